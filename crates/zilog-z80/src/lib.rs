//! Zilog Z80 CPU emulator driven by a static instruction table.
//!
//! Each instruction form is described once, with its opcode bytes, size,
//! timing and behaviour, in an [`InstructionSet`] built on first use.
//! [`Z80::step`](emu_core::Cpu::step) decodes through that table and runs
//! one whole instruction, returning its cost in
//! [`Ticks`](emu_core::Ticks). The same descriptors drive the
//! disassembler.
//!
//! Undocumented behaviour covered: the `IXH`/`IXL`/`IYH`/`IYL` halves,
//! `SLL`, the register-copying `DDCB`/`FDCB` forms, `IN F, (C)`,
//! `OUT (C), 0`, the duplicate `ED` forms and the X/Y flag bits. The
//! internal `MEMPTR` register is not modelled.

mod alu;
mod cpu;
pub mod flags;
mod instruction;
mod operand;
mod registers;
mod table;

pub use cpu::Z80;
pub use flags::{CF, Condition, HF, NF, PF, SF, XF, YF, ZF};
pub use instruction::{Action, Instruction};
pub use operand::{Encoded, IndexRegister, Numeric, Operand, Style};
pub use registers::Registers;
pub use table::{InstructionSet, disassemble};
