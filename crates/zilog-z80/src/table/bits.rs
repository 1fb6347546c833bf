//! The `CB` page and the `DDCB`/`FDCB` indexed bit operations.

use super::{InstructionSet, plain, reg_name};
use crate::alu;
use crate::cpu::Index;
use crate::flags::CF;
use crate::instruction::Instruction;

const SHIFT_NAMES: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

/// What a bit-page opcode does to its operand, selected by bits 6-7.
#[derive(Clone, Copy)]
enum BitOp {
    Shift(u8),
    Test(u8),
    Reset(u8),
    Set(u8),
}

impl BitOp {
    const fn decode(opcode: u8) -> Self {
        let y = (opcode >> 3) & 7;
        match opcode >> 6 {
            0 => Self::Shift(y),
            1 => Self::Test(y),
            2 => Self::Reset(y),
            _ => Self::Set(y),
        }
    }

    /// Mnemonic and leading operand text.
    fn prefix(self) -> String {
        match self {
            Self::Shift(op) => format!("{} ", SHIFT_NAMES[op as usize]),
            Self::Test(n) => format!("BIT {n}, "),
            Self::Reset(n) => format!("RES {n}, "),
            Self::Set(n) => format!("SET {n}, "),
        }
    }

    /// Apply a read-modify-write operation, updating flags for shifts.
    fn modify(self, f: &mut u8, v: u8) -> u8 {
        match self {
            Self::Shift(op) => {
                let result = alu::rotate(op, v, *f & CF != 0);
                *f = result.flags;
                result.value
            }
            Self::Reset(n) => v & !(1 << n),
            Self::Set(n) => v | (1 << n),
            Self::Test(_) => v,
        }
    }
}

pub(super) fn add_all(table: &mut InstructionSet) {
    for opcode in 0..=255u8 {
        cb_form(table, opcode);
        for idx in [Index::Ix, Index::Iy] {
            indexed_form(table, idx, opcode);
        }
    }
}

fn cb_form(table: &mut InstructionSet, opcode: u8) {
    let op = BitOp::decode(opcode);
    let z = opcode & 7;
    let name = format!("{}{}", op.prefix(), reg_name(z, Index::Hl));

    let (t_states, action) = match (op, z) {
        (BitOp::Test(n), 6) => (
            12,
            plain(move |cpu, bus| {
                let v = bus.read(cpu.regs.hl());
                cpu.regs.f = alu::bit(n, v, cpu.regs.h, cpu.regs.f & CF != 0);
            }),
        ),
        (BitOp::Test(n), _) => (
            8,
            plain(move |cpu, _| {
                let v = cpu.reg8(z, Index::Hl);
                cpu.regs.f = alu::bit(n, v, v, cpu.regs.f & CF != 0);
            }),
        ),
        (_, 6) => (
            15,
            plain(move |cpu, bus| {
                let addr = cpu.regs.hl();
                let v = bus.read(addr);
                let v = op.modify(&mut cpu.regs.f, v);
                bus.write(addr, v);
            }),
        ),
        _ => (
            8,
            plain(move |cpu, _| {
                let v = cpu.reg8(z, Index::Hl);
                let v = op.modify(&mut cpu.regs.f, v);
                cpu.set_reg8(z, Index::Hl, v);
            }),
        ),
    };
    table.add(Instruction::new(name, t_states, 0xCB, Some(opcode), None, action));
}

/// `DDCB d op` and `FDCB d op`. Forms with a register field other than 6
/// also copy the result into that register (undocumented).
fn indexed_form(table: &mut InstructionSet, idx: Index, opcode: u8) {
    let op = BitOp::decode(opcode);
    let z = opcode & 7;
    let Some(prefix) = idx.prefix() else {
        return;
    };

    let mut name = format!("{}{}", op.prefix(), idx.memory_name());
    if z != 6 && !matches!(op, BitOp::Test(_)) {
        name = format!("{name}, {}", reg_name(z, Index::Hl));
    }

    let (t_states, action) = match op {
        BitOp::Test(n) => (
            20,
            plain(move |cpu, bus| {
                let addr = cpu.memory_address(bus, idx);
                let v = bus.read(addr);
                cpu.regs.f = alu::bit(n, v, (addr >> 8) as u8, cpu.regs.f & CF != 0);
            }),
        ),
        _ => (
            23,
            plain(move |cpu, bus| {
                let addr = cpu.memory_address(bus, idx);
                let v = bus.read(addr);
                let v = op.modify(&mut cpu.regs.f, v);
                bus.write(addr, v);
                if z != 6 {
                    cpu.set_reg8(z, Index::Hl, v);
                }
            }),
        ),
    };
    table.add(Instruction::new(name, t_states, prefix, Some(0xCB), Some(opcode), action));
}
