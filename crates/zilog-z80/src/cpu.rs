//! The Z80 execution engine.
//!
//! Decoding goes through the static [`InstructionSet`]; this module holds
//! the register file, the operand accessors the table's actions use and
//! interrupt acceptance.

use emu_core::{Bus, Cpu, Ticks};
use log::trace;

use crate::Registers;
use crate::table::InstructionSet;

/// Where `H`, `L` and `(HL)` point for the current instruction.
///
/// `DD` and `FD` prefixes redirect them to the index registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Index {
    Hl,
    Ix,
    Iy,
}

impl Index {
    pub(crate) const fn prefix(self) -> Option<u8> {
        match self {
            Self::Hl => None,
            Self::Ix => Some(0xDD),
            Self::Iy => Some(0xFD),
        }
    }

    pub(crate) const fn pair_name(self) -> &'static str {
        match self {
            Self::Hl => "HL",
            Self::Ix => "IX",
            Self::Iy => "IY",
        }
    }

    pub(crate) const fn high_name(self) -> &'static str {
        match self {
            Self::Hl => "H",
            Self::Ix => "IXH",
            Self::Iy => "IYH",
        }
    }

    pub(crate) const fn low_name(self) -> &'static str {
        match self {
            Self::Hl => "L",
            Self::Ix => "IXL",
            Self::Iy => "IYL",
        }
    }

    pub(crate) const fn memory_name(self) -> &'static str {
        match self {
            Self::Hl => "(HL)",
            Self::Ix => "(IX+d)",
            Self::Iy => "(IY+d)",
        }
    }
}

/// Position of the instruction being executed, for operand fetches.
#[derive(Debug, Clone, Copy, Default)]
struct Fetch {
    pc: u16,
    core_size: u8,
    size: u8,
}

/// Zilog Z80 CPU.
#[derive(Debug, Clone, Default)]
pub struct Z80 {
    pub(crate) regs: Registers,
    pub(crate) halted: bool,
    /// Set by `EI`: interrupts stay blocked until one more instruction has
    /// completed.
    pub(crate) ei_delay: bool,
    fetch: Fetch,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.reset();
        cpu
    }

    /// Mutable register access for loaders and tests.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Address of the instruction most recently executed.
    #[must_use]
    pub const fn instruction_pc(&self) -> u16 {
        self.fetch.pc
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    // Operand fetches relative to the current instruction.

    pub(crate) fn imm8(&self, bus: &mut dyn Bus) -> u8 {
        bus.read(
            self.fetch
                .pc
                .wrapping_add(u16::from(self.fetch.size))
                .wrapping_sub(1),
        )
    }

    pub(crate) fn imm16(&self, bus: &mut dyn Bus) -> u16 {
        let at = self.fetch.pc.wrapping_add(u16::from(self.fetch.core_size));
        let lo = bus.read(at);
        let hi = bus.read(at.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn displacement(&self, bus: &mut dyn Bus) -> i8 {
        bus.read(self.fetch.pc.wrapping_add(u16::from(self.fetch.core_size))) as i8
    }

    /// Target of a relative jump: `pc + size + e`.
    pub(crate) fn relative_target(&self, bus: &mut dyn Bus) -> u16 {
        let e = self.displacement(bus);
        self.fetch
            .pc
            .wrapping_add(u16::from(self.fetch.size))
            .wrapping_add(e as u16)
    }

    /// Restart the current instruction (block repeats).
    pub(crate) fn repeat(&mut self) {
        self.regs.pc = self.fetch.pc;
    }

    // Register access, with index substitution.

    pub(crate) fn index_value(&self, idx: Index) -> u16 {
        match idx {
            Index::Hl => self.regs.hl(),
            Index::Ix => self.regs.ix,
            Index::Iy => self.regs.iy,
        }
    }

    pub(crate) fn set_index_value(&mut self, idx: Index, value: u16) {
        match idx {
            Index::Hl => self.regs.set_hl(value),
            Index::Ix => self.regs.ix = value,
            Index::Iy => self.regs.iy = value,
        }
    }

    /// Effective address of `(HL)` or `(IX+d)`.
    pub(crate) fn memory_address(&self, bus: &mut dyn Bus, idx: Index) -> u16 {
        match idx {
            Index::Hl => self.regs.hl(),
            _ => {
                let d = self.displacement(bus);
                self.index_value(idx).wrapping_add(d as u16)
            }
        }
    }

    /// 8-bit register by its 3-bit opcode code. Code 6 is memory and must
    /// be handled by the caller.
    pub(crate) fn reg8(&self, code: u8, idx: Index) -> u8 {
        match code & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => (self.index_value(idx) >> 8) as u8,
            5 => self.index_value(idx) as u8,
            7 => self.regs.a,
            _ => unreachable!("(HL) is not a register"),
        }
    }

    pub(crate) fn set_reg8(&mut self, code: u8, idx: Index, value: u8) {
        match code & 7 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => {
                let v = self.index_value(idx);
                self.set_index_value(idx, (v & 0x00FF) | (u16::from(value) << 8));
            }
            5 => {
                let v = self.index_value(idx);
                self.set_index_value(idx, (v & 0xFF00) | u16::from(value));
            }
            7 => self.regs.a = value,
            _ => unreachable!("(HL) is not a register"),
        }
    }

    /// Register pair by its 2-bit code, with SP as pair 3.
    pub(crate) fn reg16(&self, code: u8, idx: Index) -> u16 {
        match code & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.index_value(idx),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_reg16(&mut self, code: u8, idx: Index, value: u16) {
        match code & 3 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.set_index_value(idx, value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair by its 2-bit code, with AF as pair 3 (`PUSH`/`POP`).
    pub(crate) fn reg16_af(&self, code: u8, idx: Index) -> u16 {
        if code & 3 == 3 {
            self.regs.af()
        } else {
            self.reg16(code, idx)
        }
    }

    pub(crate) fn set_reg16_af(&mut self, code: u8, idx: Index, value: u16) {
        if code & 3 == 3 {
            self.regs.set_af(value);
        } else {
            self.set_reg16(code, idx, value);
        }
    }

    // Stack and word memory helpers.

    pub(crate) fn read16(bus: &mut dyn Bus, address: u16) -> u16 {
        let lo = bus.read(address);
        let hi = bus.read(address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn write16(bus: &mut dyn Bus, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        bus.write(address, lo);
        bus.write(address.wrapping_add(1), hi);
    }

    pub(crate) fn push(&mut self, bus: &mut dyn Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    pub(crate) fn pop(&mut self, bus: &mut dyn Bus) -> u16 {
        let value = Self::read16(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// Decode and run one instruction, returning its cost.
    fn execute_one(&mut self, bus: &mut dyn Bus) -> Ticks {
        if self.halted {
            self.regs.bump_r(1);
            return Ticks::from_t_states(4);
        }
        self.ei_delay = false;

        let pc = self.regs.pc;
        let instruction = InstructionSet::get().decode(|addr| bus.read(addr), pc);
        self.fetch = Fetch {
            pc,
            core_size: instruction.opcode_core_size(),
            size: instruction.size(),
        };
        self.regs.pc = pc.wrapping_add(u16::from(instruction.size()));
        self.regs.bump_r(instruction.r_increment());
        trace!("{pc:04X}  {}", instruction.name());

        if instruction.execute(self, bus) {
            instruction.ticks_with_extra()
        } else {
            instruction.ticks()
        }
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> Ticks {
        self.execute_one(bus)
    }

    fn pc(&self) -> u16 {
        self.regs.pc
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> Option<Ticks> {
        if !self.regs.iff1 || self.ei_delay {
            return None;
        }
        self.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.bump_r(1);
        let return_to = self.regs.pc;
        self.push(bus, return_to);
        if self.regs.im == 2 {
            let vector = (u16::from(self.regs.i) << 8) | 0xFF;
            self.regs.pc = Self::read16(bus, vector);
            Some(Ticks::from_t_states(19))
        } else {
            // The data bus floats to 0xFF in IM 0, which is RST 38.
            self.regs.pc = 0x0038;
            Some(Ticks::from_t_states(13))
        }
    }

    fn nmi<B: Bus>(&mut self, bus: &mut B) -> Ticks {
        self.halted = false;
        self.regs.iff1 = false;
        self.regs.bump_r(1);
        let return_to = self.regs.pc;
        self.push(bus, return_to);
        self.regs.pc = 0x0066;
        Ticks::from_t_states(11)
    }

    fn reset(&mut self) {
        self.regs = Registers {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.halted = false;
        self.ei_delay = false;
        self.fetch = Fetch::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn cpu_with(program: &[u8]) -> (Z80, SimpleBus) {
        let mut bus = SimpleBus::new();
        bus.load(0, program);
        let mut cpu = Z80::new();
        cpu.regs.sp = 0x8000;
        (cpu, bus)
    }

    #[test]
    fn reset_state() {
        let cpu = Z80::new();
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.regs.sp, 0xFFFF);
        assert_eq!(cpu.regs.af(), 0xFFFF);
        assert!(!cpu.regs.iff1);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn halted_cpu_idles_four_t_states() {
        let (mut cpu, mut bus) = cpu_with(&[0x76]);
        assert_eq!(cpu.step(&mut bus), Ticks::from_t_states(4));
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc(), 1);
        let r = cpu.regs.r;
        assert_eq!(cpu.step(&mut bus), Ticks::from_t_states(4));
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.regs.r, r + 1);
    }

    #[test]
    fn ei_blocks_interrupts_for_one_instruction() {
        // EI; NOP
        let (mut cpu, mut bus) = cpu_with(&[0xFB, 0x00]);
        cpu.step(&mut bus);
        assert!(cpu.interrupt(&mut bus).is_none());
        cpu.step(&mut bus);
        assert_eq!(cpu.interrupt(&mut bus), Some(Ticks::from_t_states(13)));
        assert_eq!(cpu.pc(), 0x38);
        assert_eq!(bus.peek(0x7FFE), 0x02);
    }

    #[test]
    fn interrupt_wakes_halt_past_the_halt() {
        // EI; HALT
        let (mut cpu, mut bus) = cpu_with(&[0xFB, 0x76]);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        assert!(cpu.interrupt(&mut bus).is_some());
        assert!(!cpu.is_halted());
        // Return address is the byte after HALT.
        assert_eq!(bus.peek(0x7FFE), 0x02);
        assert_eq!(bus.peek(0x7FFF), 0x00);
    }

    #[test]
    fn im2_reads_vector_table() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        bus.load(0x12FF, &[0x34, 0x56]);
        cpu.regs.i = 0x12;
        cpu.regs.im = 2;
        cpu.regs.iff1 = true;
        assert_eq!(cpu.interrupt(&mut bus), Some(Ticks::from_t_states(19)));
        assert_eq!(cpu.pc(), 0x5634);
    }

    #[test]
    fn nmi_preserves_iff2() {
        let (mut cpu, mut bus) = cpu_with(&[0x00]);
        cpu.regs.iff1 = true;
        cpu.regs.iff2 = true;
        assert_eq!(cpu.nmi(&mut bus), Ticks::from_t_states(11));
        assert_eq!(cpu.pc(), 0x66);
        assert!(!cpu.regs.iff1);
        assert!(cpu.regs.iff2);
    }

    #[test]
    fn index_halves_substitute_for_h_and_l() {
        let mut cpu = Z80::new();
        cpu.regs.ix = 0x1234;
        cpu.set_reg8(4, Index::Ix, 0xAB);
        assert_eq!(cpu.regs.ix, 0xAB34);
        assert_eq!(cpu.reg8(5, Index::Ix), 0x34);
        assert_eq!(cpu.regs.h, 0);
    }
}
