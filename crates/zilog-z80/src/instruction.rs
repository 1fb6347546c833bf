//! Instruction descriptors.
//!
//! An [`Instruction`] is one row of the decode table: its opcode bytes,
//! layout, timing and the behaviour that executes it. Descriptors are
//! built once and never change.

use std::fmt;

use emu_core::{Bus, Ticks};

use crate::Z80;
use crate::operand::{Encoded, Numeric, Operand, Style};

/// Executes one instruction. Returns `true` when a conditional branch was
/// taken or a block instruction repeats, in which case the alternate
/// T-states are added to the cost.
pub type Action = Box<dyn Fn(&mut Z80, &mut dyn Bus) -> bool + Send + Sync>;

/// One decoded Z80 instruction form.
pub struct Instruction {
    name: String,
    mnemonic: String,
    operands: Vec<Operand>,
    op0: u8,
    op1: Option<u8>,
    op3: Option<u8>,
    opcode_core_size: u8,
    opcode_size: u8,
    size: u8,
    t_states: u8,
    t_states_alt: u8,
    r_increment: u8,
    is_prefix: bool,
    action: Action,
}

impl Instruction {
    /// Build a descriptor from its template name, e.g. `"LD (IX+d), N"`.
    ///
    /// `op3` is only used by the four-byte `DDCB`/`FDCB` forms, where the
    /// final opcode byte follows the displacement.
    ///
    /// # Panics
    ///
    /// Panics if the opcode bytes and template disagree about the layout.
    /// The table is static, so this fires on the first decode or not at all.
    #[must_use]
    pub fn new(name: impl Into<String>, t_states: u8, op0: u8, op1: Option<u8>, op3: Option<u8>, action: Action) -> Self {
        let name = name.into();
        let (mnemonic, rest) = name.split_once(' ').unwrap_or((name.as_str(), ""));
        let texts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(", ").collect()
        };
        let operands: Vec<Operand> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Operand::parse(mnemonic, text, i, texts.len()))
            .collect();

        assert!(op3.is_none() || op1.is_some(), "{name}: op3 without op1");

        let opcode_core_size = if op1.is_some() { 2 } else { 1 };
        let opcode_size = opcode_core_size + u8::from(op3.is_some());
        let extra: u8 = operands.iter().map(Operand::extra_bytes).sum();
        // The DDCB displacement sits inside the opcode and is already
        // counted by the indexed operand.
        let size = opcode_core_size + extra + u8::from(op3.is_some());

        let numerics: Vec<&Operand> = operands.iter().filter(|o| o.is_numeric()).collect();
        let indexed = operands
            .iter()
            .any(|o| matches!(o, Operand::IndexedRegister(_)));
        assert!(numerics.len() <= 1, "{name}: more than one numeric operand");
        if indexed && !numerics.is_empty() {
            assert!(
                numerics[0] == &Operand::Numeric(Numeric::Byte),
                "{name}: indexed operand combined with a wide literal"
            );
        }
        if op3.is_some() {
            assert!(indexed && size == 4, "{name}: malformed four-byte form");
        }
        let has_tokens = indexed || !numerics.is_empty();
        assert!(
            !has_tokens || size > opcode_size,
            "{name}: operands without operand bytes"
        );

        let r_increment = if matches!(op0, 0xCB | 0xDD | 0xED | 0xFD) {
            2
        } else {
            1
        };

        Self {
            mnemonic: mnemonic.to_string(),
            name,
            operands,
            op0,
            op1,
            op3,
            opcode_core_size,
            opcode_size,
            size,
            t_states,
            t_states_alt: 0,
            r_increment,
            is_prefix: false,
            action,
        }
    }

    /// Extra T-states charged when the action reports a taken branch.
    #[must_use]
    pub fn with_alt(mut self, t_states_alt: u8) -> Self {
        self.t_states_alt = t_states_alt;
        self
    }

    /// Mark as a bare prefix byte: the fallback for an index prefix whose
    /// second byte has no indexed meaning.
    #[must_use]
    pub fn as_prefix(mut self) -> Self {
        self.is_prefix = true;
        self.r_increment = 1;
        self
    }

    /// The template name, e.g. `"LD A, (IX+d)"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    #[must_use]
    pub const fn op0(&self) -> u8 {
        self.op0
    }

    #[must_use]
    pub const fn op1(&self) -> Option<u8> {
        self.op1
    }

    #[must_use]
    pub const fn op3(&self) -> Option<u8> {
        self.op3
    }

    /// Opcode bytes before any displacement or literal.
    #[must_use]
    pub const fn opcode_core_size(&self) -> u8 {
        self.opcode_core_size
    }

    /// All opcode bytes, including the trailing `op3`.
    #[must_use]
    pub const fn opcode_size(&self) -> u8 {
        self.opcode_size
    }

    /// Total encoded length.
    #[must_use]
    pub const fn size(&self) -> u8 {
        self.size
    }

    #[must_use]
    pub const fn t_states(&self) -> u8 {
        self.t_states
    }

    #[must_use]
    pub const fn t_states_alt(&self) -> u8 {
        self.t_states_alt
    }

    /// Base cost in master ticks.
    #[must_use]
    pub const fn ticks(&self) -> Ticks {
        Ticks::from_t_states(self.t_states as u64)
    }

    /// Cost in master ticks when the branch is taken.
    #[must_use]
    pub const fn ticks_with_extra(&self) -> Ticks {
        Ticks::from_t_states(self.t_states as u64 + self.t_states_alt as u64)
    }

    /// Refresh-counter advance for one execution.
    #[must_use]
    pub const fn r_increment(&self) -> u8 {
        self.r_increment
    }

    #[must_use]
    pub const fn is_prefix(&self) -> bool {
        self.is_prefix
    }

    /// Opcode bytes packed into an integer: `op0`, then `op0 op1`, then
    /// `op0 op1 op3` for the four-byte forms.
    #[must_use]
    pub fn signature(&self) -> u32 {
        match (self.op1, self.op3) {
            (None, _) => u32::from(self.op0),
            (Some(op1), None) => (u32::from(self.op0) << 8) | u32::from(op1),
            (Some(op1), Some(op3)) => {
                (u32::from(self.op0) << 16) | (u32::from(op1) << 8) | u32::from(op3)
            }
        }
    }

    /// The signature left-aligned to 24 bits, so forms of every length sort
    /// together by their leading byte.
    #[must_use]
    pub fn padded_signature(&self) -> u32 {
        match (self.op1, self.op3) {
            (None, _) => self.signature() << 16,
            (Some(_), None) => self.signature() << 8,
            (Some(_), Some(_)) => self.signature(),
        }
    }

    pub(crate) fn execute(&self, cpu: &mut Z80, bus: &mut dyn Bus) -> bool {
        (self.action)(cpu, bus)
    }

    /// Listing form with operand values filled in, e.g. `"LD HL, 1234"`.
    #[must_use]
    pub fn full_name(&self, peek: impl Fn(u16) -> u8, pc: u16) -> String {
        if self.operands.is_empty() {
            return self.mnemonic.clone();
        }
        format!("{} {}", self.mnemonic, self.render_operands(&peek, pc, Style::Listing))
    }

    /// Assembler source form, e.g. `"\tLD\tHL, 1234H"`.
    #[must_use]
    pub fn assemblable_name(&self, peek: impl Fn(u16) -> u8, pc: u16) -> String {
        if self.operands.is_empty() {
            return format!("\t{}", self.mnemonic);
        }
        let mut operands = self.render_operands(&peek, pc, Style::Source);
        if self.mnemonic == "RST" {
            operands.push('H');
        }
        format!("\t{}\t{operands}", self.mnemonic)
    }

    fn render_operands(&self, peek: &impl Fn(u16) -> u8, pc: u16, style: Style) -> String {
        let bytes: Vec<u8> = (0..u16::from(self.size))
            .map(|i| peek(pc.wrapping_add(i)))
            .collect();
        let encoded = Encoded {
            pc,
            bytes: &bytes,
            core_size: self.opcode_core_size,
        };
        self.operands
            .iter()
            .map(|o| o.render(&encoded, style))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instruction")
            .field("name", &self.name)
            .field("signature", &format_args!("{:06X}", self.padded_signature()))
            .field("size", &self.size)
            .field("t_states", &self.t_states)
            .field("t_states_alt", &self.t_states_alt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop() -> Action {
        Box::new(|_, _| false)
    }

    fn peek_from(bytes: &[u8]) -> impl Fn(u16) -> u8 + '_ {
        move |addr| bytes.get(addr as usize).copied().unwrap_or(0)
    }

    #[test]
    fn layout_of_indexed_immediate_store() {
        let i = Instruction::new("LD (IX+d), N", 19, 0xDD, Some(0x36), None, nop());
        assert_eq!(i.opcode_core_size(), 2);
        assert_eq!(i.opcode_size(), 2);
        assert_eq!(i.size(), 4);
        assert_eq!(i.r_increment(), 2);
        assert_eq!(i.signature(), 0xDD36);
        assert_eq!(i.padded_signature(), 0xDD_3600);

        let mem = [0xDD, 0x36, 0x05, 0x7F];
        assert_eq!(i.full_name(peek_from(&mem), 0), "LD (IX+05), 7F");
        assert_eq!(i.assemblable_name(peek_from(&mem), 0), "\tLD\t(IX+05H), 7FH");
    }

    #[test]
    fn four_byte_form_signature() {
        let i = Instruction::new("RLC (IY+d)", 23, 0xFD, Some(0xCB), Some(0x06), nop());
        assert_eq!(i.size(), 4);
        assert_eq!(i.opcode_size(), 3);
        assert_eq!(i.signature(), 0xFD_CB06);
        assert_eq!(i.padded_signature(), 0xFD_CB06);

        let mem = [0xFD, 0xCB, 0xFE, 0x06];
        assert_eq!(i.full_name(peek_from(&mem), 0), "RLC (IY-02)");
    }

    #[test]
    fn ticks_scale_t_states() {
        let i = Instruction::new("JR NZ, e", 7, 0x20, None, None, nop()).with_alt(5);
        assert_eq!(i.ticks(), Ticks::from_t_states(7));
        assert_eq!(i.ticks_with_extra(), Ticks::from_t_states(12));
        assert_eq!(i.r_increment(), 1);
        assert_eq!(i.padded_signature(), 0x20_0000);
    }

    #[test]
    fn names_without_operand_bytes() {
        let nop_i = Instruction::new("NOP", 4, 0x00, None, None, nop());
        assert_eq!(nop_i.full_name(|_| 0, 0), "NOP");
        assert_eq!(nop_i.assemblable_name(|_| 0, 0), "\tNOP");

        let rst = Instruction::new("RST 38", 11, 0xFF, None, None, nop());
        assert_eq!(rst.full_name(|_| 0xFF, 0), "RST 38");
        assert_eq!(rst.assemblable_name(|_| 0xFF, 0), "\tRST\t38H");

        let ld = Instruction::new("LD A, B", 4, 0x78, None, None, nop());
        assert_eq!(ld.assemblable_name(|_| 0x78, 0), "\tLD\tA, B");
    }

    #[test]
    fn prefix_fallback_counts_one_refresh() {
        let p = Instruction::new("DD", 4, 0xDD, None, None, nop()).as_prefix();
        assert!(p.is_prefix());
        assert_eq!(p.r_increment(), 1);
        assert_eq!(p.size(), 1);
    }

    #[test]
    #[should_panic(expected = "more than one numeric operand")]
    fn two_literals_are_rejected() {
        let _ = Instruction::new("LD NN, N", 4, 0x00, None, None, nop());
    }
}
