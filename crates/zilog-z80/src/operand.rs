//! Instruction operands.
//!
//! Each operand of an instruction template is classified once, when the
//! instruction table is built. Rendering then works from the operand kind
//! and the encoded bytes directly instead of splicing text.

use crate::flags::Condition;

/// Registers that can appear as operands, including undocumented halves
/// of the index registers.
const REGISTERS: &[&str] = &[
    "A", "B", "C", "D", "E", "H", "L", "I", "R", "F", "AF", "AF'", "BC", "DE", "HL", "SP",
    "IX", "IY", "IXH", "IXL", "IYH", "IYL",
];

/// Mnemonics whose first operand may be a branch condition.
const BRANCHES: &[&str] = &["JP", "JR", "CALL", "RET"];

/// Index register addressed by an `(IX+d)` / `(IY+d)` operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRegister {
    Ix,
    Iy,
}

impl IndexRegister {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ix => "IX",
            Self::Iy => "IY",
        }
    }
}

/// Numeric operand read from the bytes that follow the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Numeric {
    /// 8-bit literal (`N`).
    Byte,
    /// 16-bit literal (`NN`).
    Word,
    /// 16-bit absolute memory address (`(NN)`).
    Address,
    /// 8-bit port number (`(N)`).
    Port,
    /// Signed jump offset (`e`), resolved to an absolute target.
    Relative,
}

impl Numeric {
    const fn extra_bytes(self) -> u8 {
        match self {
            Self::Word | Self::Address => 2,
            Self::Byte | Self::Port | Self::Relative => 1,
        }
    }
}

/// One operand of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A register or register pair, optionally used as a pointer (`(HL)`).
    Register { name: Box<str>, indirect: bool },
    /// Indexed memory access `(IX+d)` with a signed displacement byte.
    IndexedRegister(IndexRegister),
    /// A value taken from the instruction stream.
    Numeric(Numeric),
    /// A branch condition (`NZ`, `PE`, ...).
    FlagState(Condition),
    /// A constant baked into the opcode: bit numbers, `IM` modes, `RST`
    /// vectors, the `0` of `OUT (C), 0`.
    Implied(Box<str>),
}

/// The encoded bytes of one instruction at a given address.
#[derive(Debug, Clone, Copy)]
pub struct Encoded<'a> {
    /// Address of the first opcode byte.
    pub pc: u16,
    /// All `size` bytes of the instruction.
    pub bytes: &'a [u8],
    /// Number of leading opcode bytes before any displacement or literal.
    pub core_size: u8,
}

impl Encoded<'_> {
    fn at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    fn last(&self) -> u8 {
        self.bytes[self.bytes.len() - 1]
    }

    fn displacement(&self) -> i8 {
        self.at(self.core_size as usize) as i8
    }

    fn word(&self) -> u16 {
        let at = self.core_size as usize;
        u16::from_le_bytes([self.at(at), self.at(at + 1)])
    }
}

/// Which text form an operand is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Disassembly listing: bare fixed-width hex.
    Listing,
    /// Re-assemblable source: hex carries an `H` suffix.
    Source,
}

impl Operand {
    /// Classify one operand of the template for `mnemonic`.
    ///
    /// `position` is the operand's index and `count` the total number of
    /// operands, so that `C` can be told apart from the carry condition.
    #[must_use]
    pub fn parse(mnemonic: &str, text: &str, position: usize, count: usize) -> Self {
        let conditional = BRANCHES.contains(&mnemonic)
            && position == 0
            && (count == 2 || mnemonic == "RET");
        if conditional {
            if let Some(condition) = Condition::from_name(text) {
                return Self::FlagState(condition);
            }
        }

        match text {
            "NN" => return Self::Numeric(Numeric::Word),
            "(NN)" => return Self::Numeric(Numeric::Address),
            "N" => return Self::Numeric(Numeric::Byte),
            "(N)" => return Self::Numeric(Numeric::Port),
            "e" => return Self::Numeric(Numeric::Relative),
            "(IX+d)" => return Self::IndexedRegister(IndexRegister::Ix),
            "(IY+d)" => return Self::IndexedRegister(IndexRegister::Iy),
            _ => {}
        }

        if REGISTERS.contains(&text) {
            return Self::Register {
                name: text.into(),
                indirect: false,
            };
        }
        if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            if REGISTERS.contains(&inner) {
                return Self::Register {
                    name: inner.into(),
                    indirect: true,
                };
            }
        }
        Self::Implied(text.into())
    }

    /// Bytes this operand adds after the opcode.
    #[must_use]
    pub const fn extra_bytes(&self) -> u8 {
        match self {
            Self::IndexedRegister(_) => 1,
            Self::Numeric(kind) => kind.extra_bytes(),
            Self::Register { .. } | Self::FlagState(_) | Self::Implied(_) => 0,
        }
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }

    /// Value of a numeric operand. Relative offsets resolve to the absolute
    /// target `pc + size + offset`.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not numeric; asking for the value of a
    /// register or condition is a caller bug.
    #[must_use]
    pub fn numeric_value(&self, encoded: &Encoded<'_>) -> u16 {
        let Self::Numeric(kind) = self else {
            panic!("operand {self:?} has no numeric value");
        };
        match kind {
            Numeric::Byte | Numeric::Port => u16::from(encoded.last()),
            Numeric::Word | Numeric::Address => encoded.word(),
            Numeric::Relative => encoded
                .pc
                .wrapping_add(encoded.bytes.len() as u16)
                .wrapping_add(encoded.displacement() as u16),
        }
    }

    /// Low and high data bytes of a numeric operand.
    ///
    /// # Panics
    ///
    /// Panics if the operand is not numeric.
    #[must_use]
    pub fn data_bytes(&self, encoded: &Encoded<'_>) -> (u8, u8) {
        let [lo, hi] = self.numeric_value(encoded).to_le_bytes();
        (lo, hi)
    }

    /// Render the operand with values taken from `encoded`.
    #[must_use]
    pub fn render(&self, encoded: &Encoded<'_>, style: Style) -> String {
        let suffix = match style {
            Style::Listing => "",
            Style::Source => "H",
        };
        match self {
            Self::Register { name, indirect } => {
                if *indirect {
                    format!("({name})")
                } else {
                    name.to_string()
                }
            }
            Self::IndexedRegister(reg) => {
                let d = encoded.displacement();
                let sign = if d < 0 { '-' } else { '+' };
                format!("({}{sign}{:02X}{suffix})", reg.name(), d.unsigned_abs())
            }
            Self::Numeric(kind) => {
                let value = self.numeric_value(encoded);
                match kind {
                    Numeric::Byte => format!("{value:02X}{suffix}"),
                    Numeric::Port => format!("({value:02X}{suffix})"),
                    Numeric::Word | Numeric::Relative => format!("{value:04X}{suffix}"),
                    Numeric::Address => format!("({value:04X}{suffix})"),
                }
            }
            Self::FlagState(condition) => condition.name().to_string(),
            Self::Implied(text) => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(pc: u16, bytes: &[u8], core_size: u8) -> Encoded<'_> {
        Encoded {
            pc,
            bytes,
            core_size,
        }
    }

    #[test]
    fn carry_condition_versus_c_register() {
        assert_eq!(
            Operand::parse("JR", "C", 0, 2),
            Operand::FlagState(Condition::Carry)
        );
        assert_eq!(
            Operand::parse("RET", "C", 0, 1),
            Operand::FlagState(Condition::Carry)
        );
        assert_eq!(
            Operand::parse("LD", "C", 0, 2),
            Operand::Register {
                name: "C".into(),
                indirect: false
            }
        );
        assert_eq!(
            Operand::parse("IN", "(C)", 1, 2),
            Operand::Register {
                name: "C".into(),
                indirect: true
            }
        );
    }

    #[test]
    fn template_tokens_classify() {
        assert_eq!(Operand::parse("LD", "NN", 1, 2), Operand::Numeric(Numeric::Word));
        assert_eq!(Operand::parse("LD", "(NN)", 0, 2), Operand::Numeric(Numeric::Address));
        assert_eq!(Operand::parse("OUT", "(N)", 0, 2), Operand::Numeric(Numeric::Port));
        assert_eq!(Operand::parse("JR", "e", 0, 1), Operand::Numeric(Numeric::Relative));
        assert_eq!(
            Operand::parse("LD", "(IY+d)", 0, 2),
            Operand::IndexedRegister(IndexRegister::Iy)
        );
        assert_eq!(Operand::parse("RST", "38", 0, 1), Operand::Implied("38".into()));
    }

    #[test]
    fn relative_target_is_absolute() {
        // JR -2 at 0x4000 jumps to itself.
        let bytes = [0x18, 0xFE];
        let enc = encoded(0x4000, &bytes, 1);
        let op = Operand::Numeric(Numeric::Relative);
        assert_eq!(op.numeric_value(&enc), 0x4000);
        assert_eq!(op.render(&enc, Style::Listing), "4000");
        assert_eq!(op.render(&enc, Style::Source), "4000H");
    }

    #[test]
    fn negative_displacement_renders_with_minus() {
        let bytes = [0xDD, 0x7E, 0xFB];
        let enc = encoded(0, &bytes, 2);
        let op = Operand::IndexedRegister(IndexRegister::Ix);
        assert_eq!(op.render(&enc, Style::Listing), "(IX-05)");
        assert_eq!(op.render(&enc, Style::Source), "(IX-05H)");
    }

    #[test]
    fn word_data_bytes_are_little_endian() {
        let bytes = [0x21, 0x34, 0x12];
        let enc = encoded(0, &bytes, 1);
        let op = Operand::Numeric(Numeric::Word);
        assert_eq!(op.data_bytes(&enc), (0x34, 0x12));
    }

    #[test]
    #[should_panic(expected = "has no numeric value")]
    fn register_has_no_numeric_value() {
        let bytes = [0x78];
        let enc = encoded(0, &bytes, 1);
        let op = Operand::parse("LD", "A", 0, 2);
        let _ = op.numeric_value(&enc);
    }
}
