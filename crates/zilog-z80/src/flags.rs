//! Z80 flag register bits and branch conditions.

/// Sign flag (bit 7) - set if result is negative.
pub const SF: u8 = 0b1000_0000;

/// Zero flag (bit 6) - set if result is zero.
pub const ZF: u8 = 0b0100_0000;

/// Undocumented flag (bit 5) - copy of bit 5 of result.
pub const YF: u8 = 0b0010_0000;

/// Half-carry flag (bit 4) - carry from bit 3 to bit 4.
pub const HF: u8 = 0b0001_0000;

/// Undocumented flag (bit 3) - copy of bit 3 of result.
pub const XF: u8 = 0b0000_1000;

/// Parity/Overflow flag (bit 2) - parity or overflow depending on instruction.
pub const PF: u8 = 0b0000_0100;

/// Add/Subtract flag (bit 1) - set if last operation was a subtraction.
pub const NF: u8 = 0b0000_0010;

/// Carry flag (bit 0) - carry out of bit 7.
pub const CF: u8 = 0b0000_0001;

/// Sign, zero and the two undocumented bits for a result byte.
#[must_use]
pub const fn sz53(value: u8) -> u8 {
    let mut f = value & (SF | YF | XF);
    if value == 0 {
        f |= ZF;
    }
    f
}

/// [`sz53`] plus even parity in PF.
#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    let mut f = sz53(value);
    if value.count_ones() % 2 == 0 {
        f |= PF;
    }
    f
}

/// Branch condition encoded in bits 3-5 of conditional opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NonZero,
    Zero,
    NoCarry,
    Carry,
    ParityOdd,
    ParityEven,
    Positive,
    Minus,
}

impl Condition {
    pub const ALL: [Self; 8] = [
        Self::NonZero,
        Self::Zero,
        Self::NoCarry,
        Self::Carry,
        Self::ParityOdd,
        Self::ParityEven,
        Self::Positive,
        Self::Minus,
    ];

    /// Condition selected by the `ccc` field of an opcode.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        Self::ALL[(code & 7) as usize]
    }

    /// Assembler spelling of the condition.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NonZero => "NZ",
            Self::Zero => "Z",
            Self::NoCarry => "NC",
            Self::Carry => "C",
            Self::ParityOdd => "PO",
            Self::ParityEven => "PE",
            Self::Positive => "P",
            Self::Minus => "M",
        }
    }

    /// Parse an assembler spelling.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Evaluate against a flags byte.
    #[must_use]
    pub const fn holds(self, f: u8) -> bool {
        match self {
            Self::NonZero => f & ZF == 0,
            Self::Zero => f & ZF != 0,
            Self::NoCarry => f & CF == 0,
            Self::Carry => f & CF != 0,
            Self::ParityOdd => f & PF == 0,
            Self::ParityEven => f & PF != 0,
            Self::Positive => f & SF == 0,
            Self::Minus => f & SF != 0,
        }
    }
}
