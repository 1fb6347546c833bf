//! ALU operations for the Z80.
//!
//! Every function is pure: it takes operands and the incoming carry and
//! returns the result together with the complete new flags byte (callers
//! merge in any flags the instruction preserves).

#![allow(clippy::verbose_bit_mask)]

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add two bytes with optional carry.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let value = wide as u8;

    let mut flags = sz53(value);
    if (a & 0x0F) + (b & 0x0F) + c > 0x0F {
        flags |= HF;
    }
    if (a ^ b) & 0x80 == 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// Subtract with optional borrow.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = sz53(value) | NF;
    if (a & 0x0F) < (b & 0x0F) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if u16::from(a) < u16::from(b) + u16::from(c) {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// Compare: a subtraction whose undocumented bits come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let mut result = sub8(a, b, false);
    result.flags = (result.flags & !(YF | XF)) | (b & (YF | XF));
    result.value = a;
    result
}

/// One of the eight accumulator operations selected by bits 3-5 of the
/// opcode: ADD, ADC, SUB, SBC, AND, XOR, OR, CP.
#[must_use]
pub fn accumulate(op: u8, a: u8, b: u8, carry: bool) -> AluResult {
    match op & 7 {
        0 => add8(a, b, false),
        1 => add8(a, b, carry),
        2 => sub8(a, b, false),
        3 => sub8(a, b, carry),
        4 => {
            let value = a & b;
            AluResult { value, flags: sz53p(value) | HF }
        }
        5 => {
            let value = a ^ b;
            AluResult { value, flags: sz53p(value) }
        }
        6 => {
            let value = a | b;
            AluResult { value, flags: sz53p(value) }
        }
        _ => cp8(a, b),
    }
}

/// Increment byte. Carry is not affected; callers preserve it.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let mut flags = sz53(value);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// Decrement byte. Carry is not affected; callers preserve it.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let mut flags = sz53(value) | NF;
    if a & 0x0F == 0x00 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult { value, flags }
}

/// One of the eight CB-page rotates and shifts selected by bits 3-5:
/// RLC, RRC, RL, RR, SLA, SRA, SLL (undocumented), SRL.
#[must_use]
pub fn rotate(op: u8, a: u8, carry: bool) -> AluResult {
    let (value, out) = match op & 7 {
        0 => (a.rotate_left(1), a & 0x80 != 0),
        1 => (a.rotate_right(1), a & 0x01 != 0),
        2 => ((a << 1) | u8::from(carry), a & 0x80 != 0),
        3 => ((a >> 1) | (u8::from(carry) << 7), a & 0x01 != 0),
        4 => (a << 1, a & 0x80 != 0),
        5 => ((a >> 1) | (a & 0x80), a & 0x01 != 0),
        6 => ((a << 1) | 1, a & 0x80 != 0),
        _ => (a >> 1, a & 0x01 != 0),
    };
    AluResult {
        value,
        flags: sz53p(value) | if out { CF } else { 0 },
    }
}

/// Flags for `BIT n, v`. `xy_source` supplies the undocumented bits 3 and 5
/// (the operand for registers, the address high byte for memory forms).
#[must_use]
pub fn bit(n: u8, v: u8, xy_source: u8, carry: bool) -> u8 {
    let tested = v & (1 << (n & 7));
    let mut flags = HF | (xy_source & (YF | XF));
    if tested == 0 {
        flags |= ZF | PF;
    }
    if tested & 0x80 != 0 {
        flags |= SF;
    }
    if carry {
        flags |= CF;
    }
    flags
}

/// Decimal adjust after BCD addition or subtraction.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let mut correction = 0u8;
    let mut carry = f & CF != 0;
    if f & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let subtract = f & NF != 0;
    let value = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        f & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut flags = sz53p(value) | (f & NF);
    if half {
        flags |= HF;
    }
    if carry {
        flags |= CF;
    }
    AluResult { value, flags }
}

/// 16-bit add for HL/IX/IY. Returns the result and the H, C, X, Y bits;
/// S, Z and P/V are preserved by the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (YF | XF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// 16-bit add with carry (`ADC HL, rr`).
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let wide = u32::from(a) + u32::from(b) + u32::from(c);
    let value = wide as u16;

    let mut flags = ((value >> 8) as u8) & (SF | YF | XF);
    if value == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// 16-bit subtract with borrow (`SBC HL, rr`).
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);

    let mut flags = (((value >> 8) as u8) & (SF | YF | XF)) | NF;
    if value == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) < (b & 0x0FFF) + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if u32::from(a) < u32::from(b) + u32::from(c) {
        flags |= CF;
    }
    (value, flags)
}
