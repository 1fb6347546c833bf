//! Binary machine snapshots.
//!
//! Each component writes a fixed-size block with no padding. Booleans are
//! one byte (0 or 1; any non-zero byte reads back as true) and words are
//! little-endian. A whole-machine snapshot is, in order:
//!
//! | Block | Size |
//! |-------|------|
//! | Interrupt latches, 10 × (latched, enabled) | 20 |
//! | Memory: 64K image, then the first RAM address | 65,538 |
//! | Ports: current values, last-written values, no-drives flag | 513 |
//! | CPU registers and halt state | 29 |

use std::io::{self, Read, Write};

use thiserror::Error;
use zilog_z80::Registers;

/// Bytes in a whole-machine snapshot.
pub const SNAPSHOT_LEN: usize = 20 + 65_538 + 513 + CPU_BLOCK_LEN;

const CPU_BLOCK_LEN: usize = 29;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("snapshot is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
}

/// A component that can write and restore its state as a binary block.
pub trait Snapshot {
    fn save(&self, w: &mut dyn Write) -> io::Result<()>;
    fn load(&mut self, r: &mut dyn Read) -> io::Result<()>;
}

pub(crate) fn write_bool(w: &mut dyn Write, value: bool) -> io::Result<()> {
    w.write_all(&[u8::from(value)])
}

pub(crate) fn read_bool(r: &mut dyn Read) -> io::Result<bool> {
    Ok(read_u8(r)? != 0)
}

pub(crate) fn read_u8(r: &mut dyn Read) -> io::Result<u8> {
    let mut byte = [0];
    r.read_exact(&mut byte)?;
    Ok(byte[0])
}

pub(crate) fn write_u16(w: &mut dyn Write, value: u16) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

pub(crate) fn read_u16(r: &mut dyn Read) -> io::Result<u16> {
    let mut bytes = [0; 2];
    r.read_exact(&mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

/// Write the CPU block: the 8-bit registers in SNA header order, then the
/// 16-bit registers, then interrupt state.
pub(crate) fn write_cpu(w: &mut dyn Write, regs: &Registers, halted: bool) -> io::Result<()> {
    w.write_all(&[
        regs.i, regs.l_alt, regs.h_alt, regs.e_alt, regs.d_alt, regs.c_alt, regs.b_alt,
        regs.f_alt, regs.a_alt, regs.l, regs.h, regs.e, regs.d, regs.c, regs.b, regs.r,
        regs.f, regs.a,
    ])?;
    for word in [regs.iy, regs.ix, regs.sp, regs.pc] {
        write_u16(w, word)?;
    }
    w.write_all(&[u8::from(regs.iff1) | (u8::from(regs.iff2) << 1), regs.im])?;
    write_bool(w, halted)
}

pub(crate) fn read_cpu(r: &mut dyn Read) -> io::Result<(Registers, bool)> {
    let mut b = [0; 18];
    r.read_exact(&mut b)?;
    let mut regs = Registers {
        i: b[0],
        l_alt: b[1],
        h_alt: b[2],
        e_alt: b[3],
        d_alt: b[4],
        c_alt: b[5],
        b_alt: b[6],
        f_alt: b[7],
        a_alt: b[8],
        l: b[9],
        h: b[10],
        e: b[11],
        d: b[12],
        c: b[13],
        b: b[14],
        r: b[15],
        f: b[16],
        a: b[17],
        ..Registers::default()
    };
    regs.iy = read_u16(r)?;
    regs.ix = read_u16(r)?;
    regs.sp = read_u16(r)?;
    regs.pc = read_u16(r)?;
    let iff = read_u8(r)?;
    regs.iff1 = iff & 1 != 0;
    regs.iff2 = iff & 2 != 0;
    regs.im = read_u8(r)?;
    let halted = read_bool(r)?;
    Ok((regs, halted))
}
