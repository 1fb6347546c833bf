//! The `ED` page: 16-bit arithmetic with carry, block transfers, port
//! access through `C`, interrupt modes and the `I`/`R` registers.
//!
//! Opcodes the Z80 leaves undefined on this page execute as an 8 T-state
//! `NOP`.

use emu_core::Bus;

use super::{InstructionSet, branch, pair_name, plain, reg_name};
use crate::Z80;
use crate::alu;
use crate::cpu::Index;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};
use crate::instruction::{Action, Instruction};

pub(super) fn add_all(table: &mut InstructionSet) {
    for op1 in 0..=255u8 {
        let (name, t_states, alt, action) = describe(op1);
        table.add(Instruction::new(name, t_states, 0xED, Some(op1), None, action).with_alt(alt));
    }
}

fn describe(op1: u8) -> (String, u8, u8, Action) {
    let x = op1 >> 6;
    let y = (op1 >> 3) & 7;
    let z = op1 & 7;
    let p = y >> 1;
    let q = y & 1;

    match (x, z) {
        (1, 0) => {
            let name = if y == 6 {
                "IN F, (C)".to_string()
            } else {
                format!("IN {}, (C)", reg_name(y, Index::Hl))
            };
            let action = plain(move |cpu, bus| {
                let v = bus.io_read(cpu.regs.bc());
                cpu.regs.f = (cpu.regs.f & CF) | sz53p(v);
                if y != 6 {
                    cpu.set_reg8(y, Index::Hl, v);
                }
            });
            (name, 12, 0, action)
        }
        (1, 1) => {
            let name = if y == 6 {
                "OUT (C), 0".to_string()
            } else {
                format!("OUT (C), {}", reg_name(y, Index::Hl))
            };
            let action = plain(move |cpu, bus| {
                let v = if y == 6 { 0 } else { cpu.reg8(y, Index::Hl) };
                bus.io_write(cpu.regs.bc(), v);
            });
            (name, 12, 0, action)
        }
        (1, 2) => {
            let rr = pair_name(p, Index::Hl);
            let carry_in = move |cpu: &Z80| cpu.regs.f & CF != 0;
            if q == 0 {
                let action = plain(move |cpu, _| {
                    let (v, f) = alu::sbc16(cpu.regs.hl(), cpu.reg16(p, Index::Hl), carry_in(cpu));
                    cpu.regs.set_hl(v);
                    cpu.regs.f = f;
                });
                (format!("SBC HL, {rr}"), 15, 0, action)
            } else {
                let action = plain(move |cpu, _| {
                    let (v, f) = alu::adc16(cpu.regs.hl(), cpu.reg16(p, Index::Hl), carry_in(cpu));
                    cpu.regs.set_hl(v);
                    cpu.regs.f = f;
                });
                (format!("ADC HL, {rr}"), 15, 0, action)
            }
        }
        (1, 3) => {
            let rr = pair_name(p, Index::Hl);
            if q == 0 {
                let action = plain(move |cpu, bus| {
                    let addr = cpu.imm16(bus);
                    Z80::write16(bus, addr, cpu.reg16(p, Index::Hl));
                });
                (format!("LD (NN), {rr}"), 20, 0, action)
            } else {
                let action = plain(move |cpu, bus| {
                    let addr = cpu.imm16(bus);
                    let v = Z80::read16(bus, addr);
                    cpu.set_reg16(p, Index::Hl, v);
                });
                (format!("LD {rr}, (NN)"), 20, 0, action)
            }
        }
        (1, 4) => {
            let action = plain(|cpu, _| {
                let result = alu::sub8(0, cpu.regs.a, false);
                cpu.regs.a = result.value;
                cpu.regs.f = result.flags;
            });
            ("NEG".to_string(), 8, 0, action)
        }
        (1, 5) => {
            let name = if y == 1 { "RETI" } else { "RETN" };
            let action = plain(|cpu, bus| {
                cpu.regs.pc = cpu.pop(bus);
                cpu.regs.iff1 = cpu.regs.iff2;
            });
            (name.to_string(), 14, 0, action)
        }
        (1, 6) => {
            let mode = [0u8, 0, 1, 2][(y & 3) as usize];
            let action = plain(move |cpu, _| cpu.regs.im = mode);
            (format!("IM {mode}"), 8, 0, action)
        }
        (1, 7) => special_register(y),
        (2, 0..=3) if y >= 4 => block(y, z),
        _ => ("NOP".to_string(), 8, 0, plain(|_, _| {})),
    }
}

/// `LD I, A`, `LD R, A`, `LD A, I`, `LD A, R`, `RRD` and `RLD`.
fn special_register(y: u8) -> (String, u8, u8, Action) {
    let load_a = |cpu: &mut Z80, v: u8| {
        cpu.regs.a = v;
        cpu.regs.f = (cpu.regs.f & CF) | sz53(v) | if cpu.regs.iff2 { PF } else { 0 };
    };
    match y {
        0 => ("LD I, A".to_string(), 9, 0, plain(|cpu, _| cpu.regs.i = cpu.regs.a)),
        1 => ("LD R, A".to_string(), 9, 0, plain(|cpu, _| cpu.regs.r = cpu.regs.a)),
        2 => (
            "LD A, I".to_string(),
            9,
            0,
            plain(move |cpu, _| {
                let v = cpu.regs.i;
                load_a(cpu, v);
            }),
        ),
        3 => (
            "LD A, R".to_string(),
            9,
            0,
            plain(move |cpu, _| {
                let v = cpu.regs.r;
                load_a(cpu, v);
            }),
        ),
        4 => (
            "RRD".to_string(),
            18,
            0,
            plain(|cpu, bus| {
                let addr = cpu.regs.hl();
                let m = bus.read(addr);
                let a = cpu.regs.a;
                bus.write(addr, (a << 4) | (m >> 4));
                cpu.regs.a = (a & 0xF0) | (m & 0x0F);
                cpu.regs.f = (cpu.regs.f & CF) | sz53p(cpu.regs.a);
            }),
        ),
        5 => (
            "RLD".to_string(),
            18,
            0,
            plain(|cpu, bus| {
                let addr = cpu.regs.hl();
                let m = bus.read(addr);
                let a = cpu.regs.a;
                bus.write(addr, (m << 4) | (a & 0x0F));
                cpu.regs.a = (a & 0xF0) | (m >> 4);
                cpu.regs.f = (cpu.regs.f & CF) | sz53p(cpu.regs.a);
            }),
        ),
        _ => ("NOP".to_string(), 8, 0, plain(|_, _| {})),
    }
}

/// Step `HL` (and `DE`) in the block direction.
fn advance(value: u16, down: bool) -> u16 {
    if down {
        value.wrapping_sub(1)
    } else {
        value.wrapping_add(1)
    }
}

fn transfer(cpu: &mut Z80, bus: &mut dyn Bus, down: bool) {
    let v = bus.read(cpu.regs.hl());
    bus.write(cpu.regs.de(), v);
    cpu.regs.set_hl(advance(cpu.regs.hl(), down));
    cpu.regs.set_de(advance(cpu.regs.de(), down));
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);

    let n = v.wrapping_add(cpu.regs.a);
    cpu.regs.f = (cpu.regs.f & (SF | ZF | CF))
        | if bc != 0 { PF } else { 0 }
        | (n & XF)
        | ((n << 4) & YF);
}

/// Returns true when the compared byte matched.
fn compare(cpu: &mut Z80, bus: &mut dyn Bus, down: bool) -> bool {
    let v = bus.read(cpu.regs.hl());
    let a = cpu.regs.a;
    let result = a.wrapping_sub(v);
    let half = (a & 0x0F) < (v & 0x0F);
    cpu.regs.set_hl(advance(cpu.regs.hl(), down));
    let bc = cpu.regs.bc().wrapping_sub(1);
    cpu.regs.set_bc(bc);

    let n = result.wrapping_sub(u8::from(half));
    cpu.regs.f = (cpu.regs.f & CF)
        | NF
        | (sz53(result) & (SF | ZF))
        | if half { HF } else { 0 }
        | if bc != 0 { PF } else { 0 }
        | (n & XF)
        | ((n << 4) & YF);
    result == 0
}

/// Flags shared by the block port instructions. `k` is the transferred
/// byte plus the adjusted `C` or `L`.
fn port_block_flags(cpu: &mut Z80, v: u8, k: u16) {
    let b = cpu.regs.b;
    let mut f = sz53(b);
    if v & 0x80 != 0 {
        f |= NF;
    }
    if k > 0xFF {
        f |= HF | CF;
    }
    f |= sz53p(((k as u8) & 7) ^ b) & PF;
    cpu.regs.f = f;
}

fn port_in(cpu: &mut Z80, bus: &mut dyn Bus, down: bool) {
    let v = bus.io_read(cpu.regs.bc());
    bus.write(cpu.regs.hl(), v);
    cpu.regs.set_hl(advance(cpu.regs.hl(), down));
    cpu.regs.b = cpu.regs.b.wrapping_sub(1);
    let c = if down {
        cpu.regs.c.wrapping_sub(1)
    } else {
        cpu.regs.c.wrapping_add(1)
    };
    port_block_flags(cpu, v, u16::from(v) + u16::from(c));
}

fn port_out(cpu: &mut Z80, bus: &mut dyn Bus, down: bool) {
    cpu.regs.b = cpu.regs.b.wrapping_sub(1);
    let v = bus.read(cpu.regs.hl());
    bus.io_write(cpu.regs.bc(), v);
    cpu.regs.set_hl(advance(cpu.regs.hl(), down));
    port_block_flags(cpu, v, u16::from(v) + u16::from(cpu.regs.l));
}

/// The sixteen block instructions at `ED A0`-`ED BB`.
fn block(y: u8, z: u8) -> (String, u8, u8, Action) {
    let down = y & 1 == 1;
    let repeat = y >= 6;
    let base = match z {
        0 => "LD",
        1 => "CP",
        2 => "IN",
        _ => "OUT",
    };
    let name = match (z, down, repeat) {
        (3, false, true) => "OTIR".to_string(),
        (3, true, true) => "OTDR".to_string(),
        _ => format!(
            "{base}{}{}",
            if down { "D" } else { "I" },
            if repeat { "R" } else { "" }
        ),
    };

    let action = branch(move |cpu, bus| {
        let again = match z {
            0 => {
                transfer(cpu, bus, down);
                cpu.regs.bc() != 0
            }
            1 => {
                let matched = compare(cpu, bus, down);
                cpu.regs.bc() != 0 && !matched
            }
            2 => {
                port_in(cpu, bus, down);
                cpu.regs.b != 0
            }
            _ => {
                port_out(cpu, bus, down);
                cpu.regs.b != 0
            }
        };
        if repeat && again {
            cpu.repeat();
            return true;
        }
        false
    });
    (name, 16, if repeat { 5 } else { 0 }, action)
}
