//! The unprefixed page, and the `DD`/`FD` forms that mirror it with `IX`
//! or `IY` standing in for `HL`.

use emu_core::Bus;

use super::{InstructionSet, branch, indexed, pair_name, plain, reg_name};
use crate::Z80;
use crate::alu;
use crate::cpu::Index;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, Condition};
use crate::instruction::Instruction;

const ALU_NAMES: [&str; 8] = ["ADD A, ", "ADC A, ", "SUB ", "SBC A, ", "AND ", "XOR ", "OR ", "CP "];

/// Timing for the `HL` form and for the `IX`/`IY` form.
const fn t(idx: Index, hl: u8, index: u8) -> u8 {
    match idx {
        Index::Hl => hl,
        _ => index,
    }
}

pub(super) fn add_all(table: &mut InstructionSet) {
    for idx in [Index::Hl, Index::Ix, Index::Iy] {
        loads_8(table, idx);
        arithmetic_8(table, idx);
        pairs_16(table, idx);
        stack_and_jumps(table, idx);
    }
    accumulator_ops(table);
    control_flow(table);
    misc(table);
}

fn alu_apply(cpu: &mut Z80, op: u8, value: u8) {
    let result = alu::accumulate(op, cpu.regs.a, value, cpu.regs.f & CF != 0);
    cpu.regs.a = result.value;
    cpu.regs.f = result.flags;
}

fn inc_dec(cpu: &mut Z80, value: u8, dec: bool) -> u8 {
    let result = if dec { alu::dec8(value) } else { alu::inc8(value) };
    cpu.regs.f = (cpu.regs.f & CF) | result.flags;
    result.value
}

/// `LD r, r'`, `LD r, N` and their memory forms.
fn loads_8(table: &mut InstructionSet, idx: Index) {
    let hl = idx == Index::Hl;
    let uses_index_half = |code: u8| code == 4 || code == 5;

    for dst in 0..8u8 {
        for src in 0..8u8 {
            let opcode = 0x40 | (dst << 3) | src;
            if dst == 6 && src == 6 {
                continue; // HALT
            }
            if dst == 6 || src == 6 {
                // Memory form. The register side keeps plain H and L even
                // when indexed.
                let name = if dst == 6 {
                    format!("LD {}, {}", idx.memory_name(), reg_name(src, Index::Hl))
                } else {
                    format!("LD {}, {}", reg_name(dst, Index::Hl), idx.memory_name())
                };
                let action = if dst == 6 {
                    plain(move |cpu, bus| {
                        let addr = cpu.memory_address(bus, idx);
                        bus.write(addr, cpu.reg8(src, Index::Hl));
                    })
                } else {
                    plain(move |cpu, bus| {
                        let addr = cpu.memory_address(bus, idx);
                        let v = bus.read(addr);
                        cpu.set_reg8(dst, Index::Hl, v);
                    })
                };
                table.add(indexed(idx, name, t(idx, 7, 19), opcode, action));
            } else if hl || uses_index_half(dst) || uses_index_half(src) {
                let name = format!("LD {}, {}", reg_name(dst, idx), reg_name(src, idx));
                let action = plain(move |cpu, _| {
                    let v = cpu.reg8(src, idx);
                    cpu.set_reg8(dst, idx, v);
                });
                table.add(indexed(idx, name, t(idx, 4, 8), opcode, action));
            }
        }

        let opcode = 0x06 | (dst << 3);
        if dst == 6 {
            let name = format!("LD {}, N", idx.memory_name());
            let action = plain(move |cpu, bus| {
                let addr = cpu.memory_address(bus, idx);
                let v = cpu.imm8(bus);
                bus.write(addr, v);
            });
            table.add(indexed(idx, name, t(idx, 10, 19), opcode, action));
        } else if hl || uses_index_half(dst) {
            let name = format!("LD {}, N", reg_name(dst, idx));
            let action = plain(move |cpu, bus| {
                let v = cpu.imm8(bus);
                cpu.set_reg8(dst, idx, v);
            });
            table.add(indexed(idx, name, t(idx, 7, 11), opcode, action));
        }
    }
}

/// The accumulator ALU group and `INC r` / `DEC r`.
fn arithmetic_8(table: &mut InstructionSet, idx: Index) {
    let hl = idx == Index::Hl;

    for op in 0..8u8 {
        for src in 0..8u8 {
            let opcode = 0x80 | (op << 3) | src;
            let name = format!("{}{}", ALU_NAMES[op as usize], reg_name(src, idx));
            if src == 6 {
                let action = plain(move |cpu, bus| {
                    let addr = cpu.memory_address(bus, idx);
                    let v = bus.read(addr);
                    alu_apply(cpu, op, v);
                });
                table.add(indexed(idx, name, t(idx, 7, 19), opcode, action));
            } else if hl || src == 4 || src == 5 {
                let action = plain(move |cpu, _| {
                    let v = cpu.reg8(src, idx);
                    alu_apply(cpu, op, v);
                });
                table.add(indexed(idx, name, t(idx, 4, 8), opcode, action));
            }
        }

        if hl {
            let name = format!("{}N", ALU_NAMES[op as usize]);
            let action = plain(move |cpu, bus| {
                let v = cpu.imm8(bus);
                alu_apply(cpu, op, v);
            });
            table.add(Instruction::new(name, 7, 0xC6 | (op << 3), None, None, action));
        }
    }

    for r in 0..8u8 {
        for (dec, base, mnemonic) in [(false, 0x04, "INC"), (true, 0x05, "DEC")] {
            let opcode = base | (r << 3);
            let name = format!("{mnemonic} {}", reg_name(r, idx));
            if r == 6 {
                let action = plain(move |cpu, bus| {
                    let addr = cpu.memory_address(bus, idx);
                    let v = bus.read(addr);
                    let v = inc_dec(cpu, v, dec);
                    bus.write(addr, v);
                });
                table.add(indexed(idx, name, t(idx, 11, 23), opcode, action));
            } else if hl || r == 4 || r == 5 {
                let action = plain(move |cpu, _| {
                    let v = cpu.reg8(r, idx);
                    let v = inc_dec(cpu, v, dec);
                    cpu.set_reg8(r, idx, v);
                });
                table.add(indexed(idx, name, t(idx, 4, 8), opcode, action));
            }
        }
    }
}

/// 16-bit loads, `INC rr`, `DEC rr` and `ADD HL, rr`.
fn pairs_16(table: &mut InstructionSet, idx: Index) {
    let hl = idx == Index::Hl;
    let pair = idx.pair_name();

    for p in 0..4u8 {
        let name_rr = pair_name(p, idx);
        if hl || p == 2 {
            let action = plain(move |cpu, bus| {
                let v = cpu.imm16(bus);
                cpu.set_reg16(p, idx, v);
            });
            table.add(indexed(idx, format!("LD {name_rr}, NN"), t(idx, 10, 14), 0x01 | (p << 4), action));

            let action = plain(move |cpu, _| {
                let v = cpu.reg16(p, idx).wrapping_add(1);
                cpu.set_reg16(p, idx, v);
            });
            table.add(indexed(idx, format!("INC {name_rr}"), t(idx, 6, 10), 0x03 | (p << 4), action));

            let action = plain(move |cpu, _| {
                let v = cpu.reg16(p, idx).wrapping_sub(1);
                cpu.set_reg16(p, idx, v);
            });
            table.add(indexed(idx, format!("DEC {name_rr}"), t(idx, 6, 10), 0x0B | (p << 4), action));
        }

        let action = plain(move |cpu, _| {
            let (value, flags) = alu::add16(cpu.index_value(idx), cpu.reg16(p, idx));
            cpu.set_index_value(idx, value);
            cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | flags;
        });
        table.add(indexed(idx, format!("ADD {pair}, {name_rr}"), t(idx, 11, 15), 0x09 | (p << 4), action));
    }

    let action = plain(move |cpu, bus| {
        let addr = cpu.imm16(bus);
        Z80::write16(bus, addr, cpu.index_value(idx));
    });
    table.add(indexed(idx, format!("LD (NN), {pair}"), t(idx, 16, 20), 0x22, action));

    let action = plain(move |cpu, bus| {
        let addr = cpu.imm16(bus);
        let v = Z80::read16(bus, addr);
        cpu.set_index_value(idx, v);
    });
    table.add(indexed(idx, format!("LD {pair}, (NN)"), t(idx, 16, 20), 0x2A, action));

    let action = plain(move |cpu, _| cpu.regs.sp = cpu.index_value(idx));
    table.add(indexed(idx, format!("LD SP, {pair}"), t(idx, 6, 10), 0xF9, action));
}

/// `PUSH`, `POP`, `EX (SP), HL` and `JP (HL)`.
fn stack_and_jumps(table: &mut InstructionSet, idx: Index) {
    let hl = idx == Index::Hl;
    let pair = idx.pair_name();

    for p in 0..4u8 {
        if !hl && p != 2 {
            continue;
        }
        let name_rr = if p == 3 { "AF" } else { pair_name(p, idx) };
        let action = plain(move |cpu, bus| {
            let v = cpu.pop(bus);
            cpu.set_reg16_af(p, idx, v);
        });
        table.add(indexed(idx, format!("POP {name_rr}"), t(idx, 10, 14), 0xC1 | (p << 4), action));

        let action = plain(move |cpu, bus| {
            let v = cpu.reg16_af(p, idx);
            cpu.push(bus, v);
        });
        table.add(indexed(idx, format!("PUSH {name_rr}"), t(idx, 11, 15), 0xC5 | (p << 4), action));
    }

    let action = plain(move |cpu, bus| {
        let sp = cpu.regs.sp;
        let from_stack = Z80::read16(bus, sp);
        Z80::write16(bus, sp, cpu.index_value(idx));
        cpu.set_index_value(idx, from_stack);
    });
    table.add(indexed(idx, format!("EX (SP), {pair}"), t(idx, 19, 23), 0xE3, action));

    let action = plain(move |cpu, _| cpu.regs.pc = cpu.index_value(idx));
    table.add(indexed(idx, format!("JP ({pair})"), t(idx, 4, 8), 0xE9, action));
}

/// Accumulator rotates, `DAA`, `CPL`, `SCF`, `CCF` and the accumulator
/// loads through `BC`, `DE` and absolute addresses.
fn accumulator_ops(table: &mut InstructionSet) {
    for (op, name) in [(0u8, "RLCA"), (1, "RRCA"), (2, "RLA"), (3, "RRA")] {
        let action = plain(move |cpu, _| {
            let result = alu::rotate(op, cpu.regs.a, cpu.regs.f & CF != 0);
            cpu.regs.a = result.value;
            cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | (result.value & (YF | XF)) | (result.flags & CF);
        });
        table.add(Instruction::new(name, 4, 0x07 | (op << 3), None, None, action));
    }

    table.add(Instruction::new(
        "DAA",
        4,
        0x27,
        None,
        None,
        plain(|cpu, _| {
            let result = alu::daa(cpu.regs.a, cpu.regs.f);
            cpu.regs.a = result.value;
            cpu.regs.f = result.flags;
        }),
    ));
    table.add(Instruction::new(
        "CPL",
        4,
        0x2F,
        None,
        None,
        plain(|cpu, _| {
            cpu.regs.a = !cpu.regs.a;
            cpu.regs.f = (cpu.regs.f & (SF | ZF | PF | CF)) | HF | NF | (cpu.regs.a & (YF | XF));
        }),
    ));
    table.add(Instruction::new(
        "SCF",
        4,
        0x37,
        None,
        None,
        plain(|cpu, _| {
            cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | CF | (cpu.regs.a & (YF | XF));
        }),
    ));
    table.add(Instruction::new(
        "CCF",
        4,
        0x3F,
        None,
        None,
        plain(|cpu, _| {
            let carry = cpu.regs.f & CF != 0;
            let moved = if carry { HF } else { CF };
            cpu.regs.f = (cpu.regs.f & (SF | ZF | PF)) | moved | (cpu.regs.a & (YF | XF));
        }),
    ));

    for (p, name) in [(0u8, "BC"), (1, "DE")] {
        let addr_of = move |cpu: &Z80| if p == 0 { cpu.regs.bc() } else { cpu.regs.de() };
        table.add(Instruction::new(
            format!("LD ({name}), A"),
            7,
            0x02 | (p << 4),
            None,
            None,
            plain(move |cpu, bus| bus.write(addr_of(cpu), cpu.regs.a)),
        ));
        table.add(Instruction::new(
            format!("LD A, ({name})"),
            7,
            0x0A | (p << 4),
            None,
            None,
            plain(move |cpu, bus| cpu.regs.a = bus.read(addr_of(cpu))),
        ));
    }

    table.add(Instruction::new(
        "LD (NN), A",
        13,
        0x32,
        None,
        None,
        plain(|cpu, bus| {
            let addr = cpu.imm16(bus);
            bus.write(addr, cpu.regs.a);
        }),
    ));
    table.add(Instruction::new(
        "LD A, (NN)",
        13,
        0x3A,
        None,
        None,
        plain(|cpu, bus| {
            let addr = cpu.imm16(bus);
            cpu.regs.a = bus.read(addr);
        }),
    ));
}

fn call(cpu: &mut Z80, bus: &mut dyn Bus, target: u16) {
    let return_to = cpu.regs.pc;
    cpu.push(bus, return_to);
    cpu.regs.pc = target;
}

/// Jumps, calls, returns and restarts.
fn control_flow(table: &mut InstructionSet) {
    table.add(
        Instruction::new(
            "DJNZ e",
            8,
            0x10,
            None,
            None,
            branch(|cpu, bus| {
                cpu.regs.b = cpu.regs.b.wrapping_sub(1);
                if cpu.regs.b == 0 {
                    return false;
                }
                cpu.regs.pc = cpu.relative_target(bus);
                true
            }),
        )
        .with_alt(5),
    );
    table.add(Instruction::new(
        "JR e",
        12,
        0x18,
        None,
        None,
        plain(|cpu, bus| cpu.regs.pc = cpu.relative_target(bus)),
    ));
    for code in 0..4u8 {
        let condition = Condition::from_code(code);
        let action = branch(move |cpu, bus| {
            if !condition.holds(cpu.regs.f) {
                return false;
            }
            cpu.regs.pc = cpu.relative_target(bus);
            true
        });
        table.add(
            Instruction::new(format!("JR {}, e", condition.name()), 7, 0x20 | (code << 3), None, None, action)
                .with_alt(5),
        );
    }

    table.add(Instruction::new(
        "JP NN",
        10,
        0xC3,
        None,
        None,
        plain(|cpu, bus| cpu.regs.pc = cpu.imm16(bus)),
    ));
    table.add(Instruction::new(
        "CALL NN",
        17,
        0xCD,
        None,
        None,
        plain(|cpu, bus| {
            let target = cpu.imm16(bus);
            call(cpu, bus, target);
        }),
    ));
    table.add(Instruction::new(
        "RET",
        10,
        0xC9,
        None,
        None,
        plain(|cpu, bus| cpu.regs.pc = cpu.pop(bus)),
    ));

    for condition in Condition::ALL {
        let code = condition as u8;
        let cc = condition.name();

        let action = branch(move |cpu, bus| {
            if !condition.holds(cpu.regs.f) {
                return false;
            }
            cpu.regs.pc = cpu.pop(bus);
            true
        });
        table.add(Instruction::new(format!("RET {cc}"), 5, 0xC0 | (code << 3), None, None, action).with_alt(6));

        let action = plain(move |cpu, bus| {
            if condition.holds(cpu.regs.f) {
                cpu.regs.pc = cpu.imm16(bus);
            }
        });
        table.add(Instruction::new(format!("JP {cc}, NN"), 10, 0xC2 | (code << 3), None, None, action));

        let action = branch(move |cpu, bus| {
            if !condition.holds(cpu.regs.f) {
                return false;
            }
            let target = cpu.imm16(bus);
            call(cpu, bus, target);
            true
        });
        table.add(
            Instruction::new(format!("CALL {cc}, NN"), 10, 0xC4 | (code << 3), None, None, action).with_alt(7),
        );
    }

    for p in 0..8u8 {
        let vector = u16::from(p) * 8;
        let action = plain(move |cpu, bus| call(cpu, bus, vector));
        table.add(Instruction::new(format!("RST {vector:02X}"), 11, 0xC7 | (p << 3), None, None, action));
    }
}

/// Exchanges, port access, interrupt control and `HALT`.
fn misc(table: &mut InstructionSet) {
    table.add(Instruction::new("NOP", 4, 0x00, None, None, plain(|_, _| {})));
    table.add(Instruction::new(
        "HALT",
        4,
        0x76,
        None,
        None,
        plain(|cpu, _| cpu.halted = true),
    ));
    table.add(Instruction::new(
        "DI",
        4,
        0xF3,
        None,
        None,
        plain(|cpu, _| {
            cpu.regs.iff1 = false;
            cpu.regs.iff2 = false;
        }),
    ));
    table.add(Instruction::new(
        "EI",
        4,
        0xFB,
        None,
        None,
        plain(|cpu, _| {
            cpu.regs.iff1 = true;
            cpu.regs.iff2 = true;
            cpu.ei_delay = true;
        }),
    ));
    table.add(Instruction::new(
        "EX AF, AF'",
        4,
        0x08,
        None,
        None,
        plain(|cpu, _| cpu.regs.exchange_af()),
    ));
    table.add(Instruction::new(
        "EXX",
        4,
        0xD9,
        None,
        None,
        plain(|cpu, _| cpu.regs.exchange_alternates()),
    ));
    table.add(Instruction::new(
        "EX DE, HL",
        4,
        0xEB,
        None,
        None,
        plain(|cpu, _| {
            let de = cpu.regs.de();
            cpu.regs.set_de(cpu.regs.hl());
            cpu.regs.set_hl(de);
        }),
    ));
    table.add(Instruction::new(
        "OUT (N), A",
        11,
        0xD3,
        None,
        None,
        plain(|cpu, bus| {
            let port = (u16::from(cpu.regs.a) << 8) | u16::from(cpu.imm8(bus));
            bus.io_write(port, cpu.regs.a);
        }),
    ));
    table.add(Instruction::new(
        "IN A, (N)",
        11,
        0xDB,
        None,
        None,
        plain(|cpu, bus| {
            let port = (u16::from(cpu.regs.a) << 8) | u16::from(cpu.imm8(bus));
            cpu.regs.a = bus.io_read(port);
        }),
    ));
}
