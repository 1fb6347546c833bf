//! Single-instruction tests in the `SingleStepTests` JSON layout.
//!
//! Each case gives the CPU and RAM state before and after one instruction
//! and one `cycles` entry per T-state. The inline cases run everywhere; the
//! full suite lives in `test-data/z80/v1/` and runs with `--ignored`.
//! `WZ` and the `p`/`q` latches are not compared since the core does not
//! model them.

use emu_core::{Bus, Cpu};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::panic;
use std::path::Path;
use zilog_z80::Z80;

/// Flat 64KB RAM bus with preloaded port values.
struct TestBus {
    ram: Box<[u8; 0x1_0000]>,
    io_read_values: HashMap<u16, u8>,
}

impl TestBus {
    fn new() -> Self {
        Self {
            ram: Box::new([0; 0x1_0000]),
            io_read_values: HashMap::new(),
        }
    }

    fn load_ram(&mut self, entries: &[(u16, u8)]) {
        for &(addr, value) in entries {
            self.ram[addr as usize] = value;
        }
    }

    fn peek(&self, addr: u16) -> u8 {
        self.ram[addr as usize]
    }
}

impl Bus for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.io_read_values.get(&port).copied().unwrap_or(0xFF)
    }

    fn io_write(&mut self, _port: u16, _value: u8) {}
}

#[derive(Deserialize)]
struct TestCase {
    name: String,
    initial: CpuState,
    #[serde(rename = "final")]
    final_state: CpuState,
    cycles: Vec<serde_json::Value>,
    #[serde(default)]
    ports: Vec<(u16, u8, String)>,
}

#[derive(Deserialize)]
struct CpuState {
    pc: u16,
    sp: u16,
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    f: u8,
    h: u8,
    l: u8,
    i: u8,
    r: u8,
    ix: u16,
    iy: u16,
    #[serde(default, rename = "af_")]
    af_alt: u16,
    #[serde(default, rename = "bc_")]
    bc_alt: u16,
    #[serde(default, rename = "de_")]
    de_alt: u16,
    #[serde(default, rename = "hl_")]
    hl_alt: u16,
    iff1: u8,
    iff2: u8,
    im: u8,
    ram: Vec<(u16, u8)>,
}

fn setup(cpu: &mut Z80, bus: &mut TestBus, state: &CpuState, ports: &[(u16, u8, String)]) {
    bus.load_ram(&state.ram);
    for (port, value, dir) in ports {
        if dir == "r" {
            bus.io_read_values.insert(*port, *value);
        }
    }

    let regs = cpu.registers_mut();
    regs.a = state.a;
    regs.f = state.f;
    regs.b = state.b;
    regs.c = state.c;
    regs.d = state.d;
    regs.e = state.e;
    regs.h = state.h;
    regs.l = state.l;
    regs.ix = state.ix;
    regs.iy = state.iy;
    [regs.a_alt, regs.f_alt] = state.af_alt.to_be_bytes();
    [regs.b_alt, regs.c_alt] = state.bc_alt.to_be_bytes();
    [regs.d_alt, regs.e_alt] = state.de_alt.to_be_bytes();
    [regs.h_alt, regs.l_alt] = state.hl_alt.to_be_bytes();
    regs.sp = state.sp;
    regs.pc = state.pc;
    regs.i = state.i;
    regs.r = state.r;
    regs.iff1 = state.iff1 != 0;
    regs.iff2 = state.iff2 != 0;
    regs.im = state.im;
}

fn compare(cpu: &Z80, bus: &TestBus, expected: &CpuState, flag_mask: u8) -> Vec<String> {
    let regs = cpu.registers();
    let pair = |hi: u8, lo: u8| u16::from_be_bytes([hi, lo]);
    let mut errors = Vec::new();
    let mut check = |name: &str, actual: u16, want: u16| {
        if actual != want {
            errors.push(format!("{name}: got {actual:04X}, want {want:04X}"));
        }
    };

    check("A", regs.a.into(), expected.a.into());
    check("F", (regs.f & flag_mask).into(), (expected.f & flag_mask).into());
    check("B", regs.b.into(), expected.b.into());
    check("C", regs.c.into(), expected.c.into());
    check("D", regs.d.into(), expected.d.into());
    check("E", regs.e.into(), expected.e.into());
    check("H", regs.h.into(), expected.h.into());
    check("L", regs.l.into(), expected.l.into());
    check("AF'", pair(regs.a_alt, regs.f_alt), expected.af_alt);
    check("BC'", pair(regs.b_alt, regs.c_alt), expected.bc_alt);
    check("DE'", pair(regs.d_alt, regs.e_alt), expected.de_alt);
    check("HL'", pair(regs.h_alt, regs.l_alt), expected.hl_alt);
    check("IX", regs.ix, expected.ix);
    check("IY", regs.iy, expected.iy);
    check("SP", regs.sp, expected.sp);
    check("PC", regs.pc, expected.pc);
    check("I", regs.i.into(), expected.i.into());
    check("R", regs.r.into(), expected.r.into());
    check("IFF1", u16::from(regs.iff1), expected.iff1.into());
    check("IFF2", u16::from(regs.iff2), expected.iff2.into());
    check("IM", regs.im.into(), expected.im.into());

    for &(addr, value) in &expected.ram {
        let actual = bus.peek(addr);
        if actual != value {
            errors.push(format!("RAM[{addr:04X}]: got {actual:02X}, want {value:02X}"));
        }
    }
    errors
}

/// Execute one case, stepping until its cycle count is used up so that a
/// bare index prefix and the instruction after it run as one case.
fn run_case(case: &TestCase, flag_mask: u8) -> Vec<String> {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    setup(&mut cpu, &mut bus, &case.initial, &case.ports);

    let want = case.cycles.len() as u64;
    let mut spent = 0;
    while spent < want {
        spent += cpu.step(&mut bus).t_states();
    }
    let mut errors = compare(&cpu, &bus, &case.final_state, flag_mask);
    if spent != want {
        errors.push(format!("T-states: got {spent}, want {want}"));
    }
    errors
}

fn run_cases(json: &str) {
    let cases: Vec<TestCase> = serde_json::from_str(json).expect("valid test JSON");
    let failures: Vec<String> = cases
        .iter()
        .filter_map(|case| {
            let errors = run_case(case, 0xFF);
            (!errors.is_empty()).then(|| format!("{}: {}", case.name, errors.join("; ")))
        })
        .collect();

    assert!(failures.is_empty(), "{}", failures.join("\n"));
}

/// Builds a state object with everything zeroed except the given fields.
macro_rules! state {
    ($($field:ident : $value:expr),* ; ram: [$(($addr:expr, $byte:expr)),*]) => {{
        let mut state = serde_json::json!({
            "pc": 0, "sp": 0, "a": 0, "b": 0, "c": 0, "d": 0, "e": 0, "f": 0,
            "h": 0, "l": 0, "i": 0, "r": 0, "ix": 0, "iy": 0,
            "iff1": 0, "iff2": 0, "im": 0, "ram": []
        });
        $( state[stringify!($field)] = serde_json::json!($value); )*
        state["ram"] = serde_json::json!([$([$addr, $byte]),*]);
        state
    }};
}

fn case(name: &str, initial: serde_json::Value, final_state: serde_json::Value, t_states: usize) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "initial": initial,
        "final": final_state,
        "cycles": vec![serde_json::Value::Null; t_states],
    })
}

#[test]
fn unprefixed_instructions() {
    let cases = serde_json::json!([
        case(
            "00",
            state!(pc: 0x1000; ram: [(0x1000, 0x00)]),
            state!(pc: 0x1001, r: 1; ram: []),
            4
        ),
        case(
            "3e",
            state!(pc: 0x1000; ram: [(0x1000, 0x3E), (0x1001, 0x42)]),
            state!(pc: 0x1002, a: 0x42, r: 1; ram: []),
            7
        ),
        case(
            "80",
            state!(pc: 0x1000, a: 0x7F, b: 0x01; ram: [(0x1000, 0x80)]),
            state!(pc: 0x1001, a: 0x80, b: 0x01, f: 0x94, r: 1; ram: []),
            4
        ),
        case(
            "10 taken",
            state!(pc: 0x1000, b: 2; ram: [(0x1000, 0x10), (0x1001, 0xFE)]),
            state!(pc: 0x1000, b: 1, r: 1; ram: []),
            13
        ),
        case(
            "cd",
            state!(pc: 0x1000, sp: 0x8000; ram: [(0x1000, 0xCD), (0x1001, 0x00), (0x1002, 0x20)]),
            state!(pc: 0x2000, sp: 0x7FFE, r: 1; ram: [(0x7FFE, 0x03), (0x7FFF, 0x10)]),
            17
        ),
        case(
            "c0 not taken",
            state!(pc: 0x1000, sp: 0x8000, f: 0x40; ram: [(0x1000, 0xC0)]),
            state!(pc: 0x1001, sp: 0x8000, f: 0x40, r: 1; ram: []),
            5
        ),
    ]);
    run_cases(&cases.to_string());
}

#[test]
fn prefixed_instructions() {
    let cases = serde_json::json!([
        case(
            "dd 21",
            state!(pc: 0x1000; ram: [(0x1000, 0xDD), (0x1001, 0x21), (0x1002, 0x34), (0x1003, 0x12)]),
            state!(pc: 0x1004, ix: 0x1234, r: 2; ram: []),
            14
        ),
        case(
            "dd 7e",
            state!(pc: 0x1000, ix: 0x2005; ram: [(0x1000, 0xDD), (0x1001, 0x7E), (0x1002, 0xFB), (0x2000, 0x99)]),
            state!(pc: 0x1003, ix: 0x2005, a: 0x99, r: 2; ram: []),
            19
        ),
        case(
            "ed b0 repeat",
            state!(pc: 0x1000, b: 0, c: 2, h: 0x30, l: 0, d: 0x40, e: 0;
                ram: [(0x1000, 0xED), (0x1001, 0xB0), (0x3000, 0x11)]),
            state!(pc: 0x1000, b: 0, c: 1, h: 0x30, l: 1, d: 0x40, e: 1, f: 0x04, r: 2;
                ram: [(0x4000, 0x11)]),
            21
        ),
        case(
            "cb 7e",
            state!(pc: 0x1000, h: 0x30, l: 0x00, f: 0x01; ram: [(0x1000, 0xCB), (0x1001, 0x7E), (0x3000, 0x80)]),
            state!(pc: 0x1002, h: 0x30, l: 0x00, f: 0xB1, r: 2; ram: []),
            12
        ),
        case(
            "ed 44",
            state!(pc: 0x1000, a: 0x01; ram: [(0x1000, 0xED), (0x1001, 0x44)]),
            state!(pc: 0x1002, a: 0xFF, f: 0xBB, r: 2; ram: []),
            8
        ),
        case(
            "ed 57",
            state!(pc: 0x1000, iff1: 1, iff2: 1; ram: [(0x1000, 0xED), (0x1001, 0x57)]),
            state!(pc: 0x1002, f: 0x44, iff1: 1, iff2: 1, r: 2; ram: []),
            9
        ),
        case(
            "dd cb c6",
            state!(pc: 0x1000, ix: 0x2000;
                ram: [(0x1000, 0xDD), (0x1001, 0xCB), (0x1002, 0x02), (0x1003, 0xC6)]),
            state!(pc: 0x1004, ix: 0x2000, r: 2; ram: [(0x2002, 0x01)]),
            23
        ),
    ]);
    run_cases(&cases.to_string());
}

#[test]
fn port_input_uses_full_bc() {
    let mut case = case(
        "ed 78",
        state!(pc: 0x1000, b: 0x12, c: 0x34; ram: [(0x1000, 0xED), (0x1001, 0x78)]),
        state!(pc: 0x1002, a: 0x80, b: 0x12, c: 0x34, f: 0x80, r: 2; ram: []),
        12,
    );
    case["ports"] = serde_json::json!([[0x1234, 0x80, "r"]]);
    run_cases(&serde_json::json!([case]).to_string());
}

/// Flags compared for a suite file. Bits 3 and 5 of F come from the
/// unmodelled `WZ` and `q` latches for memory `BIT`, `SCF`/`CCF` and the
/// repeating block instructions, so those files compare the other six.
fn flag_mask_for(filename: &str) -> u8 {
    let opcode = |s: &str| u8::from_str_radix(s, 16).ok();
    let parts: Vec<&str> = filename.trim_end_matches(".json").split(' ').collect();
    let latch_dependent = match parts.as_slice() {
        ["37" | "3f"] => true,
        ["cb", op] => opcode(op).is_some_and(|op| op & 0xC7 == 0x46),
        ["dd" | "fd", "cb", "__", op] => opcode(op).is_some_and(|op| op & 0xC0 == 0x40),
        ["ed", op] => opcode(op).is_some_and(|op| op & 0xF4 == 0xB0),
        _ => false,
    };
    if latch_dependent { 0xD7 } else { 0xFF }
}

#[test]
fn flag_mask_covers_latch_dependent_files() {
    assert_eq!(flag_mask_for("37.json"), 0xD7);
    assert_eq!(flag_mask_for("cb 7e.json"), 0xD7);
    assert_eq!(flag_mask_for("cb 7f.json"), 0xFF);
    assert_eq!(flag_mask_for("dd cb __ 46.json"), 0xD7);
    assert_eq!(flag_mask_for("dd cb __ c6.json"), 0xFF);
    assert_eq!(flag_mask_for("ed b1.json"), 0xD7);
    assert_eq!(flag_mask_for("ed a0.json"), 0xFF);
    assert_eq!(flag_mask_for("00.json"), 0xFF);
}

#[test]
#[ignore = "requires test-data/z80 — run with --ignored"]
fn run_all() {
    let test_dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("parent of crate dir")
        .parent()
        .expect("workspace root")
        .join("test-data/z80/v1");

    if !test_dir.exists() {
        eprintln!("Test data not found at {}", test_dir.display());
        eprintln!("Skipping SingleStepTests.");
        return;
    }

    let mut filenames: Vec<String> = (0..=0xFFu8)
        .filter(|op| !matches!(op, 0xCB | 0xDD | 0xED | 0xFD))
        .map(|op| format!("{op:02x}.json"))
        .collect();
    for prefix in ["cb ", "dd ", "ed ", "fd ", "dd cb __ ", "fd cb __ "] {
        filenames.extend((0..=0xFFu8).map(|op| format!("{prefix}{op:02x}.json")));
    }

    let mut total_pass = 0u64;
    let mut total_fail = 0u64;
    let mut total_files = 0u32;

    for filename in &filenames {
        let path = test_dir.join(filename);
        if !path.exists() {
            continue;
        }

        let data = fs::read_to_string(&path).unwrap_or_else(|e| {
            panic!("Failed to read {}: {e}", path.display());
        });
        let tests: Vec<TestCase> = serde_json::from_str(&data).unwrap_or_else(|e| {
            panic!("Failed to parse {}: {e}", path.display());
        });
        let flag_mask = flag_mask_for(filename);

        let mut file_pass = 0u32;
        let mut file_fail = 0u32;
        let mut first_failures: Vec<String> = Vec::new();

        for test in &tests {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| run_case(test, flag_mask)));
            match result {
                Ok(errors) if errors.is_empty() => file_pass += 1,
                Ok(errors) => {
                    file_fail += 1;
                    if first_failures.len() < 5 {
                        first_failures.push(format!("  FAIL [{}]: {}", test.name, errors.join(", ")));
                    }
                }
                Err(_) => {
                    file_fail += 1;
                    if first_failures.len() < 5 {
                        first_failures.push(format!("  PANIC [{}]", test.name));
                    }
                }
            }
        }

        let status = if file_fail == 0 { "PASS" } else { "FAIL" };
        println!("{filename}: {status} — {file_pass}/{} passed", file_pass + file_fail);
        for msg in &first_failures {
            println!("{msg}");
        }

        total_pass += u64::from(file_pass);
        total_fail += u64::from(file_fail);
        total_files += 1;
    }

    println!();
    println!("=== Z80 SingleStepTests Summary ===");
    println!(
        "Files: {total_files}, Total: {}, Pass: {total_pass}, Fail: {total_fail}",
        total_pass + total_fail
    );

    assert_eq!(total_fail, 0, "{total_fail} tests failed");
}
