//! The static Z80 instruction table.
//!
//! Every instruction form is described once by an [`Instruction`] and the
//! table is built on first use. Decoding picks a page from the prefix
//! bytes and indexes it with the final opcode byte.

mod bits;
mod extended;
mod unprefixed;

use std::collections::HashMap;
use std::sync::LazyLock;

use emu_core::Bus;

use crate::Z80;
use crate::cpu::Index;
use crate::instruction::{Action, Instruction};

static INSTRUCTION_SET: LazyLock<InstructionSet> = LazyLock::new(InstructionSet::build);

type Page = [Option<usize>; 256];

/// All Z80 instruction forms, with decode lookup by opcode bytes.
pub struct InstructionSet {
    instructions: Vec<Instruction>,
    main: Page,
    cb: Page,
    ed: Page,
    dd: Page,
    fd: Page,
    ddcb: Page,
    fdcb: Page,
    dd_prefix: usize,
    fd_prefix: usize,
    by_signature: HashMap<u32, usize>,
}

impl InstructionSet {
    /// The shared table, built on first access.
    #[must_use]
    pub fn get() -> &'static Self {
        &INSTRUCTION_SET
    }

    fn build() -> Self {
        let mut table = Self {
            instructions: Vec::with_capacity(1800),
            main: [None; 256],
            cb: [None; 256],
            ed: [None; 256],
            dd: [None; 256],
            fd: [None; 256],
            ddcb: [None; 256],
            fdcb: [None; 256],
            dd_prefix: 0,
            fd_prefix: 0,
            by_signature: HashMap::new(),
        };

        unprefixed::add_all(&mut table);
        bits::add_all(&mut table);
        extended::add_all(&mut table);

        table.dd_prefix = table.push(Instruction::new("DD", 4, 0xDD, None, None, nop()).as_prefix());
        table.fd_prefix = table.push(Instruction::new("FD", 4, 0xFD, None, None, nop()).as_prefix());

        table
    }

    fn push(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Register an instruction on the page its opcode bytes select.
    ///
    /// # Panics
    ///
    /// Panics if another form already decodes from the same bytes.
    pub(crate) fn add(&mut self, instruction: Instruction) {
        let (op0, op1, op3) = (instruction.op0(), instruction.op1(), instruction.op3());
        let signature = instruction.padded_signature();
        let index = self.push(instruction);

        let slot = match (op0, op1, op3) {
            (0xDD, Some(0xCB), Some(op3)) => &mut self.ddcb[op3 as usize],
            (0xFD, Some(0xCB), Some(op3)) => &mut self.fdcb[op3 as usize],
            (0xCB, Some(op1), None) => &mut self.cb[op1 as usize],
            (0xED, Some(op1), None) => &mut self.ed[op1 as usize],
            (0xDD, Some(op1), None) => &mut self.dd[op1 as usize],
            (0xFD, Some(op1), None) => &mut self.fd[op1 as usize],
            (op0, None, None) => &mut self.main[op0 as usize],
            _ => panic!("{}: no decode page for these opcode bytes", self.instructions[index].name()),
        };
        assert!(
            slot.is_none(),
            "{}: opcode {signature:06X} already taken",
            self.instructions[index].name()
        );
        *slot = Some(index);
        self.by_signature.insert(signature, index);
    }

    fn page_entry(&self, page: &Page, byte: u8) -> &Instruction {
        let index = page[byte as usize].unwrap_or_else(|| unreachable!("page is complete"));
        &self.instructions[index]
    }

    /// Decode the instruction at `pc`, reading opcode bytes with `peek`.
    ///
    /// An index prefix followed by a byte with no indexed meaning decodes
    /// as the bare one-byte prefix, which then behaves like a `NOP`.
    pub fn decode(&self, mut peek: impl FnMut(u16) -> u8, pc: u16) -> &Instruction {
        let op0 = peek(pc);
        match op0 {
            0xCB => self.page_entry(&self.cb, peek(pc.wrapping_add(1))),
            0xED => self.page_entry(&self.ed, peek(pc.wrapping_add(1))),
            0xDD | 0xFD => {
                let op1 = peek(pc.wrapping_add(1));
                let (page, bit_page, prefix) = if op0 == 0xDD {
                    (&self.dd, &self.ddcb, self.dd_prefix)
                } else {
                    (&self.fd, &self.fdcb, self.fd_prefix)
                };
                if op1 == 0xCB {
                    return self.page_entry(bit_page, peek(pc.wrapping_add(3)));
                }
                match page[op1 as usize] {
                    Some(index) => &self.instructions[index],
                    None => &self.instructions[prefix],
                }
            }
            _ => self.page_entry(&self.main, op0),
        }
    }

    /// Look up a form by its padded signature.
    #[must_use]
    pub fn by_signature(&self, padded_signature: u32) -> Option<&Instruction> {
        self.by_signature
            .get(&padded_signature)
            .map(|&index| &self.instructions[index])
    }

    /// Every form in the table, including the two bare prefixes.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Disassemble the instruction at `pc`. Returns its listing text and size.
#[must_use]
pub fn disassemble(peek: impl Fn(u16) -> u8, pc: u16) -> (String, u8) {
    let instruction = InstructionSet::get().decode(&peek, pc);
    (instruction.full_name(&peek, pc), instruction.size())
}

// Builder helpers shared by the page modules.

fn nop() -> Action {
    Box::new(|_, _| false)
}

/// An action that never reports a taken branch.
fn plain(f: impl Fn(&mut Z80, &mut dyn Bus) + Send + Sync + 'static) -> Action {
    Box::new(move |cpu, bus| {
        f(cpu, bus);
        false
    })
}

/// An action whose result selects the alternate timing.
fn branch(f: impl Fn(&mut Z80, &mut dyn Bus) -> bool + Send + Sync + 'static) -> Action {
    Box::new(f)
}

/// Build a form that exists both unprefixed (for `HL`) and behind a
/// `DD`/`FD` prefix.
fn indexed(idx: Index, name: impl Into<String>, t_states: u8, code: u8, action: Action) -> Instruction {
    match idx.prefix() {
        None => Instruction::new(name, t_states, code, None, None, action),
        Some(prefix) => Instruction::new(name, t_states, prefix, Some(code), None, action),
    }
}

/// Names of the 8-bit registers by opcode code, with `H`, `L` and `(HL)`
/// following the index in use.
fn reg_name(code: u8, idx: Index) -> &'static str {
    match code & 7 {
        0 => "B",
        1 => "C",
        2 => "D",
        3 => "E",
        4 => idx.high_name(),
        5 => idx.low_name(),
        6 => idx.memory_name(),
        _ => "A",
    }
}

/// Names of the register pairs by opcode code, SP as pair 3.
fn pair_name(code: u8, idx: Index) -> &'static str {
    match code & 3 {
        0 => "BC",
        1 => "DE",
        2 => idx.pair_name(),
        _ => "SP",
    }
}
