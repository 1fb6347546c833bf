//! Model III memory map.
//!
//! | Range | Contents |
//! |-------|----------|
//! | $0000-$37FF | ROM |
//! | $3800-$3BFF | Keyboard matrix (read-only overlay) |
//! | $3C00-$3FFF | Video RAM |
//! | $4000-$FFFF | RAM |
//!
//! The keyboard block is not backed by memory. A read ORs together the
//! row bytes selected by the low eight address bits, so a program can scan
//! several rows at once. The row bytes themselves live at $3801, $3802,
//! $3804 ... $3880.

use std::io::{self, Read, Write};

use log::debug;

use crate::Trs80Error;
use crate::snapshot::{Snapshot, read_u16, write_u16};

pub const KEYBOARD_START: u16 = 0x3800;
const KEYBOARD_MASK: u16 = 0xFC00;
pub const VIDEO_START: u16 = 0x3C00;
pub const VIDEO_SIZE: usize = 0x400;
/// Default boundary between ROM and RAM.
pub const FIRST_RAM_BYTE: u16 = 0x3C00;

/// Printer status byte, fixed at "not ready". Port $F8 reads the same.
const PRINTER_STATUS: u16 = 0x37E8;

/// 64K Model III address space.
#[derive(Clone)]
pub struct Memory {
    mem: Box<[u8; 0x1_0000]>,
    first_ram_byte: u16,
    screen_written: bool,
    wide: bool,
    kanji: bool,
}

impl Memory {
    /// Build the memory map with `rom` loaded at $0000.
    ///
    /// # Errors
    ///
    /// Fails if the ROM would overlap the keyboard block.
    pub fn new(rom: &[u8]) -> Result<Self, Trs80Error> {
        if rom.len() > KEYBOARD_START as usize {
            return Err(Trs80Error::RomTooLarge {
                len: rom.len(),
                max: KEYBOARD_START as usize,
            });
        }
        let mut mem = Box::new([0; 0x1_0000]);
        mem[..rom.len()].copy_from_slice(rom);

        // TODO: check whether any Model III ROM revision needs this patch.
        mem[14312] = 63;
        mem[14313] = 63;

        mem[PRINTER_STATUS as usize] = 0x30;

        Ok(Self {
            mem,
            first_ram_byte: FIRST_RAM_BYTE,
            screen_written: false,
            wide: false,
            kanji: false,
        })
    }

    #[must_use]
    pub fn read(&self, address: u16) -> u8 {
        if address & KEYBOARD_MASK == KEYBOARD_START {
            return (0..8u16)
                .map(|bit| 1 << bit)
                .filter(|row| address & row != 0)
                .fold(0, |acc, row| acc | self.mem[(KEYBOARD_START | row) as usize]);
        }
        self.mem[address as usize]
    }

    /// Store a byte. Writes below the first RAM byte are dropped.
    pub fn write(&mut self, address: u16, value: u8) {
        if address < self.first_ram_byte {
            debug!("ignored write of {value:02X} to ROM address {address:04X}");
            return;
        }
        self.mem[address as usize] = value;
        if (VIDEO_START..VIDEO_START + VIDEO_SIZE as u16).contains(&address) {
            self.screen_written = true;
        }
    }

    /// Little-endian word through two byte reads.
    #[must_use]
    pub fn read_word(&self, address: u16) -> u16 {
        u16::from_le_bytes([self.read(address), self.read(address.wrapping_add(1))])
    }

    pub fn write_word(&mut self, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(address, lo);
        self.write(address.wrapping_add(1), hi);
    }

    /// The stored byte, bypassing the keyboard overlay.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.mem[address as usize]
    }

    #[must_use]
    pub const fn first_ram_byte(&self) -> u16 {
        self.first_ram_byte
    }

    /// The 1K of video memory, in address order. Cheap to call again for
    /// each frame.
    pub fn video_memory(&self) -> impl Iterator<Item = u8> + Clone + '_ {
        let start = VIDEO_START as usize;
        self.mem[start..start + VIDEO_SIZE].iter().copied()
    }

    /// True if video memory was written since the last call.
    pub fn take_screen_written(&mut self) -> bool {
        std::mem::take(&mut self.screen_written)
    }

    #[must_use]
    pub const fn screen_written(&self) -> bool {
        self.screen_written
    }

    pub fn set_video_mode(&mut self, wide: bool, kanji: bool) {
        if wide != self.wide || kanji != self.kanji {
            debug!("video mode: wide {wide}, kanji {kanji}");
            // Any mode change needs a full repaint.
            self.screen_written = true;
        }
        self.wide = wide;
        self.kanji = kanji;
    }

    /// 32-column mode.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.wide
    }

    #[must_use]
    pub const fn is_kanji(&self) -> bool {
        self.kanji
    }

    /// Press the key at `bit` (0-7) of keyboard `row` (0-7).
    pub fn key_down(&mut self, row: u8, bit: u8) {
        self.mem[row_address(row)] |= 1 << (bit & 7);
    }

    pub fn key_up(&mut self, row: u8, bit: u8) {
        self.mem[row_address(row)] &= !(1 << (bit & 7));
    }

    pub fn release_all_keys(&mut self) {
        for row in 0..8 {
            self.mem[row_address(row)] = 0;
        }
    }
}

fn row_address(row: u8) -> usize {
    (KEYBOARD_START | (1 << (row & 7))) as usize
}

impl Snapshot for Memory {
    fn save(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.mem[..])?;
        write_u16(w, self.first_ram_byte)
    }

    fn load(&mut self, r: &mut dyn Read) -> io::Result<()> {
        r.read_exact(&mut self.mem[..])?;
        self.first_ram_byte = read_u16(r)?;
        self.screen_written = true;
        Ok(())
    }
}
