//! Instruction-accurate TRS-80 Model III emulator core.
//!
//! The CPU runs one whole instruction per [`Trs80::step`], timed on the
//! [`Ticks`](emu_core::Ticks) timeline from the Z80 instruction table.
//! Memory implements the Model III map with its keyboard overlay, the
//! port file routes I/O side effects to the interrupt latches, the video
//! mode and an external floppy controller, and disk images load through
//! `format-jv`.
//!
//! Rendering, audio and input capture belong to the host. It reads
//! [`Memory::video_memory`] each frame and feeds keys through
//! [`Trs80::key_down`].

mod config;
mod error;
mod fdc;
mod interrupts;
mod latch;
mod memory;
mod ports;
mod pulse;
mod snapshot;
mod trs80;

pub use config::{CPU_FREQUENCY_HZ, Trs80Config, Trs80Options};
pub use error::Trs80Error;
pub use fdc::{FdcIoEvent, FloppyController, NoFdc};
pub use interrupts::{InterruptManager, LatchRole};
pub use latch::Latch;
pub use memory::{FIRST_RAM_BYTE, KEYBOARD_START, Memory, VIDEO_SIZE, VIDEO_START};
pub use ports::{PortDevices, PortSet};
pub use pulse::{PulseKind, PulseScheduler, PulseToken};
pub use snapshot::{SNAPSHOT_LEN, Snapshot, SnapshotError};
pub use trs80::{DRIVE_COUNT, Disk, Trs80, Trs80Bus};
