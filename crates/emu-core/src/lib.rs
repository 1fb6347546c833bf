//! Core traits and types for instruction-accurate emulation.
//!
//! Time is counted in [`Ticks`], a fixed fraction of one CPU T-state, so
//! that every component can be scheduled on an integer timeline.

mod bus;
mod clock;
mod cpu;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use ticks::{TICKS_PER_T_STATE, Ticks};
