//! CPU core trait.

use crate::{Bus, Ticks};

/// A CPU core.
///
/// CPUs execute whole instructions and access memory through a bus that
/// is passed in, not owned, so the machine can share it with the devices
/// that sit behind it.
pub trait Cpu {
    /// The type used for register inspection.
    type Registers;

    /// Execute one instruction (or one halted no-op cycle).
    ///
    /// Returns the time the instruction took. An instruction's side effects
    /// are complete when this returns.
    fn step<B: Bus>(&mut self, bus: &mut B) -> Ticks;

    /// Returns the current program counter.
    fn pc(&self) -> u16;

    /// Returns a copy of all registers for inspection.
    fn registers(&self) -> Self::Registers;

    /// Returns true if the CPU is halted.
    fn is_halted(&self) -> bool;

    /// Request a maskable interrupt.
    ///
    /// Returns the acceptance time if the CPU took the interrupt, or `None`
    /// if interrupts are currently disabled.
    fn interrupt<B: Bus>(&mut self, bus: &mut B) -> Option<Ticks>;

    /// Deliver a non-maskable interrupt. Returns the acceptance time.
    fn nmi<B: Bus>(&mut self, bus: &mut B) -> Ticks;

    /// Reset the CPU to its power-on state.
    fn reset(&mut self);
}
