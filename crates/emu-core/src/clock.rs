//! Master clock configuration.

use crate::{TICKS_PER_T_STATE, Ticks};

/// CPU clock configuration for a system.
///
/// Converts between emulated time on the tick timeline and wall-clock
/// microseconds, so that timers specified in real-time units can be placed
/// on the same integer timeline as instruction execution.
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    /// CPU clock frequency in Hz (e.g., `2_027_520` for a TRS-80 Model III).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks that elapse in the given number of microseconds.
    #[must_use]
    pub const fn ticks_for_micros(&self, micros: u64) -> Ticks {
        let t_states = (micros as u128 * self.frequency_hz as u128) / 1_000_000;
        Ticks::new(t_states as u64 * TICKS_PER_T_STATE)
    }

    /// Microseconds represented by the given tick count (truncating).
    #[must_use]
    pub const fn micros_for_ticks(&self, ticks: Ticks) -> u64 {
        let t_states = ticks.get() / TICKS_PER_T_STATE;
        ((t_states as u128 * 1_000_000) / self.frequency_hz as u128) as u64
    }

    /// Ticks per period at the given rate in Hz (integer division).
    #[must_use]
    pub const fn ticks_per_period(&self, hz: u64) -> Ticks {
        Ticks::new(self.frequency_hz / hz * TICKS_PER_T_STATE)
    }
}
