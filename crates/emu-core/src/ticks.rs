//! The fundamental unit of time in the emulator.

/// Number of ticks in one CPU T-state.
///
/// Timing is kept in a unit finer than a T-state so that devices clocked
/// at fractional rates still land on integer tick counts.
pub const TICKS_PER_T_STATE: u64 = 1000;

/// A count of emulator ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Ticks equivalent to the given number of T-states.
    #[must_use]
    pub const fn from_t_states(t_states: u64) -> Self {
        Self(t_states * TICKS_PER_T_STATE)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whole T-states in this tick count.
    #[must_use]
    pub const fn t_states(self) -> u64 {
        self.0 / TICKS_PER_T_STATE
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}
