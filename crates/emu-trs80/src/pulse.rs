//! Timed events on the emulated timeline.
//!
//! A pulse is a request to do something once a given tick count is
//! reached. Every request gets a unique [`PulseToken`]; cancelling hands the
//! token back, and a receiver that stored a token can check that a firing
//! pulse is still the one it is waiting for.

use emu_core::Ticks;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PulseToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    /// Real-time clock interrupt.
    RtcTick,
    /// End of the reset button's hold time.
    ResetRelease,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    due: Ticks,
    token: PulseToken,
    kind: PulseKind,
}

#[derive(Debug, Clone, Default)]
pub struct PulseScheduler {
    next_id: u64,
    /// Kept sorted by due time; ties fire in scheduling order.
    pending: Vec<Pending>,
}

impl PulseScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Ticks, kind: PulseKind) -> PulseToken {
        let token = PulseToken(self.next_id);
        self.next_id += 1;
        let at = self.pending.partition_point(|p| p.due <= due);
        self.pending.insert(at, Pending { due, token, kind });
        token
    }

    /// Drop a pending pulse. Returns false if it already fired or was
    /// never scheduled.
    pub fn cancel(&mut self, token: PulseToken) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.token != token);
        self.pending.len() != before
    }

    #[must_use]
    pub fn is_pending(&self, token: PulseToken) -> bool {
        self.pending.iter().any(|p| p.token == token)
    }

    /// Remove and return the earliest pulse due at or before `now`.
    pub fn pop_due(&mut self, now: Ticks) -> Option<(PulseToken, PulseKind, Ticks)> {
        let first = self.pending.first()?;
        if first.due > now {
            return None;
        }
        let p = self.pending.remove(0);
        Some((p.token, p.kind, p.due))
    }

    #[must_use]
    pub fn next_due(&self) -> Option<Ticks> {
        self.pending.first().map(|p| p.due)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
