//! One interrupt source's latch.
//!
//! A latch records that its source has fired. It is separate from the
//! source's enable bit: depending on how it is built, a latch may record a
//! request that arrives while disabled, and it may survive being disabled.

use std::io::{self, Read, Write};

use crate::snapshot::{Snapshot, read_bool, write_bool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latch {
    latched: bool,
    enabled: bool,
    /// Once latched, only [`Latch::unlatch`] clears it.
    trigger_lock: bool,
    /// Accept [`Latch::request_latch`] while disabled.
    can_latch_before_enabled: bool,
}

impl Latch {
    #[must_use]
    pub const fn new(trigger_lock: bool, can_latch_before_enabled: bool) -> Self {
        Self {
            latched: false,
            enabled: false,
            trigger_lock,
            can_latch_before_enabled,
        }
    }

    /// Request the latch. Returns true only on a transition from clear to
    /// latched, so the caller acts once per firing.
    pub fn request_latch(&mut self) -> bool {
        if self.latched || (!self.enabled && !self.can_latch_before_enabled) {
            return false;
        }
        self.latched = true;
        true
    }

    /// Clear the latch. Returns true if it was latched.
    pub fn unlatch(&mut self) -> bool {
        std::mem::replace(&mut self.latched, false)
    }

    /// Set the enable bit. Disabling clears the latch unless it is
    /// trigger-locked.
    pub fn enable(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled && !self.trigger_lock {
            self.latched = false;
        }
    }

    #[must_use]
    pub const fn is_latched(&self) -> bool {
        self.latched
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Latched and enabled: the source is driving its interrupt line.
    #[must_use]
    pub const fn asserted(&self) -> bool {
        self.latched && self.enabled
    }
}

impl Snapshot for Latch {
    fn save(&self, w: &mut dyn Write) -> io::Result<()> {
        write_bool(w, self.latched)?;
        write_bool(w, self.enabled)
    }

    fn load(&mut self, r: &mut dyn Read) -> io::Result<()> {
        self.latched = read_bool(r)?;
        self.enabled = read_bool(r)?;
        Ok(())
    }
}
