//! Interrupt latches and their status/mask registers.
//!
//! The real-time clock drives the maskable interrupt line. The floppy
//! controller, the motor-off timer and the reset button share the NMI
//! line. The I/O bus, cassette and RS-232 latches have no source in this
//! machine but still appear in the status byte and in snapshots.
//!
//! All status bits are active low: a clear bit means "interrupt pending".

use std::io::{self, Read, Write};

use log::{debug, warn};

use crate::latch::Latch;
use crate::pulse::PulseToken;
use crate::snapshot::Snapshot;

/// The interrupt sources, in snapshot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatchRole {
    Rtc,
    Fdc,
    MotorOff,
    ResetButton,
    Io,
    CassetteRising,
    CassetteFalling,
    Rs232Error,
    Rs232Receive,
    Rs232Transmit,
}

impl LatchRole {
    pub const ALL: [Self; 10] = [
        Self::Rtc,
        Self::Fdc,
        Self::MotorOff,
        Self::ResetButton,
        Self::Io,
        Self::CassetteRising,
        Self::CassetteFalling,
        Self::Rs232Error,
        Self::Rs232Receive,
        Self::Rs232Transmit,
    ];

    /// Bit in the port $E0 status and mask registers.
    const fn maskable_bit(self) -> Option<u8> {
        match self {
            Self::Rs232Error => Some(0x40),
            Self::Rs232Receive => Some(0x20),
            Self::Rs232Transmit => Some(0x10),
            Self::Io => Some(0x08),
            Self::Rtc => Some(0x04),
            Self::CassetteFalling => Some(0x02),
            Self::CassetteRising => Some(0x01),
            _ => None,
        }
    }

    /// Bit in the port $E4 NMI status register.
    const fn nmi_bit(self) -> Option<u8> {
        match self {
            Self::Fdc => Some(0x80),
            Self::MotorOff => Some(0x40),
            Self::ResetButton => Some(0x20),
            _ => None,
        }
    }

    fn new_latch(self) -> Latch {
        match self {
            Self::Rtc => Latch::new(true, true),
            Self::Fdc | Self::MotorOff => Latch::new(false, true),
            Self::ResetButton => {
                let mut latch = Latch::new(true, false);
                latch.enable(true);
                latch
            }
            _ => Latch::new(false, false),
        }
    }
}

const NMI_SOURCES: [LatchRole; 3] = [LatchRole::Fdc, LatchRole::MotorOff, LatchRole::ResetButton];

#[derive(Debug, Clone)]
pub struct InterruptManager {
    latches: [Latch; 10],
    /// Pending auto-release of the reset button, if any.
    reset_pulse: Option<PulseToken>,
}

impl InterruptManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            latches: LatchRole::ALL.map(LatchRole::new_latch),
            reset_pulse: None,
        }
    }

    #[must_use]
    pub fn latch(&self, role: LatchRole) -> &Latch {
        &self.latches[role as usize]
    }

    pub fn latch_mut(&mut self, role: LatchRole) -> &mut Latch {
        &mut self.latches[role as usize]
    }

    /// Port $E0 read: one clear bit per latched maskable source. Bit 7 is
    /// always clear.
    #[must_use]
    pub fn status_register(&self) -> u8 {
        let status = self.compose(LatchRole::maskable_bit);
        debug!(
            "RTC interrupt {}in progress",
            if self.latch(LatchRole::Rtc).is_latched() { "" } else { "not " }
        );
        status
    }

    /// Port $E0 write: enable or disable each maskable source.
    pub fn write_mask_register(&mut self, value: u8) {
        for role in LatchRole::ALL {
            if let Some(bit) = role.maskable_bit() {
                self.latch_mut(role).enable(value & bit != 0);
            }
        }
        debug!(
            "RTC interrupts {}",
            if value & 0x04 != 0 { "enabled" } else { "disabled" }
        );
    }

    /// Port $E4 read: one clear bit per latched NMI source.
    #[must_use]
    pub fn nmi_status(&self) -> u8 {
        self.compose(LatchRole::nmi_bit)
    }

    /// Port $E4 write: bit 7 enables the controller NMI, bit 6 the
    /// motor-off NMI. The reset button cannot be masked.
    pub fn write_nmi_mask(&mut self, value: u8) {
        for (role, bit) in [(LatchRole::Fdc, 0x80), (LatchRole::MotorOff, 0x40)] {
            let latch = self.latch_mut(role);
            let was = latch.is_enabled();
            latch.enable(value & bit != 0);
            debug!("{role:?} NMI enable: {was} -> {}", value & bit != 0);
        }
    }

    fn compose(&self, bit_of: fn(LatchRole) -> Option<u8>) -> u8 {
        LatchRole::ALL
            .into_iter()
            .filter_map(|role| bit_of(role).map(|bit| (role, bit)))
            .filter(|&(role, _)| !self.latch(role).is_latched())
            .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Port $EC read: clear the real-time clock interrupt.
    pub fn acknowledge_clock(&mut self) {
        if self.latch_mut(LatchRole::Rtc).unlatch() {
            debug!("RTC interrupt cleared");
        }
    }

    /// Clear the controller and motor-off NMIs. The reset button is
    /// released only by its own timer.
    pub fn acknowledge_nmi_group(&mut self) {
        self.latch_mut(LatchRole::Fdc).unlatch();
        self.latch_mut(LatchRole::MotorOff).unlatch();
    }

    /// Port $FF read: clear both cassette edge latches.
    pub fn acknowledge_cassette(&mut self) {
        self.latch_mut(LatchRole::CassetteRising).unlatch();
        self.latch_mut(LatchRole::CassetteFalling).unlatch();
    }

    /// Real-time clock tick.
    pub fn clock_tick(&mut self) {
        self.latch_mut(LatchRole::Rtc).request_latch();
    }

    /// The maskable interrupt line.
    #[must_use]
    pub fn irq_pending(&self) -> bool {
        self.latch(LatchRole::Rtc).asserted()
    }

    /// The NMI line.
    #[must_use]
    pub fn nmi_pending(&self) -> bool {
        NMI_SOURCES.iter().any(|&role| self.latch(role).asserted())
    }

    /// Latch the reset button. Returns true if it was newly pressed, in
    /// which case the caller schedules the release and records it with
    /// [`InterruptManager::set_reset_pulse`].
    pub fn press_reset_button(&mut self) -> bool {
        let pressed = self.latch_mut(LatchRole::ResetButton).request_latch();
        if pressed {
            debug!("reset button pressed");
        }
        pressed
    }

    /// Record the pulse that will release the reset button, returning the
    /// one it replaces.
    pub fn set_reset_pulse(&mut self, token: PulseToken) -> Option<PulseToken> {
        self.reset_pulse.replace(token)
    }

    /// Forget the pending release without firing it.
    pub fn take_reset_pulse(&mut self) -> Option<PulseToken> {
        self.reset_pulse.take()
    }

    /// Release the reset button if `token` is the pulse currently
    /// scheduled for it. Stale pulses are ignored.
    pub fn release_reset_button(&mut self, token: PulseToken) -> bool {
        if self.reset_pulse != Some(token) {
            warn!("ignoring stale reset-button release {token:?}");
            return false;
        }
        self.reset_pulse = None;
        self.latch_mut(LatchRole::ResetButton).unlatch();
        debug!("reset button released");
        true
    }
}

impl Default for InterruptManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot for InterruptManager {
    fn save(&self, w: &mut dyn Write) -> io::Result<()> {
        self.latches.iter().try_for_each(|latch| latch.save(w))
    }

    fn load(&mut self, r: &mut dyn Read) -> io::Result<()> {
        self.latches.iter_mut().try_for_each(|latch| latch.load(r))?;
        self.reset_pulse = None;
        Ok(())
    }
}
