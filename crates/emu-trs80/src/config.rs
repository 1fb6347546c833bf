//! Machine configuration.

use serde::{Deserialize, Serialize};

/// Model III CPU clock: the 10.1376 MHz crystal divided by five.
pub const CPU_FREQUENCY_HZ: u64 = 2_027_520;

/// Host-tunable machine options. Missing fields take their defaults, so a
/// host can persist only what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trs80Options {
    /// Start with no floppy drives attached.
    pub no_drives: bool,
    pub cpu_frequency_hz: u64,
    /// Real-time clock interrupt rate.
    pub rtc_hz: u64,
    /// How long the reset button stays latched after a press, in
    /// emulated microseconds.
    pub reset_button_hold_us: u64,
}

impl Default for Trs80Options {
    fn default() -> Self {
        Self {
            no_drives: true,
            cpu_frequency_hz: CPU_FREQUENCY_HZ,
            rtc_hz: 30,
            reset_button_hold_us: 200_000,
        }
    }
}

/// Configuration for creating a [`Trs80`](crate::Trs80).
#[derive(Debug, Clone, Default)]
pub struct Trs80Config {
    /// ROM image, loaded at $0000. At most 14K.
    pub rom: Vec<u8>,
    pub options: Trs80Options,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_options_fill_defaults() {
        let opts: Trs80Options = serde_json::from_str(r#"{"rtc_hz": 60}"#).expect("valid JSON");
        assert_eq!(opts.rtc_hz, 60);
        assert_eq!(opts.cpu_frequency_hz, CPU_FREQUENCY_HZ);
        assert!(opts.no_drives);

        let json = serde_json::to_string(&Trs80Options::default()).expect("serialises");
        let back: Trs80Options = serde_json::from_str(&json).expect("round trips");
        assert_eq!(back, Trs80Options::default());
    }
}
