//! The 256-port I/O space.
//!
//! Each port holds the byte a read returns. A second array records the
//! last byte written to each port, which is what output devices such as
//! the cassette see. Accesses to these ports have side effects:
//!
//! | Port | Read | Write |
//! |------|------|-------|
//! | $E0-$E3 | Maskable interrupt status | Maskable interrupt mask |
//! | $E4 | NMI status | NMI mask, then controller |
//! | $E5-$E7 | | Controller |
//! | $EC-$EF | Acknowledge RTC interrupt | Video mode (bit 2 wide, bit 3 clear for Kanji) |
//! | $F0 | Controller status, or $FF with no drives | Controller |
//! | $F1-$F3 | Controller | Controller |
//! | $F4 | | Controller |
//! | $FF | Clear cassette latches | Cassette output |
//!
//! Every other port is inert: reads return the stored byte and writes
//! change only the last-written record.

use std::io::{self, Read, Write};

use log::trace;

use crate::fdc::{FdcIoEvent, FloppyController};
use crate::interrupts::InterruptManager;
use crate::memory::Memory;
use crate::snapshot::{Snapshot, read_bool, write_bool};

const NUM_PORTS: usize = 0x100;

/// The components a port access can reach.
pub struct PortDevices<'a> {
    pub interrupts: &'a mut InterruptManager,
    pub memory: &'a mut Memory,
    pub fdc: &'a mut dyn FloppyController,
}

#[derive(Debug, Clone)]
pub struct PortSet {
    ports: [u8; NUM_PORTS],
    last_out: [u8; NUM_PORTS],
    /// No floppy drives are attached, so $F0 reads as $FF.
    no_drives: bool,
}

impl PortSet {
    #[must_use]
    pub fn new(no_drives: bool) -> Self {
        let mut ports = Self {
            ports: [0xFF; NUM_PORTS],
            last_out: [0; NUM_PORTS],
            no_drives,
        };
        ports.reset();
        ports
    }

    /// Restore power-on port values.
    pub fn reset(&mut self) {
        self.ports = [0xFF; NUM_PORTS];
        self.last_out = [0; NUM_PORTS];
        self.ports[0x50..=0x5E].fill(0x00);
        for (port, value) in [
            (0x5F, 0x32),
            (0x68, 0x59),
            (0x69, 0x1E),
            (0x6A, 0x16),
            (0x6B, 0x05),
            (0x6C, 0x24),
            (0x6D, 0x04),
            (0x71, 0x00),
            (0xE0, 0xFB),
            (0xE4, 0x00),
            (0xEC, 0x12),
            (0xF0, 0x80),
            (0xF1, 0x00),
        ] {
            self.ports[port] = value;
        }
        self.ports[0xF8..=0xFB].fill(0x3F);
        // Cassette not ready.
        self.ports[0xFC..=0xFF].fill(0x89);
    }

    #[must_use]
    pub const fn no_drives(&self) -> bool {
        self.no_drives
    }

    /// Changing the flag resets the controller status port.
    pub fn set_no_drives(&mut self, no_drives: bool) {
        if self.no_drives != no_drives {
            self.ports[0xF0] = if self.no_drives { 0xFF } else { 0x80 };
            self.no_drives = no_drives;
        }
    }

    /// CPU `IN`.
    pub fn read(&mut self, port: u8, devices: &mut PortDevices<'_>) -> u8 {
        match port {
            0xE0..=0xE3 => self.ports[port as usize] = devices.interrupts.status_register(),
            0xE4 => self.ports[0xE4] = devices.interrupts.nmi_status(),
            0xEC..=0xEF => {
                devices.interrupts.acknowledge_clock();
                self.ports[0xEC] = 0xFF;
            }
            0xF0 if self.no_drives => self.ports[0xF0] = 0xFF,
            0xF0 => {
                devices.interrupts.acknowledge_nmi_group();
                self.forward(port, 0, false, devices);
            }
            0xF1..=0xF3 => self.forward(port, 0, false, devices),
            0xFF => {
                self.ports[0xFF] &= 0xFC;
                devices.interrupts.acknowledge_cassette();
            }
            _ => {}
        }
        let value = self.ports[port as usize];
        trace!("IN {port:02X} = {value:02X}");
        value
    }

    /// CPU `OUT`.
    pub fn write(&mut self, port: u8, value: u8, devices: &mut PortDevices<'_>) {
        trace!("OUT {port:02X}, {value:02X}");
        self.last_out[port as usize] = value;
        match port {
            0xE0..=0xE3 => devices.interrupts.write_mask_register(value),
            0xE4 => {
                devices.interrupts.write_nmi_mask(value);
                self.forward(port, value, true, devices);
            }
            0xEC..=0xEF => devices
                .memory
                .set_video_mode(value & 0x04 != 0, value & 0x08 == 0),
            0xE5..=0xE7 | 0xF0..=0xF4 => self.forward(port, value, true, devices),
            _ => {}
        }
    }

    fn forward(&mut self, port: u8, value: u8, is_write: bool, devices: &mut PortDevices<'_>) {
        let event = FdcIoEvent {
            port,
            value,
            is_write,
        };
        devices.fdc.io_event(event, self, devices.interrupts);
    }

    /// Store a port value without side effects.
    pub fn set_direct(&mut self, port: u8, value: u8) {
        self.ports[port as usize] = value;
    }

    /// Read a port value without side effects.
    #[must_use]
    pub fn get_direct(&self, port: u8) -> u8 {
        self.ports[port as usize]
    }

    #[must_use]
    pub fn last_written(&self, port: u8) -> u8 {
        self.last_out[port as usize]
    }

    /// The byte most recently sent to the cassette port.
    #[must_use]
    pub fn cassette_out(&self) -> u8 {
        self.last_out[0xFF]
    }
}

impl Snapshot for PortSet {
    fn save(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.ports)?;
        w.write_all(&self.last_out)?;
        write_bool(w, self.no_drives)
    }

    fn load(&mut self, r: &mut dyn Read) -> io::Result<()> {
        r.read_exact(&mut self.ports)?;
        r.read_exact(&mut self.last_out)?;
        // Through the setter, so a flag change also resets $F0.
        let no_drives = read_bool(r)?;
        self.set_no_drives(no_drives);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::LatchRole;

    #[derive(Default)]
    struct Recorder {
        events: Vec<FdcIoEvent>,
        status: u8,
    }

    impl FloppyController for Recorder {
        fn io_event(&mut self, event: FdcIoEvent, ports: &mut PortSet, interrupts: &mut InterruptManager) {
            self.events.push(event);
            if !event.is_write {
                ports.set_direct(event.port, self.status);
            }
            if event.is_write && event.port == 0xF0 {
                interrupts.latch_mut(LatchRole::Fdc).request_latch();
            }
        }
    }

    struct Rig {
        ports: PortSet,
        interrupts: InterruptManager,
        memory: Memory,
        fdc: Recorder,
    }

    impl Rig {
        fn new(no_drives: bool) -> Self {
            Self {
                ports: PortSet::new(no_drives),
                interrupts: InterruptManager::new(),
                memory: Memory::new(&[]).expect("empty ROM"),
                fdc: Recorder::default(),
            }
        }

        fn read(&mut self, port: u8) -> u8 {
            let mut devices = PortDevices {
                interrupts: &mut self.interrupts,
                memory: &mut self.memory,
                fdc: &mut self.fdc,
            };
            self.ports.read(port, &mut devices)
        }

        fn write(&mut self, port: u8, value: u8) {
            let mut devices = PortDevices {
                interrupts: &mut self.interrupts,
                memory: &mut self.memory,
                fdc: &mut self.fdc,
            };
            self.ports.write(port, value, &mut devices);
        }
    }

    #[test]
    fn power_on_values() {
        let ports = PortSet::new(true);
        assert_eq!(ports.get_direct(0x00), 0xFF);
        assert_eq!(ports.get_direct(0x55), 0x00);
        assert_eq!(ports.get_direct(0x5F), 0x32);
        assert_eq!(ports.get_direct(0x6D), 0x04);
        assert_eq!(ports.get_direct(0xE0), 0xFB);
        assert_eq!(ports.get_direct(0xEC), 0x12);
        assert_eq!(ports.get_direct(0xF0), 0x80);
        assert_eq!(ports.get_direct(0xFA), 0x3F);
        assert_eq!(ports.get_direct(0xFF), 0x89);
        assert_eq!(ports.cassette_out(), 0x00);
    }

    #[test]
    fn inert_ports_have_no_side_effects() {
        let mut rig = Rig::new(false);
        rig.write(0x10, 0x42);
        assert_eq!(rig.read(0x10), 0xFF);
        assert_eq!(rig.ports.last_written(0x10), 0x42);
        assert!(rig.fdc.events.is_empty());
    }

    #[test]
    fn mask_register_round_trip() {
        let mut rig = Rig::new(true);
        rig.write(0xE0, 0x04);
        assert!(rig.interrupts.latch(LatchRole::Rtc).is_enabled());
        assert_eq!(rig.read(0xE0), 0x7F);
        rig.interrupts.clock_tick();
        assert_eq!(rig.read(0xE2), 0x7B);
        assert!(rig.interrupts.irq_pending());

        // Any of $EC-$EF acknowledges.
        assert_eq!(rig.read(0xEE), 0xFF);
        assert_eq!(rig.ports.get_direct(0xEC), 0xFF);
        assert!(!rig.interrupts.irq_pending());
        assert_eq!(rig.read(0xE0), 0x7F);
    }

    #[test]
    fn video_mode_bits() {
        let mut rig = Rig::new(true);
        rig.write(0xEC, 0x04);
        assert!(rig.memory.is_wide());
        assert!(rig.memory.is_kanji());
        rig.write(0xED, 0x08);
        assert!(!rig.memory.is_wide());
        assert!(!rig.memory.is_kanji());
    }

    #[test]
    fn no_drives_reads_ff_without_the_controller() {
        let mut rig = Rig::new(true);
        assert_eq!(rig.read(0xF0), 0xFF);
        assert!(rig.fdc.events.is_empty());

        rig.ports.set_no_drives(false);
        assert_eq!(rig.ports.get_direct(0xF0), 0xFF);
        rig.fdc.status = 0x20;
        assert_eq!(rig.read(0xF0), 0x20);
        rig.ports.set_no_drives(true);
        assert_eq!(rig.ports.get_direct(0xF0), 0x80);
    }

    #[test]
    fn controller_ports_forward_events() {
        let mut rig = Rig::new(false);
        rig.fdc.status = 0x5A;
        rig.write(0xE4, 0x80);
        rig.write(0xF0, 0xD0);
        rig.write(0xF4, 0x01);
        rig.write(0xE8, 0x01);
        assert_eq!(rig.read(0xF2), 0x5A);
        assert_eq!(
            rig.fdc.events,
            vec![
                FdcIoEvent { port: 0xE4, value: 0x80, is_write: true },
                FdcIoEvent { port: 0xF0, value: 0xD0, is_write: true },
                FdcIoEvent { port: 0xF4, value: 0x01, is_write: true },
                FdcIoEvent { port: 0xF2, value: 0, is_write: false },
            ]
        );
        // The $F0 command raised the controller NMI; a status read clears it.
        assert!(rig.interrupts.nmi_pending());
        assert_eq!(rig.read(0xE4), 0x60);
        rig.read(0xF0);
        assert!(!rig.interrupts.nmi_pending());
        assert_eq!(rig.read(0xE4), 0xE0);
    }

    #[test]
    fn cassette_port() {
        let mut rig = Rig::new(true);
        rig.write(0xE0, 0x03);
        rig.interrupts.latch_mut(LatchRole::CassetteRising).request_latch();
        rig.write(0xFF, 0x02);
        assert_eq!(rig.ports.cassette_out(), 0x02);
        assert_eq!(rig.read(0xFF), 0x88);
        assert!(!rig.interrupts.latch(LatchRole::CassetteRising).is_latched());
    }

    #[test]
    fn snapshot_block() {
        let mut rig = Rig::new(false);
        rig.write(0x20, 0x99);
        rig.ports.set_direct(0x21, 0x11);
        let mut out = Vec::new();
        rig.ports.save(&mut out).expect("writes");
        assert_eq!(out.len(), 513);
        assert_eq!(out[512], 0);

        let mut restored = PortSet::new(true);
        restored.load(&mut out.as_slice()).expect("reads");
        assert!(!restored.no_drives());
        assert_eq!(restored.get_direct(0x21), 0x11);
        assert_eq!(restored.last_written(0x20), 0x99);
    }
}
