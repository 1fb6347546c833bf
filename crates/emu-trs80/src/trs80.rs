//! Top-level Model III system.
//!
//! The machine advances one whole instruction at a time. After each
//! instruction it fires any pulses that have come due (the real-time
//! clock and the reset button's release), then samples the interrupt
//! lines. NMI is edge-triggered and wins over the maskable interrupt,
//! which is level-triggered and held by the RTC latch until the ROM
//! acknowledges it through port $EC.

use emu_core::{Bus, Cpu, MasterClock, Ticks};
use format_jv::{FloppyImage, ImageFormat};
use log::debug;
use zilog_z80::Z80;

use crate::config::{Trs80Config, Trs80Options};
use crate::fdc::{FloppyController, NoFdc};
use crate::interrupts::{InterruptManager, LatchRole};
use crate::memory::Memory;
use crate::ports::{PortDevices, PortSet};
use crate::pulse::{PulseKind, PulseScheduler};
use crate::snapshot::{SNAPSHOT_LEN, Snapshot, SnapshotError, read_cpu, write_cpu};
use crate::Trs80Error;

pub const DRIVE_COUNT: usize = 4;

/// The Model III bus, implementing `emu_core::Bus`.
///
/// Only the low byte of a port address is decoded.
pub struct Trs80Bus {
    pub memory: Memory,
    pub ports: PortSet,
    pub interrupts: InterruptManager,
    pub fdc: Box<dyn FloppyController>,
}

impl Trs80Bus {
    fn devices(&mut self) -> (&mut PortSet, PortDevices<'_>) {
        (
            &mut self.ports,
            PortDevices {
                interrupts: &mut self.interrupts,
                memory: &mut self.memory,
                fdc: self.fdc.as_mut(),
            },
        )
    }
}

impl Bus for Trs80Bus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        let (ports, mut devices) = self.devices();
        ports.read(port as u8, &mut devices)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        let (ports, mut devices) = self.devices();
        ports.write(port as u8, value, &mut devices);
    }
}

/// A disk in a drive, with the format it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub image: FloppyImage,
    pub format: ImageFormat,
}

/// TRS-80 Model III.
pub struct Trs80 {
    cpu: Z80,
    bus: Trs80Bus,
    pulses: PulseScheduler,
    clock: MasterClock,
    options: Trs80Options,
    /// Emulated time since power-on.
    now: Ticks,
    /// NMI line level after the previous instruction.
    nmi_line: bool,
    drives: [Option<Disk>; DRIVE_COUNT],
}

impl Trs80 {
    /// Create a Model III with no floppy controller.
    ///
    /// # Errors
    ///
    /// Fails if the ROM does not fit below the keyboard block.
    pub fn new(config: Trs80Config) -> Result<Self, Trs80Error> {
        Self::with_fdc(config, Box::new(NoFdc))
    }

    /// Create a Model III wired to the given floppy controller.
    pub fn with_fdc(config: Trs80Config, fdc: Box<dyn FloppyController>) -> Result<Self, Trs80Error> {
        let bus = Trs80Bus {
            memory: Memory::new(&config.rom)?,
            ports: PortSet::new(config.options.no_drives),
            interrupts: InterruptManager::new(),
            fdc,
        };
        let mut machine = Self {
            cpu: Z80::new(),
            bus,
            pulses: PulseScheduler::new(),
            clock: MasterClock::new(config.options.cpu_frequency_hz),
            options: config.options,
            now: Ticks::ZERO,
            nmi_line: false,
            drives: Default::default(),
        };
        machine.schedule_rtc(Ticks::ZERO);
        Ok(machine)
    }

    /// Time between RTC interrupts, or `None` if the clock is off.
    fn rtc_period(&self) -> Option<Ticks> {
        if self.options.rtc_hz == 0 {
            return None;
        }
        Some(
            self.clock
                .ticks_per_period(self.options.rtc_hz)
                .max(Ticks::from_t_states(1)),
        )
    }

    fn schedule_rtc(&mut self, from: Ticks) {
        if let Some(period) = self.rtc_period() {
            self.pulses.schedule(from + period, PulseKind::RtcTick);
        }
    }

    /// Execute one instruction, then handle due pulses and interrupts.
    ///
    /// Returns the time taken, including any interrupt acceptance.
    pub fn step(&mut self) -> Ticks {
        let mut elapsed = self.cpu.step(&mut self.bus);
        self.now += elapsed;
        self.fire_due_pulses();

        let nmi = self.bus.interrupts.nmi_pending();
        let rising = nmi && !self.nmi_line;
        self.nmi_line = nmi;
        let accepted = if rising {
            Some(self.cpu.nmi(&mut self.bus))
        } else if self.bus.interrupts.irq_pending() {
            self.cpu.interrupt(&mut self.bus)
        } else {
            None
        };
        if let Some(ticks) = accepted {
            self.now += ticks;
            elapsed += ticks;
        }
        elapsed
    }

    fn fire_due_pulses(&mut self) {
        while let Some((token, kind, due)) = self.pulses.pop_due(self.now) {
            match kind {
                PulseKind::RtcTick => {
                    self.bus.interrupts.clock_tick();
                    self.schedule_rtc(due);
                }
                PulseKind::ResetRelease => {
                    self.bus.interrupts.release_reset_button(token);
                }
            }
        }
    }

    /// Run whole instructions until at least `budget` has elapsed.
    /// Returns the time actually run.
    pub fn run_for(&mut self, budget: Ticks) -> Ticks {
        let start = self.now;
        while self.now - start < budget {
            self.step();
        }
        self.now - start
    }

    /// Press the reset button. It releases itself after the configured
    /// hold time; pressing again while held has no effect.
    pub fn press_reset_button(&mut self) {
        if self.bus.interrupts.press_reset_button() {
            self.arm_reset_release();
        }
    }

    fn arm_reset_release(&mut self) {
        let due = self.now + self.clock.ticks_for_micros(self.options.reset_button_hold_us);
        let token = self.pulses.schedule(due, PulseKind::ResetRelease);
        if let Some(old) = self.bus.interrupts.set_reset_pulse(token) {
            self.pulses.cancel(old);
        }
    }

    fn cancel_reset_release(&mut self) {
        if let Some(token) = self.bus.interrupts.take_reset_pulse() {
            self.pulses.cancel(token);
        }
    }

    /// Power-on reset of the CPU, ports and interrupt latches. RAM and
    /// inserted disks are kept.
    pub fn reset(&mut self) {
        debug!("machine reset");
        self.cancel_reset_release();
        self.cpu.reset();
        self.bus.interrupts = InterruptManager::new();
        self.bus.ports.reset();
        self.nmi_line = false;
    }

    /// Serialise the machine: interrupt latches, memory, ports, then CPU.
    pub fn save_snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut out = Vec::with_capacity(SNAPSHOT_LEN);
        self.bus.interrupts.save(&mut out)?;
        self.bus.memory.save(&mut out)?;
        self.bus.ports.save(&mut out)?;
        write_cpu(&mut out, &self.cpu.registers(), self.cpu.is_halted())?;
        debug!("saved snapshot at {} T-states", self.now.t_states());
        Ok(out)
    }

    /// Restore a snapshot from [`Trs80::save_snapshot`]. The machine is
    /// unchanged if this fails.
    ///
    /// A pending reset-button release is cancelled. If the snapshot has
    /// the button held, a new release is scheduled for the full hold time.
    /// The no-drives flag is the snapshot's, even if it disagrees with the
    /// disks now inserted, until the next insert or eject.
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        if data.len() != SNAPSHOT_LEN {
            return Err(SnapshotError::Length {
                expected: SNAPSHOT_LEN,
                actual: data.len(),
            });
        }
        let mut r = data;
        let mut interrupts = InterruptManager::new();
        interrupts.load(&mut r)?;
        let mut memory = self.bus.memory.clone();
        memory.load(&mut r)?;
        let mut ports = self.bus.ports.clone();
        ports.load(&mut r)?;
        let (regs, halted) = read_cpu(&mut r)?;

        self.cancel_reset_release();
        self.nmi_line = interrupts.nmi_pending();
        let reset_held = interrupts.latch(LatchRole::ResetButton).is_latched();
        self.bus.interrupts = interrupts;
        self.bus.memory = memory;
        self.bus.ports = ports;
        *self.cpu.registers_mut() = regs;
        self.cpu.set_halted(halted);
        if reset_held {
            self.arm_reset_release();
        }
        debug!("loaded snapshot, PC {:04X}", regs.pc);
        Ok(())
    }

    /// Load a JV1 or JV3 image into a drive. A disk already in the drive
    /// is replaced only if the new image decodes.
    pub fn insert_disk(&mut self, drive: usize, bytes: &[u8]) -> Result<ImageFormat, Trs80Error> {
        if drive >= DRIVE_COUNT {
            return Err(Trs80Error::NoSuchDrive(drive));
        }
        let (image, format) = FloppyImage::from_bytes(bytes)?;
        self.drives[drive] = Some(Disk { image, format });
        self.update_drive_presence();
        Ok(format)
    }

    pub fn eject_disk(&mut self, drive: usize) -> Option<Disk> {
        let disk = self.drives.get_mut(drive)?.take();
        self.update_drive_presence();
        disk
    }

    #[must_use]
    pub fn disk(&self, drive: usize) -> Option<&Disk> {
        self.drives.get(drive)?.as_ref()
    }

    pub fn disk_mut(&mut self, drive: usize) -> Option<&mut Disk> {
        self.drives.get_mut(drive)?.as_mut()
    }

    /// Encode a drive's disk in the format it was loaded from.
    pub fn save_disk(&self, drive: usize) -> Result<Vec<u8>, Trs80Error> {
        if drive >= DRIVE_COUNT {
            return Err(Trs80Error::NoSuchDrive(drive));
        }
        let disk = self.disk(drive).ok_or(Trs80Error::EmptyDrive(drive))?;
        Ok(disk.image.to_bytes(disk.format)?)
    }

    fn update_drive_presence(&mut self) {
        let empty = self.drives.iter().all(Option::is_none);
        self.bus.ports.set_no_drives(empty);
    }

    /// Press a key immediately (stays pressed until released).
    pub fn key_down(&mut self, row: u8, bit: u8) {
        self.bus.memory.key_down(row, bit);
    }

    pub fn key_up(&mut self, row: u8, bit: u8) {
        self.bus.memory.key_up(row, bit);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.memory.release_all_keys();
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &Trs80Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Trs80Bus {
        &mut self.bus
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.bus.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.bus.memory
    }

    #[must_use]
    pub fn now(&self) -> Ticks {
        self.now
    }

    #[must_use]
    pub fn options(&self) -> &Trs80Options {
        &self.options
    }

    #[must_use]
    pub fn clock(&self) -> MasterClock {
        self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ROM that enables interrupts and spins: IM 1; EI; JR -2.
    fn spin_rom() -> Vec<u8> {
        let mut rom = vec![0; 0x3800];
        rom[..5].copy_from_slice(&[0xED, 0x56, 0xFB, 0x18, 0xFE]);
        // RST 38 handler: IN A, (EC); EI; RETI
        rom[0x38..0x3E].copy_from_slice(&[0xDB, 0xEC, 0xFB, 0xED, 0x4D, 0x00]);
        // NMI handler: RETN
        rom[0x66..0x68].copy_from_slice(&[0xED, 0x45]);
        rom
    }

    fn machine(rtc_hz: u64) -> Trs80 {
        Trs80::new(Trs80Config {
            rom: spin_rom(),
            options: Trs80Options {
                rtc_hz,
                ..Trs80Options::default()
            },
        })
        .expect("ROM fits")
    }

    #[test]
    fn run_for_covers_the_budget() {
        let mut m = machine(0);
        let ran = m.run_for(Ticks::from_t_states(1_000));
        assert!(ran >= Ticks::from_t_states(1_000));
        assert!(ran < Ticks::from_t_states(1_020));
        assert_eq!(m.now(), ran);
    }

    #[test]
    fn rtc_interrupts_only_when_unmasked() {
        let mut m = machine(30);
        let period = m.clock().ticks_per_period(30);
        m.run_for(period + Ticks::from_t_states(100));
        // The latch is set but masked, so the CPU never left the loop.
        assert!(m.bus().interrupts.latch(LatchRole::Rtc).is_latched());
        assert!(m.cpu().pc() < 5);

        m.bus_mut().interrupts.write_mask_register(0x04);
        m.step();
        assert_eq!(m.cpu().pc(), 0x38);
        // The handler acknowledges through port $EC.
        m.step();
        assert!(!m.bus().interrupts.irq_pending());
    }

    #[test]
    fn reset_button_nmi_and_release() {
        let mut m = machine(0);
        m.run_for(Ticks::from_t_states(20));
        m.press_reset_button();
        m.step();
        assert_eq!(m.cpu().pc(), 0x66);
        // Held: no second NMI while the line stays high.
        m.step();
        assert_ne!(m.cpu().pc(), 0x66);
        assert!(m.bus().interrupts.nmi_pending());

        let hold = m.clock().ticks_for_micros(200_000);
        m.run_for(hold);
        assert!(!m.bus().interrupts.nmi_pending());
        assert_eq!(m.bus_mut().io_read(0xE4) & 0x20, 0x20);
    }

    #[test]
    fn snapshot_no_drives_flag_holds_until_drives_change() {
        let snap = machine(0).save_snapshot().expect("saves");
        let disk = FloppyImage::new(
            vec![format_jv::SectorDescriptor::new(0, 0, vec![0; 256])],
            false,
        )
        .to_bytes(ImageFormat::Jv3)
        .expect("encodes");

        let mut m = machine(0);
        m.insert_disk(0, &disk).expect("loads");
        assert!(!m.bus().ports.no_drives());
        m.load_snapshot(&snap).expect("loads");
        assert!(m.bus().ports.no_drives());

        m.insert_disk(1, &disk).expect("loads");
        assert!(!m.bus().ports.no_drives());
    }

    #[test]
    fn reset_cancels_the_pending_release() {
        let mut m = machine(0);
        m.press_reset_button();
        m.reset();
        assert!(!m.bus().interrupts.nmi_pending());
        m.press_reset_button();
        m.run_for(m.clock().ticks_for_micros(200_000) + Ticks::from_t_states(50));
        assert!(!m.bus().interrupts.nmi_pending());
    }

    #[test]
    fn snapshot_restores_state_and_rejects_bad_length() {
        let mut m = machine(0);
        m.run_for(Ticks::from_t_states(100));
        m.memory_mut().write(0x8000, 0x5A);
        m.bus_mut().io_write(0x20, 0x77);
        let snap = m.save_snapshot().expect("saves");
        assert_eq!(snap.len(), SNAPSHOT_LEN);
        let pc = m.cpu().pc();

        m.memory_mut().write(0x8000, 0);
        m.cpu_mut().registers_mut().pc = 0x1234;
        assert!(matches!(
            m.load_snapshot(&snap[1..]),
            Err(SnapshotError::Length { .. })
        ));
        assert_eq!(m.cpu().pc(), 0x1234);

        m.load_snapshot(&snap).expect("loads");
        assert_eq!(m.memory().peek(0x8000), 0x5A);
        assert_eq!(m.bus().ports.last_written(0x20), 0x77);
        assert_eq!(m.cpu().pc(), pc);
    }

    #[test]
    fn snapshot_with_button_held_rearms_release() {
        let mut m = machine(0);
        m.press_reset_button();
        let snap = m.save_snapshot().expect("saves");
        m.load_snapshot(&snap).expect("loads");
        assert!(m.bus().interrupts.nmi_pending());
        m.run_for(m.clock().ticks_for_micros(200_000) + Ticks::from_t_states(50));
        assert!(!m.bus().interrupts.nmi_pending());
    }

    #[test]
    fn disks_update_drive_presence() {
        let mut m = machine(0);
        assert!(m.bus().ports.no_drives());
        let jv1 = vec![0xE5; format_jv::jv1::TRACK_SIZE * 2];
        assert_eq!(m.insert_disk(1, &jv1).expect("valid JV1"), ImageFormat::Jv1);
        assert!(!m.bus().ports.no_drives());
        assert_eq!(m.save_disk(1).expect("encodes"), jv1);

        assert!(matches!(m.insert_disk(1, &[1, 2, 3]), Err(Trs80Error::Format(_))));
        assert_eq!(m.disk(1).map(|d| d.format), Some(ImageFormat::Jv1));
        assert!(matches!(m.insert_disk(4, &jv1), Err(Trs80Error::NoSuchDrive(4))));

        assert!(m.eject_disk(1).is_some());
        assert!(m.bus().ports.no_drives());
        assert!(matches!(m.save_disk(1), Err(Trs80Error::EmptyDrive(1))));
    }
}
