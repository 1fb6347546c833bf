//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU reaches memory and peripherals only through this trait. The bus
/// decodes addresses and routes each access to the right device, so reads
/// are allowed to have side effects (a port read may acknowledge an
/// interrupt, for example).
pub trait Bus {
    /// Read a byte from the given memory address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given memory address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte from the given I/O port.
    ///
    /// The full 16-bit port address is passed; machines that decode only
    /// the low byte mask it themselves.
    fn io_read(&mut self, port: u16) -> u8;

    /// Write a byte to the given I/O port.
    fn io_write(&mut self, port: u16, value: u8);
}

/// Flat 64K RAM with a 256-entry port file.
///
/// Port reads return the last value stored with [`SimpleBus::set_port`]
/// (default `0xFF`); port writes are recorded in `io_log` for inspection.
pub struct SimpleBus {
    ram: Box<[u8; 0x1_0000]>,
    ports: [u8; 0x100],
    /// Every `(port, value)` pair written, in program order.
    pub io_log: Vec<(u16, u8)>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ram: Box::new([0; 0x1_0000]),
            ports: [0xFF; 0x100],
            io_log: Vec::new(),
        }
    }

    /// Copy `data` into RAM starting at `address`, wrapping at 64K.
    pub fn load(&mut self, address: u16, data: &[u8]) {
        let mut addr = address;
        for &byte in data {
            self.ram[addr as usize] = byte;
            addr = addr.wrapping_add(1);
        }
    }

    /// Read RAM without going through the bus.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    /// Preload the value an `IN` from this port will return.
    pub fn set_port(&mut self, port: u8, value: u8) {
        self.ports[port as usize] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.ports[(port & 0xFF) as usize]
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.io_log.push((port, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut bus = SimpleBus::new();
        bus.load(0xFFFF, &[0x11, 0x22]);
        assert_eq!(bus.peek(0xFFFF), 0x11);
        assert_eq!(bus.peek(0x0000), 0x22);
    }

    #[test]
    fn ports_default_to_ff_and_log_writes() {
        let mut bus = SimpleBus::new();
        assert_eq!(bus.io_read(0x12FE), 0xFF);
        bus.set_port(0xFE, 0x1F);
        assert_eq!(bus.io_read(0x00FE), 0x1F);
        bus.io_write(0x00EC, 0x04);
        assert_eq!(bus.io_log, vec![(0x00EC, 0x04)]);
    }
}
