//! Boundary to the floppy disk controller.
//!
//! The controller itself lives outside this crate. The port file forwards
//! every access to ports $E4-$E7 and $F0-$F4 as an [`FdcIoEvent`]; the
//! controller answers by publishing status bytes with
//! [`PortSet::set_direct`] and raising its NMI latches.

use crate::interrupts::InterruptManager;
use crate::ports::PortSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdcIoEvent {
    pub port: u8,
    /// The byte written, or 0 for a read.
    pub value: u8,
    pub is_write: bool,
}

pub trait FloppyController {
    /// Handle one port access. For a read, whatever the controller stores
    /// in `ports` for `event.port` is what the CPU sees.
    fn io_event(&mut self, event: FdcIoEvent, ports: &mut PortSet, interrupts: &mut InterruptManager);
}

/// No controller fitted. Reads see whatever the port last held.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFdc;

impl FloppyController for NoFdc {
    fn io_event(&mut self, _: FdcIoEvent, _: &mut PortSet, _: &mut InterruptManager) {}
}

