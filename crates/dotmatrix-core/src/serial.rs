use log::debug;

use crate::interrupts::{Interrupt, InterruptController};

/// Cycles for one byte at the internal 8192 Hz shift clock.
const TRANSFER_CYCLES: u32 = 4096;

const SC_START: u8 = 0x80;
const SC_INTERNAL_CLOCK: u8 = 0x01;

pub trait LinkPort {
    /// Exchange a byte with the partner and return what it sent back.
    fn transfer(&mut self, byte: u8) -> u8;
}

/// A stub link port used when no cable is attached.
/// Incoming bits are all 1, so any transfer receives 0xFF. When `loopback`
/// is true the sent byte is echoed back instead.
#[derive(Default)]
pub struct NullLinkPort {
    loopback: bool,
}

impl NullLinkPort {
    pub fn new(loopback: bool) -> Self {
        Self { loopback }
    }
}

impl LinkPort for NullLinkPort {
    fn transfer(&mut self, byte: u8) -> u8 {
        if self.loopback { byte } else { 0xFF }
    }
}

/// SB/SC registers. Completed transfers land in an output buffer the host
/// can drain, which is how test ROMs report their results.
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    port: Box<dyn LinkPort>,
    remaining: Option<u32>,
}

impl Serial {
    pub fn new() -> Self {
        Self {
            sb: 0,
            sc: 0,
            out_buf: Vec::new(),
            port: Box::new(NullLinkPort::default()),
            remaining: None,
        }
    }

    pub fn connect(&mut self, port: Box<dyn LinkPort>) {
        self.port = port;
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => self.sc | 0x7E,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = val & (SC_START | SC_INTERNAL_CLOCK);
                if self.sc == SC_START | SC_INTERNAL_CLOCK {
                    debug!("serial transfer start: {:02X}", self.sb);
                    self.remaining = Some(TRANSFER_CYCLES);
                } else {
                    // External clock never ticks without a partner.
                    self.remaining = None;
                }
            }
            _ => {}
        }
    }

    pub fn tick(&mut self, cycles: u32, interrupts: &mut InterruptController) {
        let Some(remaining) = self.remaining else {
            return;
        };
        if remaining > cycles {
            self.remaining = Some(remaining - cycles);
            return;
        }

        self.remaining = None;
        let outgoing = self.sb;
        self.out_buf.push(outgoing);
        self.sb = self.port.transfer(outgoing);
        self.sc &= !SC_START;
        interrupts.request(Interrupt::Serial);
    }

    pub fn output(&self) -> &[u8] {
        &self.out_buf
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }
}

impl Default for Serial {
    fn default() -> Self {
        Self::new()
    }
}
