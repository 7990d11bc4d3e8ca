use crate::interrupts::{Interrupt, InterruptController};

pub const DIV_ADDR: u16 = 0xFF04;
pub const TIMA_ADDR: u16 = 0xFF05;
pub const TMA_ADDR: u16 = 0xFF06;
pub const TAC_ADDR: u16 = 0xFF07;

const TAC_ENABLE: u8 = 0x04;
const TAC_CLOCK_SELECT: u8 = 0x03;

pub struct Timer {
    /// 16-bit internal divider counter. DIV register is the upper 8 bits.
    pub div: u16,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
        }
    }

    /// Number of cycles between TIMA increments for the selected clock.
    pub fn period(&self) -> u32 {
        match self.tac & TAC_CLOCK_SELECT {
            0x00 => 1024,
            0x01 => 16,
            0x02 => 64,
            _ => 256,
        }
    }

    pub fn enabled(&self) -> bool {
        self.tac & TAC_ENABLE != 0
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV_ADDR => (self.div >> 8) as u8,
            TIMA_ADDR => self.tima,
            TMA_ADDR => self.tma,
            TAC_ADDR => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            DIV_ADDR => self.reset_div(),
            TIMA_ADDR => self.tima = val,
            TMA_ADDR => self.tma = val,
            TAC_ADDR => self.tac = val & 0x07,
            _ => {}
        }
    }

    /// Clear the whole divider, including the hidden low byte.
    pub fn reset_div(&mut self) {
        self.div = 0;
    }

    /// Advance the timer by `cycles` CPU cycles, requesting the timer
    /// interrupt whenever TIMA overflows.
    ///
    /// The sub-counter is the low bits of the divider, so TIMA steps each
    /// time the divider crosses a multiple of the selected period. A rate
    /// change takes effect from the divider's current phase.
    pub fn tick(&mut self, cycles: u32, interrupts: &mut InterruptController) {
        let before = u32::from(self.div);
        self.div = self.div.wrapping_add(cycles as u16);
        if !self.enabled() {
            return;
        }

        let period = self.period();
        let steps = (before + cycles) / period - before / period;
        for _ in 0..steps {
            self.increment(interrupts);
        }
    }

    fn increment(&mut self, interrupts: &mut InterruptController) {
        let (next, overflow) = self.tima.overflowing_add(1);
        if overflow {
            self.tima = self.tma;
            interrupts.request(Interrupt::Timer);
        } else {
            self.tima = next;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
