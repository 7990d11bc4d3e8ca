//! Interrupt enable mask (IE, 0xFFFF) and request flags (IF, 0xFF0F).
//!
//! Priority is fixed by bit position: VBlank, LCD STAT, Timer, Serial,
//! Joypad. The CPU polls [`InterruptController::pending`] after every
//! instruction and acknowledges with [`InterruptController::clear`].

/// The five interrupt sources, in hardware priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    #[inline]
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }

    /// Address the CPU jumps to when servicing this interrupt.
    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }
}

const SOURCE_BITS: u8 = 0x1F;
// IF bits 5-7 are unconnected and read back as 1.
const IF_UNUSED_BITS: u8 = 0xE0;

#[derive(Debug, Clone, Default)]
pub struct InterruptController {
    enable: u8,
    flags: u8,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, source: Interrupt) {
        self.flags |= source.mask();
    }

    pub fn clear(&mut self, source: Interrupt) {
        self.flags &= !source.mask();
    }

    pub fn is_requested(&self, source: Interrupt) -> bool {
        self.flags & source.mask() != 0
    }

    pub fn mask_enabled(&self, source: Interrupt) -> bool {
        self.enable & source.mask() != 0
    }

    /// Highest-priority source that is both requested and enabled.
    pub fn pending(&self) -> Option<Interrupt> {
        let active = self.enable & self.flags & SOURCE_BITS;
        if active == 0 {
            return None;
        }
        Interrupt::ALL
            .into_iter()
            .find(|source| active & source.mask() != 0)
    }

    pub fn has_pending(&self) -> bool {
        self.enable & self.flags & SOURCE_BITS != 0
    }

    pub fn read_flags(&self) -> u8 {
        self.flags | IF_UNUSED_BITS
    }

    pub fn write_flags(&mut self, val: u8) {
        self.flags = val & SOURCE_BITS;
    }

    pub fn read_enable(&self) -> u8 {
        self.enable
    }

    /// IE is a full 8-bit register; only the low five bits select sources.
    pub fn write_enable(&mut self, val: u8) {
        self.enable = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_honours_priority_order() {
        let mut ic = InterruptController::new();
        ic.write_enable(0x1F);
        ic.request(Interrupt::Joypad);
        ic.request(Interrupt::Timer);
        assert_eq!(ic.pending(), Some(Interrupt::Timer));

        ic.request(Interrupt::VBlank);
        assert_eq!(ic.pending(), Some(Interrupt::VBlank));

        ic.clear(Interrupt::VBlank);
        ic.clear(Interrupt::Timer);
        assert_eq!(ic.pending(), Some(Interrupt::Joypad));
    }

    #[test]
    fn masked_requests_are_not_pending() {
        let mut ic = InterruptController::new();
        ic.request(Interrupt::Serial);
        assert!(ic.is_requested(Interrupt::Serial));
        assert_eq!(ic.pending(), None);

        ic.write_enable(Interrupt::Serial.mask());
        assert!(ic.mask_enabled(Interrupt::Serial));
        assert_eq!(ic.pending(), Some(Interrupt::Serial));
    }

    #[test]
    fn flag_register_reads_unused_bits_high() {
        let mut ic = InterruptController::new();
        ic.write_flags(0xFF);
        assert_eq!(ic.read_flags(), 0xFF);
        ic.write_flags(0x00);
        assert_eq!(ic.read_flags(), 0xE0);
        ic.write_enable(0xFF);
        assert_eq!(ic.read_enable(), 0xFF);
    }
}
