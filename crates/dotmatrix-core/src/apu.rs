//! Audio register window (0xFF10-0xFF3F).
//!
//! The core stores register bytes so software reads back what it wrote and
//! forwards every write to an [`AudioSink`]. Waveform synthesis belongs to
//! the sink.

use log::debug;

pub const AUDIO_START: u16 = 0xFF10;
pub const AUDIO_END: u16 = 0xFF3F;
const NR52: u16 = 0xFF26;
const WAVE_RAM_START: u16 = 0xFF30;

const POWER_BIT: u8 = 0x80;

pub trait AudioSink {
    /// A byte written to the audio window, passed through unchanged.
    fn register_written(&mut self, addr: u16, val: u8);
}

/// Sink that drops everything.
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn register_written(&mut self, _addr: u16, _val: u8) {}
}

pub struct AudioRegisters {
    regs: [u8; (AUDIO_END - AUDIO_START + 1) as usize],
    sink: Box<dyn AudioSink>,
}

impl AudioRegisters {
    pub fn new() -> Self {
        Self {
            regs: [0; (AUDIO_END - AUDIO_START + 1) as usize],
            sink: Box::new(NullAudioSink),
        }
    }

    /// Register contents after the DMG boot ROM has played its chime.
    pub fn apply_post_boot_state(&mut self) {
        const POST_BOOT: [(u16, u8); 19] = [
            (0xFF10, 0x80),
            (0xFF11, 0xBF),
            (0xFF12, 0xF3),
            (0xFF13, 0xFF),
            (0xFF14, 0xBF),
            (0xFF16, 0x3F),
            (0xFF18, 0xFF),
            (0xFF19, 0xBF),
            (0xFF1A, 0x7F),
            (0xFF1B, 0xFF),
            (0xFF1C, 0x9F),
            (0xFF1D, 0xFF),
            (0xFF1E, 0xBF),
            (0xFF20, 0xFF),
            (0xFF21, 0x00),
            (0xFF22, 0x00),
            (0xFF23, 0xBF),
            (0xFF24, 0x77),
            (0xFF25, 0xF3),
        ];
        self.regs[Self::index(NR52)] = 0xF1;
        for (addr, val) in POST_BOOT {
            self.regs[Self::index(addr)] = val;
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.sink = sink;
    }

    fn index(addr: u16) -> usize {
        (addr - AUDIO_START) as usize
    }

    fn powered(&self) -> bool {
        self.regs[Self::index(NR52)] & POWER_BIT != 0
    }

    /// Bits that always read back as 1 for each register.
    fn read_mask(addr: u16) -> u8 {
        match addr {
            0xFF10 => 0x80,
            0xFF11 | 0xFF16 => 0x3F,
            0xFF13 | 0xFF18 | 0xFF1B | 0xFF1D | 0xFF20 => 0xFF,
            0xFF14 | 0xFF19 | 0xFF1E | 0xFF23 => 0xBF,
            0xFF1A => 0x7F,
            0xFF1C => 0x9F,
            0xFF26 => 0x70,
            0xFF15 | 0xFF1F | 0xFF27..=0xFF2F => 0xFF,
            _ => 0x00,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.regs[Self::index(addr)] | Self::read_mask(addr)
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.sink.register_written(addr, val);

        if addr >= WAVE_RAM_START {
            self.regs[Self::index(addr)] = val;
            return;
        }
        if addr == NR52 {
            let was_on = self.powered();
            let idx = Self::index(NR52);
            self.regs[idx] = (self.regs[idx] & !POWER_BIT) | (val & POWER_BIT);
            if was_on && val & POWER_BIT == 0 {
                debug!("APU powered off");
                self.regs[..idx].fill(0);
                self.regs[idx] = 0;
            }
            return;
        }
        // Register writes are dropped while the APU is off.
        if self.powered() {
            self.regs[Self::index(addr)] = val;
        }
    }
}

impl Default for AudioRegisters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Capture(Rc<RefCell<Vec<(u16, u8)>>>);

    impl AudioSink for Capture {
        fn register_written(&mut self, addr: u16, val: u8) {
            self.0.borrow_mut().push((addr, val));
        }
    }

    #[test]
    fn writes_are_forwarded_verbatim() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut apu = AudioRegisters::new();
        apu.set_sink(Box::new(Capture(seen.clone())));
        apu.write(0xFF26, 0x80);
        apu.write(0xFF12, 0xF3);
        apu.write(0xFF30, 0x12);
        assert_eq!(
            *seen.borrow(),
            vec![(0xFF26, 0x80), (0xFF12, 0xF3), (0xFF30, 0x12)]
        );
        assert_eq!(apu.read(0xFF12), 0xF3);
        assert_eq!(apu.read(0xFF30), 0x12);
    }

    #[test]
    fn unused_bits_read_high() {
        let mut apu = AudioRegisters::new();
        apu.write(0xFF26, 0x80);
        apu.write(0xFF11, 0x80);
        assert_eq!(apu.read(0xFF11), 0xBF);
        assert_eq!(apu.read(0xFF15), 0xFF);
        assert_eq!(apu.read(0xFF26), 0xF0);
    }

    #[test]
    fn power_off_clears_registers_but_not_wave_ram() {
        let mut apu = AudioRegisters::new();
        apu.apply_post_boot_state();
        apu.write(0xFF30, 0xAB);
        apu.write(0xFF26, 0x00);
        assert_eq!(apu.read(0xFF12), 0x00);
        assert_eq!(apu.read(0xFF30), 0xAB);
        apu.write(0xFF12, 0xF0);
        assert_eq!(apu.read(0xFF12), 0x00);
    }
}
