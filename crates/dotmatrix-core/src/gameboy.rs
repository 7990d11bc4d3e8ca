use crate::{
    apu::AudioSink,
    cartridge::Cartridge,
    cpu::{Cpu, CpuError},
    joypad::Button,
    mmu::Mmu,
    ppu::Renderer,
    serial::LinkPort,
};

/// T-cycles in one full frame: 154 lines of 456.
pub const FRAME_CYCLES: u32 = 70224;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
}

impl GameBoy {
    /// A machine in the post-boot state, starting at 0x0100.
    pub fn new(cart: Cartridge) -> Self {
        Self {
            cpu: Cpu::new(),
            mmu: Mmu::new(cart),
        }
    }

    /// A machine at power-on that runs `boot` from 0x0000.
    pub fn with_boot_rom(cart: Cartridge, boot: Vec<u8>) -> Self {
        Self {
            cpu: Cpu::power_on(),
            mmu: Mmu::with_boot_rom(cart, boot),
        }
    }

    pub fn step(&mut self) -> Result<u32, CpuError> {
        self.cpu.step(&mut self.mmu)
    }

    /// Run until the PPU finishes a frame. With the display off a frame's
    /// worth of cycles is run instead. Returns the T-cycles consumed.
    pub fn run_frame(&mut self) -> Result<u32, CpuError> {
        let start = self.mmu.ppu.frames();
        let mut cycles = 0;
        while self.mmu.ppu.frames() == start {
            cycles += self.step()?;
            if !self.mmu.ppu.lcd_enabled() && cycles >= FRAME_CYCLES {
                break;
            }
        }
        Ok(cycles)
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.mmu.cart
    }

    /// External RAM for the host to persist when the cartridge has a battery.
    pub fn export_ram_bytes(&self) -> Vec<u8> {
        self.mmu.export_ram_bytes()
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.mmu.set_renderer(renderer);
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.mmu.set_audio_sink(sink);
    }

    pub fn connect_link(&mut self, port: Box<dyn LinkPort>) {
        self.mmu.connect_link(port);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.mmu.set_button(button, pressed);
    }

    /// Bytes shifted out of the serial port since the last call.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.mmu.serial.take_output()
    }
}
