use log::{debug, warn};
use thiserror::Error;

use crate::{
    apu::{AUDIO_END, AUDIO_START, AudioRegisters, AudioSink},
    cartridge::Cartridge,
    interrupts::InterruptController,
    joypad::{Button, Joypad},
    ppu::{OAM_SIZE, Ppu, Renderer},
    serial::{LinkPort, Serial},
    timer::Timer,
};

const WRAM_SIZE: usize = 0x2000;
const HRAM_SIZE: usize = 0x7F;
const BOOT_ROM_SIZE: usize = 0x100;

/// T-cycles the OAM DMA engine keeps the video buses busy.
const OAM_DMA_CYCLES: u32 = 640;

/// Internal divider value left by the DMG boot ROM when it hands over.
const POST_BOOT_DIV: u16 = 0xABCC;

/// Fatal bus conditions that cartridge software can trigger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusFault {
    #[error("boot ROM disable register (0xFF50) written with {0:#04X}, expected 0x01")]
    InvalidBootRomDisable(u8),

    #[error("boot ROM disable register (0xFF50) written after the boot ROM was unmapped")]
    BootRomAlreadyDisabled,
}

/// The system bus: owns every storage region and routes each access to the
/// component that backs it.
pub struct Mmu {
    pub wram: [u8; WRAM_SIZE],
    pub hram: [u8; HRAM_SIZE],
    pub cart: Cartridge,
    boot_rom: Option<Vec<u8>>,
    boot_mapped: bool,
    boot_disable_written: bool,
    pub interrupts: InterruptController,
    pub timer: Timer,
    pub ppu: Ppu,
    pub joypad: Joypad,
    pub serial: Serial,
    pub audio: AudioRegisters,
    dma_cycles: u32,
    fault: Option<BusFault>,
}

impl Mmu {
    fn with_cart(cart: Cartridge) -> Self {
        Self {
            wram: [0; WRAM_SIZE],
            hram: [0; HRAM_SIZE],
            cart,
            boot_rom: None,
            boot_mapped: false,
            boot_disable_written: false,
            interrupts: InterruptController::new(),
            timer: Timer::new(),
            ppu: Ppu::new(),
            joypad: Joypad::new(),
            serial: Serial::new(),
            audio: AudioRegisters::new(),
            dma_cycles: 0,
            fault: None,
        }
    }

    /// Bus in the state the DMG boot ROM leaves behind, with no boot image
    /// mapped.
    pub fn new(cart: Cartridge) -> Self {
        let mut mmu = Self::with_cart(cart);
        mmu.interrupts.write_flags(0x01);
        mmu.timer.div = POST_BOOT_DIV;
        mmu.ppu.apply_post_boot_state();
        mmu.audio.apply_post_boot_state();
        mmu
    }

    /// Power-on bus with `boot` overlaid on 0x0000-0x00FF until software
    /// writes 0x01 to 0xFF50.
    pub fn with_boot_rom(cart: Cartridge, boot: Vec<u8>) -> Self {
        if boot.len() < BOOT_ROM_SIZE {
            warn!(
                "boot ROM is {} bytes, missing bytes read as 0xFF",
                boot.len()
            );
        }
        let mut mmu = Self::with_cart(cart);
        mmu.boot_rom = Some(boot);
        mmu.boot_mapped = true;
        mmu
    }

    pub fn boot_rom_mapped(&self) -> bool {
        self.boot_mapped
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.ppu.set_renderer(renderer);
    }

    pub fn set_audio_sink(&mut self, sink: Box<dyn AudioSink>) {
        self.audio.set_sink(sink);
    }

    pub fn connect_link(&mut self, port: Box<dyn LinkPort>) {
        self.serial.connect(port);
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.joypad
            .set_pressed(button, pressed, &mut self.interrupts);
    }

    /// Battery-backed external RAM contents for the host to persist.
    pub fn export_ram_bytes(&self) -> Vec<u8> {
        self.cart.ram().to_vec()
    }

    /// Fatal condition raised by the last access, if any.
    pub fn take_fault(&mut self) -> Option<BusFault> {
        self.fault.take()
    }

    fn raise(&mut self, fault: BusFault) {
        warn!("bus fault: {fault}");
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    /// True while an OAM DMA transfer holds the bus.
    pub fn dma_active(&self) -> bool {
        self.dma_cycles > 0
    }

    /// While OAM DMA runs only ROM, work RAM, I/O and HRAM stay reachable.
    fn dma_blocks(&self, addr: u16) -> bool {
        self.dma_active()
            && !matches!(addr, 0x0000..=0x7FFF | 0xC000..=0xFDFF | 0xFF00..=0xFFFF)
    }

    pub fn read(&self, addr: u16) -> u8 {
        if self.dma_blocks(addr) {
            return 0xFF;
        }
        self.read_unlocked(addr)
    }

    fn read_unlocked(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x00FF if self.boot_mapped => self
                .boot_rom
                .as_ref()
                .and_then(|b| b.get(addr as usize).copied())
                .unwrap_or(0xFF),
            0x0000..=0x7FFF => self.cart.read(addr),
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self.cart.read(addr),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupts.read_enable(),
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.interrupts.read_flags(),
            AUDIO_START..=AUDIO_END => self.audio.read(addr),
            0xFF40..=0xFF4B => self.ppu.read_reg(addr),
            0xFF50 => 0xFE | u8::from(!self.boot_mapped),
            _ => {
                debug!("read from unmapped I/O {addr:04X}");
                0xFF
            }
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if self.dma_blocks(addr) {
            debug!("write {val:02X} to {addr:04X} dropped during OAM DMA");
            return;
        }
        match addr {
            0x0000..=0x7FFF => self.cart.write(addr, val),
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => self.cart.write(addr, val),
            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.interrupts.write_enable(val),
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val),
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.interrupts.write_flags(val),
            AUDIO_START..=AUDIO_END => self.audio.write(addr, val),
            0xFF46 => self.start_oam_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_reg(addr, val),
            0xFF50 => self.write_boot_disable(val),
            _ => debug!("write {val:02X} to unmapped I/O {addr:04X}"),
        }
    }

    fn write_boot_disable(&mut self, val: u8) {
        if self.boot_disable_written {
            self.raise(BusFault::BootRomAlreadyDisabled);
        } else if val != 0x01 {
            self.raise(BusFault::InvalidBootRomDisable(val));
        } else {
            self.boot_disable_written = true;
            if self.boot_mapped {
                debug!("boot ROM unmapped");
            }
            self.boot_mapped = false;
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM at once, then hold the
    /// video buses for the duration of the transfer.
    fn start_oam_dma(&mut self, page: u8) {
        self.ppu.write_reg(0xFF46, page);
        let mut src = (page as u16) << 8;
        // Sources above the echo region alias back onto work RAM.
        if src >= 0xFE00 {
            src -= 0x2000;
        }
        debug!("OAM DMA from {src:04X}");

        let mut block = [0u8; OAM_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = self.read_unlocked(src + i as u16);
        }
        self.ppu.load_oam(&block);
        self.dma_cycles = OAM_DMA_CYCLES;
    }

    /// Advance every clocked peripheral by `cycles`. Returns true when the
    /// PPU entered vertical blank.
    pub fn tick(&mut self, cycles: u32) -> bool {
        self.timer.tick(cycles, &mut self.interrupts);
        self.serial.tick(cycles, &mut self.interrupts);
        self.dma_cycles = self.dma_cycles.saturating_sub(cycles);
        self.ppu.step(cycles, &mut self.interrupts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_cart() -> Cartridge {
        Cartridge::from_rom(vec![0; 0x8000]).unwrap()
    }

    #[test]
    fn echo_ram_mirrors_work_ram() {
        let mut mmu = Mmu::new(blank_cart());
        mmu.write(0xC123, 0x42);
        assert_eq!(mmu.read(0xE123), 0x42);
        mmu.write(0xFDFF, 0x24);
        assert_eq!(mmu.read(0xDDFF), 0x24);
    }

    #[test]
    fn post_boot_io_values() {
        let mmu = Mmu::new(blank_cart());
        assert_eq!(mmu.read(0xFF0F), 0xE1);
        assert_eq!(mmu.read(0xFF40), 0x91);
        assert_eq!(mmu.read(0xFF47), 0xFC);
        assert_eq!(mmu.read(0xFF04), 0xAB);
        assert_eq!(mmu.read(0xFF00), 0xFF);
    }

    #[test]
    fn oam_dma_copies_and_locks() {
        let mut mmu = Mmu::new(blank_cart());
        for i in 0..0xA0u16 {
            mmu.write(0xC000 + i, i as u8);
        }
        mmu.write(0xFF46, 0xC0);
        assert_eq!(mmu.read(0xFE10), 0xFF);
        assert_eq!(mmu.read(0xC010), 0x10);
        mmu.tick(OAM_DMA_CYCLES - 4);
        assert!(mmu.dma_active());
        mmu.tick(4);
        assert!(!mmu.dma_active());
        assert_eq!(mmu.read(0xFE10), 0x10);
        assert_eq!(mmu.read(0xFF46), 0xC0);
    }

    #[test]
    fn unmapped_io_reads_high() {
        let mmu = Mmu::new(blank_cart());
        assert_eq!(mmu.read(0xFF03), 0xFF);
        assert_eq!(mmu.read(0xFF7F), 0xFF);
        assert_eq!(mmu.read(0xFEA0), 0xFF);
    }
}
