use log::debug;

use crate::interrupts::{Interrupt, InterruptController};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const VRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xA0;

// Mode timings (in CPU cycles)
const MODE0_CYCLES: u32 = 204; // HBlank
const MODE1_CYCLES: u32 = 456; // One line during VBlank
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // Pixel transfer

const VBLANK_LINES: u8 = 10;
const LAST_LINE: u8 = SCREEN_HEIGHT as u8 + VBLANK_LINES - 1;

const LCDC_ENABLE: u8 = 0x80;

const STAT_HBLANK_SELECT: u8 = 0x08;
const STAT_VBLANK_SELECT: u8 = 0x10;
const STAT_OAM_SELECT: u8 = 0x20;
const STAT_LYC_SELECT: u8 = 0x40;
const STAT_WRITABLE: u8 = 0x78;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PpuMode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

impl PpuMode {
    fn duration(self) -> u32 {
        match self {
            PpuMode::HBlank => MODE0_CYCLES,
            PpuMode::VBlank => MODE1_CYCLES,
            PpuMode::OamSearch => MODE2_CYCLES,
            PpuMode::Transfer => MODE3_CYCLES,
        }
    }
}

/// Decode a DMG palette register into shade indices for colors 0-3.
pub fn decode_palette(val: u8) -> [u8; 4] {
    [val & 0x03, (val >> 2) & 0x03, (val >> 4) & 0x03, (val >> 6) & 0x03]
}

/// Register snapshot handed to the renderer for one visible line.
pub struct ScanlineContext<'a> {
    pub lcdc: u8,
    pub scy: u8,
    pub scx: u8,
    pub wy: u8,
    pub wx: u8,
    pub bgp: [u8; 4],
    pub obp0: [u8; 4],
    pub obp1: [u8; 4],
    pub vram: &'a [u8; VRAM_SIZE],
    pub oam: &'a [u8; OAM_SIZE],
}

/// Pixel producer fed by the PPU. The core never reads anything back.
pub trait Renderer {
    /// A byte of tile data or tile map changed. `addr` is relative to 0x8000.
    fn tile_written(&mut self, _addr: u16, _val: u8) {}

    /// A sprite attribute byte changed. `addr` is relative to 0xFE00.
    fn oam_written(&mut self, _addr: u16, _val: u8) {}

    fn render_scanline(&mut self, _line: u8, _ctx: &ScanlineContext<'_>) {}

    /// Called once per frame on entry to vertical blank.
    fn present(&mut self) {}
}

/// Renderer that discards everything. Used when running headless.
pub struct NullRenderer;

impl Renderer for NullRenderer {}

pub struct Ppu {
    pub vram: [u8; VRAM_SIZE],
    pub oam: [u8; OAM_SIZE],

    lcdc: u8,
    stat: u8,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    lyc_eq_ly: bool,
    pub dma: u8,
    bgp: u8,
    obp0: u8,
    obp1: u8,
    wy: u8,
    wx: u8,

    mode: PpuMode,
    mode_clock: u32,
    frame_counter: u64,

    renderer: Box<dyn Renderer>,
}

impl Ppu {
    /// Power-on state: display off, every register cleared.
    pub fn new() -> Self {
        Self {
            vram: [0; VRAM_SIZE],
            oam: [0; OAM_SIZE],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            lyc_eq_ly: false,
            dma: 0xFF,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            mode: PpuMode::HBlank,
            mode_clock: 0,
            frame_counter: 0,
            renderer: Box::new(NullRenderer),
        }
    }

    /// Register values left behind by the DMG boot ROM.
    pub fn apply_post_boot_state(&mut self) {
        self.lcdc = 0x91;
        self.stat = 0;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
        self.ly = 0;
        self.mode = PpuMode::OamSearch;
        self.mode_clock = 0;
        self.update_lyc_compare();
    }

    pub fn set_renderer(&mut self, renderer: Box<dyn Renderer>) {
        self.renderer = renderer;
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_ENABLE != 0
    }

    /// Completed frames since power-on.
    pub fn frames(&self) -> u64 {
        self.frame_counter
    }

    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[(addr as usize - 0x8000) & (VRAM_SIZE - 1)]
    }

    pub fn write_vram(&mut self, addr: u16, val: u8) {
        let offset = (addr as usize - 0x8000) & (VRAM_SIZE - 1);
        self.vram[offset] = val;
        self.renderer.tile_written(offset as u16, val);
    }

    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam[addr as usize - 0xFE00]
    }

    pub fn write_oam(&mut self, addr: u16, val: u8) {
        let offset = addr as usize - 0xFE00;
        self.oam[offset] = val;
        self.renderer.oam_written(offset as u16, val);
    }

    /// Bulk copy performed by OAM DMA.
    pub fn load_oam(&mut self, data: &[u8; OAM_SIZE]) {
        self.oam = *data;
        for (i, &val) in data.iter().enumerate() {
            self.renderer.oam_written(i as u16, val);
        }
    }

    fn update_lyc_compare(&mut self) {
        if self.lcd_enabled() {
            self.lyc_eq_ly = self.ly == self.lyc;
        }
    }

    pub fn read_reg(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                (self.stat & STAT_WRITABLE)
                    | 0x80
                    | if self.lyc_eq_ly { 0x04 } else { 0 }
                    | self.mode as u8
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write_reg(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => {
                let was_on = self.lcd_enabled();
                self.lcdc = val;
                if was_on && !self.lcd_enabled() {
                    debug!("LCD off at frame {}", self.frame_counter);
                    self.mode = PpuMode::HBlank;
                    self.mode_clock = 0;
                    self.ly = 0;
                } else if !was_on && self.lcd_enabled() {
                    debug!("LCD on");
                    self.mode = PpuMode::OamSearch;
                    self.mode_clock = 0;
                    self.update_lyc_compare();
                }
            }
            0xFF41 => self.stat = val & STAT_WRITABLE,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => {
                self.lyc = val;
                self.update_lyc_compare();
            }
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }

    /// Advance the mode state machine by `cycles`. Returns true when the
    /// display entered vertical blank during this call.
    pub fn step(&mut self, cycles: u32, interrupts: &mut InterruptController) -> bool {
        if !self.lcd_enabled() {
            return false;
        }

        let mut remaining = cycles;
        let mut entered_vblank = false;
        while remaining > 0 {
            let slice = remaining.min(self.mode.duration() - self.mode_clock);
            self.mode_clock += slice;
            remaining -= slice;
            if self.mode_clock == self.mode.duration() {
                self.mode_clock = 0;
                entered_vblank |= self.advance(interrupts);
            }
        }
        entered_vblank
    }

    fn advance(&mut self, interrupts: &mut InterruptController) -> bool {
        match self.mode {
            PpuMode::OamSearch => {
                self.mode = PpuMode::Transfer;
            }
            PpuMode::Transfer => {
                self.render_scanline();
                self.enter(PpuMode::HBlank, interrupts);
            }
            PpuMode::HBlank => {
                self.next_line(self.ly + 1, interrupts);
                if self.ly as usize == SCREEN_HEIGHT {
                    interrupts.request(Interrupt::VBlank);
                    self.renderer.present();
                    self.frame_counter = self.frame_counter.wrapping_add(1);
                    self.enter(PpuMode::VBlank, interrupts);
                    return true;
                }
                self.enter(PpuMode::OamSearch, interrupts);
            }
            PpuMode::VBlank => {
                if self.ly == LAST_LINE {
                    self.next_line(0, interrupts);
                    self.enter(PpuMode::OamSearch, interrupts);
                } else {
                    self.next_line(self.ly + 1, interrupts);
                }
            }
        }
        false
    }

    fn next_line(&mut self, line: u8, interrupts: &mut InterruptController) {
        self.ly = line;
        self.update_lyc_compare();
        if self.lyc_eq_ly && self.stat & STAT_LYC_SELECT != 0 {
            interrupts.request(Interrupt::LcdStat);
        }
    }

    fn enter(&mut self, mode: PpuMode, interrupts: &mut InterruptController) {
        self.mode = mode;
        let select = match mode {
            PpuMode::HBlank => STAT_HBLANK_SELECT,
            PpuMode::VBlank => STAT_VBLANK_SELECT,
            PpuMode::OamSearch => STAT_OAM_SELECT,
            PpuMode::Transfer => 0,
        };
        if self.stat & select != 0 {
            interrupts.request(Interrupt::LcdStat);
        }
    }

    fn render_scanline(&mut self) {
        let ctx = ScanlineContext {
            lcdc: self.lcdc,
            scy: self.scy,
            scx: self.scx,
            wy: self.wy,
            wx: self.wx,
            bgp: decode_palette(self.bgp),
            obp0: decode_palette(self.obp0),
            obp1: decode_palette(self.obp1),
            vram: &self.vram,
            oam: &self.oam,
        };
        self.renderer.render_scanline(self.ly, &ctx);
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        lines: Vec<u8>,
        presents: u32,
        tiles: Vec<(u16, u8)>,
        last_bgp: [u8; 4],
    }

    struct Recorder(Rc<RefCell<Log>>);

    impl Renderer for Recorder {
        fn tile_written(&mut self, addr: u16, val: u8) {
            self.0.borrow_mut().tiles.push((addr, val));
        }
        fn render_scanline(&mut self, line: u8, ctx: &ScanlineContext<'_>) {
            let mut log = self.0.borrow_mut();
            log.lines.push(line);
            log.last_bgp = ctx.bgp;
        }
        fn present(&mut self) {
            self.0.borrow_mut().presents += 1;
        }
    }

    fn powered_ppu() -> Ppu {
        let mut ppu = Ppu::new();
        ppu.apply_post_boot_state();
        ppu
    }

    #[test]
    fn palette_decodes_two_bits_per_color() {
        assert_eq!(decode_palette(0xFC), [0, 3, 3, 3]);
        assert_eq!(decode_palette(0xE4), [0, 1, 2, 3]);
    }

    #[test]
    fn line_walks_through_three_modes() {
        let mut ppu = powered_ppu();
        let mut ic = InterruptController::new();
        assert_eq!(ppu.mode(), PpuMode::OamSearch);
        ppu.step(80, &mut ic);
        assert_eq!(ppu.mode(), PpuMode::Transfer);
        ppu.step(172, &mut ic);
        assert_eq!(ppu.mode(), PpuMode::HBlank);
        ppu.step(203, &mut ic);
        assert_eq!(ppu.ly(), 0);
        ppu.step(1, &mut ic);
        assert_eq!(ppu.ly(), 1);
        assert_eq!(ppu.mode(), PpuMode::OamSearch);
    }

    #[test]
    fn renderer_sees_every_visible_line_and_one_present() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut ppu = powered_ppu();
        ppu.set_renderer(Box::new(Recorder(log.clone())));
        let mut ic = InterruptController::new();
        ppu.write_vram(0x8010, 0x7E);
        ppu.step(456 * 154, &mut ic);

        let log = log.borrow();
        assert_eq!(log.lines, (0..144).collect::<Vec<u8>>());
        assert_eq!(log.presents, 1);
        assert_eq!(log.tiles, vec![(0x0010, 0x7E)]);
        assert_eq!(log.last_bgp, [0, 3, 3, 3]);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.frames(), 1);
    }

    #[test]
    fn lyc_match_requests_stat_when_selected() {
        let mut ppu = powered_ppu();
        let mut ic = InterruptController::new();
        ppu.write_reg(0xFF45, 3);
        ppu.step(456 * 3, &mut ic);
        assert!(!ic.is_requested(Interrupt::LcdStat));
        assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0x04);

        ppu.write_reg(0xFF41, STAT_LYC_SELECT);
        ppu.write_reg(0xFF45, 4);
        ppu.step(456, &mut ic);
        assert!(ic.is_requested(Interrupt::LcdStat));
    }

    #[test]
    fn hblank_select_requests_stat_on_entry() {
        let mut ppu = powered_ppu();
        let mut ic = InterruptController::new();
        ppu.write_reg(0xFF41, STAT_HBLANK_SELECT);
        ppu.step(251, &mut ic);
        assert!(!ic.is_requested(Interrupt::LcdStat));
        ppu.step(1, &mut ic);
        assert!(ic.is_requested(Interrupt::LcdStat));
    }

    #[test]
    fn lcd_off_parks_at_line_zero() {
        let mut ppu = powered_ppu();
        let mut ic = InterruptController::new();
        ppu.step(456 * 10 + 100, &mut ic);
        assert_eq!(ppu.ly(), 10);
        ppu.write_reg(0xFF40, 0x11);
        assert_eq!(ppu.ly(), 0);
        assert_eq!(ppu.read_reg(0xFF41) & 0x03, 0);
        assert!(!ppu.step(456 * 200, &mut ic));
        assert_eq!(ppu.ly(), 0);
    }
}
