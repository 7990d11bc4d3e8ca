mod common;

use common::machine_with;
use dotmatrix_core::interrupts::{Interrupt, InterruptController};
use dotmatrix_core::ppu::{Ppu, PpuMode, Renderer, ScanlineContext};
use std::cell::RefCell;
use std::rc::Rc;

fn lit_ppu() -> Ppu {
    let mut ppu = Ppu::new();
    ppu.apply_post_boot_state();
    ppu
}

#[test]
fn frame_visits_three_modes_144_times_then_vblank_once() {
    let mut ppu = lit_ppu();
    let mut ic = InterruptController::new();
    let mut modes = vec![ppu.mode()];
    let mut vblank_requests = 0;
    let mut vblank_line = None;

    for _ in 0..(70224 / 4) {
        ppu.step(4, &mut ic);
        if modes.last() != Some(&ppu.mode()) {
            modes.push(ppu.mode());
        }
        if ic.is_requested(Interrupt::VBlank) {
            vblank_requests += 1;
            vblank_line = Some(ppu.ly());
            ic.clear(Interrupt::VBlank);
        }
    }

    let first_vblank = modes
        .iter()
        .position(|&m| m == PpuMode::VBlank)
        .unwrap();
    let visible = &modes[..first_vblank];
    assert_eq!(visible.len(), 144 * 3);
    for line in visible.chunks(3) {
        assert_eq!(
            line,
            [PpuMode::OamSearch, PpuMode::Transfer, PpuMode::HBlank]
        );
    }
    assert_eq!(modes.last(), Some(&PpuMode::OamSearch));
    assert_eq!(vblank_requests, 1);
    assert_eq!(vblank_line, Some(144));
    assert_eq!(ppu.ly(), 0);
}

#[test]
fn vblank_spans_ten_lines() {
    let mut ppu = lit_ppu();
    let mut ic = InterruptController::new();
    ppu.step(144 * 456, &mut ic);
    assert_eq!(ppu.mode(), PpuMode::VBlank);
    assert_eq!(ppu.ly(), 144);
    ppu.step(9 * 456, &mut ic);
    assert_eq!(ppu.ly(), 153);
    assert_eq!(ppu.mode(), PpuMode::VBlank);
    ppu.step(456, &mut ic);
    assert_eq!(ppu.ly(), 0);
    assert_eq!(ppu.mode(), PpuMode::OamSearch);
}

#[test]
fn stat_register_reports_mode_and_coincidence() {
    let mut ppu = lit_ppu();
    let mut ic = InterruptController::new();
    assert_eq!(ppu.read_reg(0xFF41), 0x86);
    ppu.step(80, &mut ic);
    assert_eq!(ppu.read_reg(0xFF41) & 0x03, 3);
    ppu.write_reg(0xFF45, 1);
    assert_eq!(ppu.read_reg(0xFF41) & 0x04, 0);
    ppu.write_reg(0xFF44, 0x99);
    assert_eq!(ppu.read_reg(0xFF44), 0);
}

#[derive(Default)]
struct Counts {
    tiles: usize,
    sprites: usize,
    lines: usize,
    frames: usize,
    last_obp0: [u8; 4],
}

struct CountingRenderer(Rc<RefCell<Counts>>);

impl Renderer for CountingRenderer {
    fn tile_written(&mut self, _addr: u16, _val: u8) {
        self.0.borrow_mut().tiles += 1;
    }
    fn oam_written(&mut self, _addr: u16, _val: u8) {
        self.0.borrow_mut().sprites += 1;
    }
    fn render_scanline(&mut self, _line: u8, ctx: &ScanlineContext<'_>) {
        let mut c = self.0.borrow_mut();
        c.lines += 1;
        c.last_obp0 = ctx.obp0;
    }
    fn present(&mut self) {
        self.0.borrow_mut().frames += 1;
    }
}

#[test]
fn run_frame_drives_the_renderer() {
    // LD A,0x42; LD (0x8000),A; LD (0xFE00),A; LD A,0xE4; LDH (48),A; JR -2
    let program = [
        0x3E, 0x42, 0xEA, 0x00, 0x80, 0xEA, 0x00, 0xFE, 0x3E, 0xE4, 0xE0, 0x48, 0x18, 0xFE,
    ];
    let counts = Rc::new(RefCell::new(Counts::default()));
    let mut gb = machine_with(&program);
    gb.set_renderer(Box::new(CountingRenderer(counts.clone())));

    let first = gb.run_frame().unwrap();
    assert!((65664..65664 + 24).contains(&first));
    let second = gb.run_frame().unwrap();
    assert!((70224 - 24..70224 + 24).contains(&second));

    let c = counts.borrow();
    assert_eq!(c.tiles, 1);
    assert_eq!(c.sprites, 1);
    assert_eq!(c.lines, 288);
    assert_eq!(c.frames, 2);
    assert_eq!(c.last_obp0, [0, 1, 2, 3]);
    assert_eq!(gb.mmu.ppu.frames(), 2);
}

#[test]
fn run_frame_with_lcd_off_returns_after_a_frame_of_cycles() {
    // LD A,0x00; LDH (40),A; JR -2
    let mut gb = machine_with(&[0x3E, 0x00, 0xE0, 0x40, 0x18, 0xFE]);
    let cycles = gb.run_frame().unwrap();
    assert!(cycles >= 70224);
    assert_eq!(gb.mmu.ppu.frames(), 0);
    assert_eq!(gb.mmu.read(0xFF44), 0);
}
