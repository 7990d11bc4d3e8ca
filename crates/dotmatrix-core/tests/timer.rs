mod common;

use common::machine_with;
use dotmatrix_core::interrupts::{Interrupt, InterruptController};
use dotmatrix_core::timer::Timer;

#[test]
fn div_increment() {
    let mut t = Timer::new();
    let mut ic = InterruptController::new();
    t.tick(256, &mut ic);
    assert_eq!(t.read(0xFF04), 1);
    assert!(!ic.is_requested(Interrupt::Timer));
}

#[test]
fn div_resets_on_write() {
    let mut t = Timer::new();
    t.div = 0xABCD;
    t.write(0xFF04, 0x12);
    assert_eq!(t.read(0xFF04), 0);
    assert_eq!(t.div, 0);
}

#[test]
fn fastest_rate_increments_once_per_16_cycles() {
    let mut t = Timer::new();
    let mut ic = InterruptController::new();
    t.write(0xFF07, 0x05);
    t.tick(16, &mut ic);
    assert_eq!(t.tima, 1);
}

#[test]
fn slowest_rate_does_not_round_up() {
    let mut t = Timer::new();
    let mut ic = InterruptController::new();
    t.write(0xFF07, 0x04);
    t.tick(4095, &mut ic);
    assert_eq!(t.tima, 3);
    t.tick(1, &mut ic);
    assert_eq!(t.tima, 4);
}

#[test]
fn tima_increment_and_overflow() {
    let mut t = Timer::new();
    let mut ic = InterruptController::new();
    t.write(0xFF07, 0x04);
    t.tick(1024, &mut ic);
    assert_eq!(t.tima, 1);
    assert!(!ic.is_requested(Interrupt::Timer));

    t.tima = 0xFF;
    t.tma = 0xAB;
    t.tick(1024, &mut ic);
    assert_eq!(t.tima, 0xAB);
    assert!(ic.is_requested(Interrupt::Timer));
}

#[test]
fn many_overflows_in_one_tick_reload_each_time() {
    let mut t = Timer::new();
    let mut ic = InterruptController::new();
    t.write(0xFF06, 0xFE);
    t.write(0xFF07, 0x05);
    t.tima = 0xFE;
    // 5 increments: FF, FE(reload), FF, FE(reload), FF
    t.tick(16 * 5, &mut ic);
    assert_eq!(t.tima, 0xFF);
    assert!(ic.is_requested(Interrupt::Timer));
}

#[test]
fn tac_reads_upper_bits_set() {
    let mut t = Timer::new();
    t.write(0xFF07, 0xFF);
    assert_eq!(t.read(0xFF07), 0xFF);
    t.write(0xFF07, 0x00);
    assert_eq!(t.read(0xFF07), 0xF8);
}

#[test]
fn timer_interrupt_reaches_cpu() {
    // LD A,0xFF; LDH (05),A; LD A,0x05; LDH (07),A; EI; then JR -2
    let program = [
        0x3E, 0xFF, 0xE0, 0x05, 0x3E, 0x05, 0xE0, 0x07, 0xFB, 0x18, 0xFE,
    ];
    let mut gb = machine_with(&program);
    gb.mmu.interrupts.write_enable(Interrupt::Timer.mask());
    for _ in 0..10 {
        gb.step().unwrap();
        if gb.cpu.pc == 0x0050 {
            break;
        }
    }
    assert_eq!(gb.cpu.pc, 0x0050);
    assert!(!gb.mmu.interrupts.is_requested(Interrupt::Timer));
    // Reloaded from TMA=0, then JR (12) and dispatch (20) add two ticks.
    assert_eq!(gb.mmu.read(0xFF05), 0x02);
}
