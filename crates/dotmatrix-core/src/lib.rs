//! Cycle-counted Game Boy (DMG) emulation core.
//!
//! This crate holds the platform-agnostic machine: CPU, bus and cartridge
//! controllers, interrupts, timer and the PPU mode state machine. Pixel
//! output and audio synthesis are supplied by the host through the
//! [`ppu::Renderer`] and [`apu::AudioSink`] traits, and the whole machine is
//! driven through the [`gameboy`] facade.

/// Flag arithmetic for the ALU and CB operations.
pub mod alu;

/// Audio register window and the audio sink interface.
pub mod apu;

/// Cartridge header parsing and memory bank controllers.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// High-level facade that wires the CPU and MMU into a single machine.
pub mod gameboy;

/// Opcode decoding, disassembly and cycle tables.
pub mod instruction;

/// Interrupt enable and request registers.
pub mod interrupts;

/// Joypad input register.
pub mod joypad;

/// Memory map and hardware plumbing.
pub mod mmu;

/// PPU mode timing and the renderer interface.
pub mod ppu;

/// Serial unit and link cable plumbing.
pub mod serial;

/// Divider/timer unit.
pub mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use cpu::CpuError;
pub use gameboy::GameBoy;
pub use mmu::BusFault;
