#![allow(dead_code)]

use dotmatrix_core::{Cartridge, GameBoy};
use once_cell::sync::Lazy;

pub const ROM_BANK_SIZE: usize = 0x4000;

/// 64-bank MBC1 image where byte 0x0000 of every bank holds the bank number.
pub static BANKED_MBC1: Lazy<Vec<u8>> = Lazy::new(|| {
    RomBuilder::new()
        .cart_type(0x03)
        .rom_size_code(0x05)
        .ram_size_code(0x03)
        .mark_banks()
        .build()
});

/// Hand-assembled cartridge image with a valid header.
pub struct RomBuilder {
    cart_type: u8,
    rom_code: u8,
    ram_code: u8,
    program: Vec<u8>,
    mark_banks: bool,
}

impl RomBuilder {
    pub fn new() -> Self {
        Self {
            cart_type: 0x00,
            rom_code: 0x00,
            ram_code: 0x00,
            program: Vec::new(),
            mark_banks: false,
        }
    }

    pub fn cart_type(mut self, val: u8) -> Self {
        self.cart_type = val;
        self
    }

    pub fn rom_size_code(mut self, val: u8) -> Self {
        self.rom_code = val;
        self
    }

    pub fn ram_size_code(mut self, val: u8) -> Self {
        self.ram_code = val;
        self
    }

    /// Machine code placed at the 0x0100 entry point.
    pub fn program(mut self, code: &[u8]) -> Self {
        self.program = code.to_vec();
        self
    }

    pub fn mark_banks(mut self) -> Self {
        self.mark_banks = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let banks = 2usize << self.rom_code;
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        if self.mark_banks {
            for bank in 0..banks {
                rom[bank * ROM_BANK_SIZE] = bank as u8;
            }
        }
        rom[0x0134..0x0134 + 4].copy_from_slice(b"TEST");
        rom[0x0147] = self.cart_type;
        rom[0x0148] = self.rom_code;
        rom[0x0149] = self.ram_code;
        rom[0x0100..0x0100 + self.program.len()].copy_from_slice(&self.program);
        rom
    }

    pub fn cartridge(self) -> Cartridge {
        Cartridge::from_rom(self.build()).unwrap()
    }
}

/// Post-boot machine running `program` from 0x0100.
pub fn machine_with(program: &[u8]) -> GameBoy {
    GameBoy::new(RomBuilder::new().program(program).cartridge())
}
