use log::{trace, warn};
use thiserror::Error;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

const HEADER_END: usize = 0x0150;
const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const CART_TYPE_ADDR: usize = 0x0147;
const ROM_SIZE_ADDR: usize = 0x0148;
const RAM_SIZE_ADDR: usize = 0x0149;

/// MBC2 carries 512 half-byte cells on the controller itself.
const MBC2_RAM_SIZE: usize = 0x200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("ROM image is {0} bytes, too small to contain a cartridge header")]
    TooSmall(usize),

    #[error("unsupported cartridge controller type {0:#04X} at header offset 0x0147")]
    UnsupportedController(u8),

    #[error("invalid ROM size code {0:#04X} at header offset 0x0148")]
    InvalidRomSize(u8),

    #[error("invalid RAM size code {0:#04X} at header offset 0x0149")]
    InvalidRamSize(u8),

    #[error("ROM image is {actual} bytes but the header declares {declared}")]
    Truncated { declared: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
}

/// Fields decoded from the fixed header range 0x0134-0x014F.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cart_type: u8,
    pub mbc: MbcType,
    pub rom_banks: usize,
    pub ram_size: usize,
    pub battery: bool,
    pub rtc: bool,
}

impl CartridgeHeader {
    pub fn parse(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::TooSmall(data.len()));
        }

        let cart_type = data[CART_TYPE_ADDR];
        let (mbc, battery, rtc) = match cart_type {
            0x00 | 0x08 => (MbcType::NoMbc, false, false),
            0x09 => (MbcType::NoMbc, true, false),
            0x01 | 0x02 => (MbcType::Mbc1, false, false),
            0x03 => (MbcType::Mbc1, true, false),
            0x05 => (MbcType::Mbc2, false, false),
            0x06 => (MbcType::Mbc2, true, false),
            0x0F | 0x10 => (MbcType::Mbc3, true, true),
            0x11 | 0x12 => (MbcType::Mbc3, false, false),
            0x13 => (MbcType::Mbc3, true, false),
            other => return Err(CartridgeError::UnsupportedController(other)),
        };

        let rom_code = data[ROM_SIZE_ADDR];
        if rom_code > 0x08 {
            return Err(CartridgeError::InvalidRomSize(rom_code));
        }
        let rom_banks = 2usize << rom_code;

        let ram_size = if mbc == MbcType::Mbc2 {
            MBC2_RAM_SIZE
        } else {
            match data[RAM_SIZE_ADDR] {
                0x00 => 0,
                0x01 => 0x800,
                0x02 => 0x2000,
                0x03 => 0x8000,
                0x04 => 0x20000,
                0x05 => 0x10000,
                other => return Err(CartridgeError::InvalidRamSize(other)),
            }
        };

        let mut title = &data[TITLE_START..TITLE_END];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }

        Ok(Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cart_type,
            mbc,
            rom_banks,
            ram_size,
            battery,
            rtc,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RtcPlaceholder {
    regs: [u8; 5],
    latched: [u8; 5],
}

impl RtcPlaceholder {
    fn read(&self, reg: u8) -> u8 {
        self.latched[(reg - 0x08) as usize]
    }

    fn write(&mut self, reg: u8, val: u8) {
        self.regs[(reg - 0x08) as usize] = val;
        self.latched = self.regs;
    }

    fn latch(&mut self) {
        self.latched = self.regs;
    }
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        ram_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
        rtc: RtcPlaceholder,
        latch_pending: bool,
    },
}

#[derive(Debug)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    header: CartridgeHeader,
    mbc_state: MbcState,
}

impl Cartridge {
    /// Build a cartridge from a raw ROM image, validating the header.
    pub fn from_rom(data: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = CartridgeHeader::parse(&data)?;
        let declared = header.rom_banks * ROM_BANK_SIZE;
        if data.len() < declared {
            return Err(CartridgeError::Truncated {
                declared,
                actual: data.len(),
            });
        }

        let mbc_state = match header.mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcType::Mbc2 => MbcState::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
                rtc: RtcPlaceholder::default(),
                latch_pending: false,
            },
        };

        Ok(Self {
            ram: vec![0; header.ram_size],
            rom: data,
            header,
            mbc_state,
        })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn mbc(&self) -> MbcType {
        self.header.mbc
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn has_battery(&self) -> bool {
        self.header.battery
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Restore persisted external RAM. Extra bytes are ignored and a short
    /// image leaves the remainder untouched.
    pub fn load_ram(&mut self, bytes: &[u8]) {
        for (d, s) in self.ram.iter_mut().zip(bytes.iter()) {
            *d = *s;
        }
        if bytes.len() != self.ram.len() {
            warn!(
                "save RAM is {} bytes, cartridge expects {}",
                bytes.len(),
                self.ram.len()
            );
        }
    }

    /// Index of the bank currently mapped at 0x4000-0x7FFF.
    pub fn rom_bank(&self) -> usize {
        let bank = match &self.mbc_state {
            MbcState::NoMbc => 1,
            MbcState::Mbc1 {
                rom_bank, ram_bank, ..
            } => ((*ram_bank as usize) << 5) | *rom_bank as usize,
            MbcState::Mbc2 { rom_bank, .. } | MbcState::Mbc3 { rom_bank, .. } => {
                *rom_bank as usize
            }
        };
        bank % self.header.rom_banks
    }

    fn low_rom_bank(&self) -> usize {
        match &self.mbc_state {
            MbcState::Mbc1 {
                ram_bank, mode: 1, ..
            } => ((*ram_bank as usize) << 5) % self.header.rom_banks,
            _ => 0,
        }
    }

    fn ram_enabled(&self) -> bool {
        match &self.mbc_state {
            MbcState::NoMbc => true,
            MbcState::Mbc1 { ram_enable, .. }
            | MbcState::Mbc2 { ram_enable, .. }
            | MbcState::Mbc3 { ram_enable, .. } => *ram_enable,
        }
    }

    fn ram_index(&self, addr: u16) -> usize {
        let offset = addr as usize - 0xA000;
        let bank_count = self.ram.len().div_ceil(RAM_BANK_SIZE).max(1);
        match &self.mbc_state {
            MbcState::NoMbc => offset,
            MbcState::Mbc2 { .. } => offset & (MBC2_RAM_SIZE - 1),
            MbcState::Mbc1 { ram_bank, mode, .. } => {
                let bank = if *mode == 0 { 0 } else { *ram_bank as usize };
                (bank % bank_count) * RAM_BANK_SIZE + offset
            }
            MbcState::Mbc3 { ram_bank, .. } => {
                ((*ram_bank as usize & 0x03) % bank_count) * RAM_BANK_SIZE + offset
            }
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3FFF => {
                let offset = self.low_rom_bank() * ROM_BANK_SIZE + addr as usize;
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0x4000..=0x7FFF => {
                let offset = self.rom_bank() * ROM_BANK_SIZE + (addr as usize - 0x4000);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled() {
            return 0x00;
        }
        match &self.mbc_state {
            MbcState::Mbc2 { .. } => {
                let idx = self.ram_index(addr);
                0xF0 | (self.ram[idx] & 0x0F)
            }
            MbcState::Mbc3 { ram_bank, rtc, .. } if (0x08..=0x0C).contains(ram_bank) => {
                rtc.read(*ram_bank)
            }
            MbcState::Mbc3 { ram_bank, .. } if *ram_bank > 0x03 => 0x00,
            _ => {
                let idx = self.ram_index(addr);
                self.ram.get(idx).copied().unwrap_or(0x00)
            }
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match (&mut self.mbc_state, addr) {
            (MbcState::NoMbc, 0x0000..=0x7FFF) => {
                warn!("ignored write {val:02X} to ROM at {addr:04X}");
            }
            (MbcState::Mbc1 { ram_enable, .. }, 0x0000..=0x1FFF)
            | (MbcState::Mbc3 { ram_enable, .. }, 0x0000..=0x1FFF) => {
                *ram_enable = val & 0x0F == 0x0A;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x1F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
                trace!("MBC1 ROM bank low bits -> {:02X}", *rom_bank);
            }
            (MbcState::Mbc1 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
                trace!("MBC1 secondary bank register -> {:02X}", *ram_bank);
            }
            (MbcState::Mbc1 { mode, .. }, 0x6000..=0x7FFF) => {
                *mode = val & 0x01;
            }
            (
                MbcState::Mbc2 {
                    rom_bank,
                    ram_enable,
                },
                0x0000..=0x3FFF,
            ) => {
                // Address bit 8 selects between RAM enable and ROM bank select.
                if addr & 0x0100 == 0 {
                    *ram_enable = val & 0x0F == 0x0A;
                } else {
                    *rom_bank = val & 0x0F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                    trace!("MBC2 ROM bank -> {:02X}", *rom_bank);
                }
            }
            (MbcState::Mbc2 { .. }, 0x4000..=0x7FFF) => {
                warn!("ignored write {val:02X} to MBC2 ROM at {addr:04X}");
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = val & 0x7F;
                if *rom_bank == 0 {
                    *rom_bank = 1;
                }
                trace!("MBC3 ROM bank -> {:02X}", *rom_bank);
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            (
                MbcState::Mbc3 {
                    latch_pending, rtc, ..
                },
                0x6000..=0x7FFF,
            ) => {
                if val == 0 {
                    *latch_pending = true;
                } else {
                    if val == 1 && *latch_pending {
                        rtc.latch();
                    }
                    *latch_pending = false;
                }
            }
            (_, 0xA000..=0xBFFF) => self.write_ram(addr, val),
            _ => {}
        }
    }

    fn write_ram(&mut self, addr: u16, val: u8) {
        if !self.ram_enabled() {
            warn!("dropped write {val:02X} to disabled cartridge RAM at {addr:04X}");
            return;
        }
        let idx = self.ram_index(addr);
        match &mut self.mbc_state {
            MbcState::Mbc2 { .. } => self.ram[idx] = val & 0x0F,
            MbcState::Mbc3 { ram_bank, rtc, .. } if (0x08..=0x0C).contains(ram_bank) => {
                rtc.write(*ram_bank, val);
            }
            MbcState::Mbc3 { ram_bank, .. } if *ram_bank > 0x03 => {}
            _ => {
                if let Some(b) = self.ram.get_mut(idx) {
                    *b = val;
                }
            }
        }
    }
}
