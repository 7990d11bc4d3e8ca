mod config;
mod save;

use clap::Parser;
use dotmatrix_core::{Cartridge, CartridgeError, CpuError, GameBoy};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

use crate::config::RunConfig;
use crate::save::SaveError;

#[derive(Parser)]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Boot ROM to run from 0x0000 instead of starting in the post-boot state
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Number of frames to run before exiting
    #[arg(long)]
    frames: Option<usize>,

    /// Battery save file (defaults to the ROM path with a .sav extension)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Print bytes sent over the serial port
    #[arg(long)]
    serial: bool,

    /// TOML file supplying defaults for the options above
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum RunError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to load ROM: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("emulation stopped after {frames} frames: {source}")]
    Cpu { frames: usize, source: CpuError },
    #[error(transparent)]
    Save(#[from] SaveError),
}

fn read_file(path: &Path) -> Result<Vec<u8>, RunError> {
    std::fs::read(path).map_err(|source| RunError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn print_serial(bytes: &[u8]) {
    print!("[SERIAL] ");
    for b in bytes {
        if b.is_ascii_graphic() || *b == b' ' {
            print!("{}", *b as char);
        } else {
            print!("\\x{b:02X}");
        }
    }
    println!();
}

/// Empty the serial capture buffer, echoing it when asked. Returns the
/// number of bytes drained.
fn drain_serial(gb: &mut GameBoy, echo: bool) -> usize {
    let out = gb.take_serial_output();
    if echo && !out.is_empty() {
        print_serial(&out);
    }
    out.len()
}

fn run(args: Args) -> Result<(), RunError> {
    let cfg = match &args.config {
        Some(path) => config::load_from_file(path),
        None => RunConfig::default(),
    };
    let bootrom = args.bootrom.or(cfg.bootrom.clone());
    let frames = args.frames.unwrap_or(cfg.frames_or_default());
    let serial = args.serial || cfg.serial;
    let save_path = save::save_path(&args.rom, args.save.as_deref(), cfg.save_dir.as_deref());

    let mut cart = Cartridge::from_rom(read_file(&args.rom)?)?;
    info!(
        "Loaded {} ({:?}, {} ROM banks, {} bytes RAM)",
        cart.title(),
        cart.mbc(),
        cart.header().rom_banks,
        cart.ram().len()
    );
    if cart.has_battery()
        && let Some(data) = save::load(&save_path)?
    {
        cart.load_ram(&data);
    }

    let mut gb = match bootrom {
        Some(path) => {
            let boot = read_file(&path)?;
            info!("Running boot ROM {}", path.display());
            GameBoy::with_boot_rom(cart, boot)
        }
        None => GameBoy::new(cart),
    };

    let mut result = Ok(());
    let mut cycles = 0u64;
    for frame in 0..frames {
        match gb.run_frame() {
            Ok(c) => cycles += u64::from(c),
            Err(source) => {
                result = Err(RunError::Cpu {
                    frames: frame,
                    source,
                });
                break;
            }
        }
        drain_serial(&mut gb, serial);
    }
    info!("Ran {cycles} cycles");

    // Battery RAM is written back even when the run stopped on an error.
    if gb.cartridge().has_battery() {
        save::store(&save_path, &gb.export_ram_bytes())?;
    }
    result
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
