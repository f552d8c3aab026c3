mod battery;
mod config;
mod screenshot;

use clap::Parser;
use config::RunConfig;
use log::{error, info, warn};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tickboy_core::{GameBoy, cartridge::Cartridge};

#[derive(Parser)]
#[command(name = "tickboy", about = "Run a DMG ROM headless for a number of frames")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long)]
    frames: Option<u32>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Path to boot ROM file
    #[arg(long)]
    bootrom: Option<PathBuf>,

    /// Path to a TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// `RUST_LOG` wins, then `--verbose`, then the config file's filter.
fn init_logging(verbose: bool, config_filter: Option<&str>) {
    let fallback = if verbose {
        "debug"
    } else {
        config_filter.unwrap_or("info")
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(fallback)).init();
}

/// Command-line values override the file.
fn merge(args: &Args, mut config: RunConfig) -> RunConfig {
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    if let Some(path) = &args.screenshot {
        config.screenshot = Some(path.clone());
    }
    config
}

fn build_machine(args: &Args, cart: Cartridge) -> GameBoy {
    let Some(path) = &args.bootrom else {
        return GameBoy::new(cart);
    };
    match std::fs::read(path) {
        Ok(data) => GameBoy::with_boot_rom(cart, data),
        Err(e) => {
            warn!("Failed to load boot ROM {}: {e}; starting after boot", path.display());
            GameBoy::new(cart)
        }
    }
}

fn run(args: &Args, config: &RunConfig) -> Result<(), Box<dyn Error>> {
    let rom = std::fs::read(&args.rom)
        .map_err(|e| format!("Failed to read ROM {}: {e}", args.rom.display()))?;
    let mut cart = Cartridge::from_bytes(&rom)?;

    let save_path = battery::save_path(&args.rom);
    if config.save_ram {
        battery::load(&mut cart, &save_path)?;
    }

    let mut gb = build_machine(args, cart);
    info!("Running {} frames of {}", config.frames, args.rom.display());

    let result = (0..config.frames).try_for_each(|_| gb.step_frame());
    // Keep whatever the game saved even if the CPU faulted.
    if config.save_ram {
        battery::store(&gb.mmu.cart, &save_path)?;
    }
    result?;
    info!(
        "Stopped after {} ticks, {} frames",
        gb.ticks(),
        gb.ppu.frames()
    );

    if let Some(path) = &config.screenshot {
        screenshot::save_png(path, gb.framebuffer())?;
        info!("Saved screenshot to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (file_config, config_error) = match &args.config {
        Some(path) => match config::load_from_file(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (RunConfig::default(), Some((path.clone(), e))),
        },
        None => (RunConfig::default(), None),
    };
    init_logging(args.verbose, file_config.log_filter.as_deref());
    if let Some((path, e)) = config_error {
        warn!("Failed to parse config {}: {e}; using defaults", path.display());
    }

    let config = merge(&args, file_config);
    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn command_line_overrides_file() {
        let args = Args::parse_from(["tickboy", "game.gb", "--frames", "5"]);
        let file = RunConfig {
            frames: 100,
            screenshot: Some(PathBuf::from("file.png")),
            ..RunConfig::default()
        };
        let merged = merge(&args, file);
        assert_eq!(merged.frames, 5);
        assert_eq!(merged.screenshot, Some(PathBuf::from("file.png")));
    }

    #[test]
    fn file_values_used_when_flags_absent() {
        let args = Args::parse_from(["tickboy", "game.gb", "--screenshot", "cli.png"]);
        let merged = merge(&args, RunConfig::default());
        assert_eq!(merged.frames, 60);
        assert_eq!(merged.screenshot, Some(PathBuf::from("cli.png")));
    }

    #[test]
    fn runs_rom_and_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let rom_path = dir.path().join("game.gb");
        let shot = dir.path().join("game.png");

        // Enable RAM, store 0x5A at 0xA000, then spin.
        let mut rom = vec![0u8; 0x8000];
        rom[0x0147] = 0x03;
        rom[0x0149] = 0x02;
        rom[0x0100..0x010C].copy_from_slice(&[
            0x3E, 0x0A, 0xEA, 0x00, 0x00, 0x3E, 0x5A, 0xEA, 0x00, 0xA0, 0x18, 0xFE,
        ]);
        std::fs::write(&rom_path, &rom).unwrap();

        let args = Args::parse_from([
            OsStr::new("tickboy"),
            rom_path.as_os_str(),
            OsStr::new("--frames"),
            OsStr::new("2"),
            OsStr::new("--screenshot"),
            shot.as_os_str(),
        ]);
        let config = merge(&args, RunConfig::default());
        run(&args, &config).unwrap();

        assert!(shot.exists());
        let save = std::fs::read(dir.path().join("game.sav")).unwrap();
        assert_eq!(save.len(), 0x2000);
        assert_eq!(save[0], 0x5A);
    }

    #[test]
    fn fault_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let rom_path = dir.path().join("bad.gb");
        let mut rom = vec![0u8; 0x8000];
        rom[0x0100] = 0xD3;
        std::fs::write(&rom_path, &rom).unwrap();

        let args = Args::parse_from([OsStr::new("tickboy"), rom_path.as_os_str()]);
        let err = run(&args, &RunConfig::default()).unwrap_err();
        assert!(err.to_string().contains("0xD3"), "{err}");
    }
}
