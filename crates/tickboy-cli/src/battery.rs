use log::{debug, info};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tickboy_core::cartridge::Cartridge;

/// `<rom>.sav` next to the ROM file.
pub fn save_path(rom: &Path) -> PathBuf {
    rom.with_extension("sav")
}

/// Copy a save file into cartridge RAM. Returns whether anything was loaded.
pub fn load(cart: &mut Cartridge, path: &Path) -> io::Result<bool> {
    if cart.ram().is_empty() {
        return Ok(false);
    }
    match std::fs::read(path) {
        Ok(data) => {
            cart.load_ram(&data);
            info!("loaded {} bytes of save RAM from {}", data.len(), path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("no save file at {}", path.display());
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Write cartridge RAM out verbatim. Cartridges without RAM write nothing.
pub fn store(cart: &Cartridge, path: &Path) -> io::Result<bool> {
    if cart.ram().is_empty() {
        return Ok(false);
    }
    std::fs::write(path, cart.ram())?;
    info!("wrote {} bytes of save RAM to {}", cart.ram().len(), path.display());
    Ok(true)
}
