use log::{debug, info};

use crate::error::CartridgeError;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

const HEADER_END: usize = 0x0150;
const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0143;
const ROM_SIZE_OFFSET: usize = 0x0148;
const RAM_SIZE_OFFSET: usize = 0x0149;

const MAX_ROM_SIZE_CODE: u8 = 0x06;
const MAX_RAM_SIZE_CODE: u8 = 0x05;

// From 1 MiB of ROM the secondary bank register feeds ROM address bits 19-20.
const LARGE_ROM_SIZE_CODE: u8 = 0x05;
// From 32 KiB of RAM the secondary bank register selects RAM banks.
const BANKED_RAM_SIZE_CODE: u8 = 0x03;

/// What the secondary 2-bit bank register drives in the upper address bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BankingMode {
    #[default]
    Rom,
    Ram,
}

/// MBC1-class cartridge controller.
///
/// Bytes written before [`Cartridge::notify_load_complete`] are appended to
/// the ROM image; afterwards writes drive the bank registers.
#[derive(Debug, Default)]
pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    title: String,
    rom_size_code: u8,
    ram_size_code: u8,
    rom_bank: u8,
    ram_bank: u8,
    ram_enabled: bool,
    mode: BankingMode,
    loaded: bool,
}

impl Cartridge {
    pub fn new() -> Self {
        Self {
            rom_bank: 1,
            ..Self::default()
        }
    }

    /// Stream `data` through the load path and finish loading.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        let mut cart = Self::new();
        cart.rom.reserve(data.len());
        for &byte in data {
            cart.write(0, byte);
        }
        cart.notify_load_complete()?;
        Ok(cart)
    }

    /// Freeze the ROM image, decode the size codes and allocate external RAM.
    pub fn notify_load_complete(&mut self) -> Result<(), CartridgeError> {
        if self.loaded {
            return Err(CartridgeError::AlreadyLoaded);
        }
        let header = Header::parse(&self.rom)?;
        let rom_size_code = header.rom_size_code();
        if rom_size_code > MAX_ROM_SIZE_CODE {
            return Err(CartridgeError::UnsupportedRomSize(rom_size_code));
        }
        let ram_size_code = header.ram_size_code();
        let Some(ram_size) = ram_size(ram_size_code) else {
            return Err(CartridgeError::UnsupportedRamSize(ram_size_code));
        };

        self.title = header.title();
        self.rom_size_code = rom_size_code;
        self.ram_size_code = ram_size_code;
        self.ram = vec![0; ram_size];
        self.rom_bank = 1;
        self.ram_bank = 0;
        self.ram_enabled = false;
        self.mode = BankingMode::Rom;
        self.loaded = true;

        info!(
            "loaded cartridge \"{}\": {} ROM bytes (code {:#04X}), {} RAM bytes (code {:#04X})",
            self.title,
            self.rom.len(),
            rom_size_code,
            ram_size,
            ram_size_code
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn read(&self, addr: u16) -> u8 {
        if !self.loaded {
            debug!("cartridge read {addr:04X} before load completed");
            return 0xFF;
        }
        match addr {
            0x0000..=0x3FFF => {
                let offset = self.zero_bank() * ROM_BANK_SIZE + addr as usize;
                self.rom[offset % self.rom.len()]
            }
            0x4000..=0x7FFF => {
                let offset =
                    self.effective_rom_bank() * ROM_BANK_SIZE + (addr as usize - ROM_BANK_SIZE);
                self.rom[offset % self.rom.len()]
            }
            0xA000..=0xBFFF => self
                .ram_offset(addr)
                .map(|offset| self.ram[offset])
                .unwrap_or(0xFF),
            _ => {
                debug!("cartridge read outside its ranges: {addr:04X}");
                0xFF
            }
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if !self.loaded {
            self.rom.push(val);
            return;
        }
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                if self.rom_size_code == 0 {
                    self.rom_bank = 1;
                    return;
                }
                let bank = val & self.rom_bank_mask();
                self.rom_bank = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => {
                if self.has_secondary_banking() {
                    self.ram_bank = val & 0x03;
                }
            }
            0x6000..=0x7FFF => {
                if self.has_secondary_banking() {
                    self.mode = if val & 0x01 != 0 {
                        BankingMode::Ram
                    } else {
                        BankingMode::Rom
                    };
                }
            }
            0xA000..=0xBFFF => {
                if let Some(offset) = self.ram_offset(addr) {
                    self.ram[offset] = val;
                }
            }
            _ => debug!("cartridge write outside its ranges: {addr:04X}={val:02X}"),
        }
    }

    /// Bank index currently visible at 0x4000-0x7FFF.
    pub fn effective_rom_bank(&self) -> usize {
        (self.upper_bank_bits() | self.rom_bank as usize) % self.rom_bank_count()
    }

    /// Bank index currently visible at 0x0000-0x3FFF.
    pub fn zero_bank(&self) -> usize {
        if self.mode == BankingMode::Ram && self.rom_size_code >= LARGE_ROM_SIZE_CODE {
            self.upper_bank_bits() % self.rom_bank_count()
        } else {
            0
        }
    }

    pub fn rom_bank(&self) -> u8 {
        self.rom_bank
    }

    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }

    pub fn banking_mode(&self) -> BankingMode {
        self.mode
    }

    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    pub fn rom_size_code(&self) -> u8 {
        self.rom_size_code
    }

    pub fn ram_size_code(&self) -> u8 {
        self.ram_size_code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// External RAM contents, suitable for writing to a save file verbatim.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    /// Restore external RAM from a save file. Extra bytes are ignored.
    pub fn load_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
        if data.len() != self.ram.len() {
            debug!(
                "save data is {} bytes, cartridge RAM is {} bytes",
                data.len(),
                self.ram.len()
            );
        }
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_bank_mask(&self) -> u8 {
        let banks = 2usize << self.rom_size_code;
        (banks - 1).min(0x1F) as u8
    }

    fn upper_bank_bits(&self) -> usize {
        match self.rom_size_code {
            0x05 => ((self.ram_bank & 0x01) as usize) << 5,
            0x06 => ((self.ram_bank & 0x03) as usize) << 5,
            _ => 0,
        }
    }

    fn has_secondary_banking(&self) -> bool {
        self.rom_size_code >= LARGE_ROM_SIZE_CODE || self.ram_size_code >= BANKED_RAM_SIZE_CODE
    }

    fn ram_offset(&self, addr: u16) -> Option<usize> {
        if !self.ram_enabled || self.ram.is_empty() {
            return None;
        }
        let local = addr as usize - 0xA000;
        let offset = if self.mode == BankingMode::Ram && self.ram_size_code >= BANKED_RAM_SIZE_CODE
        {
            self.ram_bank as usize * RAM_BANK_SIZE + local
        } else {
            local
        };
        Some(offset % self.ram.len())
    }
}

fn ram_size(code: u8) -> Option<usize> {
    match code {
        0x00 => Some(0),
        0x01 => Some(0x800),
        0x02 => Some(0x2000),
        0x03 => Some(0x8000),
        0x04 => Some(0x20000),
        0x05 => Some(0x10000),
        _ => None,
    }
}

struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::HeaderTruncated { len: data.len() });
        }
        Ok(Self { data })
    }

    fn title(&self) -> String {
        let mut slice = &self.data[TITLE_START..TITLE_END];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    fn rom_size_code(&self) -> u8 {
        self.data[ROM_SIZE_OFFSET]
    }

    fn ram_size_code(&self) -> u8 {
        self.data[RAM_SIZE_OFFSET]
    }
}
