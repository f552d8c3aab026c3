use log::{debug, trace};

use crate::{
    cartridge::Cartridge,
    interrupts::{Interrupt, InterruptController},
    joypad::{Button, Joypad},
    ppu::Mode,
    timer::Timer,
};

// Hardware register addresses (gbdev.io/pandocs/Hardware_Reg_List.html)
pub const JOYP: u16 = 0xFF00;
pub const IF: u16 = 0xFF0F;
pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const DMA: u16 = 0xFF46;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;
pub const BOOT: u16 = 0xFF50;
pub const IE: u16 = 0xFFFF;

const IO_BASE: u16 = 0xFF00;
const LCDC_ENABLE: u8 = 0x80;
const STAT_COINCIDENCE: u8 = 0x04;
const STAT_MODE_MASK: u8 = 0x03;
const STAT_WRITABLE: u8 = 0x78;

const BOOT_ROM_SIZE: usize = 0x100;
const OAM_SIZE: usize = 0xA0;

// OAM DMA: two M-cycles of start-up, then one byte per M-cycle.
const DMA_START_DELAY: u16 = 8;
const DMA_TICKS_PER_BYTE: u16 = 4;

/// Named partition of the 16-bit address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    RestartVectors,
    CartridgeHeader,
    RomBank0,
    RomBankN,
    CharacterRam,
    BackgroundMap0,
    BackgroundMap1,
    CartridgeRam,
    WorkRam0,
    WorkRam1,
    EchoRam,
    Oam,
    Unusable,
    HardwareRegisters,
    ZeroPage,
    InterruptEnable,
}

impl Region {
    pub const fn classify(addr: u16) -> Region {
        match addr {
            0x0000..=0x00FF => Region::RestartVectors,
            0x0100..=0x014F => Region::CartridgeHeader,
            0x0150..=0x3FFF => Region::RomBank0,
            0x4000..=0x7FFF => Region::RomBankN,
            0x8000..=0x97FF => Region::CharacterRam,
            0x9800..=0x9BFF => Region::BackgroundMap0,
            0x9C00..=0x9FFF => Region::BackgroundMap1,
            0xA000..=0xBFFF => Region::CartridgeRam,
            0xC000..=0xCFFF => Region::WorkRam0,
            0xD000..=0xDFFF => Region::WorkRam1,
            0xE000..=0xFDFF => Region::EchoRam,
            0xFE00..=0xFE9F => Region::Oam,
            0xFEA0..=0xFEFF => Region::Unusable,
            0xFF00..=0xFF7F => Region::HardwareRegisters,
            0xFF80..=0xFFFE => Region::ZeroPage,
            0xFFFF => Region::InterruptEnable,
        }
    }

    pub const fn base(self) -> u16 {
        match self {
            Region::RestartVectors => 0x0000,
            Region::CartridgeHeader => 0x0100,
            Region::RomBank0 => 0x0150,
            Region::RomBankN => 0x4000,
            Region::CharacterRam => 0x8000,
            Region::BackgroundMap0 => 0x9800,
            Region::BackgroundMap1 => 0x9C00,
            Region::CartridgeRam => 0xA000,
            Region::WorkRam0 => 0xC000,
            Region::WorkRam1 => 0xD000,
            Region::EchoRam => 0xE000,
            Region::Oam => 0xFE00,
            Region::Unusable => 0xFEA0,
            Region::HardwareRegisters => 0xFF00,
            Region::ZeroPage => 0xFF80,
            Region::InterruptEnable => 0xFFFF,
        }
    }

    pub const fn size(self) -> usize {
        match self {
            Region::RestartVectors => 0x100,
            Region::CartridgeHeader => 0x50,
            Region::RomBank0 => 0x3EB0,
            Region::RomBankN => 0x4000,
            Region::CharacterRam => 0x1800,
            Region::BackgroundMap0 | Region::BackgroundMap1 => 0x400,
            Region::CartridgeRam => 0x2000,
            Region::WorkRam0 | Region::WorkRam1 => 0x1000,
            Region::EchoRam => 0x1E00,
            Region::Oam => OAM_SIZE,
            Region::Unusable => 0x60,
            Region::HardwareRegisters => 0x80,
            Region::ZeroPage => 0x7F,
            Region::InterruptEnable => 1,
        }
    }
}

/// Edge seen on LCDC bit 7 since the Video Unit last looked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdToggle {
    On,
    Off,
}

#[derive(Debug, Clone, Copy)]
struct OamDma {
    source: u16,
    ticks: u16,
}

pub struct Mmu {
    pub cart: Cartridge,
    boot_rom: Option<Vec<u8>>,
    character_ram: [u8; 0x1800],
    background_maps: [[u8; 0x400]; 2],
    wram: [[u8; 0x1000]; 2],
    oam: [u8; OAM_SIZE],
    io: [u8; 0x80],
    hram: [u8; 0x7F],
    pub interrupts: InterruptController,
    pub timer: Timer,
    pub joypad: Joypad,
    lcd_enabled: bool,
    lcd_toggle: Option<LcdToggle>,
    ppu_mode: Mode,
    dma: Option<OamDma>,
}

impl Mmu {
    /// Power-on bus: every region zeroed, LCD off.
    pub fn new(cart: Cartridge) -> Self {
        Self {
            cart,
            boot_rom: None,
            character_ram: [0; 0x1800],
            background_maps: [[0; 0x400]; 2],
            wram: [[0; 0x1000]; 2],
            oam: [0; OAM_SIZE],
            io: [0; 0x80],
            hram: [0; 0x7F],
            interrupts: InterruptController::new(),
            timer: Timer::new(),
            joypad: Joypad::new(),
            lcd_enabled: false,
            lcd_toggle: None,
            ppu_mode: Mode::HBlank,
            dma: None,
        }
    }

    /// Register state left behind by the DMG boot ROM
    /// (gbdev.io/pandocs/Power_Up_State.html).
    pub fn apply_post_boot_state(&mut self) {
        self.timer.set_div_counter(0xABCC);
        self.interrupts.set_requested(0x01);
        self.set_io(LCDC, 0x91);
        self.set_io(STAT, 0x80);
        self.set_io(DMA, 0xFF);
        self.set_io(BGP, 0xFC);
        self.set_io(OBP0, 0xFF);
        self.set_io(OBP1, 0xFF);
        self.lcd_enabled = true;
        self.lcd_toggle = None;
        self.boot_rom = None;
    }

    /// Overlay a boot ROM on 0x0000-0x00FF until 0xFF50 is written.
    pub fn load_boot_rom(&mut self, mut data: Vec<u8>) {
        data.resize(BOOT_ROM_SIZE, 0xFF);
        self.boot_rom = Some(data);
    }

    pub fn boot_rom_mapped(&self) -> bool {
        self.boot_rom.is_some()
    }

    pub fn read(&self, addr: u16) -> u8 {
        let region = Region::classify(addr);
        let offset = (addr - region.base()) as usize;
        match region {
            Region::RestartVectors if self.boot_rom.is_some() => {
                self.boot_rom.as_ref().map(|b| b[offset]).unwrap_or(0xFF)
            }
            Region::RestartVectors
            | Region::CartridgeHeader
            | Region::RomBank0
            | Region::RomBankN
            | Region::CartridgeRam => self.cart.read(addr),
            Region::CharacterRam => self.character_ram[offset],
            Region::BackgroundMap0 => self.background_maps[0][offset],
            Region::BackgroundMap1 => self.background_maps[1][offset],
            Region::WorkRam0 => self.wram[0][offset],
            Region::WorkRam1 => self.wram[1][offset],
            Region::EchoRam => self.read(addr - 0x2000),
            Region::Oam => {
                if self.oam_blocked() {
                    0xFF
                } else {
                    self.oam[offset]
                }
            }
            Region::Unusable => {
                debug!("read from unmapped address {addr:04X}");
                0
            }
            Region::HardwareRegisters => self.read_io(addr),
            Region::ZeroPage => self.hram[offset],
            Region::InterruptEnable => self.interrupts.enabled(),
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        let region = Region::classify(addr);
        let offset = (addr - region.base()) as usize;
        match region {
            Region::RestartVectors
            | Region::CartridgeHeader
            | Region::RomBank0
            | Region::RomBankN
            | Region::CartridgeRam => self.cart.write(addr, val),
            Region::CharacterRam => self.character_ram[offset] = val,
            Region::BackgroundMap0 => self.background_maps[0][offset] = val,
            Region::BackgroundMap1 => self.background_maps[1][offset] = val,
            Region::WorkRam0 => self.wram[0][offset] = val,
            Region::WorkRam1 => self.wram[1][offset] = val,
            Region::EchoRam => self.write(addr - 0x2000, val),
            Region::Oam => {
                if !self.oam_blocked() {
                    self.oam[offset] = val;
                }
            }
            Region::Unusable => {
                debug!("write to unmapped address {addr:04X}={val:02X} dropped");
            }
            Region::HardwareRegisters => self.write_io(addr, val),
            Region::ZeroPage => self.hram[offset] = val,
            Region::InterruptEnable => self.interrupts.set_enabled(val),
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            JOYP => self.joypad.read(),
            0xFF04..=0xFF07 => self.timer.read(addr),
            IF => self.interrupts.read_flags(),
            STAT => self.io(STAT) | 0x80,
            BOOT => 0xFF,
            _ => self.io(addr),
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            JOYP => self.joypad.write(val),
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            IF => self.interrupts.set_requested(val),
            LCDC => {
                let was_on = self.io(LCDC) & LCDC_ENABLE != 0;
                let now_on = val & LCDC_ENABLE != 0;
                self.set_io(LCDC, val);
                if was_on != now_on {
                    self.lcd_enabled = now_on;
                    self.lcd_toggle = Some(if now_on { LcdToggle::On } else { LcdToggle::Off });
                }
            }
            STAT => {
                let live = self.io(STAT) & !STAT_WRITABLE;
                self.set_io(STAT, live | (val & STAT_WRITABLE));
            }
            LY => {}
            DMA => {
                self.set_io(DMA, val);
                self.dma = Some(OamDma {
                    source: (val as u16) << 8,
                    ticks: 0,
                });
                trace!("OAM DMA scheduled from {:04X}", (val as u16) << 8);
            }
            BOOT => {
                if self.boot_rom.take().is_some() {
                    debug!("boot ROM unmapped");
                }
            }
            _ => self.set_io(addr, val),
        }
    }

    /// Advance bus-side peripherals by one base clock tick.
    pub fn tick(&mut self) {
        self.timer.tick(&mut self.interrupts);
        self.tick_dma();
    }

    fn tick_dma(&mut self) {
        let Some(mut dma) = self.dma.take() else {
            return;
        };
        dma.ticks += 1;
        if dma.ticks > DMA_START_DELAY && (dma.ticks - DMA_START_DELAY) % DMA_TICKS_PER_BYTE == 0 {
            let index = (dma.ticks - DMA_START_DELAY) / DMA_TICKS_PER_BYTE - 1;
            self.oam[index as usize] = self.dma_source_read(dma.source.wrapping_add(index));
            if index as usize + 1 == OAM_SIZE {
                trace!("OAM DMA from {:04X} complete", dma.source);
                return;
            }
        }
        self.dma = Some(dma);
    }

    fn dma_source_read(&self, addr: u16) -> u8 {
        // Sources above WRAM alias back onto it.
        let addr = if addr >= 0xE000 { addr - 0x2000 } else { addr };
        match Region::classify(addr) {
            Region::Oam => self.oam[(addr - 0xFE00) as usize],
            _ => self.read(addr),
        }
    }

    fn oam_blocked(&self) -> bool {
        self.dma.is_some_and(|dma| dma.ticks >= DMA_START_DELAY)
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if self.joypad.set_button(button, pressed) {
            self.interrupts.request(Interrupt::Joypad);
        }
    }

    // Video Unit side channel. These bypass CPU-visible masking.

    #[inline]
    pub fn io(&self, addr: u16) -> u8 {
        self.io[(addr - IO_BASE) as usize]
    }

    #[inline]
    fn set_io(&mut self, addr: u16, val: u8) {
        self.io[(addr - IO_BASE) as usize] = val;
    }

    pub fn set_ly(&mut self, ly: u8) {
        self.set_io(LY, ly);
    }

    pub fn set_coincidence(&mut self, equal: bool) {
        let stat = self.io(STAT) & !STAT_COINCIDENCE;
        self.set_io(STAT, stat | if equal { STAT_COINCIDENCE } else { 0 });
    }

    pub fn set_ppu_mode(&mut self, mode: Mode) {
        self.ppu_mode = mode;
        let stat = self.io(STAT) & !STAT_MODE_MASK;
        self.set_io(STAT, stat | mode.stat_bits());
    }

    pub fn ppu_mode(&self) -> Mode {
        self.ppu_mode
    }

    pub fn lcd_enabled(&self) -> bool {
        self.lcd_enabled
    }

    pub fn take_lcd_toggle(&mut self) -> Option<LcdToggle> {
        self.lcd_toggle.take()
    }

    pub fn dma_active(&self) -> bool {
        self.dma.is_some()
    }

    /// VRAM byte as the pixel fetcher sees it.
    #[inline]
    pub fn vram(&self, addr: u16) -> u8 {
        match addr {
            0x8000..=0x97FF => self.character_ram[(addr - 0x8000) as usize],
            0x9800..=0x9BFF => self.background_maps[0][(addr - 0x9800) as usize],
            0x9C00..=0x9FFF => self.background_maps[1][(addr - 0x9C00) as usize],
            _ => 0xFF,
        }
    }

    pub fn oam(&self) -> &[u8; OAM_SIZE] {
        &self.oam
    }
}
