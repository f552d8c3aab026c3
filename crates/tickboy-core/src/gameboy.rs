use crate::{
    cartridge::Cartridge,
    cpu::Cpu,
    error::EmuError,
    joypad::Button,
    mmu::Mmu,
    ppu::Ppu,
};

/// Base clock ticks in one full frame (154 lines of 456 dots).
pub const TICKS_PER_FRAME: u32 = 70_224;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub ppu: Ppu,
    ticks: u64,
}

impl GameBoy {
    /// Machine in the state the boot ROM hands over at 0x0100.
    pub fn new(cart: Cartridge) -> Self {
        let mut mmu = Mmu::new(cart);
        mmu.apply_post_boot_state();
        let ppu = Ppu::new();
        mmu.set_ppu_mode(ppu.mode());
        Self {
            cpu: Cpu::new(),
            mmu,
            ppu,
            ticks: 0,
        }
    }

    /// Machine at power-on, executing `boot` from 0x0000.
    pub fn with_boot_rom(cart: Cartridge, boot: Vec<u8>) -> Self {
        let mut mmu = Mmu::new(cart);
        mmu.load_boot_rom(boot);
        let ppu = Ppu::new();
        mmu.set_ppu_mode(ppu.mode());
        Self {
            cpu: Cpu::new_power_on(),
            mmu,
            ppu,
            ticks: 0,
        }
    }

    /// Stream a ROM image into a fresh cartridge and start from post-boot state.
    pub fn from_rom(rom: &[u8]) -> Result<Self, EmuError> {
        Ok(Self::new(Cartridge::from_bytes(rom)?))
    }

    /// Advance every component by one base clock tick, in hardware order.
    pub fn tick(&mut self) -> Result<(), EmuError> {
        self.cpu.tick(&mut self.mmu)?;
        self.mmu.tick();
        self.mmu.interrupts.tick();
        self.ppu.tick(&mut self.mmu);
        self.ticks += 1;
        Ok(())
    }

    /// Run until the PPU completes a frame, or for one frame's worth of ticks
    /// while the LCD is off.
    pub fn step_frame(&mut self) -> Result<(), EmuError> {
        for _ in 0..TICKS_PER_FRAME {
            self.tick()?;
            if self.ppu.take_frame_ready() {
                break;
            }
        }
        Ok(())
    }

    pub fn framebuffer(&self) -> &[u32] {
        self.ppu.framebuffer()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.mmu.set_button(button, pressed);
    }

    /// Base clock ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
