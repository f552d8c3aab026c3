#![allow(dead_code)]

use tickboy_core::{GameBoy, cartridge::Cartridge, mmu::Mmu};

pub const ENTRY: usize = 0x0100;
pub const ROM_BANK_SIZE: usize = 0x4000;
/// Offset inside every ROM bank that holds the bank's own index.
pub const BANK_TAG_OFFSET: usize = 0x2000;

/// Synthetic MBC1 image sized to match `rom_code`, with each bank tagged.
pub fn rom_image(rom_code: u8, ram_code: u8) -> Vec<u8> {
    let size = 0x8000usize << rom_code;
    let mut rom = vec![0u8; size];
    for bank in 0..size / ROM_BANK_SIZE {
        rom[bank * ROM_BANK_SIZE + BANK_TAG_OFFSET] = bank as u8;
    }
    rom[0x0134..0x0138].copy_from_slice(b"TEST");
    rom[0x0147] = 0x03; // MBC1 + RAM + Battery
    rom[0x0148] = rom_code;
    rom[0x0149] = ram_code;
    rom
}

pub fn cartridge(rom_code: u8, ram_code: u8) -> Cartridge {
    Cartridge::from_bytes(&rom_image(rom_code, ram_code)).unwrap()
}

/// 32 KiB image with `program` placed at the entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = rom_image(0, 0);
    rom[ENTRY..ENTRY + program.len()].copy_from_slice(program);
    rom
}

pub fn machine(program: &[u8]) -> GameBoy {
    GameBoy::from_rom(&rom_with_program(program)).unwrap()
}

pub fn run_ticks(gb: &mut GameBoy, ticks: usize) {
    for _ in 0..ticks {
        gb.tick().unwrap();
    }
}

pub fn run_m_cycles(gb: &mut GameBoy, m_cycles: usize) {
    run_ticks(gb, m_cycles * 4);
}

/// Bus with the LCD on and registers in post-boot state.
pub fn post_boot_bus() -> Mmu {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.apply_post_boot_state();
    mmu
}
