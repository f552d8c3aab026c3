mod common;

use common::{BANK_TAG_OFFSET, cartridge, rom_image};
use tickboy_core::{
    CartridgeError,
    cartridge::{BankingMode, Cartridge},
};

#[test]
fn streamed_bytes_become_the_rom_image() {
    let image = rom_image(1, 0);
    let mut cart = Cartridge::new();
    for &byte in &image {
        cart.write(0x2000, byte);
    }
    assert!(!cart.is_loaded());
    cart.notify_load_complete().unwrap();

    assert_eq!(cart.rom(), &image[..]);
    assert_eq!(cart.title(), "TEST");
    assert_eq!(cart.rom_size_code(), 1);
    assert_eq!(cart.read(0x0147), 0x03);
    assert_eq!(cart.read(0x4000 + BANK_TAG_OFFSET as u16), 1);
}

#[test]
fn bank_zero_select_maps_bank_one_for_every_size() {
    for code in 0..=6u8 {
        let mut cart = cartridge(code, 0);
        for value in [0x00, 0x20, 0x40, 0x60, 0xE0] {
            cart.write(0x2000, value);
            assert_eq!(cart.effective_rom_bank(), 1, "code {code} value {value:#04X}");
            assert_eq!(cart.read(0x6000), 1, "code {code} value {value:#04X}");
        }
    }
}

#[test]
fn bank_number_is_masked_to_rom_size() {
    let mut cart = cartridge(1, 0); // 4 banks
    cart.write(0x2000, 0x07);
    assert_eq!(cart.rom_bank(), 3);
    assert_eq!(cart.read(0x6000), 3);

    cart.write(0x2000, 0x05);
    assert_eq!(cart.read(0x6000), 1);
}

#[test]
fn rom_only_size_ignores_bank_writes() {
    let mut cart = cartridge(0, 0);
    cart.write(0x2000, 0x03);
    assert_eq!(cart.rom_bank(), 1);
    cart.write(0x4000, 0x03);
    cart.write(0x6000, 0x01);
    assert_eq!(cart.ram_bank(), 0);
    assert_eq!(cart.banking_mode(), BankingMode::Rom);
}

#[test]
fn large_rom_takes_upper_bits_from_secondary_register() {
    let mut cart = cartridge(5, 0); // 1 MiB
    cart.write(0x4000, 0x01);
    cart.write(0x2000, 0x02);
    assert_eq!(cart.effective_rom_bank(), 0x22);
    assert_eq!(cart.read(0x6000), 0x22);

    // ROM mode keeps bank 0 fixed.
    assert_eq!(cart.read(BANK_TAG_OFFSET as u16), 0);
    cart.write(0x6000, 0x01);
    assert_eq!(cart.zero_bank(), 0x20);
    assert_eq!(cart.read(BANK_TAG_OFFSET as u16), 0x20);
}

#[test]
fn two_mebibyte_rom_uses_both_secondary_bits() {
    let mut cart = cartridge(6, 0);
    cart.write(0x4000, 0x03);
    cart.write(0x2000, 0x01);
    assert_eq!(cart.read(0x6000), 0x61);
    cart.write(0x6000, 0x01);
    assert_eq!(cart.read(BANK_TAG_OFFSET as u16), 0x60);
}

#[test]
fn ram_requires_enable() {
    let mut cart = cartridge(0, 2); // 8 KiB
    cart.write(0xA123, 0x55);
    assert_eq!(cart.read(0xA123), 0xFF);

    cart.write(0x0000, 0x0A);
    assert!(cart.ram_enabled());
    cart.write(0xA123, 0x55);
    assert_eq!(cart.read(0xA123), 0x55);

    cart.write(0x0000, 0x00);
    assert_eq!(cart.read(0xA123), 0xFF);
    cart.write(0x0000, 0x1A);
    assert_eq!(cart.read(0xA123), 0x55);
}

#[test]
fn cartridge_without_ram_reads_open_bus() {
    let mut cart = cartridge(0, 0);
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x12);
    assert_eq!(cart.read(0xA000), 0xFF);
}

#[test]
fn ram_banks_switch_only_in_ram_mode() {
    let mut cart = cartridge(0, 3); // 32 KiB
    cart.write(0x0000, 0x0A);
    cart.write(0x6000, 0x01);
    cart.write(0x4000, 0x02);
    cart.write(0xA000, 0xB2);
    cart.write(0x4000, 0x00);
    cart.write(0xA000, 0xB0);

    cart.write(0x4000, 0x02);
    assert_eq!(cart.read(0xA000), 0xB2);
    assert_eq!(cart.ram()[2 * 0x2000], 0xB2);

    cart.write(0x6000, 0x00);
    assert_eq!(cart.read(0xA000), 0xB0);
}

#[test]
fn unsupported_size_codes_are_rejected() {
    let mut image = rom_image(0, 0);
    image[0x0148] = 0x07;
    assert_eq!(
        Cartridge::from_bytes(&image).unwrap_err(),
        CartridgeError::UnsupportedRomSize(0x07)
    );

    let mut image = rom_image(0, 0);
    image[0x0149] = 0x06;
    assert_eq!(
        Cartridge::from_bytes(&image).unwrap_err(),
        CartridgeError::UnsupportedRamSize(0x06)
    );
}

#[test]
fn truncated_header_is_rejected() {
    assert_eq!(
        Cartridge::from_bytes(&[0u8; 0x100]).unwrap_err(),
        CartridgeError::HeaderTruncated { len: 0x100 }
    );
}

#[test]
fn load_completes_once() {
    let mut cart = cartridge(0, 0);
    assert_eq!(cart.notify_load_complete(), Err(CartridgeError::AlreadyLoaded));
}

#[test]
fn ram_allocated_from_size_code() {
    let sizes = [0usize, 0x800, 0x2000, 0x8000, 0x20000, 0x10000];
    for (code, size) in sizes.into_iter().enumerate() {
        assert_eq!(cartridge(0, code as u8).ram().len(), size);
    }
}

#[test]
fn save_ram_round_trips() {
    let mut cart = cartridge(0, 2);
    cart.write(0x0000, 0x0A);
    cart.write(0xA010, 0x99);
    let saved = cart.ram().to_vec();

    let mut restored = cartridge(0, 2);
    restored.load_ram(&saved);
    restored.write(0x0000, 0x0A);
    assert_eq!(restored.read(0xA010), 0x99);

    // Oversized save data is truncated.
    restored.load_ram(&vec![0x11; 0x4000]);
    assert_eq!(restored.ram().len(), 0x2000);
    assert_eq!(restored.read(0xA010), 0x11);
}
