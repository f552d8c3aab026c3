mod common;

use common::{cartridge, post_boot_bus};
use tickboy_core::{
    interrupts::Interrupt,
    joypad::Button,
    mmu::{self, LcdToggle, Mmu, Region},
};

fn assert_round_trip(mmu: &mut Mmu, range: std::ops::RangeInclusive<u16>) {
    for addr in range {
        for val in 0..=0xFFu8 {
            mmu.write(addr, val);
            assert_eq!(mmu.read(addr), val, "addr {addr:04X} val {val:02X}");
        }
    }
}

#[test]
fn regions_partition_the_address_space() {
    let mut total = 0usize;
    let mut last = None;
    for addr in 0..=0xFFFFu16 {
        let region = Region::classify(addr);
        assert!(region.base() <= addr);
        assert!((addr as usize) < region.base() as usize + region.size());
        if last != Some(region) {
            assert_eq!(region.base(), addr, "{region:?} starts at its base");
            total += region.size();
            last = Some(region);
        }
    }
    assert_eq!(total, 0x10000);
}

#[test]
fn writable_regions_round_trip() {
    let mut mmu = Mmu::new(cartridge(0, 2));
    mmu.write(0x0000, 0x0A);
    assert_round_trip(&mut mmu, 0x8000..=0x9FFF);
    assert_round_trip(&mut mmu, 0xA000..=0xBFFF);
    assert_round_trip(&mut mmu, 0xC000..=0xDFFF);
    assert_round_trip(&mut mmu, 0xFE00..=0xFE9F);
    assert_round_trip(&mut mmu, 0xFF80..=0xFFFE);
    assert_round_trip(&mut mmu, 0xFFFF..=0xFFFF);
}

#[test]
fn echo_ram_mirrors_work_ram() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(0xC123, 0x5A);
    assert_eq!(mmu.read(0xE123), 0x5A);
    mmu.write(0xFDFF, 0xA5);
    assert_eq!(mmu.read(0xDDFF), 0xA5);
}

#[test]
fn unusable_range_reads_zero_and_drops_writes() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(0xFEA0, 0x77);
    assert_eq!(mmu.read(0xFEA0), 0);
    assert_eq!(mmu.read(0xFEFF), 0);
}

#[test]
fn rom_writes_drive_the_controller() {
    let mut mmu = Mmu::new(cartridge(1, 0));
    mmu.write(0x2000, 0x02);
    assert_eq!(mmu.cart.rom_bank(), 2);
    assert_eq!(mmu.read(0x6000), 2);
}

#[test]
fn register_read_masks() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(mmu::IF, 0x00);
    assert_eq!(mmu.read(mmu::IF), 0xE0);
    mmu.write(mmu::IF, 0x1F);
    assert_eq!(mmu.interrupts.requested(), 0x1F);

    mmu.write(mmu::STAT, 0xFF);
    assert_eq!(mmu.read(mmu::STAT) & 0xF8, 0xF8);
    assert_eq!(mmu.read(mmu::STAT) & 0x07, 0x00);

    mmu.write(0xFF07, 0x00);
    assert_eq!(mmu.read(0xFF07), 0xF8);
    assert_eq!(mmu.read(mmu::JOYP) & 0xC0, 0xC0);
}

#[test]
fn ly_is_read_only() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.set_ly(42);
    mmu.write(mmu::LY, 7);
    assert_eq!(mmu.read(mmu::LY), 42);
}

#[test]
fn lcdc_bit_7_edges_are_reported_once() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    assert!(!mmu.lcd_enabled());
    mmu.write(mmu::LCDC, 0x80);
    assert!(mmu.lcd_enabled());
    assert_eq!(mmu.take_lcd_toggle(), Some(LcdToggle::On));
    assert_eq!(mmu.take_lcd_toggle(), None);

    mmu.write(mmu::LCDC, 0x91);
    assert_eq!(mmu.take_lcd_toggle(), None);

    mmu.write(mmu::LCDC, 0x11);
    assert!(!mmu.lcd_enabled());
    assert_eq!(mmu.take_lcd_toggle(), Some(LcdToggle::Off));
}

#[test]
fn post_boot_registers() {
    let mmu = post_boot_bus();
    assert_eq!(mmu.read(mmu::LCDC), 0x91);
    assert_eq!(mmu.read(mmu::BGP), 0xFC);
    assert_eq!(mmu.read(mmu::IF), 0xE1);
    assert_eq!(mmu.timer.div_counter(), 0xABCC);
    assert!(mmu.lcd_enabled());
}

#[test]
fn oam_dma_copies_160_bytes() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    for i in 0..0xA0u16 {
        mmu.write(0xC000 + i, i as u8 ^ 0x5A);
    }
    mmu.write(0xFE00, 0x11);
    mmu.write(mmu::DMA, 0xC0);
    assert!(mmu.dma_active());

    // Start-up delay: OAM still visible.
    for _ in 0..7 {
        mmu.tick();
    }
    assert_eq!(mmu.read(0xFE00), 0x11);
    mmu.tick();
    assert_eq!(mmu.read(0xFE00), 0xFF);

    for _ in 0..640 {
        mmu.tick();
    }
    assert!(!mmu.dma_active());
    for i in 0..0xA0u16 {
        assert_eq!(mmu.read(0xFE00 + i), i as u8 ^ 0x5A);
    }
}

#[test]
fn oam_dma_one_byte_per_m_cycle() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(0xC000, 0xAB);
    mmu.write(0xC001, 0xCD);
    mmu.write(mmu::DMA, 0xC0);
    for _ in 0..12 {
        mmu.tick();
    }
    assert_eq!(mmu.oam()[0], 0xAB);
    assert_eq!(mmu.oam()[1], 0x00);
    for _ in 0..4 {
        mmu.tick();
    }
    assert_eq!(mmu.oam()[1], 0xCD);
}

#[test]
fn boot_rom_overlays_until_unmapped() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.load_boot_rom(vec![0x31; 0x100]);
    assert_eq!(mmu.read(0x0000), 0x31);
    assert_eq!(mmu.read(0x00FF), 0x31);
    assert_eq!(mmu.read(0x0147), 0x03);

    mmu.write(mmu::BOOT, 0x01);
    assert!(!mmu.boot_rom_mapped());
    assert_eq!(mmu.read(0x0000), 0x00);
}

#[test]
fn joypad_press_requests_interrupt() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(mmu::JOYP, 0x20); // select directions
    mmu.set_button(Button::Right, true);
    assert_eq!(mmu.read(mmu::JOYP) & 0x0F, 0x0E);
    assert_ne!(mmu.interrupts.requested() & Interrupt::Joypad.bit(), 0);

    mmu.interrupts.set_requested(0);
    mmu.set_button(Button::A, true); // action group not selected
    assert_eq!(mmu.interrupts.requested(), 0);
    assert_eq!(mmu.read(mmu::JOYP) & 0x0F, 0x0E);
}

#[test]
fn timer_registers_are_routed() {
    let mut mmu = Mmu::new(cartridge(0, 0));
    mmu.write(0xFF06, 0x33);
    assert_eq!(mmu.timer.tma(), 0x33);
    for _ in 0..256 {
        mmu.tick();
    }
    assert_eq!(mmu.read(0xFF04), 1);
}
