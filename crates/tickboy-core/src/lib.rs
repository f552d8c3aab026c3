//! Cycle-accurate DMG Game Boy emulation core.
//!
//! Every component advances one base clock tick at a time. The [`gameboy`]
//! facade owns the CPU, bus and PPU and drives them in hardware order.

/// Pure 8/16-bit arithmetic and flag computation.
pub mod alu;

/// MBC1 cartridge controller and battery RAM.
pub mod cartridge;

/// SM83 CPU core: fetch, decode and per-M-cycle execution.
pub mod cpu;

/// Error types surfaced to hosts.
pub mod error;

/// High-level facade that wires the CPU, bus and PPU into a single machine.
pub mod gameboy;

/// Interrupt enable/request flags and priority resolution.
pub mod interrupts;

/// Joypad input register.
pub mod joypad;

/// Micro-operations and the per-instruction queue.
pub mod microcode;

/// Memory map, hardware registers and OAM DMA.
pub mod mmu;

/// Pixel Processing Unit (PPU) with pixel FIFOs.
pub mod ppu;

/// CPU register file.
pub mod registers;

/// Divider/timer unit.
pub mod timer;

pub use error::{CartridgeError, CpuError, EmuError};
pub use gameboy::GameBoy;
