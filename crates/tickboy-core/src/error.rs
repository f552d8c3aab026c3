use thiserror::Error;

/// Fatal problems detected while finishing a cartridge load.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("cartridge image is {len} bytes, too short to contain a header")]
    HeaderTruncated { len: usize },
    #[error("unsupported ROM size code {0:#04X}")]
    UnsupportedRomSize(u8),
    #[error("unsupported RAM size code {0:#04X}")]
    UnsupportedRamSize(u8),
    #[error("cartridge load was already completed")]
    AlreadyLoaded,
}

/// Conditions that stop the CPU.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("unimplemented opcode {opcode:#04X} at PC={pc:#06X}")]
    UnimplementedOpcode { opcode: u8, pc: u16 },
}

/// Any condition that halts the machine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmuError {
    #[error("cartridge: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("cpu: {0}")]
    Cpu(#[from] CpuError),
}
