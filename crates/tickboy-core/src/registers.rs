// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub z: bool,
    pub n: bool,
    pub h: bool,
    pub c: bool,
}

impl Flags {
    pub const fn new(z: bool, n: bool, h: bool, c: bool) -> Self {
        Self { z, n, h, c }
    }

    /// Packed F register. The low nibble always reads 0.
    pub const fn to_byte(self) -> u8 {
        (if self.z { FLAG_Z } else { 0 })
            | (if self.n { FLAG_N } else { 0 })
            | (if self.h { FLAG_H } else { 0 })
            | (if self.c { FLAG_C } else { 0 })
    }

    pub const fn from_byte(f: u8) -> Self {
        Self {
            z: f & FLAG_Z != 0,
            n: f & FLAG_N != 0,
            h: f & FLAG_H != 0,
            c: f & FLAG_C != 0,
        }
    }
}

/// 8-bit register names, in the order opcodes encode them (minus `(HL)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
}

/// 8-bit operand selected by a 3-bit opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Reg(R8),
    /// Memory at HL.
    HlIndirect,
}

const OPERAND_TABLE: [Operand8; 8] = [
    Operand8::Reg(R8::B),
    Operand8::Reg(R8::C),
    Operand8::Reg(R8::D),
    Operand8::Reg(R8::E),
    Operand8::Reg(R8::H),
    Operand8::Reg(R8::L),
    Operand8::HlIndirect,
    Operand8::Reg(R8::A),
];

impl Operand8 {
    #[inline]
    pub const fn decode(index: u8) -> Self {
        OPERAND_TABLE[(index & 0x07) as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    Pc,
}

impl R16 {
    /// `rp` table: register pairs addressed by LD/INC/DEC/ADD.
    pub const fn rp(p: u8) -> Self {
        match p & 0x03 {
            0 => R16::Bc,
            1 => R16::De,
            2 => R16::Hl,
            _ => R16::Sp,
        }
    }

    /// `rp2` table: register pairs addressed by PUSH/POP.
    pub const fn rp2(p: u8) -> Self {
        match p & 0x03 {
            0 => R16::Bc,
            1 => R16::De,
            2 => R16::Hl,
            _ => R16::Af,
        }
    }
}

/// Branch conditions selected by a 2-bit opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Nz,
    Z,
    Nc,
    C,
}

impl Condition {
    pub const fn decode(index: u8) -> Self {
        match index & 0x03 {
            0 => Condition::Nz,
            1 => Condition::Z,
            2 => Condition::Nc,
            _ => Condition::C,
        }
    }

    pub const fn holds(self, flags: Flags) -> bool {
        match self {
            Condition::Nz => !flags.z,
            Condition::Z => flags.z,
            Condition::Nc => !flags.c,
            Condition::C => flags.c,
        }
    }
}

/// Architectural register file plus the Z/W scratch pair used mid-instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub z: u8,
    pub w: u8,
}

impl Registers {
    /// Post-boot DMG register state (gbdev.io/pandocs/Power_Up_State.html).
    pub fn post_boot() -> Self {
        let mut regs = Self {
            sp: 0xFFFE,
            pc: 0x0100,
            ..Self::default()
        };
        regs.set16(R16::Af, 0x01B0);
        regs.set16(R16::Bc, 0x0013);
        regs.set16(R16::De, 0x00D8);
        regs.set16(R16::Hl, 0x014D);
        regs
    }

    #[inline]
    pub fn get(&self, r: R8) -> u8 {
        match r {
            R8::B => self.b,
            R8::C => self.c,
            R8::D => self.d,
            R8::E => self.e,
            R8::H => self.h,
            R8::L => self.l,
            R8::A => self.a,
        }
    }

    #[inline]
    pub fn set(&mut self, r: R8, val: u8) {
        match r {
            R8::B => self.b = val,
            R8::C => self.c = val,
            R8::D => self.d = val,
            R8::E => self.e = val,
            R8::H => self.h = val,
            R8::L => self.l = val,
            R8::A => self.a = val,
        }
    }

    pub fn get16(&self, rr: R16) -> u16 {
        match rr {
            R16::Bc => u16::from_be_bytes([self.b, self.c]),
            R16::De => u16::from_be_bytes([self.d, self.e]),
            R16::Hl => u16::from_be_bytes([self.h, self.l]),
            R16::Af => u16::from_be_bytes([self.a, self.f.to_byte()]),
            R16::Sp => self.sp,
            R16::Pc => self.pc,
        }
    }

    pub fn set16(&mut self, rr: R16, val: u16) {
        let [hi, lo] = val.to_be_bytes();
        match rr {
            R16::Bc => (self.b, self.c) = (hi, lo),
            R16::De => (self.d, self.e) = (hi, lo),
            R16::Hl => (self.h, self.l) = (hi, lo),
            R16::Af => (self.a, self.f) = (hi, Flags::from_byte(lo)),
            R16::Sp => self.sp = val,
            R16::Pc => self.pc = val,
        }
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        self.get16(R16::Hl)
    }

    #[inline]
    pub fn wz(&self) -> u16 {
        u16::from_be_bytes([self.w, self.z])
    }

    pub fn set_wz(&mut self, val: u16) {
        [self.w, self.z] = val.to_be_bytes();
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X}",
            self.a,
            self.f.to_byte(),
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_high_byte_first() {
        let mut regs = Registers::default();
        regs.set16(R16::De, 0xBEEF);
        assert_eq!((regs.d, regs.e), (0xBE, 0xEF));
        regs.set(R8::H, 0x12);
        regs.set(R8::L, 0x34);
        assert_eq!(regs.hl(), 0x1234);
    }

    #[test]
    fn af_drops_low_flag_nibble() {
        let mut regs = Registers::default();
        regs.set16(R16::Af, 0x12FF);
        assert_eq!(regs.get16(R16::Af), 0x12F0);
        assert_eq!(regs.f, Flags::new(true, true, true, true));
    }

    #[test]
    fn operand_table_matches_opcode_layout() {
        assert_eq!(Operand8::decode(0), Operand8::Reg(R8::B));
        assert_eq!(Operand8::decode(6), Operand8::HlIndirect);
        assert_eq!(Operand8::decode(7), Operand8::Reg(R8::A));
    }

    #[test]
    fn post_boot_state() {
        let regs = Registers::post_boot();
        assert_eq!(regs.get16(R16::Af), 0x01B0);
        assert_eq!(regs.get16(R16::Bc), 0x0013);
        assert_eq!(regs.get16(R16::De), 0x00D8);
        assert_eq!(regs.hl(), 0x014D);
        assert_eq!((regs.sp, regs.pc), (0xFFFE, 0x0100));
    }
}
