//! Pure arithmetic primitives. Every function returns the result together with
//! the complete flag set it defines; callers decide which flags to keep.

use crate::registers::Flags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult<T = u8> {
    pub value: T,
    pub flags: Flags,
}

/// Accumulator operations selected by the `y` field of `x=2` and `x=3,z=6` opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

impl AluOp {
    pub const fn decode(y: u8) -> Self {
        match y & 0x07 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbc,
            4 => AluOp::And,
            5 => AluOp::Xor,
            6 => AluOp::Or,
            _ => AluOp::Cp,
        }
    }

    /// Apply to the accumulator. CP leaves `a` unchanged.
    pub fn apply(self, a: u8, operand: u8, carry: bool) -> AluResult {
        match self {
            AluOp::Add => add8(a, operand, false),
            AluOp::Adc => add8(a, operand, carry),
            AluOp::Sub => sub8(a, operand, false),
            AluOp::Sbc => sub8(a, operand, carry),
            AluOp::And => and8(a, operand),
            AluOp::Xor => xor8(a, operand),
            AluOp::Or => or8(a, operand),
            AluOp::Cp => AluResult {
                value: a,
                flags: sub8(a, operand, false).flags,
            },
        }
    }
}

/// Rotate/shift operations of the CB table (`x=0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

impl RotOp {
    pub const fn decode(y: u8) -> Self {
        match y & 0x07 {
            0 => RotOp::Rlc,
            1 => RotOp::Rrc,
            2 => RotOp::Rl,
            3 => RotOp::Rr,
            4 => RotOp::Sla,
            5 => RotOp::Sra,
            6 => RotOp::Swap,
            _ => RotOp::Srl,
        }
    }

    pub fn apply(self, val: u8, carry: bool) -> AluResult {
        let carry_in = u8::from(carry);
        let (value, carry_out) = match self {
            RotOp::Rlc => (val.rotate_left(1), val & 0x80 != 0),
            RotOp::Rrc => (val.rotate_right(1), val & 0x01 != 0),
            RotOp::Rl => ((val << 1) | carry_in, val & 0x80 != 0),
            RotOp::Rr => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            RotOp::Sla => (val << 1, val & 0x80 != 0),
            RotOp::Sra => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            RotOp::Swap => (val.rotate_left(4), false),
            RotOp::Srl => (val >> 1, val & 0x01 != 0),
        };
        AluResult {
            value,
            flags: Flags::new(value == 0, false, false, carry_out),
        }
    }
}

pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let value = wide as u8;
    AluResult {
        value,
        flags: Flags::new(
            value == 0,
            false,
            (a & 0x0F) + (b & 0x0F) + c > 0x0F,
            wide > 0xFF,
        ),
    }
}

pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let value = a.wrapping_sub(b).wrapping_sub(c);
    AluResult {
        value,
        flags: Flags::new(
            value == 0,
            true,
            (a & 0x0F) < (b & 0x0F) + c,
            u16::from(a) < u16::from(b) + u16::from(c),
        ),
    }
}

pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult {
        value,
        flags: Flags::new(value == 0, false, true, false),
    }
}

pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult {
        value,
        flags: Flags::new(value == 0, false, false, false),
    }
}

pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult {
        value,
        flags: Flags::new(value == 0, false, false, false),
    }
}

/// INC r: carry is passed through untouched.
pub fn inc8(val: u8, carry: bool) -> AluResult {
    let value = val.wrapping_add(1);
    AluResult {
        value,
        flags: Flags::new(value == 0, false, val & 0x0F == 0x0F, carry),
    }
}

/// DEC r: carry is passed through untouched.
pub fn dec8(val: u8, carry: bool) -> AluResult {
    let value = val.wrapping_sub(1);
    AluResult {
        value,
        flags: Flags::new(value == 0, true, val & 0x0F == 0, carry),
    }
}

/// ADD HL,rr: half-carry out of bit 11, carry out of bit 15, zero kept.
pub fn add16(a: u16, b: u16, zero: bool) -> AluResult<u16> {
    let wide = u32::from(a) + u32::from(b);
    AluResult {
        value: wide as u16,
        flags: Flags::new(zero, false, (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF, wide > 0xFFFF),
    }
}

/// SP plus a signed offset, as used by `ADD SP,e` and `LD HL,SP+e`.
/// Flags come from the unsigned low-byte addition.
pub fn add_sp_offset(sp: u16, offset: u8) -> AluResult<u16> {
    let value = sp.wrapping_add(offset as i8 as i16 as u16);
    let low = sp & 0x00FF;
    let offset = u16::from(offset);
    AluResult {
        value,
        flags: Flags::new(
            false,
            false,
            (low & 0x0F) + (offset & 0x0F) > 0x0F,
            low + offset > 0xFF,
        ),
    }
}

/// Decimal-adjust the accumulator after a BCD add or subtract.
pub fn daa(a: u8, flags: Flags) -> AluResult {
    let mut correction = 0u8;
    let mut carry = flags.c;
    if flags.h || (!flags.n && (a & 0x0F) > 0x09) {
        correction |= 0x06;
    }
    if flags.c || (!flags.n && a > 0x99) {
        correction |= 0x60;
        carry = true;
    }
    let value = if flags.n {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    AluResult {
        value,
        flags: Flags::new(value == 0, flags.n, false, carry),
    }
}

/// BIT b,r: only flags are produced.
pub fn bit(index: u8, val: u8, carry: bool) -> Flags {
    Flags::new(val & (1 << (index & 0x07)) == 0, false, true, carry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add8_flags_exhaustive() {
        for x in 0..=0xFFu8 {
            for y in 0..=0xFFu8 {
                let r = add8(x, y, false);
                let sum = x as u16 + y as u16;
                assert_eq!(r.value, sum as u8);
                assert_eq!(r.flags.z, sum & 0xFF == 0, "z {x:02X}+{y:02X}");
                assert_eq!(r.flags.h, (x & 0x0F) + (y & 0x0F) > 0x0F, "h {x:02X}+{y:02X}");
                assert_eq!(r.flags.c, sum > 0xFF, "c {x:02X}+{y:02X}");
                assert!(!r.flags.n);
            }
        }
    }

    #[test]
    fn sub8_flags_exhaustive() {
        for x in 0..=0xFFu8 {
            for y in 0..=0xFFu8 {
                let r = sub8(x, y, false);
                assert_eq!(r.value, x.wrapping_sub(y));
                assert_eq!(r.flags.z, x == y);
                assert_eq!(r.flags.h, (x & 0x0F) < (y & 0x0F), "h {x:02X}-{y:02X}");
                assert_eq!(r.flags.c, x < y, "c {x:02X}-{y:02X}");
                assert!(r.flags.n);
            }
        }
    }

    #[test]
    fn carry_in_participates() {
        let r = add8(0x0F, 0x00, true);
        assert_eq!(r.value, 0x10);
        assert!(r.flags.h);
        let r = add8(0xFF, 0x00, true);
        assert_eq!(r.value, 0);
        assert!(r.flags.z && r.flags.c);
        let r = sub8(0x00, 0x00, true);
        assert_eq!(r.value, 0xFF);
        assert!(r.flags.h && r.flags.c);
    }

    #[test]
    fn cp_keeps_accumulator() {
        let r = AluOp::Cp.apply(0x10, 0x20, false);
        assert_eq!(r.value, 0x10);
        assert!(r.flags.c && r.flags.n);
    }

    #[test]
    fn add16_uses_bit_11_and_15() {
        let r = add16(0x0FFF, 0x0001, true);
        assert_eq!(r.value, 0x1000);
        assert!(r.flags.h && !r.flags.c && r.flags.z);
        let r = add16(0xFFFF, 0x0001, false);
        assert_eq!(r.value, 0);
        assert!(r.flags.h && r.flags.c && !r.flags.z);
    }

    #[test]
    fn sp_offset_flags_from_low_byte() {
        let r = add_sp_offset(0x00FF, 0x01);
        assert_eq!(r.value, 0x0100);
        assert!(r.flags.h && r.flags.c);
        let r = add_sp_offset(0x1000, 0xFF);
        assert_eq!(r.value, 0x0FFF);
        assert!(!r.flags.h && !r.flags.c && !r.flags.z);
    }

    #[test]
    fn inc_dec_half_carry_and_carry_passthrough() {
        let r = inc8(0x0F, true);
        assert_eq!(r.value, 0x10);
        assert!(r.flags.h && r.flags.c);
        let r = dec8(0x10, false);
        assert_eq!(r.value, 0x0F);
        assert!(r.flags.h && r.flags.n && !r.flags.c);
        assert!(dec8(0x01, false).flags.z);
    }

    #[test]
    fn daa_after_bcd_add_and_sub() {
        let sum = add8(0x45, 0x38, false);
        let adj = daa(sum.value, sum.flags);
        assert_eq!(adj.value, 0x83);
        assert!(!adj.flags.c);

        let sum = add8(0x99, 0x01, false);
        let adj = daa(sum.value, sum.flags);
        assert_eq!(adj.value, 0x00);
        assert!(adj.flags.z && adj.flags.c);

        let diff = sub8(0x42, 0x15, false);
        let adj = daa(diff.value, diff.flags);
        assert_eq!(adj.value, 0x27);
    }

    #[test]
    fn rotates_move_carry() {
        assert_eq!(RotOp::Rl.apply(0x80, true).value, 0x01);
        assert!(RotOp::Rl.apply(0x80, true).flags.c);
        assert_eq!(RotOp::Rr.apply(0x01, true).value, 0x80);
        assert_eq!(RotOp::Sra.apply(0x81, false).value, 0xC0);
        assert_eq!(RotOp::Swap.apply(0xF1, true).value, 0x1F);
        assert!(!RotOp::Swap.apply(0xF1, true).flags.c);
        assert!(RotOp::Srl.apply(0x01, false).flags.z);
    }

    #[test]
    fn bit_test_preserves_carry() {
        assert!(bit(7, 0x7F, true).z);
        assert!(bit(7, 0x7F, true).c);
        assert!(!bit(0, 0x01, false).z);
    }
}
