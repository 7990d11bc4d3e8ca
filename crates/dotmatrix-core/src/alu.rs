//! Flag arithmetic shared by the primary and CB-prefixed instructions.
//!
//! Every function is pure: it takes operand values plus the current flag
//! byte where a result depends on or preserves it, and returns
//! `(result, flags)`.

pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

#[inline]
fn z(val: u8) -> u8 {
    if val == 0 { FLAG_Z } else { 0 }
}

#[inline]
fn flag(cond: bool, bit: u8) -> u8 {
    if cond { bit } else { 0 }
}

pub fn add8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = carry as u16;
    let wide = a as u16 + b as u16 + c;
    let res = wide as u8;
    let h = (a & 0x0F) + (b & 0x0F) + c as u8 > 0x0F;
    (res, z(res) | flag(h, FLAG_H) | flag(wide > 0xFF, FLAG_C))
}

pub fn sub8(a: u8, b: u8, carry: bool) -> (u8, u8) {
    let c = carry as u8;
    let res = a.wrapping_sub(b).wrapping_sub(c);
    let h = (a & 0x0F) < (b & 0x0F) + c;
    let borrow = (a as u16) < b as u16 + c as u16;
    (
        res,
        z(res) | FLAG_N | flag(h, FLAG_H) | flag(borrow, FLAG_C),
    )
}

pub fn and8(a: u8, b: u8) -> (u8, u8) {
    let res = a & b;
    (res, z(res) | FLAG_H)
}

pub fn or8(a: u8, b: u8) -> (u8, u8) {
    let res = a | b;
    (res, z(res))
}

pub fn xor8(a: u8, b: u8) -> (u8, u8) {
    let res = a ^ b;
    (res, z(res))
}

/// INC r: Carry is carried over from `flags` untouched.
pub fn inc8(val: u8, flags: u8) -> (u8, u8) {
    let res = val.wrapping_add(1);
    (
        res,
        (flags & FLAG_C) | z(res) | flag(val & 0x0F == 0x0F, FLAG_H),
    )
}

/// DEC r: Carry is carried over from `flags` untouched.
pub fn dec8(val: u8, flags: u8) -> (u8, u8) {
    let res = val.wrapping_sub(1);
    (
        res,
        (flags & FLAG_C) | z(res) | FLAG_N | flag(val & 0x0F == 0, FLAG_H),
    )
}

/// ADD HL,rr: Zero is preserved, carries come out of bits 11 and 15.
pub fn add16(hl: u16, val: u16, flags: u8) -> (u16, u8) {
    let (res, carry) = hl.overflowing_add(val);
    let h = (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF;
    (
        res,
        (flags & FLAG_Z) | flag(h, FLAG_H) | flag(carry, FLAG_C),
    )
}

/// SP plus a signed offset, as used by ADD SP,e8 and LD HL,SP+e8.
/// Carries are taken from the unsigned low byte addition.
pub fn add_sp_offset(sp: u16, offset: i8) -> (u16, u8) {
    let res = sp.wrapping_add(offset as i16 as u16);
    let b = offset as u8 as u16;
    let h = (sp & 0x000F) + (b & 0x000F) > 0x000F;
    let c = (sp & 0x00FF) + b > 0x00FF;
    (res, flag(h, FLAG_H) | flag(c, FLAG_C))
}

/// Decimal adjust after a BCD add or subtract.
pub fn daa(a: u8, flags: u8) -> (u8, u8) {
    let mut adjust = 0u8;
    let mut carry = flags & FLAG_C != 0;
    if flags & FLAG_N == 0 {
        if flags & FLAG_H != 0 || a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        if carry || a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        let res = a.wrapping_add(adjust);
        (res, z(res) | flag(carry, FLAG_C))
    } else {
        if flags & FLAG_H != 0 {
            adjust |= 0x06;
        }
        if carry {
            adjust |= 0x60;
        }
        let res = a.wrapping_sub(adjust);
        (res, z(res) | FLAG_N | flag(carry, FLAG_C))
    }
}

pub fn rlc(val: u8) -> (u8, u8) {
    let res = val.rotate_left(1);
    (res, z(res) | flag(val & 0x80 != 0, FLAG_C))
}

pub fn rrc(val: u8) -> (u8, u8) {
    let res = val.rotate_right(1);
    (res, z(res) | flag(val & 0x01 != 0, FLAG_C))
}

pub fn rl(val: u8, flags: u8) -> (u8, u8) {
    let res = (val << 1) | u8::from(flags & FLAG_C != 0);
    (res, z(res) | flag(val & 0x80 != 0, FLAG_C))
}

pub fn rr(val: u8, flags: u8) -> (u8, u8) {
    let res = (val >> 1) | if flags & FLAG_C != 0 { 0x80 } else { 0 };
    (res, z(res) | flag(val & 0x01 != 0, FLAG_C))
}

pub fn sla(val: u8) -> (u8, u8) {
    let res = val << 1;
    (res, z(res) | flag(val & 0x80 != 0, FLAG_C))
}

pub fn sra(val: u8) -> (u8, u8) {
    let res = (val >> 1) | (val & 0x80);
    (res, z(res) | flag(val & 0x01 != 0, FLAG_C))
}

pub fn srl(val: u8) -> (u8, u8) {
    let res = val >> 1;
    (res, z(res) | flag(val & 0x01 != 0, FLAG_C))
}

pub fn swap(val: u8) -> (u8, u8) {
    let res = val.rotate_left(4);
    (res, z(res))
}

/// BIT n,r only touches flags; Carry survives.
pub fn bit(n: u8, val: u8, flags: u8) -> u8 {
    (flags & FLAG_C) | FLAG_H | z(val & (1 << n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_dec_round_trip_keeps_carry() {
        for carry in [0, FLAG_C] {
            for a in 0..=255u8 {
                let (up, f1) = inc8(a, carry);
                let (back, f2) = dec8(up, f1);
                assert_eq!(back, a);
                assert_eq!(f1 & FLAG_C, carry);
                assert_eq!(f2 & FLAG_C, carry);
            }
        }
    }

    #[test]
    fn inc_dec_half_carry_edges() {
        assert_eq!(inc8(0x0F, 0), (0x10, FLAG_H));
        assert_eq!(inc8(0xFF, 0), (0x00, FLAG_Z | FLAG_H));
        assert_eq!(dec8(0x10, 0), (0x0F, FLAG_N | FLAG_H));
        assert_eq!(dec8(0x01, FLAG_C), (0x00, FLAG_Z | FLAG_N | FLAG_C));
    }

    #[test]
    fn add_and_sub_carry_rules() {
        assert_eq!(add8(0x3A, 0xC6, false), (0x00, FLAG_Z | FLAG_H | FLAG_C));
        assert_eq!(add8(0x0E, 0x01, true), (0x10, FLAG_H));
        assert_eq!(sub8(0x3E, 0x3E, false), (0x00, FLAG_Z | FLAG_N));
        assert_eq!(sub8(0x3E, 0x0F, false), (0x2F, FLAG_N | FLAG_H));
        assert_eq!(sub8(0x3B, 0x4F, true), (0xEB, FLAG_N | FLAG_H | FLAG_C));
        // borrow out of the carry-in alone
        assert_eq!(sub8(0x00, 0xFF, true), (0x00, FLAG_Z | FLAG_N | FLAG_H | FLAG_C));
    }

    #[test]
    fn logic_flags() {
        assert_eq!(and8(0xF0, 0x0F), (0x00, FLAG_Z | FLAG_H));
        assert_eq!(or8(0x00, 0x00), (0x00, FLAG_Z));
        assert_eq!(xor8(0xFF, 0x0F), (0xF0, 0));
    }

    #[test]
    fn daa_after_bcd_add() {
        let (sum, f) = add8(0x19, 0x26, false);
        assert_eq!(daa(sum, f), (0x45, 0));

        let (sum, f) = add8(0x90, 0x90, false);
        let (res, f) = daa(sum, f);
        assert_eq!(res, 0x80);
        assert_ne!(f & FLAG_C, 0);

        let (sum, f) = add8(0x99, 0x01, false);
        assert_eq!(daa(sum, f), (0x00, FLAG_Z | FLAG_C));
    }

    #[test]
    fn daa_after_bcd_sub() {
        let (diff, f) = sub8(0x45, 0x26, false);
        assert_eq!(daa(diff, f), (0x19, FLAG_N));

        let (diff, f) = sub8(0x10, 0x20, false);
        assert_eq!(daa(diff, f), (0x90, FLAG_N | FLAG_C));
    }

    #[test]
    fn sixteen_bit_adds() {
        assert_eq!(add16(0x0FFF, 0x0001, FLAG_Z), (0x1000, FLAG_Z | FLAG_H));
        assert_eq!(add16(0xFFFF, 0x0001, 0), (0x0000, FLAG_H | FLAG_C));
        assert_eq!(add_sp_offset(0xFFF8, 0x08), (0x0000, FLAG_H | FLAG_C));
        assert_eq!(add_sp_offset(0x0001, -1), (0x0000, FLAG_H | FLAG_C));
        assert_eq!(add_sp_offset(0x1000, -1), (0x0FFF, 0));
    }

    #[test]
    fn rotates_and_shifts() {
        assert_eq!(rlc(0x80), (0x01, FLAG_C));
        assert_eq!(rl(0x80, 0), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(rr(0x01, FLAG_C), (0x80, FLAG_C));
        assert_eq!(sra(0x81), (0xC0, FLAG_C));
        assert_eq!(srl(0x01), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(swap(0xF1), (0x1F, 0));
        assert_eq!(bit(7, 0x7F, FLAG_C), FLAG_Z | FLAG_H | FLAG_C);
    }
}
