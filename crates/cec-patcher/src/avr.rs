//! AVR jump instructions
//!
//! `rjmp k`: `1100 kkkk kkkk kkkk`, jumps `k + 1` words from its own address. On a
//! 4 KiB part the jump wraps around the end of flash, so `k` is read as unsigned
//! and only a byte offset reaching bit 13 counts as negative.
//!
//! `jmp k`: `1001 010k kkkk 110k` followed by the low 16 bits of `k`, an absolute
//! 22 bit word address.

use crate::{Result, err::Error};

const RJMP: u16 = 0xc000;
const RJMP_MASK: u16 = 0xf000;
const RJMP_RANGE: core::ops::RangeInclusive<i64> = -2048..=2047;
/// Byte offsets with this bit set are sign extended
const RJMP_SIGN: u32 = 0x2000;

const JMP: u16 = 0x940c;
const JMP_MAX_WORD: u32 = (1 << 22) - 1;

/// Byte address an `rjmp` at `base` lands on
pub fn decode_rjmp(word: u16, base: u32) -> Result<u32> {
    if word & RJMP_MASK != RJMP {
        return Err(Error::NotRelativeJump(word));
    }

    let mut offset = ((word & 0xfff) as u32 + 1) * 2;
    if offset & RJMP_SIGN != 0 {
        offset |= !(RJMP_SIGN - 1);
    }
    Ok(base.wrapping_add(offset))
}

/// `rjmp` placed at `base` that lands on `dest`
pub fn encode_rjmp(dest: u32, base: u32) -> Result<u16> {
    for address in [dest, base] {
        if address % 2 != 0 {
            return Err(Error::UnalignedTarget(address));
        }
    }

    let k = (dest as i64 - base as i64) / 2 - 1;
    if !RJMP_RANGE.contains(&k) {
        return Err(Error::JumpOutOfRange {
            from: base,
            to: dest,
        });
    }

    Ok(RJMP | (k as u16 & 0xfff))
}

/// `jmp` to `dest` as it sits in flash
pub fn encode_jmp(dest: u32) -> Result<[u8; 4]> {
    if dest % 2 != 0 {
        return Err(Error::UnalignedTarget(dest));
    }

    let k = dest / 2;
    if k > JMP_MAX_WORD {
        return Err(Error::JumpOutOfRange { from: 0, to: dest });
    }

    let high = ((k >> 16) & 0x1) as u16 | (((k >> 17) & 0x1f) as u16) << 4;
    let [a, b] = (JMP | high).to_le_bytes();
    let [c, d] = (k as u16).to_le_bytes();
    Ok([a, b, c, d])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_forward_rjmp() {
        assert_eq!(decode_rjmp(0xc007, 0).unwrap(), 0x10);
        assert_eq!(decode_rjmp(0xc000, 0x100).unwrap(), 0x102);
    }

    #[test]
    fn test_decode_wraps_past_flash_end() {
        // Upper half of k reaches past 4 KiB and wraps back on the device
        assert_eq!(decode_rjmp(0xceff, 0).unwrap(), 0x1e00);
        assert_eq!(decode_rjmp(0xc800, 0).unwrap(), 0x1002);
        assert_eq!(decode_rjmp(0xc7ff, 0).unwrap(), 0x1000);
    }

    #[test]
    fn test_decode_sign_extends_bit_13() {
        assert_eq!(decode_rjmp(0xcfff, 0).unwrap(), 0xffff_e000);
        assert_eq!(decode_rjmp(0xcfff, 0x2000).unwrap(), 0);
    }

    #[test]
    fn test_decode_rejects_other_instructions() {
        assert!(matches!(
            decode_rjmp(0x940c, 0),
            Err(Error::NotRelativeJump(0x940c))
        ));
        assert!(decode_rjmp(0xffff, 0).is_err());
    }

    #[test]
    fn test_encode_bootloader_jump() {
        assert_eq!(encode_rjmp(0xec0, 0).unwrap(), 0xc75f);
    }

    #[test]
    fn test_rjmp_round_trip() {
        for dest in (2..=4096).step_by(2) {
            let word = encode_rjmp(dest, 0).unwrap();
            assert_eq!(decode_rjmp(word, 0).unwrap(), dest);
        }
        for dest in (0x1002..0x2000).step_by(2) {
            let word = encode_rjmp(dest, 0x1000).unwrap();
            assert_eq!(decode_rjmp(word, 0x1000).unwrap(), dest);
        }
    }

    #[test]
    fn test_rjmp_out_of_range() {
        assert!(matches!(
            encode_rjmp(4098, 0),
            Err(Error::JumpOutOfRange { from: 0, to: 4098 })
        ));
        assert!(encode_rjmp(0x1ec0, 0).is_err());
    }

    #[test]
    fn test_rjmp_unaligned() {
        assert!(matches!(
            encode_rjmp(0xec1, 0),
            Err(Error::UnalignedTarget(0xec1))
        ));
    }

    #[test]
    fn test_encode_jmp() {
        assert_eq!(encode_jmp(0x10).unwrap(), [0x0c, 0x94, 0x08, 0x00]);
        assert_eq!(encode_jmp(0x1ffe).unwrap(), [0x0c, 0x94, 0xff, 0x0f]);
    }

    #[test]
    fn test_jmp_trampoline_for_even_targets() {
        for target in (0..0x2_0000u32).step_by(0x2e) {
            let bytes = encode_jmp(target).unwrap();
            assert_eq!(&bytes[..2], &[0x0c, 0x94]);
            assert_eq!(&bytes[2..], &((target / 2) as u16).to_le_bytes());
        }
    }

    #[test]
    fn test_jmp_high_bits() {
        // k = 0x10000 sets the lowest of the high bits
        assert_eq!(encode_jmp(0x2_0000).unwrap(), [0x0d, 0x94, 0x00, 0x00]);
        assert!(encode_jmp(0x80_0000).is_err());
        assert!(encode_jmp(0x11).is_err());
    }
}
