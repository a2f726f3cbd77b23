//! Bit twiddling helpers used when decoding registers and instructions.

macro_rules! impl_bit {
    ($t:ident) => {
        impl Bit for $t {
            #[inline]
            fn bit(self, n: usize) -> bool {
                (self >> n) & 1 == 1
            }

            #[inline]
            fn bit_range(self, ls: usize, ms: usize) -> Self {
                let width = ms - ls + 1;
                if width >= Self::BITS as usize {
                    return self >> ls;
                }
                (self >> ls) & ((1 << width) - 1)
            }
        }

        impl BitSet for $t {
            #[inline]
            fn set_bit(self, bit: usize, val: bool) -> Self {
                (self & !(1 << bit)) | ((val as Self) << bit)
            }

            #[inline]
            fn set_bit_range(self, ls: usize, ms: usize, val: Self) -> Self {
                let width = ms - ls + 1;
                let mask = if width >= Self::BITS as usize {
                    Self::MAX
                } else {
                    (1 << width) - 1
                };
                (self & !(mask << ls)) | ((val & mask) << ls)
            }
        }
    }
}

impl_bit!(u32);
impl_bit!(u16);
impl_bit!(u8);

/// Extract bits from a value.
pub trait Bit {
    /// Extract a single bit.
    #[must_use]
    fn bit(self, n: usize) -> bool;

    /// Extract the bits between `ls` and `ms`, both inclusive, shifted down to bit 0.
    #[must_use]
    fn bit_range(self, ls: usize, ms: usize) -> Self;
}

/// Replace bits in a value.
pub trait BitSet {
    #[must_use]
    fn set_bit(self, bit: usize, val: bool) -> Self;

    #[must_use]
    fn set_bit_range(self, ls: usize, ms: usize, val: Self) -> Self;
}

/// Sign extend the lower 16 bits of `val` to 32 bits.
#[inline]
pub fn sign_extend_16(val: u32) -> u32 {
    val as u16 as i16 as i32 as u32
}

#[test]
fn bit_range() {
    assert_eq!(0xdead_beef_u32.bit_range(0, 15), 0xbeef);
    assert_eq!(0xdead_beef_u32.bit_range(16, 31), 0xdead);
    assert_eq!(0xdead_beef_u32.bit_range(0, 31), 0xdead_beef);
    assert_eq!(0b1010_u8.bit_range(1, 2), 0b01);
}

#[test]
fn set_bit_range() {
    assert_eq!(0_u32.set_bit_range(3, 4, 0b11), 0b11000);
    assert_eq!(0_u32.set_bit_range(0, 10, u32::MAX), 0b111_1111_1111);
    assert_eq!(0_u32.set_bit_range(0, 31, 0x1234_5678), 0x1234_5678);
    assert_eq!(0xffff_u16.set_bit_range(4, 7, 0), 0xff0f);
}

#[test]
fn set_bit() {
    assert_eq!(0_u32.set_bit(2, true), 0b100);
    assert_eq!(0b111_u32.set_bit(2, false), 0b011);
    assert!(0x8000_0000_u32.bit(31));
}

#[test]
fn sign_extend() {
    assert_eq!(sign_extend_16(0x8000), 0xffff_8000);
    assert_eq!(sign_extend_16(0x7fff), 0x0000_7fff);
    assert_eq!(sign_extend_16(0x1_ffff), 0xffff_ffff);
}
