/// Rounding of addresses and sizes to power of two boundaries.
///
/// An alignment of zero leaves the value unchanged. Any other alignment must
/// be a power of two.
pub trait Alignable: Sized {
    type Alignment;

    /// The smallest multiple of `alignment` that is not below `self`.
    fn align_up(self, alignment: Self::Alignment) -> Self;

    /// The largest multiple of `alignment` that is not above `self`.
    fn align_down(self, alignment: Self::Alignment) -> Self;

    fn is_aligned(self, alignment: Self::Alignment) -> bool;
}

/// `align_up` that reports overflow instead of wrapping to zero.
pub trait CheckedAlign: Sized {
    fn checked_align_up(self, alignment: Self) -> Option<Self>;
}

macro_rules! impl_align {
    ($($int:ty),*) => {$(
        impl Alignable for $int {
            type Alignment = $int;

            fn align_up(self, alignment: $int) -> $int {
                match alignment_mask(alignment as u64) {
                    None => self,
                    Some(mask) => self.wrapping_add(mask as $int) & !(mask as $int),
                }
            }

            fn align_down(self, alignment: $int) -> $int {
                match alignment_mask(alignment as u64) {
                    None => self,
                    Some(mask) => self & !(mask as $int),
                }
            }

            fn is_aligned(self, alignment: $int) -> bool {
                alignment_mask(alignment as u64).map_or(true, |mask| (self & mask as $int) == 0)
            }
        }

        impl CheckedAlign for $int {
            fn checked_align_up(self, alignment: $int) -> Option<$int> {
                match alignment_mask(alignment as u64) {
                    None => Some(self),
                    Some(mask) => self.checked_add(mask as $int).map(|v| v & !(mask as $int)),
                }
            }
        }
    )*};
}

/// `alignment - 1`, or `None` for a zero alignment.
fn alignment_mask(alignment: u64) -> Option<u64> {
    if alignment == 0 {
        return None;
    }
    assert!(alignment.is_power_of_two(), "alignment {} is not a power of two", alignment);
    Some(alignment - 1)
}

impl_align!(usize, u64);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(23_usize.align_down(8), 16);
        assert_eq!(24_usize.align_down(8), 24);
        assert_eq!(23_usize.align_up(8), 24);
        assert_eq!(24_usize.align_up(8), 24);
        assert_eq!(4097_u64.align_up(4096), 8192);
        assert!(0x3000_usize.is_aligned(4096));
        assert!(!0x3008_usize.is_aligned(16));

        assert_eq!(23_usize.align_up(0), 23);
        assert_eq!(u64::MAX.align_down(0), u64::MAX);
    }

    #[test]
    fn checked_align_up_does_not_wrap() {
        assert_eq!(100_usize.checked_align_up(16), Some(112));
        assert_eq!(usize::MAX.checked_align_up(16), None);
        assert_eq!((usize::MAX - 15).checked_align_up(16), Some(usize::MAX - 15));
    }

    #[test]
    #[should_panic]
    fn alignment_must_be_a_power_of_two() {
        let _ = 100_usize.align_up(24);
    }
}
