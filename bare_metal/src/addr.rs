//! Distinct types for physical and virtual addresses.

use core::fmt;
use core::ops;

use super::align::Alignable;

/// A virtual address, meaningful only under a particular page mapping.
#[repr(transparent)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Hash, Default)]
pub struct VirtAddr(pub usize);

/// A physical address. Software reaches it through some virtual mapping.
#[repr(transparent)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Hash, Default)]
pub struct PhysAddr(pub usize);

impl VirtAddr {
    pub fn as_ptr<T>(self) -> *const T {
        self.0 as *const T
    }

    pub fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Whether bits 48..64 are copies of bit 47, as the CPU requires for any access.
    pub fn is_canonical(self) -> bool {
        let upper = self.0 >> 47;
        upper == 0 || upper == (usize::MAX >> 47)
    }
}

macro_rules! address_ops {
    ($addr:ident, $suffix:expr) => {
        impl Alignable for $addr {
            type Alignment = usize;

            fn align_up(self, alignment: usize) -> $addr {
                $addr(self.0.align_up(alignment))
            }

            fn align_down(self, alignment: usize) -> $addr {
                $addr(self.0.align_down(alignment))
            }

            fn is_aligned(self, alignment: usize) -> bool {
                self.0.is_aligned(alignment)
            }
        }

        impl ops::Add<usize> for $addr {
            type Output = $addr;

            fn add(self, offset: usize) -> $addr {
                $addr(self.0 + offset)
            }
        }

        impl ops::AddAssign<usize> for $addr {
            fn add_assign(&mut self, offset: usize) {
                self.0 += offset;
            }
        }

        /// Distance in bytes between two addresses.
        impl ops::Sub<$addr> for $addr {
            type Output = usize;

            fn sub(self, base: $addr) -> usize {
                self.0 - base.0
            }
        }

        impl fmt::Pointer for $addr {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{:#x}{}", self.0, $suffix)
            }
        }
    };
}

address_ops!(VirtAddr, "v");
address_ops!(PhysAddr, "p");

#[cfg(test)]
mod test {
    use super::*;
    use std::format;

    #[test]
    fn alignment_and_offsets() {
        let a = VirtAddr(0x40_1234);
        assert_eq!(a.align_down(4096), VirtAddr(0x40_1000));
        assert_eq!(a.align_up(4096), VirtAddr(0x40_2000));
        assert!(!a.is_aligned(4096));
        assert!(PhysAddr(0x20_0000).is_aligned(4096));
        assert_eq!(PhysAddr(0x20_0000) + 0x30, PhysAddr(0x20_0030));
        assert_eq!(VirtAddr(0x40_2000) - VirtAddr(0x40_1000), 0x1000);
    }

    #[test]
    fn canonical_addresses() {
        assert!(VirtAddr(0).is_canonical());
        assert!(VirtAddr(0x0000_7FFF_FFFF_FFFF).is_canonical());
        assert!(VirtAddr(0xFFFF_8000_0000_0000).is_canonical());
        assert!(!VirtAddr(0x0000_8000_0000_0000).is_canonical());
        assert!(!VirtAddr(0xFFFF_0000_0000_0000).is_canonical());
    }

    #[test]
    fn pointer_format() {
        assert_eq!(format!("{:p}", PhysAddr(0x1000)), "0x1000p");
        assert_eq!(format!("{:p}", VirtAddr(0x40_0000)), "0x400000v");
    }
}
