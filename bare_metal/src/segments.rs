/// Selector of a GDT segment: table offset plus requested privilege level.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct Selector(pub u16);

impl Selector {
    /// The 64 bit code segment the boot code loads before entering the kernel.
    pub const KERNEL_CODE: Selector = Selector(0x08);

    pub fn requested_privilege(self) -> Ring {
        Ring((self.0 & 0b11) as u8)
    }
}

/// CPU privilege level, 0 for the kernel and 3 for user code.
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug)]
pub struct Ring(u8);

impl Ring {
    pub const RING0: Ring = Ring(0);
    pub const RING3: Ring = Ring(3);

    pub fn new(level: u8) -> Option<Ring> {
        (level <= 3).then(|| Ring(level))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rings() {
        assert_eq!(Ring::new(3), Some(Ring::RING3));
        assert_eq!(Ring::new(4), None);
        assert_eq!(Selector::KERNEL_CODE.requested_privilege(), Ring::RING0);
        assert_eq!(Selector(0x1B).requested_privilege(), Ring::RING3);
    }
}
