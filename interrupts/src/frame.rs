/// CPU state saved by the trap entry stubs, lowest address first.
///
/// The stubs push the general purpose registers on top of the vector number and
/// the error code (zero for vectors without one). Everything from `rip` on was
/// pushed by the processor itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub vector: u64,
    pub error_code: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

assert_eq_size!(TrapFrame, [u64; 22]);

/// Byte offset of `vector` in the frame, as seen by the entry stubs.
pub const VECTOR_OFFSET: usize = 15 * 8;

const_assert_eq!(core::mem::size_of::<TrapFrame>() - VECTOR_OFFSET, 7 * 8);

impl TrapFrame {
    /// A frame as it would be captured for the given vector, all registers zero.
    pub fn for_vector(vector: u8) -> TrapFrame {
        TrapFrame { vector: vector as u64, ..TrapFrame::default() }
    }
}
