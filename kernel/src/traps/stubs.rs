//! Entry stubs for vectors 0-47.
//!
//! Each stub brings the stack into the shape of a `TrapFrame`: vectors without a
//! hardware error code push a zero in its place, then the vector number is pushed.
//! The common part saves all general purpose registers and calls into Rust with a
//! pointer to the frame.

use core::arch::naked_asm;

use interrupts::{EntryStub, STUB_COUNT};

use super::trap_entry;

macro_rules! trap_stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym trap_common,
            )
        }
    };
    ($name:ident, $vector:literal, error_code) => {
        #[unsafe(naked)]
        unsafe extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {common}",
                vector = const $vector,
                common = sym trap_common,
            )
        }
    };
}

#[unsafe(naked)]
unsafe extern "C" fn trap_common() {
    naked_asm!(
        "cld",
        "push rax", "push rbx", "push rcx", "push rdx", "push rsi", "push rdi", "push rbp",
        "push r8", "push r9", "push r10", "push r11", "push r12", "push r13", "push r14", "push r15",
        // rsp now points at the frame
        "mov rdi, rsp",
        // rbx survives the call, use it to undo the alignment
        "mov rbx, rsp",
        "and rsp, -16",
        "call {entry}",
        "mov rsp, rbx",
        "pop r15", "pop r14", "pop r13", "pop r12", "pop r11", "pop r10", "pop r9", "pop r8",
        "pop rbp", "pop rdi", "pop rsi", "pop rdx", "pop rcx", "pop rbx", "pop rax",
        // drop vector and error code
        "add rsp, 16",
        "iretq",
        entry = sym trap_entry,
    )
}

trap_stub!(stub_0, 0);
trap_stub!(stub_1, 1);
trap_stub!(stub_2, 2);
trap_stub!(stub_3, 3);
trap_stub!(stub_4, 4);
trap_stub!(stub_5, 5);
trap_stub!(stub_6, 6);
trap_stub!(stub_7, 7);
trap_stub!(stub_8, 8, error_code);
trap_stub!(stub_9, 9);
trap_stub!(stub_10, 10, error_code);
trap_stub!(stub_11, 11, error_code);
trap_stub!(stub_12, 12, error_code);
trap_stub!(stub_13, 13, error_code);
trap_stub!(stub_14, 14, error_code);
trap_stub!(stub_15, 15);
trap_stub!(stub_16, 16);
trap_stub!(stub_17, 17, error_code);
trap_stub!(stub_18, 18);
trap_stub!(stub_19, 19);
trap_stub!(stub_20, 20);
trap_stub!(stub_21, 21, error_code);
trap_stub!(stub_22, 22);
trap_stub!(stub_23, 23);
trap_stub!(stub_24, 24);
trap_stub!(stub_25, 25);
trap_stub!(stub_26, 26);
trap_stub!(stub_27, 27);
trap_stub!(stub_28, 28);
trap_stub!(stub_29, 29, error_code);
trap_stub!(stub_30, 30, error_code);
trap_stub!(stub_31, 31);
trap_stub!(stub_32, 32);
trap_stub!(stub_33, 33);
trap_stub!(stub_34, 34);
trap_stub!(stub_35, 35);
trap_stub!(stub_36, 36);
trap_stub!(stub_37, 37);
trap_stub!(stub_38, 38);
trap_stub!(stub_39, 39);
trap_stub!(stub_40, 40);
trap_stub!(stub_41, 41);
trap_stub!(stub_42, 42);
trap_stub!(stub_43, 43);
trap_stub!(stub_44, 44);
trap_stub!(stub_45, 45);
trap_stub!(stub_46, 46);
trap_stub!(stub_47, 47);

/// Stubs in vector order.
pub static STUBS: [EntryStub; STUB_COUNT] = [
    stub_0, stub_1, stub_2, stub_3, stub_4, stub_5, stub_6, stub_7,
    stub_8, stub_9, stub_10, stub_11, stub_12, stub_13, stub_14, stub_15,
    stub_16, stub_17, stub_18, stub_19, stub_20, stub_21, stub_22, stub_23,
    stub_24, stub_25, stub_26, stub_27, stub_28, stub_29, stub_30, stub_31,
    stub_32, stub_33, stub_34, stub_35, stub_36, stub_37, stub_38, stub_39,
    stub_40, stub_41, stub_42, stub_43, stub_44, stub_45, stub_46, stub_47,
];
