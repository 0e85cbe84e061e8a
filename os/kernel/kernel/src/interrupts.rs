//! # Interrupt entry points
//!
//! Naked trampolines for every gate the kernel installs. Each one builds a
//! frame on the kernel stack and calls an ordinary `extern "C"` handler:
//!
//! | gate            | frame                | handler            |
//! |-----------------|----------------------|--------------------|
//! | exceptions 0-21 | [`TrapFrame`]        | [`fatal_trap`]     |
//! | `int 0x80`      | [`SyscallFrame`]     | [`syscall_entry`]  |
//! | keyboard IRQ    | caller-saved regs    | [`keyboard_irq`]   |
//!
//! The CPU aligns `rsp` to 16 bytes before pushing its five-word frame, so
//! the push counts below decide whether the `call` sees an aligned stack.

use crate::pic::{self, KEYBOARD_IRQ};
use crate::ports::inb;
use crate::state::{KERNEL, KernelContext};
use core::arch::naked_asm;
use kernel_interrupts::vectors::EXCEPTION_COUNT;
use kernel_interrupts::{FatalTrap, TrapFrame};
use kernel_syscall::{SYSCALL_FAILED, SyscallFrame, dispatch};
use log::error;

/// PS/2 controller data port.
const KEYBOARD_DATA_PORT: u16 = 0x60;

/// Defines an exception stub that completes the [`TrapFrame`] and jumps to
/// the shared tail. Vectors without a CPU error code get a zero in its place.
macro_rules! exception_stub {
    ($name:ident, $vector:literal) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push 0",
                "push {vector}",
                "jmp {tail}",
                vector = const $vector,
                tail = sym exception_tail,
            );
        }
    };
    ($name:ident, $vector:literal, error_code) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            naked_asm!(
                "push {vector}",
                "jmp {tail}",
                vector = const $vector,
                tail = sym exception_tail,
            );
        }
    };
}

exception_stub!(divide_error, 0);
exception_stub!(debug, 1);
exception_stub!(nmi, 2);
exception_stub!(breakpoint, 3);
exception_stub!(overflow, 4);
exception_stub!(bound_range, 5);
exception_stub!(invalid_opcode, 6);
exception_stub!(device_not_available, 7);
exception_stub!(double_fault, 8, error_code);
exception_stub!(coprocessor_segment_overrun, 9);
exception_stub!(invalid_tss, 10, error_code);
exception_stub!(segment_not_present, 11, error_code);
exception_stub!(stack_segment_fault, 12, error_code);
exception_stub!(general_protection, 13, error_code);
exception_stub!(page_fault, 14, error_code);
exception_stub!(reserved_15, 15);
exception_stub!(x87_floating_point, 16);
exception_stub!(alignment_check, 17, error_code);
exception_stub!(machine_check, 18);
exception_stub!(simd_floating_point, 19);
exception_stub!(virtualization, 20);
exception_stub!(control_protection, 21, error_code);

/// Entry addresses of the exception stubs, indexed by vector.
pub fn exception_handlers() -> [u64; EXCEPTION_COUNT] {
    let stubs: [extern "C" fn(); EXCEPTION_COUNT] = [
        divide_error,
        debug,
        nmi,
        breakpoint,
        overflow,
        bound_range,
        invalid_opcode,
        device_not_available,
        double_fault,
        coprocessor_segment_overrun,
        invalid_tss,
        segment_not_present,
        stack_segment_fault,
        general_protection,
        page_fault,
        reserved_15,
        x87_floating_point,
        alignment_check,
        machine_check,
        simd_floating_point,
        virtualization,
        control_protection,
    ];
    stubs.map(|stub| stub as usize as u64)
}

/// Vector and error code on top of the CPU frame leave `rsp` 8 bytes off.
#[unsafe(naked)]
extern "C" fn exception_tail() {
    naked_asm!(
        "cld",
        "mov rdi, rsp",
        "sub rsp, 8",
        "call {fatal}",
        "ud2",
        fatal = sym fatal_trap,
    );
}

/// Reports an exception and stops the machine. Nothing is recoverable,
/// faults raised by user code included.
extern "C" fn fatal_trap(frame: &TrapFrame) -> ! {
    let cr2: u64;
    // SAFETY: reading CR2 has no side effects.
    unsafe { core::arch::asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags)) };

    error!("{}", FatalTrap::new(frame, cr2));
    halt_forever()
}

/// Parks the CPU with interrupts off.
pub fn halt_forever() -> ! {
    loop {
        // SAFETY: ring 0; stopping is the intent.
        unsafe { core::arch::asm!("cli", "hlt", options(nomem, nostack)) };
    }
}

/// `int 0x80` gate. Pushes `r15` down to `rax` so the stack is a
/// [`SyscallFrame`]; 5 + 15 words keeps it aligned for the call.
#[unsafe(naked)]
pub extern "C" fn syscall_stub() {
    naked_asm!(
        "push r15",
        "push r14",
        "push r13",
        "push r12",
        "push r11",
        "push r10",
        "push r9",
        "push r8",
        "push rbp",
        "push rdi",
        "push rsi",
        "push rdx",
        "push rcx",
        "push rbx",
        "push rax",
        "cld",
        "mov rdi, rsp",
        "call {entry}",
        "pop rax",
        "pop rbx",
        "pop rcx",
        "pop rdx",
        "pop rsi",
        "pop rdi",
        "pop rbp",
        "pop r8",
        "pop r9",
        "pop r10",
        "pop r11",
        "pop r12",
        "pop r13",
        "pop r14",
        "pop r15",
        "iretq",
        entry = sym syscall_entry,
    );
}

extern "C" fn syscall_entry(frame: &mut SyscallFrame) {
    match KERNEL.get() {
        Some(kernel) => dispatch(&mut KernelContext::new(kernel), frame),
        None => frame.set_return(SYSCALL_FAILED),
    }
}

/// Keyboard IRQ gate. Saves the nine caller-saved registers; 5 + 9 words
/// keeps the stack aligned.
#[unsafe(naked)]
pub extern "C" fn keyboard_stub() {
    naked_asm!(
        "push rax",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "cld",
        "call {handler}",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rax",
        "iretq",
        handler = sym keyboard_irq,
    );
}

/// Runs with interrupts masked (interrupt gate), so the plain lock is enough.
extern "C" fn keyboard_irq() {
    // SAFETY: the PS/2 data port belongs to this handler.
    let scancode = unsafe { inb(KEYBOARD_DATA_PORT) };

    if let Some(kernel) = KERNEL.get() {
        kernel.input.lock().handle_scancode(scancode);
    }

    pic::end_of_interrupt(KEYBOARD_IRQ);
}
