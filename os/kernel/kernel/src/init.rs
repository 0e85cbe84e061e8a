//! # Bring-up
//!
//! Limine jumps to [`kmain`] in long mode with interrupts off, paging on
//! and the higher-half direct map in place. [`kmain`] moves onto the
//! kernel's own boot stack, then [`bring_up`] runs the stages in order:
//!
//! 1. console and logger
//! 2. boot information
//! 3. GDT and TSS
//! 4. PICs and IDT
//! 5. `CR0.WP`, `EFER.NXE`
//! 6. frame allocator, address space, dropping the bootloader's lower half
//! 7. publish the kernel state, enable interrupts
//! 8. load `init` and enter ring 3
//!
//! A failing stage is logged and the CPU halts.

use crate::boot::{BootError, BootInfo};
use crate::interrupts::{self, halt_forever};
use crate::state::{KERNEL, Kernel, KernelContext, Memory};
use crate::userland::enter_user_mode;
use crate::{gdt, pic};
use kernel_alloc::{DirectMap, FreeListFrameAlloc};
use kernel_info::memory::{INIT_MODULE_NAME, USER_STACK_TOP};
use kernel_interrupts::vectors::KEYBOARD;
use kernel_interrupts::{Idt, IdtSetup, IdtSetupError};
use kernel_registers::cr0::Cr0;
use kernel_registers::efer::Efer;
use kernel_registers::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use kernel_syscall::{SyscallContext, SyscallError};
use kernel_vmem::{AddressSpace, CpuTlb, VirtualAddress};
use log::{LevelFilter, error, info};

const BOOT_STACK_SIZE: usize = 64 * 1024;

#[repr(align(16))]
struct Aligned16<const N: usize>([u8; N]);

static mut BOOT_STACK: Aligned16<BOOT_STACK_SIZE> = Aligned16([0; BOOT_STACK_SIZE]);

static mut IDT: Idt = Idt::new();

#[derive(Debug, thiserror::Error)]
enum KernelError {
    #[error(transparent)]
    Boot(#[from] BootError),
    #[error("interrupt table: {0}")]
    Idt(#[from] IdtSetupError),
    #[error("the kernel state was already published")]
    AlreadyInitialized,
    #[error("cannot start init: {0}")]
    Init(SyscallError),
}

/// The kernel entry point named in the linker script.
///
/// Switches to [`BOOT_STACK`] and emulates a `call` so the Rust entry sees
/// `rsp % 16 == 8`.
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "C" fn kmain() {
    core::arch::naked_asm!(
        "cli",
        "lea rax, [rip + {stack}]",
        "add rax, {size}",
        "and rax, -16",
        "mov rsp, rax",
        "push 0",
        "xor rbp, rbp",
        "jmp {entry}",
        stack = sym BOOT_STACK,
        size = const BOOT_STACK_SIZE,
        entry = sym kernel_entry_on_boot_stack,
    );
}

extern "C" fn kernel_entry_on_boot_stack() -> ! {
    match bring_up() {
        Ok(never) => match never {},
        Err(e) => {
            error!("Boot failed: {e}");
            halt_forever()
        }
    }
}

fn console_sink(bytes: &[u8]) {
    kernel_console::serial::write(bytes);
    #[cfg(feature = "qemu")]
    kernel_console::debugcon::write(bytes);
}

fn bring_up() -> Result<core::convert::Infallible, KernelError> {
    // SAFETY: COM1 is only touched through the console from here on.
    unsafe { kernel_console::serial::init() };
    // first and only installation; neither can fail
    let _ = kernel_console::install_sink(console_sink);
    let _ = kernel_console::ConsoleLogger::new(LevelFilter::Debug).init();
    info!("Kernel starting");

    let boot = BootInfo::collect()?;

    // SAFETY: ring 0, interrupts off, once.
    unsafe {
        gdt::init();
        pic::remap();
    }

    // SAFETY: the only reference to IDT, taken before interrupts are enabled.
    let idt = unsafe { &mut *(&raw mut IDT) };
    let mut setup = IdtSetup::new(idt, gdt::KERNEL_CS);
    setup.zero()?;
    setup.exceptions(&interrupts::exception_handlers())?;
    setup.syscall(interrupts::syscall_stub as usize as u64)?;
    setup.hardware_irq(KEYBOARD, interrupts::keyboard_stub as usize as u64, || {
        pic::unmask(pic::KEYBOARD_IRQ);
    })?;
    // SAFETY: every gate points at a trampoline above, running on KERNEL_CS.
    unsafe { setup.install()? };

    // SAFETY: ring 0; both only tighten what the page tables already say.
    unsafe {
        Cr0::load_unsafe().with_wp_write_protect(true).store_unsafe();
        Efer::load_unsafe().with_nxe(true).store_unsafe();
    }

    let mapper = DirectMap::new(boot.hhdm_offset);
    let mut frames = FreeListFrameAlloc::new(mapper);
    // SAFETY: Limine reports the kernel, the modules, page tables and its
    // own data as non-usable.
    let seeded = unsafe { frames.seed(&boot.memory_map) };
    info!("{seeded} physical frames available");

    // SAFETY: paging is on and the direct map reaches every table.
    let mut space = unsafe { AddressSpace::from_current(mapper, CpuTlb) };
    let reclaimed = space.unmap_lower_half(&mut frames);
    info!("Dropped the bootloader's lower half ({reclaimed} tables reclaimed)");

    let kernel = Kernel::new(Memory { frames, space }, boot.modules);
    KERNEL
        .set(kernel)
        .map_err(|_| KernelError::AlreadyInitialized)?;
    let kernel = KERNEL.get().ok_or(KernelError::AlreadyInitialized)?;

    // SAFETY: GDT, TSS and IDT are loaded.
    #[cfg(target_os = "none")]
    unsafe {
        kernel_sync::irq::sti_enable_interrupts();
    }

    let entry = KernelContext::new(kernel)
        .load_module(INIT_MODULE_NAME)
        .map_err(KernelError::Init)?;

    // SAFETY: load_module mapped the image and the user stack.
    unsafe { enter_user_mode(entry, VirtualAddress::new(USER_STACK_TOP)) }
}
