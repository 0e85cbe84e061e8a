use crate::gdt::{USER_CS, USER_DS};
use kernel_vmem::VirtualAddress;
use log::info;

/// `IF` set, reserved bit 1 set.
const USER_RFLAGS: u64 = 0x202;

/// Drops to ring 3 at `entry` with the stack at `user_sp`.
///
/// # Safety
/// `entry` and the pages below `user_sp` must be mapped user-accessible in
/// the active address space, and the GDT and TSS must be loaded.
pub unsafe fn enter_user_mode(entry: VirtualAddress, user_sp: VirtualAddress) -> ! {
    let rip = entry.as_u64();
    let cs = u64::from(USER_CS);
    let ss = u64::from(USER_DS);
    let rsp = user_sp.as_u64();

    info!("Entering user mode at {entry}");

    unsafe {
        core::arch::asm!(
            "push {ss}",
            "push {rsp}",
            "push {rflags}",
            "push {cs}",
            "push {rip}",
            "xor eax, eax",
            "xor ebx, ebx",
            "xor ecx, ecx",
            "xor edx, edx",
            "xor esi, esi",
            "xor edi, edi",
            "xor ebp, ebp",
            "iretq",
            ss = in(reg) ss,
            rsp = in(reg) rsp,
            rflags = in(reg) USER_RFLAGS,
            cs = in(reg) cs,
            rip = in(reg) rip,
            options(noreturn)
        )
    }
}
