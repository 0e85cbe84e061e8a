use kernel_info::memory::USER_STACK_TOP;
use kernel_vmem::VirtualAddress;

/// Registers as saved by the `int 0x80` trampoline, lowest address first.
///
/// The trampoline pushes `r15` down to `rax`; above them sits the frame the
/// CPU pushed on entry.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SyscallFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    // pushed by the CPU
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

const _: () = assert!(size_of::<SyscallFrame>() == 20 * 8);

impl SyscallFrame {
    pub const fn number(&self) -> u64 {
        self.rax
    }

    /// Arguments 0 to 5.
    pub const fn args(&self) -> [u64; 6] {
        [self.rdi, self.rsi, self.rdx, self.r10, self.r8, self.r9]
    }

    pub const fn set_return(&mut self, value: u64) {
        self.rax = value;
    }

    /// Makes `iretq` continue at `entry` on a fresh user stack, with all
    /// general purpose registers cleared. Segments and flags are kept.
    pub const fn restart_at(&mut self, entry: VirtualAddress) {
        let (rip, cs, rflags, ss) = (self.rip, self.cs, self.rflags, self.ss);
        *self = Self {
            rip,
            cs,
            rflags,
            ss,
            ..Self::ZEROED
        };
        self.rip = entry.as_u64();
        self.rsp = USER_STACK_TOP;
    }

    const ZEROED: Self = Self {
        rax: 0,
        rbx: 0,
        rcx: 0,
        rdx: 0,
        rsi: 0,
        rdi: 0,
        rbp: 0,
        r8: 0,
        r9: 0,
        r10: 0,
        r11: 0,
        r12: 0,
        r13: 0,
        r14: 0,
        r15: 0,
        rip: 0,
        cs: 0,
        rflags: 0,
        rsp: 0,
        ss: 0,
    };
}
