//! # Kernel state
//!
//! One [`Kernel`] is built at boot and published in [`KERNEL`]. Interrupt
//! handlers and system calls reach it from there.
//!
//! | field     | lock       | taken by |
//! |-----------|------------|----------|
//! | `memory`  | `SpinLock` | system calls, boot |
//! | `input`   | `SpinLock` | keyboard IRQ (push), `read` (pop) |
//! | `modules` | none       | immutable after boot |
//!
//! The two locks are independent, so the keyboard IRQ can deliver input
//! while `read` waits. Thread-side users take both with `lock_irq`.

use kernel_alloc::{DirectMap, FreeListFrameAlloc};
use kernel_elf::{LoadPolicy, load};
use kernel_info::boot::ModuleList;
use kernel_info::memory::{PAGE_SIZE, USER_STACK_PAGES, USER_STACK_TOP, USERSPACE_END};
use kernel_input::KeyboardInput;
use kernel_sync::{SpinLock, SyncOnceCell, irq::halt_unless};
use kernel_syscall::{SyscallContext, SyscallError};
use kernel_vmem::{AddressSpace, CpuTlb, Permissions, VirtualAddress, VmemError};
use log::{debug, info};

pub type KernelFrames = FreeListFrameAlloc<DirectMap>;
pub type KernelSpace = AddressSpace<DirectMap, CpuTlb>;

/// Frame allocator and the one address space, which always change together.
pub struct Memory {
    pub frames: KernelFrames,
    pub space: KernelSpace,
}

pub struct Kernel {
    pub memory: SpinLock<Memory>,
    pub input: SpinLock<KeyboardInput>,
    pub modules: ModuleList,
}

pub static KERNEL: SyncOnceCell<Kernel> = SyncOnceCell::new();

const USER_DATA: Permissions = Permissions::new(true, true, false);

impl Kernel {
    pub fn new(memory: Memory, modules: ModuleList) -> Self {
        Self {
            memory: SpinLock::new(memory),
            input: SpinLock::new(KeyboardInput::new()),
            modules,
        }
    }
}

/// Rejects ranges that leave the user half.
fn check_user(va: VirtualAddress, len: u64) -> Result<(), VmemError> {
    match va.as_u64().checked_add(len) {
        Some(end) if end <= USERSPACE_END => Ok(()),
        _ => Err(VmemError::NotUser(va)),
    }
}

/// [`SyscallContext`] over the published kernel state.
pub struct KernelContext<'k> {
    kernel: &'k Kernel,
}

impl<'k> KernelContext<'k> {
    pub const fn new(kernel: &'k Kernel) -> Self {
        Self { kernel }
    }
}

impl SyscallContext for KernelContext<'_> {
    fn try_read_char(&mut self) -> Option<u8> {
        self.kernel.input.lock_irq().pop()
    }

    fn wait_for_input(&mut self) {
        let _ = halt_unless(|| !self.kernel.input.lock_irq().queue().is_empty());
    }

    fn write_output(&mut self, bytes: &[u8]) {
        kernel_console::CONSOLE.write_bytes(bytes);
    }

    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError> {
        self.kernel.memory.lock_irq().space.read_user(va, buf)
    }

    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError> {
        self.kernel.memory.lock_irq().space.write_user(va, bytes)
    }

    fn map_user_page(&mut self, va: VirtualAddress) -> Result<(), VmemError> {
        check_user(va, PAGE_SIZE)?;
        let mut memory = self.kernel.memory.lock_irq();
        let Memory { frames, space } = &mut *memory;
        space.vm_map(frames, va, Permissions::ALL).map(|_| ())
    }

    fn load_module(&mut self, name: &str) -> Result<VirtualAddress, SyscallError> {
        let module = self
            .kernel
            .modules
            .find(name)
            .ok_or(SyscallError::ImageNotFound)?;

        let mut memory = self.kernel.memory.lock_irq();
        let Memory { frames, space } = &mut *memory;

        let image = load(space, frames, module.bytes, LoadPolicy::ContinueOnError)?;

        for page in 1..=USER_STACK_PAGES {
            let va = VirtualAddress::new(USER_STACK_TOP - page * PAGE_SIZE);
            space.vm_map(frames, va, USER_DATA)?;
        }

        debug!("{} frames free after loading {name}", frames.free_count());
        info!("Starting {name} at {}", image.entry);
        Ok(image.entry)
    }
}
