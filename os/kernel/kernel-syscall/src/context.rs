use crate::SyscallError;
use kernel_vmem::{VirtualAddress, VmemError};

/// Kernel services the system calls are built on.
///
/// User memory is always reached through these methods, never by
/// dereferencing user pointers, so an unmapped buffer is an error instead
/// of a fault inside the kernel.
pub trait SyscallContext {
    /// Takes the next buffered input character, if any.
    fn try_read_char(&mut self) -> Option<u8>;

    /// Called while `read` waits for input.
    fn wait_for_input(&mut self) {
        core::hint::spin_loop();
    }

    /// Sends bytes to the console.
    fn write_output(&mut self, bytes: &[u8]);

    /// Copies user memory at `va` into `buf`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if part of the range is not mapped.
    fn copy_from_user(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmemError>;

    /// Copies `bytes` to user memory at `va`.
    ///
    /// # Errors
    /// [`VmemError::NotMapped`] if part of the range is not mapped.
    fn copy_to_user(&mut self, va: VirtualAddress, bytes: &[u8]) -> Result<(), VmemError>;

    /// Maps one user-accessible, writable, executable page at `va`.
    ///
    /// An existing mapping is kept as it is.
    ///
    /// # Errors
    /// Whatever the address space reports.
    fn map_user_page(&mut self, va: VirtualAddress) -> Result<(), VmemError>;

    /// Loads the boot module called `name` and returns its entry point.
    ///
    /// # Errors
    /// [`SyscallError::ImageNotFound`] if no module matches exactly, or the
    /// load failure.
    fn load_module(&mut self, name: &str) -> Result<VirtualAddress, SyscallError>;
}
