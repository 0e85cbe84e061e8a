//! # Memory Layout

/// Size of a physical frame and of the base page.
pub const PAGE_SIZE: u64 = 4096;

/// Number of L4 entries that make up the lower (user) half.
pub const LOWER_HALF_L4_ENTRIES: usize = 256;

/// Number of entries in every page table.
pub const TABLE_ENTRIES: usize = 512;

/// First address past the user range.
pub const USERSPACE_END: u64 = 0x0000_8000_0000_0000;

/// Top of the stack handed to user modules (exclusive).
pub const USER_STACK_TOP: u64 = 0x0000_7FFF_FFFF_F000;

/// Number of 4 KiB pages mapped below [`USER_STACK_TOP`].
pub const USER_STACK_PAGES: u64 = 8;

/// The size of the kernel stack used on ring 3 to ring 0 transitions.
pub const KERNEL_STACK_SIZE: usize = 32 * 1024;

/// Capacity of the keyboard character queue.
pub const INPUT_QUEUE_CAPACITY: usize = 32;

/// Maximum number of boot modules the kernel records.
pub const MAX_MODULES: usize = 16;

/// Maximum number of memory map regions the kernel records.
pub const MAX_MEMORY_REGIONS: usize = 256;

/// The module started at boot and re-entered on `exit`.
pub const INIT_MODULE_NAME: &str = "init";

const _: () = {
    assert!(KERNEL_STACK_SIZE.is_multiple_of(4096));
    assert!(USER_STACK_TOP.is_multiple_of(PAGE_SIZE));
    assert!(USER_STACK_TOP < USERSPACE_END);
    assert!(LOWER_HALF_L4_ENTRIES * 2 == TABLE_ENTRIES);
    assert!(INPUT_QUEUE_CAPACITY > 0);
};
