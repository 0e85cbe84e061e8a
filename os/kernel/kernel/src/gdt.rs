//! # Global Descriptor Table and Task State Segment
//!
//! Long mode ignores segment bases and limits, but the selectors still
//! carry the privilege level: returning to user code with `iretq` needs
//! ring 3 code and data descriptors, and entering the kernel from ring 3
//! needs a loaded TSS whose `rsp0` names the ring 0 stack.
//!
//! Index | Selector | Segment
//! ------|----------|--------
//! 0     | `0x00`   | null
//! 1     | `0x08`   | kernel code ([`KERNEL_CS`])
//! 2     | `0x10`   | kernel data ([`KERNEL_DS`])
//! 3     | `0x1b`   | user data ([`USER_DS`], RPL 3)
//! 4     | `0x23`   | user code ([`USER_CS`], RPL 3)
//! 5, 6  | `0x28`   | 16-byte TSS descriptor ([`TSS_SELECTOR`])

use bitfield_struct::bitfield;
use kernel_info::memory::KERNEL_STACK_SIZE;
use kernel_sync::SyncOnceCell;
use log::debug;

const fn selector(index: u16, rpl: u16) -> u16 {
    (index << 3) | rpl
}

pub const KERNEL_CS: u16 = selector(1, 0);
pub const KERNEL_DS: u16 = selector(2, 0);
pub const USER_DS: u16 = selector(3, 3);
pub const USER_CS: u16 = selector(4, 3);
pub const TSS_SELECTOR: u16 = selector(5, 0);

const _: () = {
    assert!(KERNEL_CS == 0x08);
    assert!(KERNEL_DS == 0x10);
    assert!(USER_DS == 0x1b);
    assert!(USER_CS == 0x23);
    assert!(TSS_SELECTOR == 0x28);
};

/// Code, data and the low half of system descriptors share this layout.
#[bitfield(u64)]
struct SegmentDescriptor {
    limit_lo: u16,
    base_lo: u16,
    base_mid: u8,
    #[bits(4)]
    typ: u8,
    /// 1 = code/data, 0 = system
    s: bool,
    #[bits(2)]
    dpl: u8,
    present: bool,
    #[bits(4)]
    limit_hi: u8,
    avl: bool,
    /// 64-bit code
    long_mode: bool,
    db: bool,
    granularity: bool,
    base_hi: u8,
}

/// Execute/read
const TYPE_CODE: u8 = 0b1010;
/// Read/write
const TYPE_DATA: u8 = 0b0010;
/// Available 64-bit TSS
const TYPE_TSS: u8 = 0x9;

impl SegmentDescriptor {
    const fn code(dpl: u8) -> Self {
        Self::new()
            .with_typ(TYPE_CODE)
            .with_s(true)
            .with_dpl(dpl)
            .with_present(true)
            .with_long_mode(true)
    }

    const fn data(dpl: u8) -> Self {
        Self::new()
            .with_typ(TYPE_DATA)
            .with_s(true)
            .with_dpl(dpl)
            .with_present(true)
    }

    #[allow(clippy::cast_possible_truncation)]
    const fn tss_low(base: u64, limit: u32) -> Self {
        Self::new()
            .with_limit_lo(limit as u16)
            .with_base_lo(base as u16)
            .with_base_mid((base >> 16) as u8)
            .with_typ(TYPE_TSS)
            .with_present(true)
            .with_limit_hi(((limit >> 16) & 0xF) as u8)
            .with_base_hi((base >> 24) as u8)
    }
}

/// 64-bit TSS. Only `rsp0` is used: the kernel has no IST stacks and
/// denies user port I/O by placing the bitmap offset past the end.
#[repr(C, packed)]
#[allow(dead_code)] // read by the CPU
pub struct TaskStateSegment {
    _reserved0: u32,
    rsp: [u64; 3],
    _reserved1: u64,
    ist: [u64; 7],
    _reserved2: u64,
    _reserved3: u16,
    iopb_offset: u16,
}

const _: () = assert!(size_of::<TaskStateSegment>() == 104);

impl TaskStateSegment {
    #[allow(clippy::cast_possible_truncation)]
    const fn new(rsp0: u64) -> Self {
        Self {
            _reserved0: 0,
            rsp: [rsp0, 0, 0],
            _reserved1: 0,
            ist: [0; 7],
            _reserved2: 0,
            _reserved3: 0,
            iopb_offset: size_of::<Self>() as u16,
        }
    }
}

#[repr(C, align(16))]
struct Gdt([u64; 7]);

impl Gdt {
    #[allow(clippy::cast_possible_truncation)]
    fn new(tss: &'static TaskStateSegment) -> Self {
        let base = core::ptr::from_ref(tss) as u64;
        let limit = (size_of::<TaskStateSegment>() - 1) as u32;
        Self([
            0,
            SegmentDescriptor::code(0).into_bits(),
            SegmentDescriptor::data(0).into_bits(),
            SegmentDescriptor::data(3).into_bits(),
            SegmentDescriptor::code(3).into_bits(),
            SegmentDescriptor::tss_low(base, limit).into_bits(),
            base >> 32,
        ])
    }
}

#[repr(C, packed)]
struct DescriptorTablePointer {
    limit: u16,
    base: u64,
}

#[repr(C, align(16))]
struct Ring0Stack([u8; KERNEL_STACK_SIZE]);

/// Stack the CPU switches to when ring 3 code traps into the kernel.
static mut RING0_STACK: Ring0Stack = Ring0Stack([0; KERNEL_STACK_SIZE]);

static TSS: SyncOnceCell<TaskStateSegment> = SyncOnceCell::new();
static GDT: SyncOnceCell<Gdt> = SyncOnceCell::new();

fn ring0_stack_top() -> u64 {
    (&raw const RING0_STACK) as u64 + KERNEL_STACK_SIZE as u64
}

/// Builds and loads the GDT, reloads every segment register and loads the
/// task register.
///
/// # Safety
/// Ring 0, interrupts disabled, once.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn init() {
    let rsp0 = ring0_stack_top();
    let tss = TSS.get_or_init(|| TaskStateSegment::new(rsp0));
    let gdt = GDT.get_or_init(|| Gdt::new(tss));

    let pointer = DescriptorTablePointer {
        limit: (size_of::<Gdt>() - 1) as u16,
        base: core::ptr::from_ref(gdt) as u64,
    };

    unsafe {
        core::arch::asm!(
            "lgdt [{}]",
            in(reg) &raw const pointer,
            options(readonly, nostack, preserves_flags)
        );

        core::arch::asm!(
            "mov ds, {0:x}",
            "mov es, {0:x}",
            "mov ss, {0:x}",
            in(reg) KERNEL_DS,
            options(nostack, preserves_flags)
        );

        // far return into the new code segment
        core::arch::asm!(
            "push {cs}",
            "lea {tmp}, [rip + 2f]",
            "push {tmp}",
            "retfq",
            "2:",
            cs = in(reg) u64::from(KERNEL_CS),
            tmp = lateout(reg) _,
            options(preserves_flags)
        );

        core::arch::asm!(
            "ltr {0:x}",
            in(reg) TSS_SELECTOR,
            options(nostack, preserves_flags)
        );
    }

    debug!("GDT loaded, ring 0 stack top {rsp0:#x}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_data_descriptors() {
        assert_eq!(SegmentDescriptor::code(0).into_bits(), 0x0020_9A00_0000_0000);
        assert_eq!(SegmentDescriptor::code(3).into_bits(), 0x0020_FA00_0000_0000);
        assert_eq!(SegmentDescriptor::data(0).into_bits(), 0x0000_9200_0000_0000);
        assert_eq!(SegmentDescriptor::data(3).into_bits(), 0x0000_F200_0000_0000);
    }

    #[test]
    fn tss_descriptor_splits_the_base() {
        let low = SegmentDescriptor::tss_low(0xFFFF_8000_1234_5678, 103);
        assert_eq!(low.into_bits(), 0x1200_8934_5678_0067);
    }

    #[test]
    fn tss_points_at_the_stack_and_disables_the_bitmap() {
        let tss = TaskStateSegment::new(0xFFFF_8000_0010_0000);
        let rsp = tss.rsp;
        let iopb = tss.iopb_offset;
        assert_eq!(rsp[0], 0xFFFF_8000_0010_0000);
        assert_eq!(iopb, 104);
    }
}
