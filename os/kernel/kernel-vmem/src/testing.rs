//! Host-side stand-ins for physical memory, the frame allocator and the
//! TLB, for tests of code built on [`AddressSpace`](crate::AddressSpace).

use crate::{AddressSpace, FrameAlloc, PhysMapper, Tlb};
use alloc::vec::Vec;
use core::cell::RefCell;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

#[repr(C, align(4096))]
struct Frame([u8; 4096]);

/// Simulated physical RAM starting at physical address 0.
///
/// Physical address `pa` lives at `base + pa` in the host heap.
pub struct TestPhys {
    _storage: Vec<Frame>,
    base: *mut u8,
    frames: usize,
}

impl TestPhys {
    #[must_use]
    pub fn with_frames(frames: usize) -> Self {
        let mut storage: Vec<Frame> = (0..frames).map(|_| Frame([0; 4096])).collect();
        let base = storage.as_mut_ptr().cast::<u8>();
        Self {
            _storage: storage,
            base,
            frames,
        }
    }

    /// Host pointer of physical address 0.
    #[must_use]
    pub const fn base_ptr(&self) -> *mut u8 {
        self.base
    }

    /// Every frame address, ascending.
    pub fn all_frames(&self) -> impl Iterator<Item = PhysicalAddress> + use<> {
        (0..self.frames as u64).map(PhysicalAddress::from_frame_number)
    }

    /// Bytes of the frame at `pa`.
    #[must_use]
    pub fn frame_bytes(&self, pa: PhysicalAddress) -> &[u8] {
        assert!(pa.is_aligned::<kernel_memory_addresses::Size4K>());
        unsafe { core::slice::from_raw_parts(self.phys_to_ptr(pa), 4096) }
    }
}

impl PhysMapper for TestPhys {
    fn phys_to_ptr(&self, pa: PhysicalAddress) -> *mut u8 {
        let idx = usize::try_from(pa.frame_number()).unwrap_or(usize::MAX);
        assert!(idx < self.frames, "{pa:?} outside simulated RAM");
        unsafe { self.base.add(usize::try_from(pa.as_u64()).unwrap_or(usize::MAX)) }
    }
}

/// Frame pool over an explicit set of addresses; hands out the lowest first.
pub struct PoolAlloc {
    free: Vec<PhysicalAddress>,
}

impl PoolAlloc {
    pub fn new(frames: impl IntoIterator<Item = PhysicalAddress>) -> Self {
        let mut free: Vec<_> = frames.into_iter().collect();
        free.sort_unstable_by(|a, b| b.cmp(a));
        Self { free }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn contains(&self, frame: PhysicalAddress) -> bool {
        self.free.contains(&frame)
    }
}

impl FrameAlloc for PoolAlloc {
    fn allocate(&mut self) -> Option<PhysicalAddress> {
        self.free.pop()
    }

    fn free(&mut self, frame: PhysicalAddress) {
        self.free.push(frame);
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TlbEvent {
    Invalidate(VirtualAddress),
    Reload(PhysicalAddress),
}

/// Records invalidations instead of executing them.
#[derive(Default)]
pub struct RecordingTlb {
    events: RefCell<Vec<TlbEvent>>,
}

impl RecordingTlb {
    #[must_use]
    pub fn events(&self) -> Vec<TlbEvent> {
        self.events.borrow().clone()
    }
}

impl Tlb for RecordingTlb {
    fn invalidate_page(&self, va: VirtualAddress) {
        self.events.borrow_mut().push(TlbEvent::Invalidate(va));
    }

    fn reload_root(&self, root: PhysicalAddress) {
        self.events.borrow_mut().push(TlbEvent::Reload(root));
    }
}

/// An address space with an empty root, all frames of `phys` in `alloc`.
///
/// # Panics
/// If `phys` has no frames.
pub fn fresh_space(phys: &TestPhys) -> (AddressSpace<&TestPhys, RecordingTlb>, PoolAlloc) {
    let mut alloc = PoolAlloc::new(phys.all_frames());
    let space = AddressSpace::new_empty(&mut alloc, phys, RecordingTlb::default())
        .expect("simulated RAM has at least one frame");
    (space, alloc)
}
