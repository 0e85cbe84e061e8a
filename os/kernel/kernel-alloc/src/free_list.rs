use kernel_vmem::{PhysMapper, PhysicalAddress};

/// Marks the end of the list. Never a valid frame address since it is not
/// page aligned.
const END: u64 = u64::MAX;

/// The link word stored in the first bytes of every free frame.
#[repr(C)]
struct FrameLink {
    next: u64,
}

/// Intrusive LIFO of free frames.
pub(crate) struct FreeFrameList<M: PhysMapper> {
    head: u64,
    len: usize,
    mapper: M,
}

// Safety: frames on the list are owned by the list; access is serialized by
// the lock that wraps the allocator.
unsafe impl<M: PhysMapper + Send> Send for FreeFrameList<M> {}

impl<M: PhysMapper> FreeFrameList<M> {
    pub(crate) const fn new(mapper: M) -> Self {
        Self {
            head: END,
            len: 0,
            mapper,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn mapper(&self) -> &M {
        &self.mapper
    }

    fn link(&self, frame: u64) -> *mut FrameLink {
        self.mapper
            .phys_to_ptr(PhysicalAddress::new(frame))
            .cast::<FrameLink>()
    }

    /// # Safety
    /// `frame` must be page aligned, reachable through the mapper, unused by
    /// anyone else and not already on the list.
    pub(crate) unsafe fn push(&mut self, frame: PhysicalAddress) {
        let raw = frame.as_u64();
        // SAFETY: the frame is ours now; its first word becomes the link.
        unsafe { self.link(raw).write(FrameLink { next: self.head }) };
        self.head = raw;
        self.len += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<PhysicalAddress> {
        if self.head == END {
            return None;
        }
        let frame = self.head;
        // SAFETY: every address on the list was pushed with a valid link.
        self.head = unsafe { self.link(frame).read() }.next;
        self.len -= 1;
        Some(PhysicalAddress::new(frame))
    }
}
