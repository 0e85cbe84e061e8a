/// Fixed-capacity FIFO of decoded characters.
///
/// Pushing into a full queue leaves it unchanged: new input is dropped,
/// buffered input is never overwritten.
#[derive(Debug, Clone)]
pub struct InputQueue<const N: usize> {
    buffer: [u8; N],
    start: usize,
    end: usize,
    count: usize,
}

impl<const N: usize> Default for InputQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> InputQueue<N> {
    pub const CAPACITY: usize = N;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            start: 0,
            end: 0,
            count: 0,
        }
    }

    /// Appends `ch`; returns `false` if it was dropped.
    pub const fn push(&mut self, ch: u8) -> bool {
        if self.count == N {
            return false;
        }
        self.buffer[self.end] = ch;
        self.end = (self.end + 1) % N;
        self.count += 1;
        true
    }

    pub const fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let ch = self.buffer[self.start];
        self.start = (self.start + 1) % N;
        self.count -= 1;
        Some(ch)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.count == N
    }
}
