//! # Keyboard input
//!
//! ```text
//!  IRQ 1 ──► scancode ──► ScancodeDecoder ──► InputQueue ──► read(0, ..)
//!            port 0x60    (set 1, US layout,   (ring, drops
//!                          shift, caps lock)     when full)
//! ```
//!
//! The interrupt side only ever pushes and the system call side only pops.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod decoder;
mod queue;

pub use crate::decoder::ScancodeDecoder;
pub use crate::queue::InputQueue;

use kernel_info::memory::INPUT_QUEUE_CAPACITY;

/// Backspace as delivered to readers.
pub const BACKSPACE: u8 = 8;

/// Decoder and character queue of the one PS/2 keyboard.
pub struct KeyboardInput {
    decoder: ScancodeDecoder,
    queue: InputQueue<INPUT_QUEUE_CAPACITY>,
}

impl Default for KeyboardInput {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardInput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decoder: ScancodeDecoder::new(),
            queue: InputQueue::new(),
        }
    }

    /// Feeds one scancode from the interrupt handler.
    ///
    /// Returns the character that was queued, if any. A character decoded
    /// while the queue is full is dropped and not returned.
    pub fn handle_scancode(&mut self, scancode: u8) -> Option<u8> {
        let ch = self.decoder.decode(scancode)?;
        self.queue.push(ch).then_some(ch)
    }

    /// Next buffered character, without blocking.
    pub fn pop(&mut self) -> Option<u8> {
        self.queue.pop()
    }

    pub const fn queue(&self) -> &InputQueue<INPUT_QUEUE_CAPACITY> {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_line_arrives_in_order() {
        let mut input = KeyboardInput::new();
        // l, s, Enter (press + release each)
        for sc in [0x26, 0xA6, 0x1F, 0x9F, 0x1C, 0x9C] {
            input.handle_scancode(sc);
        }
        assert_eq!(input.pop(), Some(b'l'));
        assert_eq!(input.pop(), Some(b's'));
        assert_eq!(input.pop(), Some(b'\n'));
        assert_eq!(input.pop(), None);
    }

    #[test]
    fn full_queue_drops_new_keys() {
        let mut input = KeyboardInput::new();
        for _ in 0..INPUT_QUEUE_CAPACITY {
            assert_eq!(input.handle_scancode(0x1E), Some(b'a'));
            input.handle_scancode(0x9E);
        }
        assert_eq!(input.handle_scancode(0x30), None);
        assert_eq!(input.queue().len(), INPUT_QUEUE_CAPACITY);
    }
}
