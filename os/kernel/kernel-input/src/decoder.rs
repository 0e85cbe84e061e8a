use log::trace;
use pc_keyboard::{DecodedKey, HandleControl, Keyboard, ScancodeSet1, layouts};

/// Scancode set 1 to ASCII, tracking shift and caps lock.
pub struct ScancodeDecoder {
    keyboard: Keyboard<layouts::Us104Key, ScancodeSet1>,
}

impl Default for ScancodeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScancodeDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            keyboard: Keyboard::new(
                ScancodeSet1::new(),
                layouts::Us104Key,
                HandleControl::MapLettersToUnicode,
            ),
        }
    }

    /// Feeds one byte; yields a character on key press.
    ///
    /// Releases, modifiers and keys without an ASCII meaning yield `None`
    /// but still update the modifier state.
    pub fn decode(&mut self, scancode: u8) -> Option<u8> {
        let event = match self.keyboard.add_byte(scancode) {
            Ok(event) => event?,
            Err(e) => {
                trace!("Ignoring scancode {scancode:#04x}: {e:?}");
                return None;
            }
        };
        match self.keyboard.process_keyevent(event)? {
            DecodedKey::Unicode(ch) if ch.is_ascii() => Some(ch as u8),
            DecodedKey::Unicode(_) | DecodedKey::RawKey(_) => None,
        }
    }
}
