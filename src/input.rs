//! Keyboard translation for winit hosts
//!
//! Maps winit key events to the byte sequences a shell expects on its pty.

use winit::keyboard::{Key, ModifiersState, NamedKey};

/// Bytes to send to the shell for a key press, or `None` if the key has no
/// terminal meaning
pub fn key_to_bytes(key: &Key, text: Option<&str>, modifiers: &ModifiersState) -> Option<Vec<u8>> {
    match key {
        Key::Named(named) => named_key_bytes(*named).map(|bytes| bytes.to_vec()),
        Key::Character(s) => {
            let mut chars = s.chars();
            if let (Some(ch), None) = (chars.next(), chars.next())
                && modifiers.control_key()
                && ch.is_ascii_alphabetic()
            {
                // Ctrl+letter produces control codes 1-26
                let lower = ch.to_ascii_lowercase();
                return Some(vec![(lower as u8) - b'a' + 1]);
            }
            Some(text.unwrap_or(s.as_str()).as_bytes().to_vec())
        }
        _ => None,
    }
}

fn named_key_bytes(named: NamedKey) -> Option<&'static [u8]> {
    let bytes: &'static [u8] = match named {
        NamedKey::Enter => b"\r",
        NamedKey::Backspace => b"\x7f",
        NamedKey::Tab => b"\t",
        NamedKey::Space => b" ",
        NamedKey::Escape => b"\x1b",
        NamedKey::ArrowUp => b"\x1b[A",
        NamedKey::ArrowDown => b"\x1b[B",
        NamedKey::ArrowRight => b"\x1b[C",
        NamedKey::ArrowLeft => b"\x1b[D",
        NamedKey::Home => b"\x1b[H",
        NamedKey::End => b"\x1b[F",
        NamedKey::PageUp => b"\x1b[5~",
        NamedKey::PageDown => b"\x1b[6~",
        NamedKey::Delete => b"\x1b[3~",
        NamedKey::Insert => b"\x1b[2~",
        _ => return None,
    };
    Some(bytes)
}
