//! XSig encoder for control-panel list feedback.
//!
//! XSig packs indexed digital/analog/serial values into a compact byte stream.
//! Indexes are 1-based on the API and stored 0-based on the wire.
//!
//! | kind    | bytes                                                                     |
//! |---------|---------------------------------------------------------------------------|
//! | digital | `1 0 !v i11 i10 i9 i8 i7`, `0 i6..i0`                                      |
//! | analog  | `1 1 v15 v14 0 i9 i8 i7`, `0 i6..i0`, `0 v13..v7`, `0 v6..v0`              |
//! | serial  | `1 1 0 0 1 i9 i8 i7`, `0 i6..i0`, latin-1 text, `0xFF`                     |
//!
//! An empty token list encodes to the single "clear outputs" byte so a panel list
//! that used to hold entries is blanked rather than left stale.

use crate::codec::calls::ActiveCall;
use crate::codec::directory::{Directory, DirectoryItem};

/// Reserved sequence telling the panel to clear all outputs.
pub const CLEAR_OUTPUTS: [u8; 1] = [0xFC];

const SERIAL_TERMINATOR: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XSigValue {
    Digital(bool),
    Analog(u16),
    Serial(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XSigToken {
    /// 1-based join index.
    pub index: u16,
    pub value: XSigValue,
}

impl XSigToken {
    pub fn digital(index: u16, value: bool) -> Self {
        Self {
            index,
            value: XSigValue::Digital(value),
        }
    }
    pub fn analog(index: u16, value: u16) -> Self {
        Self {
            index,
            value: XSigValue::Analog(value),
        }
    }
    pub fn serial(index: u16, value: impl Into<String>) -> Self {
        Self {
            index,
            value: XSigValue::Serial(value.into()),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let idx = self.index.saturating_sub(1);
        match &self.value {
            XSigValue::Digital(v) => {
                let mut b0 = 0x80 | ((idx >> 7) & 0x1F) as u8;
                if !v {
                    b0 |= 0x20;
                }
                out.push(b0);
                out.push((idx & 0x7F) as u8);
            }
            XSigValue::Analog(v) => {
                out.push(0xC0 | ((v >> 10) & 0x30) as u8 | ((idx >> 7) & 0x07) as u8);
                out.push((idx & 0x7F) as u8);
                out.push(((v >> 7) & 0x7F) as u8);
                out.push((v & 0x7F) as u8);
            }
            XSigValue::Serial(s) => {
                out.push(0xC8 | ((idx >> 7) & 0x07) as u8);
                out.push((idx & 0x7F) as u8);
                out.extend(latin1(s));
                out.push(SERIAL_TERMINATOR);
            }
        }
    }
}

/// Encode tokens in order. Empty input yields [`CLEAR_OUTPUTS`].
pub fn encode_tokens(tokens: &[XSigToken]) -> Vec<u8> {
    if tokens.is_empty() {
        return CLEAR_OUTPUTS.to_vec();
    }
    let mut out = Vec::with_capacity(tokens.len() * 4);
    for t in tokens {
        t.encode_into(&mut out);
    }
    out
}

/// Single-byte encoding: code points above U+00FF (and the terminator byte
/// itself) become `?`.
fn latin1(s: &str) -> impl Iterator<Item = u8> + '_ {
    s.chars().map(|c| match u8::try_from(c as u32) {
        Ok(SERIAL_TERMINATOR) | Err(_) => b'?',
        Ok(b) => b,
    })
}

/// Panel tokens for a directory page: serial `n` is the entry name, digital `n`
/// is true for folders.
pub fn directory_tokens(directory: &Directory) -> Vec<XSigToken> {
    let mut tokens = Vec::new();
    for (i, item) in directory.items().enumerate() {
        let index = (i + 1) as u16;
        let (name, is_folder) = match item {
            DirectoryItem::Folder(f) => (f.name.as_str(), true),
            DirectoryItem::Contact(c) => (c.name.as_str(), false),
        };
        tokens.push(XSigToken::digital(index, is_folder));
        tokens.push(XSigToken::serial(index, name));
    }
    tokens
}

/// Panel tokens for active calls: per call three serials (name, number, status)
/// and one digital (on hold).
pub fn active_call_tokens(calls: &[ActiveCall]) -> Vec<XSigToken> {
    let mut tokens = Vec::new();
    for (i, call) in calls.iter().enumerate() {
        let base = (i * 3) as u16;
        tokens.push(XSigToken::serial(base + 1, call.name.clone()));
        tokens.push(XSigToken::serial(base + 2, call.number.clone()));
        tokens.push(XSigToken::serial(base + 3, call.status.as_str()));
        tokens.push(XSigToken::digital((i + 1) as u16, call.is_on_hold));
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_encodes_clear_outputs() {
        assert_eq!(encode_tokens(&[]), vec![0xFC]);
        assert!(!encode_tokens(&[]).is_empty());
    }

    #[test]
    fn digital_high_and_low() {
        assert_eq!(encode_tokens(&[XSigToken::digital(1, true)]), vec![0x80, 0x00]);
        assert_eq!(encode_tokens(&[XSigToken::digital(1, false)]), vec![0xA0, 0x00]);
        // index 200 -> 199 = 0b1_1000111
        assert_eq!(encode_tokens(&[XSigToken::digital(200, true)]), vec![0x81, 0x47]);
    }

    #[test]
    fn analog_splits_value_bits() {
        // 0xFFFF: top two bits go into byte 0
        assert_eq!(
            encode_tokens(&[XSigToken::analog(2, 0xFFFF)]),
            vec![0xF0, 0x01, 0x7F, 0x7F]
        );
        assert_eq!(
            encode_tokens(&[XSigToken::analog(1, 300)]),
            vec![0xC0, 0x00, 0x02, 0x2C]
        );
    }

    #[test]
    fn serial_uses_single_byte_text_and_terminator() {
        assert_eq!(
            encode_tokens(&[XSigToken::serial(3, "Zoë")]),
            vec![0xC8, 0x02, b'Z', b'o', 0xEB, 0xFF]
        );
        assert_eq!(
            encode_tokens(&[XSigToken::serial(1, "☎")]),
            vec![0xC8, 0x00, b'?', 0xFF]
        );
    }

    #[test]
    fn tokens_are_emitted_in_order() {
        let bytes = encode_tokens(&[XSigToken::digital(2, true), XSigToken::serial(1, "A")]);
        assert_eq!(bytes, vec![0x80, 0x01, 0xC8, 0x00, b'A', 0xFF]);
    }
}
