//! Logging helpers that keep codec protocol text on a single log line.
//!
//! Codec output is full of `\r\n` delimiters and multi-line JSON bodies; logging it
//! raw splits one record across many lines and makes the log unreadable.

use std::fmt::Write;

const MAX_PREVIEW_CHARS: usize = 300;

/// Escape a string for single-line logging.
///
/// `\n`, `\r`, `\t` and backslash become their escaped forms, other control
/// characters become `\xNN`. Output is capped at 300 characters with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW_CHARS) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW_CHARS {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape and cut `input` to at most `max_bytes` of source text, never splitting a
/// UTF-8 sequence. A `...` suffix marks truncation.
pub fn truncate_for_log(input: &str, max_bytes: usize) -> String {
    if input.len() <= max_bytes {
        return escape_log(input);
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !input.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = escape_log(&input[..cut]);
    out.push_str("...");
    out
}

/// Hex preview of raw bytes (serial noise, non-UTF-8 input).
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    data.iter()
        .take(max)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_protocol_delimiters() {
        assert_eq!(escape_log("{\r\n"), "{\\r\\n");
        assert_eq!(escape_log("a\tb\\c"), "a\\tb\\\\c");
        assert_eq!(escape_log("\u{1b}[0m"), "\\x1B[0m");
    }

    #[test]
    fn truncate_does_not_split_multibyte_chars() {
        // "é" is 2 bytes; cut target 4 lands inside it.
        let out = truncate_for_log("abcé123456", 7);
        assert_eq!(out, "abc...");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_log("OK", 10), "OK");
    }

    #[test]
    fn hex_snippet_caps_length() {
        assert_eq!(hex_snippet(&[0xc0, 0x01, 0xff], 2), "c001");
    }
}
