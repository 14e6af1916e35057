//! Multi-line message reassembly.
//!
//! Two kinds of messages span several lines:
//!
//! * JSON documents: a line that is exactly `{` opens one, a line that is exactly
//!   `}` closes it. Nested braces are indented by the codec so they never match.
//! * Feedback lists: the reply to `xFeedback list` is a run of lines starting with
//!   `/`. The run ends at the first line that does not start with `/`.
//!
//! Command echoes (anything containing `xcommand`) are dropped before either check
//! so local echo on serial links never turns into data.

use super::strip_delimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Complete JSON document text, delimiters included.
    Json(String),
    /// Buffered `/path` lines of an `xFeedback list` reply.
    FeedbackList(String),
    /// Any other single line (acks, echoes of non-xCommand input, banners).
    Line(String),
}

#[derive(Default)]
pub struct MessageReassembler {
    json: Option<String>,
    feedback: Option<String>,
}

impl MessageReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_collecting_json(&self) -> bool {
        self.json.is_some()
    }

    /// Drop any partially collected message (connection lost).
    pub fn reset(&mut self) {
        self.json = None;
        self.feedback = None;
    }

    /// Process one line (delimiter may or may not be present).
    pub fn push_line(&mut self, line: &str) -> Vec<Message> {
        let mut out = Vec::new();
        if line.to_lowercase().contains("xcommand") {
            log::trace!("dropping command echo: {}", crate::logutil::escape_log(line));
            return out;
        }
        let bare = strip_delimiter(line);

        if let Some(mut buf) = self.feedback.take() {
            if bare.starts_with('/') {
                buf.push_str(line);
                self.feedback = Some(buf);
                return out;
            }
            out.push(Message::FeedbackList(buf));
        }

        if bare == "{" {
            if let Some(stale) = self.json.take() {
                log::warn!(
                    "json document restarted before close; dropped {} bytes",
                    stale.len()
                );
                crate::metrics::inc_parse_errors();
            }
            self.json = Some(line.to_string());
            return out;
        }

        if let Some(buf) = self.json.as_mut() {
            buf.push_str(line);
            if bare == "}" {
                if let Some(doc) = self.json.take() {
                    out.push(Message::Json(doc));
                }
            }
            return out;
        }

        if bare.starts_with('/') {
            self.feedback = Some(line.to_string());
            return out;
        }

        out.push(Message::Line(line.to_string()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LineReassembler;

    const DOC: &str = "{\r\n  \"Status\": {\r\n    \"Standby\": {\r\n      \"State\": {\r\n        \"Value\": \"Off\"\r\n      }\r\n    }\r\n  }\r\n}\r\n";

    fn feed(chunks: &[&[u8]]) -> Vec<Message> {
        let mut lines = LineReassembler::crlf();
        let mut msgs = MessageReassembler::new();
        let mut out = Vec::new();
        for chunk in chunks {
            for line in lines.push(chunk) {
                out.extend(msgs.push_line(&line));
            }
        }
        out
    }

    #[test]
    fn whole_document_in_one_chunk() {
        assert_eq!(feed(&[DOC.as_bytes()]), vec![Message::Json(DOC.to_string())]);
    }

    #[test]
    fn every_two_way_split_yields_the_same_document() {
        let bytes = DOC.as_bytes();
        for cut in 0..=bytes.len() {
            let out = feed(&[&bytes[..cut], &bytes[cut..]]);
            assert_eq!(out, vec![Message::Json(DOC.to_string())], "cut at {}", cut);
        }
    }

    #[test]
    fn byte_at_a_time_yields_the_same_document() {
        let chunks: Vec<&[u8]> = DOC.as_bytes().chunks(1).collect();
        assert_eq!(feed(&chunks), vec![Message::Json(DOC.to_string())]);
    }

    #[test]
    fn indented_braces_do_not_close_the_document() {
        let mut m = MessageReassembler::new();
        assert!(m.push_line("{\r\n").is_empty());
        assert!(m.push_line("  }\r\n").is_empty());
        assert!(m.is_collecting_json());
        assert_eq!(m.push_line("}\r\n").len(), 1);
    }

    #[test]
    fn command_echo_is_discarded() {
        let mut m = MessageReassembler::new();
        assert!(m.push_line("xCommand Dial Number: 123\r\n").is_empty());
        assert!(m.push_line("XCOMMAND Standby Activate\r\n").is_empty());
    }

    #[test]
    fn feedback_list_flushes_on_first_non_path_line() {
        let mut m = MessageReassembler::new();
        assert!(m.push_line("/Configuration\r\n").is_empty());
        assert!(m.push_line("/Status/Call\r\n").is_empty());
        let out = m.push_line("** end\r\n");
        assert_eq!(
            out,
            vec![
                Message::FeedbackList("/Configuration\r\n/Status/Call\r\n".into()),
                Message::Line("** end\r\n".into()),
            ]
        );
    }

    #[test]
    fn feedback_list_followed_by_json_opening() {
        let mut m = MessageReassembler::new();
        m.push_line("/Event/CallDisconnect\r\n");
        let out = m.push_line("{\r\n");
        assert_eq!(
            out,
            vec![Message::FeedbackList("/Event/CallDisconnect\r\n".into())]
        );
        assert!(m.is_collecting_json());
    }

    #[test]
    fn plain_lines_pass_through() {
        let mut m = MessageReassembler::new();
        assert_eq!(m.push_line("OK\r\n"), vec![Message::Line("OK\r\n".into())]);
    }
}
