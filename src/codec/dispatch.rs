//! Splits one reassembled JSON document into its top-level sections.
//!
//! A document may carry any mix of `Status`, `Configuration`, `Event` and
//! `CommandResponse`, plus an optional `ResultId`. Sections are handed out
//! independently so one bad section never hides the others; a section holding a
//! `Reason` anywhere inside it is logged and withheld.

use crate::error::Result;
use crate::logutil::{escape_log, truncate_for_log};
use crate::protocol::json;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Status,
    Configuration,
    Event,
    CommandResponse,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Status,
        Section::Configuration,
        Section::Event,
        Section::CommandResponse,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Section::Status => "Status",
            Section::Configuration => "Configuration",
            Section::Event => "Event",
            Section::CommandResponse => "CommandResponse",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed document.
#[derive(Debug, Clone)]
pub struct Response {
    root: Value,
    /// `None` when the document carried no `ResultId`.
    pub result_id: Option<String>,
}

/// A section withheld because it carried an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionError {
    pub section: Section,
    pub reason: String,
}

impl Response {
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The raw section, empty or not, errors included.
    pub fn raw(&self, section: Section) -> Option<&Value> {
        self.root.get(section.key())
    }

    /// Section body if present, non-empty and free of a `Reason`.
    pub fn section(&self, section: Section) -> Option<&Value> {
        let body = self.raw(section)?;
        if json::is_empty(body) || json::find_reason(body).is_some() {
            return None;
        }
        Some(body)
    }

    /// Every present section whose body carries a `Reason`.
    pub fn errors(&self) -> Vec<SectionError> {
        Section::ALL
            .iter()
            .filter_map(|s| {
                let reason = json::find_reason(self.raw(*s)?)?;
                Some(SectionError {
                    section: *s,
                    reason,
                })
            })
            .collect()
    }
}

pub struct ResponseDispatcher;

impl ResponseDispatcher {
    /// Parse a complete document. Failures are the caller's to log and drop.
    pub fn parse(text: &str) -> Result<Response> {
        let root: Value = serde_json::from_str(text)?;
        let result_id = root.get("ResultId").and_then(json::leaf_text);
        let response = Response { root, result_id };
        for err in response.errors() {
            crate::metrics::inc_protocol_errors();
            log::warn!(
                "codec reported error in {}{}: {}",
                err.section,
                response
                    .result_id
                    .as_deref()
                    .map(|id| format!(" (ResultId {})", id))
                    .unwrap_or_default(),
                escape_log(&err.reason)
            );
        }
        Ok(response)
    }

    /// Parse, logging and swallowing malformed documents.
    pub fn parse_or_log(text: &str) -> Option<Response> {
        match Self::parse(text) {
            Ok(r) => Some(r),
            Err(e) => {
                crate::metrics::inc_parse_errors();
                log::warn!(
                    "dropping malformed json document ({}): {}",
                    e,
                    escape_log(&truncate_for_log(text, 200))
                );
                None
            }
        }
    }
}
