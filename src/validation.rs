//! Argument validation for values embedded into outbound xCommand lines.
//!
//! The codec parses each command line on its own, so anything a caller hands us
//! (search text, dial strings, layout names) must not be able to terminate the
//! line early or smuggle a second command in.

/// Argument validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument is empty")]
    Empty,

    #[error("argument is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("argument contains line breaks or control characters")]
    ControlCharacters,

    #[error("argument contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },
}

/// Per-argument validation rules
#[derive(Debug, Clone)]
pub struct ArgumentRules {
    pub allow_empty: bool,
    pub max_length: usize,
    /// Characters rejected outright (beyond control characters).
    pub forbidden: &'static [char],
}

impl ArgumentRules {
    /// Free text such as directory search strings. Empty is allowed (lists everything).
    pub fn search() -> Self {
        ArgumentRules {
            allow_empty: true,
            max_length: 255,
            forbidden: &[],
        }
    }

    /// Dial strings: SIP URIs, H.323 aliases, E.164 numbers.
    pub fn dial() -> Self {
        ArgumentRules {
            allow_empty: false,
            max_length: 255,
            forbidden: &['"', '|', ' '],
        }
    }

    /// Identifiers echoed back by the codec (folder ids, layout names).
    pub fn identifier() -> Self {
        ArgumentRules {
            allow_empty: false,
            max_length: 128,
            forbidden: &['"', '|'],
        }
    }
}

/// Validate an argument against a rule set.
pub fn validate_argument(value: &str, rules: &ArgumentRules) -> Result<(), ArgumentError> {
    if value.is_empty() && !rules.allow_empty {
        return Err(ArgumentError::Empty);
    }
    if value.chars().count() > rules.max_length {
        return Err(ArgumentError::TooLong {
            max: rules.max_length,
        });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(ArgumentError::ControlCharacters);
    }
    let bad: String = value
        .chars()
        .filter(|c| rules.forbidden.contains(c))
        .collect();
    if !bad.is_empty() {
        return Err(ArgumentError::InvalidCharacters { chars: bad });
    }
    Ok(())
}

/// Validate and render a value as a double-quoted xAPI string literal.
///
/// Embedded quotes and backslashes are escaped.
pub fn quote_argument(value: &str, rules: &ArgumentRules) -> Result<String, ArgumentError> {
    validate_argument(value, rules)?;
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(out)
}
