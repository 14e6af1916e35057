use thiserror::Error;

/// Errors surfaced by the codec transport and engine APIs.
///
/// Inbound protocol problems are never reported through this type to the
/// caller of the receive path; they are logged and the offending message is
/// dropped. These variants cover the outbound side and setup.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Wrapper around IO errors from sockets and serial ports.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The transport is not connected.
    #[error("not connected")]
    NotConnected,

    /// Transport-specific failure (open, configure, write).
    #[error("transport error: {0}")]
    Transport(String),

    /// A bounded wait elapsed.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// A caller-supplied argument cannot be embedded in a command.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] crate::validation::ArgumentError),

    /// The requested layout is not in the current layout set.
    #[error("unknown layout: {0}")]
    UnknownLayout(String),

    /// Sharing was requested before a presentation source was chosen.
    #[error("no presentation source selected")]
    NoShareSource,

    /// A tagged request was rejected by the codec, expired, or the link dropped.
    #[error("request cancelled before a reply arrived")]
    RequestCancelled,

    /// The device worker is gone (stopped or panicked).
    #[error("device worker channel closed")]
    ChannelClosed,

    /// Configuration problems detected at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;
