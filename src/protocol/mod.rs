//! # Room-OS wire protocol
//!
//! Leaf pieces of the codec's terminal protocol: line splitting, the serial login
//! prompt dance, multi-line message reassembly, JSON path helpers and the XSig
//! panel encoder. Nothing in here owns state beyond its own buffer; the
//! [`crate::codec`] engine wires them together.
//!
//! The codec speaks CRLF-terminated lines. After `xPreferences outputmode json`
//! every status, configuration, event and command response arrives as a
//! pretty-printed JSON document whose first and last lines are a bare `{` and `}`.

pub mod json;
pub mod lines;
pub mod login;
pub mod reassembly;
pub mod xsig;

pub use lines::LineReassembler;
pub use login::{LoginAction, LoginNegotiator, LoginState};
pub use reassembly::{Message, MessageReassembler};

/// Line delimiter used in both directions.
pub const DELIMITER: &str = "\r\n";

/// Switches the codec into JSON feedback mode.
pub const CMD_OUTPUT_MODE_JSON: &str = "xPreferences outputmode json";

/// Status probes sent once the output mode is confirmed.
pub const BOOTSTRAP_STATUS_PROBES: [&str; 4] =
    ["xStatus Cameras", "xStatus SIP", "xStatus Call", "xStatus"];

pub const CMD_CONFIGURATION: &str = "xConfiguration";
pub const CMD_SYSTEM_UNIT: &str = "xStatus SystemUnit";
pub const CMD_FEEDBACK_LIST: &str = "xFeedback list";

/// Feedback subscription paths. The last entry doubles as the completion
/// sentinel: the codec processes registrations in order, so seeing it
/// registered means none of the earlier ones were dropped.
pub const FEEDBACK_PATHS: [&str; 24] = [
    "/Configuration",
    "/Status/Audio",
    "/Status/Call",
    "/Status/Conference/Presentation",
    "/Status/Conference/DoNotDisturb",
    "/Status/Cameras/SpeakerTrack",
    "/Status/Cameras/SpeakerTrack/Status",
    "/Status/Cameras/SpeakerTrack/Availability",
    "/Status/Cameras/PresenterTrack",
    "/Status/Cameras/PresenterTrack/Status",
    "/Status/Cameras/PresenterTrack/Availability",
    "/Status/RoomAnalytics",
    "/Status/RoomPreset",
    "/Status/Standby",
    "/Status/Video/Selfview",
    "/Status/MediaChannels/Call",
    "/Status/Video/Layout/CurrentLayouts",
    "/Status/Video/Layout/LayoutFamily",
    "/Status/Video/Input/MainVideoMute",
    "/Bookings",
    "/Event/Bookings",
    "/Event/CameraPresetListUpdated",
    "/Event/UserInterface/Presentation/ExternalSource/Selected/SourceIdentifier",
    "/Event/CallDisconnect",
];

/// The sentinel registration path (always last).
pub const FEEDBACK_SENTINEL: &str = "/Event/CallDisconnect";

/// Full registration expression, one `xFeedback register` per line.
pub fn feedback_registration_expression() -> String {
    FEEDBACK_PATHS
        .iter()
        .map(|p| format!("xFeedback register {}", p))
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Echo of the sentinel registration line, lower-cased for comparison.
pub fn sentinel_registration_echo() -> String {
    format!("xfeedback register {}", FEEDBACK_SENTINEL).to_lowercase()
}

/// Paths from [`FEEDBACK_PATHS`] missing in a reassembled `xFeedback list` body.
///
/// Comparison ignores case, surrounding whitespace and a trailing slash.
pub fn missing_feedback_paths(feedback_list: &str) -> Vec<&'static str> {
    let registered: Vec<String> = feedback_list
        .lines()
        .map(|l| l.trim().trim_end_matches('/').to_lowercase())
        .filter(|l| l.starts_with('/'))
        .collect();
    FEEDBACK_PATHS
        .iter()
        .copied()
        .filter(|p| !registered.iter().any(|r| r == &p.to_lowercase()))
        .collect()
}

/// Strip a trailing `\r\n`, `\n` or `\r` (only the delimiter, never other whitespace).
pub fn strip_delimiter(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .or_else(|| line.strip_suffix('\r'))
        .unwrap_or(line)
}
