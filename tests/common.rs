//! Test utilities & fixtures.
//! Scripted codec replies shared by the integration tests.

use codecsync::codec::{CodecEngine, CodecEvent, CommandQueue, CommandReceiver};
use codecsync::config::Config;
use codecsync::protocol::FEEDBACK_PATHS;
use serde_json::{json, Value};

pub const LEGACY_FIRMWARE: &str = "ce9.15.3.17";
#[allow(dead_code)]
pub const ENHANCED_FIRMWARE: &str = "RoomOS 11.5.1.4 4f2b1c3e8a1";

/// Render a value the way the codec does: pretty-printed, CRLF line endings.
pub fn doc(v: &Value) -> Vec<u8> {
    let pretty = serde_json::to_string_pretty(v).unwrap();
    let mut out = pretty.replace('\n', "\r\n");
    out.push_str("\r\n");
    out.into_bytes()
}

pub fn status_doc(firmware: &str) -> Vec<u8> {
    doc(&json!({"Status": {
        "SystemUnit": {
            "ProductId": {"Value": "Cisco Codec Pro"},
            "Software": {"Version": {"Value": firmware}},
            "Hardware": {"Module": {"SerialNumber": {"Value": "FOC2233ABCD"}}}
        },
        "Standby": {"State": {"Value": "Off"}}
    }}))
}

pub fn configuration_doc() -> Vec<u8> {
    doc(&json!({"Configuration": {
        "Conference": {"AutoAnswer": {"Mode": {"Value": "Off"}}},
        "H323": {"H323Alias": {"E164": {"Value": "4455"}}}
    }}))
}

/// Complete `xFeedback list` reply followed by the terminating status line.
pub fn feedback_list() -> Vec<u8> {
    let mut out = FEEDBACK_PATHS.join("\r\n");
    out.push_str("\r\n** end\r\n");
    out.into_bytes()
}

pub const LOGIN_LINE: &[u8] = b"*s SystemUnit ProductId: \"Cisco Codec Pro\"\r\n";
pub const JSON_MODE_ECHO: &[u8] = b"xPreferences outputmode json\r\n";

#[allow(dead_code)]
pub fn engine_with(config: &Config) -> (CodecEngine, CommandReceiver) {
    let (queue, rx) = CommandQueue::new();
    let engine = CodecEngine::new(config, queue, false).unwrap();
    (engine, rx)
}

#[allow(dead_code)]
pub fn engine() -> (CodecEngine, CommandReceiver) {
    engine_with(&Config::default())
}

/// Drive a socket engine from connect to `SyncComplete`; returns every event.
#[allow(dead_code)]
pub fn sync(engine: &mut CodecEngine, firmware: &str) -> Vec<CodecEvent> {
    let mut events = engine.handle_connection(true);
    events.extend(engine.handle_received(LOGIN_LINE));
    events.extend(engine.handle_received(JSON_MODE_ECHO));
    events.extend(engine.handle_received(&status_doc(firmware)));
    events.extend(engine.handle_received(&configuration_doc()));
    events.extend(engine.handle_received(&feedback_list()));
    events
}

/// The `resultid` tag appended to a tagged command.
#[allow(dead_code)]
pub fn tag_of(cmd: &str) -> String {
    cmd.rsplit("resultid=\"")
        .next()
        .unwrap()
        .trim_end_matches('"')
        .to_string()
}
