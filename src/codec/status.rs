//! System information, camera tracking and the small on/off status values.
//!
//! Each struct knows which `Status`/`Configuration` paths feed it and reports
//! whether an update changed anything, so the engine only emits events on real
//! transitions.

use crate::protocol::json;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Dotted numeric firmware version. Ordering compares component-wise with
/// missing trailing components treated as zero.
#[derive(Debug, Clone, Eq)]
pub struct FirmwareVersion {
    parts: Vec<u32>,
}

impl FirmwareVersion {
    /// Accepts `ce9.15.3.17`, `RoomOS 11.5.1.4 a1b2c3`, `9.15.10.8`.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();
        if let Some(rest) = s.strip_prefix("RoomOS ") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix("ce") {
            s = rest;
        }
        let token = s.split_whitespace().next()?;
        let mut parts = Vec::new();
        for piece in token.split('.') {
            let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().ok()?);
        }
        if parts.is_empty() {
            return None;
        }
        Some(Self { parts })
    }

    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    fn component(&self, i: usize) -> u32 {
        self.parts.get(i).copied().unwrap_or(0)
    }
}

impl PartialEq for FirmwareVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for FirmwareVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let n = self.parts.len().max(other.parts.len());
        (0..n)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for FirmwareVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        f.write_str(&joined.join("."))
    }
}

impl Serialize for FirmwareVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CodecInfo {
    pub firmware: Option<FirmwareVersion>,
    pub serial_number: String,
    pub ipv4_address: String,
    pub mac_address: String,
    pub sip_uri: String,
    pub h323_e164: String,
    pub multisite: bool,
    pub auto_answer: String,
}

fn set_if_some(slot: &mut String, value: Option<String>) {
    if let Some(v) = value {
        *slot = v;
    }
}

impl CodecInfo {
    /// Update from a `Status` section. Returns true when anything changed.
    pub fn apply_status(&mut self, status: &Value) -> bool {
        let before = self.clone();
        if let Some(raw) = json::text(status, &["SystemUnit", "Software", "Version"]) {
            match FirmwareVersion::parse(&raw) {
                Some(v) => self.firmware = Some(v),
                None => {
                    log::warn!("unparseable firmware version {}", crate::logutil::escape_log(&raw));
                    self.firmware = None;
                }
            }
        }
        set_if_some(
            &mut self.serial_number,
            json::text(status, &["SystemUnit", "Hardware", "Module", "SerialNumber"]),
        );
        set_if_some(
            &mut self.ipv4_address,
            json::text(status, &["Network", "IPv4", "Address"]),
        );
        set_if_some(
            &mut self.mac_address,
            json::text(status, &["Network", "Ethernet", "MacAddress"]),
        );
        set_if_some(&mut self.sip_uri, json::text(status, &["SIP", "Registration", "URI"]));
        if let Some(on) = json::flag(status, &["SystemUnit", "Software", "OptionKeys", "MultiSite"]) {
            self.multisite = on;
        }
        *self != before
    }

    /// Update from a `Configuration` section.
    pub fn apply_configuration(&mut self, config: &Value) -> bool {
        let before = self.clone();
        set_if_some(&mut self.h323_e164, json::text(config, &["H323", "H323Alias", "E164"]));
        set_if_some(
            &mut self.auto_answer,
            json::text(config, &["Conference", "AutoAnswer", "Mode"]),
        );
        *self != before
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CameraTracking {
    pub speaker_track_available: bool,
    pub speaker_track_active: bool,
    pub presenter_track_available: bool,
    /// `Off`, `Follow`, `Background`, `Persistent`, or empty when unknown.
    pub presenter_track_mode: String,
}

impl CameraTracking {
    pub fn apply_status(&mut self, status: &Value) -> bool {
        let before = self.clone();
        let available = |path: &[&str]| {
            json::text(status, path).map(|s| s.eq_ignore_ascii_case("available"))
        };
        if let Some(v) = available(&["Cameras", "SpeakerTrack", "Availability"]) {
            self.speaker_track_available = v;
        }
        if let Some(v) = json::flag(status, &["Cameras", "SpeakerTrack", "Status"]) {
            self.speaker_track_active = v;
        }
        if let Some(v) = available(&["Cameras", "PresenterTrack", "Availability"]) {
            self.presenter_track_available = v;
        }
        set_if_some(
            &mut self.presenter_track_mode,
            json::text(status, &["Cameras", "PresenterTrack", "Status"]),
        );
        *self != before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StandbyState {
    Off,
    Standby,
    EnteringStandby,
    Halfwake,
    Unknown,
}

impl StandbyState {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => StandbyState::Off,
            "standby" => StandbyState::Standby,
            "enteringstandby" => StandbyState::EnteringStandby,
            "halfwake" => StandbyState::Halfwake,
            _ => StandbyState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiscStatus {
    pub do_not_disturb: bool,
    pub standby: StandbyState,
    pub self_view: bool,
    pub main_video_mute: bool,
    pub volume: Option<u8>,
    pub microphones_muted: bool,
}

impl Default for MiscStatus {
    fn default() -> Self {
        Self {
            do_not_disturb: false,
            standby: StandbyState::Unknown,
            self_view: false,
            main_video_mute: false,
            volume: None,
            microphones_muted: false,
        }
    }
}

impl MiscStatus {
    pub fn apply_status(&mut self, status: &Value) -> bool {
        let before = self.clone();
        if let Some(v) = json::flag(status, &["Conference", "DoNotDisturb"]) {
            self.do_not_disturb = v;
        }
        if let Some(s) = json::text(status, &["Standby", "State"]) {
            self.standby = StandbyState::from_wire(&s);
        }
        if let Some(v) = json::flag(status, &["Video", "Selfview", "Mode"]) {
            self.self_view = v;
        }
        if let Some(v) = json::flag(status, &["Video", "Input", "MainVideoMute"]) {
            self.main_video_mute = v;
        }
        if let Some(v) = json::int(status, &["Audio", "Volume"]) {
            self.volume = Some(v.clamp(0, 100) as u8);
        }
        if let Some(v) = json::flag(status, &["Audio", "Microphones", "Mute"]) {
            self.microphones_muted = v;
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn firmware_parse_strips_prefixes() {
        assert_eq!(FirmwareVersion::parse("ce9.15.3.17").unwrap().parts(), &[9, 15, 3, 17]);
        assert_eq!(
            FirmwareVersion::parse("RoomOS 11.5.1.4 8f1b2c3").unwrap().parts(),
            &[11, 5, 1, 4]
        );
        assert_eq!(FirmwareVersion::parse("9.15.10.8").unwrap().to_string(), "9.15.10.8");
        assert!(FirmwareVersion::parse("garbage").is_none());
        assert!(FirmwareVersion::parse("").is_none());
    }

    #[test]
    fn firmware_ordering() {
        let threshold = FirmwareVersion::parse("9.15.10.8").unwrap();
        assert!(FirmwareVersion::parse("ce9.15.3.17").unwrap() < threshold);
        assert!(FirmwareVersion::parse("RoomOS 10.8.2.5").unwrap() > threshold);
        assert!(FirmwareVersion::parse("9.15.10.8").unwrap() >= threshold);
        assert_eq!(
            FirmwareVersion::parse("9.15").unwrap(),
            FirmwareVersion::parse("9.15.0.0").unwrap()
        );
    }

    #[test]
    fn codec_info_reports_changes_once() {
        let mut info = CodecInfo::default();
        let status = json!({
            "SystemUnit": {"Software": {"Version": {"Value": "ce9.15.3.17"},
                                        "OptionKeys": {"MultiSite": {"Value": "True"}}},
                           "Hardware": {"Module": {"SerialNumber": {"Value": "FOC123"}}}},
            "Network": [{"id": "1", "IPv4": {"Address": {"Value": "10.1.2.3"}},
                         "Ethernet": {"MacAddress": {"Value": "00:11:22:33:44:55"}}}],
            "SIP": {"Registration": [{"id": "1", "URI": {"Value": "room@example.com"}}]}
        });
        assert!(info.apply_status(&status));
        assert!(!info.apply_status(&status));
        assert_eq!(info.serial_number, "FOC123");
        assert_eq!(info.ipv4_address, "10.1.2.3");
        assert_eq!(info.sip_uri, "room@example.com");
        assert!(info.multisite);
        assert!(info.apply_configuration(&json!({
            "H323": {"H323Alias": {"E164": {"Value": "5551000"}}},
            "Conference": {"AutoAnswer": {"Mode": {"Value": "Off"}}}
        })));
        assert_eq!(info.h323_e164, "5551000");
        assert_eq!(info.auto_answer, "Off");
    }

    #[test]
    fn camera_tracking_and_misc_status() {
        let mut tracking = CameraTracking::default();
        assert!(tracking.apply_status(&json!({"Cameras": {
            "SpeakerTrack": {"Availability": {"Value": "Available"}, "Status": {"Value": "Active"}},
            "PresenterTrack": {"Availability": {"Value": "Unavailable"}, "Status": {"Value": "Off"}}
        }})));
        assert!(tracking.speaker_track_available && tracking.speaker_track_active);
        assert!(!tracking.presenter_track_available);
        assert_eq!(tracking.presenter_track_mode, "Off");

        let mut misc = MiscStatus::default();
        assert!(misc.apply_status(&json!({
            "Conference": {"DoNotDisturb": {"Value": "Active"}},
            "Standby": {"State": {"Value": "Halfwake"}},
            "Audio": {"Volume": {"Value": "70"}, "Microphones": {"Mute": {"Value": "On"}}}
        })));
        assert!(misc.do_not_disturb);
        assert_eq!(misc.standby, StandbyState::Halfwake);
        assert_eq!(misc.volume, Some(70));
        assert!(misc.microphones_muted);
        assert!(!misc.apply_status(&json!({"Audio": {"Volume": {"Value": "70"}}})));
    }
}
