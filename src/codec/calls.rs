//! Active call list and the fragment merge rules.
//!
//! The codec reports calls as partial fragments under `Status.Call[]`: only the
//! fields that changed are present, and an ended call arrives as
//! `{"id": "..", "ghost": "True"}`. [`CallList`] folds those fragments into
//! durable [`ActiveCall`] records and reports what happened as a [`CallOutcome`]
//! so the engine can fan out side effects (events, layout polls, self-view,
//! call history) in one place.

use crate::protocol::json;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    Idle,
    Dialing,
    Ringing,
    Connecting,
    Connected,
    Disconnecting,
    OnHold,
    EarlyMedia,
    Preserved,
    RemotePreserved,
    Unknown,
}

impl CallStatus {
    pub fn from_wire(s: &str) -> Self {
        // older firmware spells it the British way
        let s = s.trim();
        let s = if s.eq_ignore_ascii_case("dialling") { "Dialing" } else { s };
        match s.to_ascii_lowercase().as_str() {
            "idle" => CallStatus::Idle,
            "dialing" => CallStatus::Dialing,
            "ringing" => CallStatus::Ringing,
            "connecting" => CallStatus::Connecting,
            "connected" => CallStatus::Connected,
            "disconnecting" => CallStatus::Disconnecting,
            "onhold" => CallStatus::OnHold,
            "earlymedia" => CallStatus::EarlyMedia,
            "preserved" => CallStatus::Preserved,
            "remotepreserved" => CallStatus::RemotePreserved,
            _ => CallStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "Idle",
            CallStatus::Dialing => "Dialing",
            CallStatus::Ringing => "Ringing",
            CallStatus::Connecting => "Connecting",
            CallStatus::Connected => "Connected",
            CallStatus::Disconnecting => "Disconnecting",
            CallStatus::OnHold => "OnHold",
            CallStatus::EarlyMedia => "EarlyMedia",
            CallStatus::Preserved => "Preserved",
            CallStatus::RemotePreserved => "RemotePreserved",
            CallStatus::Unknown => "Unknown",
        }
    }

    /// Statuses that count as an established media session.
    pub fn is_connected(&self) -> bool {
        matches!(self, CallStatus::Connected | CallStatus::OnHold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallType {
    Video,
    Audio,
    AudioCanEscalate,
    ForwardAllCall,
    Unknown,
}

impl CallType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => CallType::Video,
            "audio" => CallType::Audio,
            "audiocanescalate" => CallType::AudioCanEscalate,
            "forwardallcall" => CallType::ForwardAllCall,
            _ => CallType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallDirection {
    Incoming,
    Outgoing,
    Unknown,
}

impl CallDirection {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => CallDirection::Incoming,
            "outgoing" => CallDirection::Outgoing,
            _ => CallDirection::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveCall {
    pub id: String,
    pub status: CallStatus,
    pub call_type: CallType,
    pub direction: CallDirection,
    pub name: String,
    pub number: String,
    /// Seconds; `None` until the codec reports one.
    pub duration: Option<u32>,
    pub is_on_hold: bool,
}

impl ActiveCall {
    fn new(id: String) -> Self {
        Self {
            id,
            status: CallStatus::Unknown,
            call_type: CallType::Unknown,
            direction: CallDirection::Unknown,
            name: String::new(),
            number: String::new(),
            duration: None,
            is_on_hold: false,
        }
    }

    /// Apply the non-empty fields of `fragment`. Returns true when anything changed.
    fn merge(&mut self, fragment: &CallFragment) -> bool {
        let before = self.clone();
        if let Some(s) = fragment.status {
            self.status = s;
            self.is_on_hold = s == CallStatus::OnHold;
        }
        if let Some(t) = fragment.call_type {
            self.call_type = t;
        }
        if let Some(d) = fragment.direction {
            self.direction = d;
        }
        if let Some(name) = &fragment.name {
            self.name = name.clone();
        }
        if let Some(number) = &fragment.number {
            self.number = number.clone();
        }
        if let Some(secs) = fragment.duration {
            self.duration = Some(secs);
        }
        *self != before
    }
}

/// One `Call[]` item as it came off the wire. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFragment {
    pub id: String,
    pub ghost: bool,
    pub status: Option<CallStatus>,
    pub call_type: Option<CallType>,
    pub direction: Option<CallDirection>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub duration: Option<u32>,
}

fn non_empty(item: &Value, key: &str) -> Option<String> {
    json::text(item, &[key]).filter(|s| !s.trim().is_empty())
}

impl CallFragment {
    pub fn parse(item: &Value) -> Option<Self> {
        let id = json::id_of(item)?;
        Some(Self {
            id,
            ghost: json::is_ghost(item),
            status: non_empty(item, "Status").map(|s| CallStatus::from_wire(&s)),
            call_type: non_empty(item, "CallType").map(|s| CallType::from_wire(&s)),
            direction: non_empty(item, "Direction").map(|s| CallDirection::from_wire(&s)),
            name: non_empty(item, "DisplayName"),
            number: non_empty(item, "RemoteNumber").or_else(|| non_empty(item, "CallbackNumber")),
            duration: non_empty(item, "Duration").and_then(|s| s.trim().parse().ok()),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Added(ActiveCall),
    Changed(ActiveCall),
    Removed(ActiveCall),
    Unchanged,
}

/// Media-channel role flags for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFlags(u8);

impl MediaFlags {
    pub const INCOMING: MediaFlags = MediaFlags(1 << 0);
    pub const OUTGOING: MediaFlags = MediaFlags(1 << 1);
    pub const AUDIO: MediaFlags = MediaFlags(1 << 2);
    pub const VIDEO: MediaFlags = MediaFlags(1 << 3);
    pub const MAIN: MediaFlags = MediaFlags(1 << 4);
    pub const PRESENTATION: MediaFlags = MediaFlags(1 << 5);

    pub fn empty() -> Self {
        MediaFlags(0)
    }

    pub fn contains(self, other: MediaFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: MediaFlags) {
        self.0 |= other.0;
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Flags implied by one `Channel[]` item.
    fn from_channel(channel: &Value) -> Self {
        let mut flags = MediaFlags::empty();
        match json::text(channel, &["Direction"]).map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("incoming") => flags.insert(MediaFlags::INCOMING),
            Some("outgoing") => flags.insert(MediaFlags::OUTGOING),
            _ => {}
        }
        match json::text(channel, &["Type"]).map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("audio") => flags.insert(MediaFlags::AUDIO),
            Some("video") => flags.insert(MediaFlags::VIDEO),
            _ => {}
        }
        match json::text(channel, &["Video", "ChannelRole"])
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("main") => flags.insert(MediaFlags::MAIN),
            Some("presentation") => flags.insert(MediaFlags::PRESENTATION),
            _ => {}
        }
        flags
    }
}

#[derive(Debug, Default)]
pub struct CallList {
    calls: Vec<ActiveCall>,
    media: HashMap<String, MediaFlags>,
}

impl CallList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[ActiveCall] {
        &self.calls
    }

    pub fn get(&self, id: &str) -> Option<&ActiveCall> {
        self.calls.iter().find(|c| c.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn media_flags(&self, id: &str) -> MediaFlags {
        self.media.get(id).copied().unwrap_or_default()
    }

    pub fn in_connected_call(&self) -> bool {
        self.calls.iter().any(|c| c.status.is_connected())
    }

    /// Fold one fragment into the list.
    pub fn apply(&mut self, fragment: CallFragment) -> CallOutcome {
        let pos = self.calls.iter().position(|c| c.id == fragment.id);
        match (pos, fragment.ghost) {
            (Some(i), true) => {
                self.media.remove(&fragment.id);
                CallOutcome::Removed(self.calls.remove(i))
            }
            (None, true) => {
                log::debug!("ghost for unknown call id {}", fragment.id);
                CallOutcome::Unchanged
            }
            (Some(i), false) => {
                let call = &mut self.calls[i];
                if call.merge(&fragment) {
                    CallOutcome::Changed(call.clone())
                } else {
                    CallOutcome::Unchanged
                }
            }
            (None, false) => {
                let mut call = ActiveCall::new(fragment.id.clone());
                call.merge(&fragment);
                self.calls.push(call.clone());
                CallOutcome::Added(call)
            }
        }
    }

    /// Every `Call[]` item under a `Status` section.
    pub fn apply_status(&mut self, status: &Value) -> Vec<CallOutcome> {
        json::items(status, &["Call"])
            .into_iter()
            .filter_map(|item| match CallFragment::parse(item) {
                Some(f) => Some(self.apply(f)),
                None => {
                    log::debug!("call fragment without id ignored");
                    None
                }
            })
            .collect()
    }

    /// Remove by id (disconnect event).
    pub fn remove(&mut self, id: &str) -> Option<ActiveCall> {
        let i = self.calls.iter().position(|c| c.id == id)?;
        self.media.remove(id);
        Some(self.calls.remove(i))
    }

    /// OR channel flags from `Status.MediaChannels.Call[]` into each call's mask.
    /// A call whose mask gains the video bit is promoted to a video call.
    pub fn apply_media_channels(&mut self, status: &Value) -> Vec<CallOutcome> {
        let mut outcomes = Vec::new();
        for call_item in json::items(status, &["MediaChannels", "Call"]) {
            let Some(id) = json::id_of(call_item) else {
                continue;
            };
            if json::is_ghost(call_item) {
                self.media.remove(&id);
                continue;
            }
            let entry = self.media.entry(id.clone()).or_default();
            let had_video = entry.contains(MediaFlags::VIDEO);
            for channel in json::items(call_item, &["Channel"]) {
                if json::is_ghost(channel) {
                    continue;
                }
                entry.insert(MediaFlags::from_channel(channel));
            }
            if !had_video && entry.contains(MediaFlags::VIDEO) {
                if let Some(call) = self.calls.iter_mut().find(|c| c.id == id) {
                    if call.call_type != CallType::Video {
                        call.call_type = CallType::Video;
                        outcomes.push(CallOutcome::Changed(call.clone()));
                    }
                }
            }
        }
        outcomes
    }

    /// Empty the list, handing back the calls it held.
    pub fn take_all(&mut self) -> Vec<ActiveCall> {
        self.media.clear();
        std::mem::take(&mut self.calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frag(v: Value) -> CallFragment {
        CallFragment::parse(&v).unwrap()
    }

    #[test]
    fn wire_strings_normalize_and_fall_back_to_unknown() {
        assert_eq!(CallStatus::from_wire("Dialling"), CallStatus::Dialing);
        assert_eq!(CallStatus::from_wire("OnHold"), CallStatus::OnHold);
        assert_eq!(CallStatus::from_wire("Bogus"), CallStatus::Unknown);
        assert_eq!(CallType::from_wire("AudioCanEscalate"), CallType::AudioCanEscalate);
        assert_eq!(CallType::from_wire(""), CallType::Unknown);
        assert_eq!(CallDirection::from_wire("outgoing"), CallDirection::Outgoing);
    }

    #[test]
    fn new_call_gets_defaults() {
        let mut list = CallList::new();
        let out = list.apply(frag(json!({"id": "4", "Status": {"Value": "Dialling"}})));
        let CallOutcome::Added(call) = out else {
            panic!("expected Added, got {:?}", out)
        };
        assert_eq!(call.status, CallStatus::Dialing);
        assert_eq!(call.call_type, CallType::Unknown);
        assert_eq!(call.direction, CallDirection::Unknown);
        assert_eq!(call.duration, None);
    }

    #[test]
    fn merge_keeps_last_non_empty_values() {
        let mut list = CallList::new();
        list.apply(frag(json!({"id": "1", "Status": {"Value": "Dialing"}, "DisplayName": {"Value": "Lobby"}})));
        list.apply(frag(json!({"id": "1", "RemoteNumber": {"Value": "1001@example.com"}, "DisplayName": {"Value": ""}})));
        list.apply(frag(json!({"id": "1", "Status": {"Value": "Connected"}, "CallType": {"Value": "Video"}, "Duration": {"Value": "12"}})));
        let out = list.apply(frag(json!({"id": "1", "Direction": {"Value": "Outgoing"}})));
        assert!(matches!(out, CallOutcome::Changed(_)));

        let call = list.get("1").unwrap();
        assert_eq!(call.status, CallStatus::Connected);
        assert_eq!(call.name, "Lobby");
        assert_eq!(call.number, "1001@example.com");
        assert_eq!(call.call_type, CallType::Video);
        assert_eq!(call.direction, CallDirection::Outgoing);
        assert_eq!(call.duration, Some(12));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn identical_fragment_is_unchanged() {
        let mut list = CallList::new();
        list.apply(frag(json!({"id": "1", "Status": {"Value": "Connected"}})));
        let out = list.apply(frag(json!({"id": "1", "Status": {"Value": "Connected"}})));
        assert_eq!(out, CallOutcome::Unchanged);
    }

    #[test]
    fn hold_status_drives_hold_flag() {
        let mut list = CallList::new();
        list.apply(frag(json!({"id": "2", "Status": {"Value": "Connected"}})));
        list.apply(frag(json!({"id": "2", "Status": {"Value": "OnHold"}})));
        assert!(list.get("2").unwrap().is_on_hold);
        list.apply(frag(json!({"id": "2", "Status": {"Value": "Connected"}})));
        assert!(!list.get("2").unwrap().is_on_hold);
    }

    #[test]
    fn ghost_removes_exactly_that_call() {
        let mut list = CallList::new();
        let status = json!({"Call": [{"id": "1", "Status": {"Value": "Connected"}}, {"id": "2", "Status": {"Value": "Ringing"}}]});
        assert_eq!(list.apply_status(&status).len(), 2);
        let outs = list.apply_status(&json!({"Call": {"id": "1", "ghost": "True"}}));
        assert!(matches!(&outs[..], [CallOutcome::Removed(c)] if c.id == "1"));
        assert!(list.get("1").is_none());
        assert!(list.get("2").is_some());
        // a second ghost is a no-op
        let outs = list.apply_status(&json!({"Call": {"id": "1", "ghost": "True"}}));
        assert_eq!(outs, vec![CallOutcome::Unchanged]);
    }

    #[test]
    fn video_channel_promotes_call_type() {
        let mut list = CallList::new();
        list.apply(frag(json!({"id": "5", "CallType": {"Value": "Audio"}})));
        let media = json!({"MediaChannels": {"Call": [{"id": "5", "Channel": [
            {"id": "1", "Direction": {"Value": "Incoming"}, "Type": {"Value": "Audio"}},
            {"id": "2", "Direction": {"Value": "Incoming"}, "Type": {"Value": "Video"},
             "Video": {"ChannelRole": {"Value": "Main"}}}
        ]}]}});
        let outs = list.apply_media_channels(&media);
        assert_eq!(outs.len(), 1);
        assert_eq!(list.get("5").unwrap().call_type, CallType::Video);
        let flags = list.media_flags("5");
        assert!(flags.contains(MediaFlags::INCOMING));
        assert!(flags.contains(MediaFlags::AUDIO));
        assert!(flags.contains(MediaFlags::VIDEO));
        assert!(flags.contains(MediaFlags::MAIN));
        assert!(!flags.contains(MediaFlags::PRESENTATION));
        // already video: no second promotion
        assert!(list.apply_media_channels(&media).is_empty());
    }
}
