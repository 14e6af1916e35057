//! Presentation (content sharing) state and the video layout set.
//!
//! Two layout families exist. Firmware below the enhanced-layouts threshold
//! gets the fixed legacy `LayoutFamily` list; newer firmware reports its own
//! `CurrentLayouts`. Only one family is live at a time.

use crate::codec::status::FirmwareVersion;
use crate::protocol::json;
use crate::validation::{quote_argument, ArgumentError, ArgumentRules};
use serde::Serialize;
use serde_json::Value;

pub const CMD_PRESENTATION_STOP: &str = "xCommand Presentation Stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SendingMode {
    LocalOnly,
    LocalRemote,
}

impl SendingMode {
    pub fn as_wire(&self) -> &'static str {
        match self {
            SendingMode::LocalOnly => "LocalOnly",
            SendingMode::LocalRemote => "LocalRemote",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresentationState {
    pub desired_source: u32,
    pub active_source: u32,
    pub sending_local_only: bool,
    pub sending_local_remote: bool,
    pub is_active: bool,
    pub is_in_presentation: bool,
}

/// What a presentation update did, for the engine to act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationUpdate {
    pub changed: bool,
    pub active_changed: bool,
    pub clear_layouts: bool,
}

#[derive(Debug, Default)]
pub struct Presentation {
    state: PresentationState,
    mode: Option<SendingMode>,
}

impl Presentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    pub fn set_desired_source(&mut self, source: u32) {
        self.state.desired_source = source;
    }

    pub fn set_sending_mode(&mut self, mode: SendingMode) {
        self.mode = Some(mode);
    }

    /// `None` until a source > 0 has been chosen.
    pub fn start_command(&self) -> Option<String> {
        if self.state.desired_source == 0 {
            return None;
        }
        let mode = self.mode.unwrap_or(SendingMode::LocalRemote);
        Some(format!(
            "xCommand Presentation Start PresentationSource: {} SendingMode: {}",
            self.state.desired_source,
            mode.as_wire()
        ))
    }

    /// Fold `Status.Conference.Presentation` into the state.
    pub fn apply_status(&mut self, status: &Value) -> PresentationUpdate {
        let Some(pres) = json::at(status, &["Conference", "Presentation"]) else {
            return PresentationUpdate::default();
        };
        let before = self.state.clone();
        let mut clear_layouts = false;

        if let Some(mode) = json::text(pres, &["Mode"]) {
            self.state.is_in_presentation = !mode.eq_ignore_ascii_case("off");
        }

        for instance in json::items(pres, &["LocalInstance"]) {
            if json::is_ghost(instance) {
                self.state.active_source = 0;
                self.state.sending_local_only = false;
                self.state.sending_local_remote = false;
                self.state.is_active = false;
                clear_layouts = true;
                continue;
            }
            if let Some(mode) = json::text(instance, &["SendingMode"]) {
                let mode = mode.to_ascii_lowercase();
                self.state.sending_local_only = mode == "localonly";
                self.state.sending_local_remote = mode == "localremote";
                self.state.is_active =
                    self.state.sending_local_only || self.state.sending_local_remote;
            }
            if let Some(src) = json::int(instance, &["Source"]) {
                self.state.active_source = u32::try_from(src).unwrap_or(0);
            }
        }

        let changed = self.state != before;
        if changed && self.state.active_source == 0 && before.active_source != 0 {
            clear_layouts = true;
        }
        PresentationUpdate {
            changed,
            active_changed: self.state.is_active != before.is_active,
            clear_layouts,
        }
    }

    pub fn reset(&mut self) {
        let desired = self.state.desired_source;
        self.state = PresentationState {
            desired_source: desired,
            ..Default::default()
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayoutFamily {
    Legacy,
    Enhanced,
}

impl LayoutFamily {
    pub fn select(firmware: &FirmwareVersion, threshold: &FirmwareVersion) -> Self {
        if firmware >= threshold {
            LayoutFamily::Enhanced
        } else {
            LayoutFamily::Legacy
        }
    }

    pub fn poll_command(&self) -> &'static str {
        match self {
            LayoutFamily::Legacy => "xStatus Video Layout LayoutFamily",
            LayoutFamily::Enhanced => "xStatus Video Layout CurrentLayouts",
        }
    }
}

pub const LEGACY_LAYOUTS: [&str; 4] = ["Equal", "Overlay", "Prominent", "Single"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutOption {
    /// Token sent back to the codec.
    pub command: String,
    /// Name shown to users.
    pub label: String,
}

impl LayoutOption {
    pub fn new(command: &str) -> Self {
        let label = if command.eq_ignore_ascii_case("grid") {
            "Side by Side".to_string()
        } else {
            command.to_string()
        };
        Self {
            command: command.to_string(),
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutChanges {
    pub available: bool,
    pub current: bool,
}

impl LayoutChanges {
    pub fn any(&self) -> bool {
        self.available || self.current
    }
}

#[derive(Debug)]
pub struct LayoutSet {
    family: LayoutFamily,
    threshold: FirmwareVersion,
    available: Vec<LayoutOption>,
    current: String,
}

impl LayoutSet {
    pub fn new(threshold: FirmwareVersion) -> Self {
        Self {
            family: LayoutFamily::Legacy,
            threshold,
            available: Vec::new(),
            current: String::new(),
        }
    }

    pub fn family(&self) -> LayoutFamily {
        self.family
    }

    pub fn available(&self) -> &[LayoutOption] {
        &self.available
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn poll_command(&self) -> &'static str {
        self.family.poll_command()
    }

    /// Pick the family for this firmware. Switching families drops the old state.
    pub fn select_family(&mut self, firmware: &FirmwareVersion) -> LayoutChanges {
        let family = LayoutFamily::select(firmware, &self.threshold);
        if family != self.family {
            log::info!("layout family for firmware {}: {:?}", firmware, family);
        }
        self.use_family(family)
    }

    pub fn use_family(&mut self, family: LayoutFamily) -> LayoutChanges {
        if family == self.family {
            return LayoutChanges::default();
        }
        self.family = family;
        self.clear()
    }

    /// Calls came or went. The legacy list is only offered while in a call; with
    /// no calls both families are emptied.
    pub fn on_calls_changed(&mut self, has_calls: bool) -> LayoutChanges {
        if !has_calls {
            return self.clear();
        }
        match self.family {
            LayoutFamily::Legacy => self.set_available(legacy_options()),
            LayoutFamily::Enhanced => LayoutChanges::default(),
        }
    }

    /// Fold `Status.Video.Layout` into the set.
    pub fn apply_status(&mut self, status: &Value, has_calls: bool) -> LayoutChanges {
        let Some(layout) = json::at(status, &["Video", "Layout"]) else {
            return LayoutChanges::default();
        };
        if !has_calls {
            return LayoutChanges::default();
        }
        match self.family {
            LayoutFamily::Legacy => {
                let mut changes = self.set_available(legacy_options());
                if let Some(local) = json::text(layout, &["LayoutFamily", "Local"]) {
                    let label = LEGACY_LAYOUTS
                        .iter()
                        .find(|l| l.eq_ignore_ascii_case(&local))
                        .map(|l| l.to_string())
                        .unwrap_or(local);
                    changes.current = self.set_current(label);
                }
                changes
            }
            LayoutFamily::Enhanced => {
                let mut changes = LayoutChanges::default();
                let current_layouts = json::at(layout, &["CurrentLayouts"]);
                if let Some(cl) = current_layouts {
                    let names: Vec<LayoutOption> = json::items(cl, &["AvailableLayouts"])
                        .into_iter()
                        .filter(|item| !json::is_ghost(item))
                        .filter_map(|item| json::text(item, &["LayoutName"]))
                        .map(|name| LayoutOption::new(&name))
                        .collect();
                    if json::at(cl, &["AvailableLayouts"]).is_some() {
                        changes = self.set_available(names);
                    }
                    if let Some(active) = json::text(cl, &["ActiveLayout"]) {
                        changes.current = self.set_current(LayoutOption::new(&active).label);
                    }
                }
                changes
            }
        }
    }

    /// Build the command selecting the layout with this label (or command token).
    pub fn set_command(&self, label: &str) -> Result<Option<String>, ArgumentError> {
        let Some(option) = self
            .available
            .iter()
            .find(|o| o.label == label || o.command == label)
        else {
            return Ok(None);
        };
        let cmd = match self.family {
            LayoutFamily::Legacy => format!(
                "xCommand Video Layout LayoutFamily Set LayoutFamily: {}",
                option.command.to_ascii_lowercase()
            ),
            LayoutFamily::Enhanced => format!(
                "xCommand Video Layout SetLayout LayoutName: {}",
                quote_argument(&option.command, &ArgumentRules::identifier())?
            ),
        };
        Ok(Some(cmd))
    }

    pub fn clear(&mut self) -> LayoutChanges {
        LayoutChanges {
            available: self.set_available(Vec::new()).available,
            current: self.set_current(String::new()),
        }
    }

    fn set_available(&mut self, options: Vec<LayoutOption>) -> LayoutChanges {
        if self.available == options {
            return LayoutChanges::default();
        }
        self.available = options;
        LayoutChanges {
            available: true,
            current: false,
        }
    }

    fn set_current(&mut self, label: String) -> bool {
        if self.current == label {
            return false;
        }
        self.current = label;
        true
    }
}

fn legacy_options() -> Vec<LayoutOption> {
    LEGACY_LAYOUTS.iter().map(|l| LayoutOption::new(l)).collect()
}
