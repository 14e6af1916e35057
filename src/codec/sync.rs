//! Handshake milestones.
//!
//! Each milestone flips to true at most once per connection. `InitialSyncComplete`
//! is derived, and the completion notification is handed out exactly once until the
//! next [`SyncState::reset`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    LoginMessageReceived,
    JsonModeSet,
    FeedbackRegistered,
    InitialStatusReceived,
    InitialConfigurationReceived,
    InitialSoftwareVersionReceived,
}

impl Milestone {
    pub const ALL: [Milestone; 6] = [
        Milestone::LoginMessageReceived,
        Milestone::JsonModeSet,
        Milestone::FeedbackRegistered,
        Milestone::InitialStatusReceived,
        Milestone::InitialConfigurationReceived,
        Milestone::InitialSoftwareVersionReceived,
    ];
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Milestone::LoginMessageReceived => "login",
            Milestone::JsonModeSet => "json mode",
            Milestone::FeedbackRegistered => "feedback registered",
            Milestone::InitialStatusReceived => "initial status",
            Milestone::InitialConfigurationReceived => "initial configuration",
            Milestone::InitialSoftwareVersionReceived => "software version",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    login_message_received: bool,
    json_mode_set: bool,
    feedback_registered: bool,
    initial_status_received: bool,
    initial_configuration_received: bool,
    initial_software_version_received: bool,
    completion_reported: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, m: Milestone) -> bool {
        match m {
            Milestone::LoginMessageReceived => self.login_message_received,
            Milestone::JsonModeSet => self.json_mode_set,
            Milestone::FeedbackRegistered => self.feedback_registered,
            Milestone::InitialStatusReceived => self.initial_status_received,
            Milestone::InitialConfigurationReceived => self.initial_configuration_received,
            Milestone::InitialSoftwareVersionReceived => self.initial_software_version_received,
        }
    }

    /// Set a milestone. Returns true only on the false→true transition.
    pub fn mark(&mut self, m: Milestone) -> bool {
        let slot = match m {
            Milestone::LoginMessageReceived => &mut self.login_message_received,
            Milestone::JsonModeSet => &mut self.json_mode_set,
            Milestone::FeedbackRegistered => &mut self.feedback_registered,
            Milestone::InitialStatusReceived => &mut self.initial_status_received,
            Milestone::InitialConfigurationReceived => &mut self.initial_configuration_received,
            Milestone::InitialSoftwareVersionReceived => {
                &mut self.initial_software_version_received
            }
        };
        if *slot {
            return false;
        }
        *slot = true;
        log::info!("sync milestone reached: {}", m);
        true
    }

    pub fn is_complete(&self) -> bool {
        Milestone::ALL.iter().all(|m| self.get(*m))
    }

    /// True exactly once per connection: the first call after every milestone is set.
    pub fn take_completion(&mut self) -> bool {
        if self.completion_reported || !self.is_complete() {
            return false;
        }
        self.completion_reported = true;
        true
    }

    /// Milestones still outstanding, for timeout diagnostics.
    pub fn pending(&self) -> Vec<Milestone> {
        Milestone::ALL
            .iter()
            .copied()
            .filter(|m| !self.get(*m))
            .collect()
    }

    /// Back to all-false. Safe to call repeatedly.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
