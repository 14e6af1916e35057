//! # Codec synchronization engine
//!
//! [`CodecEngine`] owns every piece of per-connection protocol state: the sync
//! milestones, the login negotiator, both reassemblers, the call list,
//! presentation and layouts, the directory browser, and the codec info. It does
//! no IO. Raw bytes and connection changes go in; typed [`CodecEvent`]s come out,
//! and outbound commands are appended to the shared [`CommandQueue`].
//!
//! [`device::CodecDevice`] runs the engine against a real transport.
//!
//! ## Handshake
//!
//! ```text
//! login ─► xPreferences outputmode json ─► echo ─► status probes
//!       ─► Status ─► xConfiguration + xFeedback register ... + xFeedback list
//!       ─► Configuration ─► xStatus SystemUnit ─► firmware version
//!       ─► sentinel registered ─► InitialSyncComplete (once)
//! ```
//!
//! Handshake commands use the handshake lane of the queue; everything else waits
//! in the normal lane until sync completes.

pub mod bookings;
pub mod calls;
pub mod device;
pub mod directory;
pub mod dispatch;
pub mod presentation;
pub mod queue;
pub mod requests;
pub mod status;
pub mod sync;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::Config;
use crate::error::{CodecError, Result};
use crate::logutil::escape_log;
use crate::metrics;
use crate::protocol::{
    self, json, xsig, LineReassembler, LoginAction, LoginNegotiator, LoginState, Message,
    MessageReassembler,
};
use crate::validation::{quote_argument, validate_argument, ArgumentError, ArgumentRules};

pub use bookings::{Booking, BookingSchedule, CallHistoryEntry};
pub use calls::{ActiveCall, CallDirection, CallList, CallOutcome, CallStatus, CallType};
pub use directory::{Directory, DirectoryBrowser, DirectoryItem, PhonebookSyncState};
pub use dispatch::{Response, ResponseDispatcher, Section};
pub use presentation::{
    LayoutChanges, LayoutFamily, LayoutOption, LayoutSet, Presentation, PresentationState,
    SendingMode,
};
pub use queue::{CommandQueue, CommandReceiver, Lane};
pub use requests::{RequestTable, SearchTagQueue};
pub use status::{CameraTracking, CodecInfo, FirmwareVersion, MiscStatus};
pub use sync::{Milestone, SyncState};

/// Camera discovery probe sent once sync completes.
const CMD_CAMERA_DISCOVERY: &str = "xStatus Cameras";

/// Upward notifications. Consumers subscribe to the stream of these rather than
/// registering callbacks on individual components.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecEvent {
    Connected(bool),
    LoggedIn,
    LoginRejected,
    SyncComplete,
    CallStatusChanged(ActiveCall),
    CallDisconnected(ActiveCall),
    CallHistoryUpdated(Vec<CallHistoryEntry>),
    DirectoryResult(Directory),
    PhonebookSynced(PhonebookSyncState),
    AvailableLayoutsChanged(Vec<LayoutOption>),
    CurrentLayoutChanged(String),
    CodecInfoChanged(CodecInfo),
    CameraTrackingChanged(CameraTracking),
    PresentationChanged(PresentationState),
    PresentationActiveChanged(bool),
    MiscStatusChanged(MiscStatus),
    BookingsUpdated(Vec<Booking>),
    MeetingStartingSoon(Booking),
}

/// Outbound operations accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Dial(String),
    EndCall(String),
    EndAllCalls,
    AcceptCall(String),
    RejectCall(String),
    Hold(String),
    Resume(String),
    StartSharing,
    StopSharing,
    SetShareSource(u32),
    SetSendingMode(SendingMode),
    SetLayout(String),
    SetSelfView(bool),
    SetDoNotDisturb(bool),
    Standby(bool),
    SearchDirectory(String),
    GetFolderContents(String),
    DirectoryUp,
    ResetDirectory,
}

/// Point-in-time view of the engine, for status output and tests.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub connected: bool,
    pub logged_in: bool,
    pub sync_complete: bool,
    pub pending_milestones: Vec<String>,
    pub calls: Vec<ActiveCall>,
    pub presentation: PresentationState,
    pub layout_family: LayoutFamily,
    pub available_layouts: Vec<LayoutOption>,
    pub current_layout: String,
    pub codec_info: CodecInfo,
    pub camera_tracking: CameraTracking,
    pub misc: MiscStatus,
    pub phonebook: PhonebookSyncState,
    pub bookings: usize,
    pub pending_requests: usize,
    pub pending_searches: usize,
}

fn on_off(on: bool) -> &'static str {
    if on {
        "On"
    } else {
        "Off"
    }
}

/// Call ids are small integers assigned by the codec.
fn call_id_arg(id: &str) -> std::result::Result<u32, ArgumentError> {
    validate_argument(id, &ArgumentRules::identifier())?;
    id.trim().parse().map_err(|_| ArgumentError::InvalidCharacters {
        chars: id.chars().filter(|c| !c.is_ascii_digit()).collect(),
    })
}

pub struct CodecEngine {
    config: Config,
    queue: CommandQueue,
    connected: bool,
    sync: SyncState,
    login: LoginNegotiator,
    lines: LineReassembler,
    messages: MessageReassembler,
    requests: Arc<RequestTable>,
    search_tags: Arc<SearchTagQueue>,
    calls: CallList,
    presentation: Presentation,
    layouts: LayoutSet,
    directory: DirectoryBrowser,
    info: CodecInfo,
    tracking: CameraTracking,
    misc: MiscStatus,
    schedule: BookingSchedule,
    history: Vec<CallHistoryEntry>,
    self_view_sent: Option<bool>,
    events: Vec<CodecEvent>,
}

impl CodecEngine {
    pub fn new(config: &Config, queue: CommandQueue, is_serial: bool) -> Result<Self> {
        let threshold = config
            .layouts
            .threshold()
            .map_err(|e| CodecError::Config(e.to_string()))?;
        let search_tags = Arc::new(SearchTagQueue::new());
        Ok(Self {
            config: config.clone(),
            queue,
            connected: false,
            sync: SyncState::new(),
            login: LoginNegotiator::new(&config.codec.username, &config.codec.password, is_serial),
            lines: LineReassembler::crlf(),
            messages: MessageReassembler::new(),
            requests: Arc::new(RequestTable::new(config.timing.request_timeout())),
            search_tags: Arc::clone(&search_tags),
            calls: CallList::new(),
            presentation: Presentation::new(),
            layouts: LayoutSet::new(threshold),
            directory: DirectoryBrowser::new(config.directory.clone(), search_tags),
            info: CodecInfo::default(),
            tracking: CameraTracking::default(),
            misc: MiscStatus::default(),
            schedule: BookingSchedule::new(),
            history: Vec::new(),
            self_view_sent: None,
            events: Vec::new(),
        })
    }

    // ----- observers -------------------------------------------------------

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    pub fn is_synced(&self) -> bool {
        self.sync.is_complete()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn login_state(&self) -> LoginState {
        self.login.state()
    }

    pub fn calls(&self) -> &[ActiveCall] {
        self.calls.calls()
    }

    pub fn presentation(&self) -> &PresentationState {
        self.presentation.state()
    }

    pub fn layouts(&self) -> &LayoutSet {
        &self.layouts
    }

    pub fn directory(&self) -> &DirectoryBrowser {
        &self.directory
    }

    pub fn codec_info(&self) -> &CodecInfo {
        &self.info
    }

    pub fn camera_tracking(&self) -> &CameraTracking {
        &self.tracking
    }

    pub fn misc_status(&self) -> &MiscStatus {
        &self.misc
    }

    pub fn bookings(&self) -> &[Booking] {
        self.schedule.bookings()
    }

    pub fn call_history(&self) -> &[CallHistoryEntry] {
        &self.history
    }

    pub fn request_table(&self) -> Arc<RequestTable> {
        Arc::clone(&self.requests)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            connected: self.connected,
            logged_in: self.login.is_logged_in(),
            sync_complete: self.sync.is_complete(),
            pending_milestones: self.sync.pending().iter().map(|m| m.to_string()).collect(),
            calls: self.calls.calls().to_vec(),
            presentation: self.presentation.state().clone(),
            layout_family: self.layouts.family(),
            available_layouts: self.layouts.available().to_vec(),
            current_layout: self.layouts.current().to_string(),
            codec_info: self.info.clone(),
            camera_tracking: self.tracking.clone(),
            misc: self.misc.clone(),
            phonebook: self.directory.sync_state().clone(),
            bookings: self.schedule.bookings().len(),
            pending_requests: self.requests.len(),
            pending_searches: self.search_tags.len(),
        }
    }

    /// XSig bytes for the directory page currently shown.
    pub fn directory_xsig(&self) -> Vec<u8> {
        xsig::encode_tokens(&xsig::directory_tokens(self.directory.current()))
    }

    /// XSig bytes for the active call list.
    pub fn calls_xsig(&self) -> Vec<u8> {
        xsig::encode_tokens(&xsig::active_call_tokens(self.calls.calls()))
    }

    // ----- inbound ---------------------------------------------------------

    fn emit(&mut self, event: CodecEvent) {
        self.events.push(event);
    }

    fn take_events(&mut self) -> Vec<CodecEvent> {
        std::mem::take(&mut self.events)
    }

    /// Transport connection status changed.
    pub fn handle_connection(&mut self, connected: bool) -> Vec<CodecEvent> {
        if connected {
            self.reset_session();
            self.connected = true;
            log::info!("codec transport connected");
            if !self.login.is_serial() {
                // a SystemUnit reply doubles as the login banner on sockets
                self.queue.enqueue_handshake(protocol::CMD_SYSTEM_UNIT);
            }
        } else {
            if self.connected {
                log::warn!("codec transport disconnected");
            }
            self.connected = false;
            self.reset_session();
        }
        self.emit(CodecEvent::Connected(connected));
        self.take_events()
    }

    /// Everything that belongs to one connection goes back to its initial state.
    fn reset_session(&mut self) {
        self.sync.reset();
        self.login.reset();
        self.lines.clear();
        self.messages.reset();
        self.requests.clear();
        self.directory.on_disconnect();
        self.self_view_sent = None;
        let dropped = self.calls.take_all();
        if !dropped.is_empty() {
            for call in dropped {
                log::info!("call {} dropped with the connection", call.id);
                self.emit(CodecEvent::CallDisconnected(call));
            }
            let changes = self.layouts.clear();
            self.emit_layout_changes(changes);
        }
        let was_presenting = self.presentation.state().is_active;
        self.presentation.reset();
        if was_presenting {
            self.emit(CodecEvent::PresentationActiveChanged(false));
        }
    }

    /// Raw bytes from the transport, in arrival order.
    pub fn handle_received(&mut self, data: &[u8]) -> Vec<CodecEvent> {
        for line in self.lines.push(data) {
            metrics::inc_lines_received();
            self.handle_line(&line);
        }
        if !self.login.is_logged_in() {
            let partial = self.lines.partial();
            if !partial.trim().is_empty() {
                let consumed = matches!(
                    self.observe_login(&partial),
                    LoginAction::Send(_) | LoginAction::Rejected
                );
                if consumed {
                    self.lines.discard_partial();
                }
            }
        }
        self.check_completion();
        self.take_events()
    }

    fn observe_login(&mut self, text: &str) -> LoginAction {
        let action = self.login.observe(text);
        match &action {
            LoginAction::Send(credential) => {
                log::debug!("answering login prompt");
                self.queue.enqueue_handshake(credential.clone());
            }
            LoginAction::LoggedIn => self.on_logged_in(),
            LoginAction::Rejected => {
                log::error!("codec rejected the configured credentials");
                self.emit(CodecEvent::LoginRejected);
            }
            LoginAction::None => {}
        }
        action
    }

    fn on_logged_in(&mut self) {
        self.emit(CodecEvent::LoggedIn);
        if self.sync.mark(Milestone::LoginMessageReceived) {
            self.queue.enqueue_handshake(protocol::CMD_OUTPUT_MODE_JSON);
        }
    }

    fn handle_line(&mut self, line: &str) {
        if !self.login.is_logged_in() {
            self.observe_login(line);
        }
        for message in self.messages.push_line(line) {
            metrics::inc_messages_dispatched();
            match message {
                Message::Json(text) => self.handle_json(&text),
                Message::FeedbackList(body) => self.handle_feedback_list(&body),
                Message::Line(text) => self.handle_plain_line(&text),
            }
        }
    }

    fn handle_plain_line(&mut self, line: &str) {
        let lower = protocol::strip_delimiter(line).trim().to_lowercase();
        if lower.contains(&protocol::CMD_OUTPUT_MODE_JSON.to_lowercase()) {
            if self.sync.mark(Milestone::JsonModeSet)
                && !self.sync.get(Milestone::InitialStatusReceived)
            {
                for probe in protocol::BOOTSTRAP_STATUS_PROBES {
                    self.queue.enqueue_handshake(probe);
                }
            }
            return;
        }
        if lower == protocol::sentinel_registration_echo() {
            self.sync.mark(Milestone::FeedbackRegistered);
            return;
        }
        log::trace!("line: {}", escape_log(line));
    }

    fn handle_feedback_list(&mut self, body: &str) {
        let missing = protocol::missing_feedback_paths(body);
        if !missing.contains(&protocol::FEEDBACK_SENTINEL) {
            self.sync.mark(Milestone::FeedbackRegistered);
        }
        if missing.is_empty() {
            log::debug!("feedback registrations intact");
            return;
        }
        if self.sync.is_complete() {
            log::warn!(
                "codec lost {} feedback registration(s) ({}); registering again",
                missing.len(),
                missing.join(", ")
            );
            self.queue
                .enqueue(protocol::feedback_registration_expression());
        } else {
            log::debug!("feedback list incomplete during handshake: {} missing", missing.len());
        }
    }

    fn handle_json(&mut self, text: &str) {
        let Some(response) = ResponseDispatcher::parse_or_log(text) else {
            return;
        };
        if let Some(status) = response.section(Section::Status) {
            self.handle_status(status);
        }
        if let Some(config) = response.section(Section::Configuration) {
            self.handle_configuration(config);
        }
        if let Some(event) = response.section(Section::Event) {
            self.handle_event(event);
        }
        match response.result_id.as_deref() {
            Some(tag) => self.handle_tagged(tag, &response),
            None => {
                if let Some(cr) = response.section(Section::CommandResponse) {
                    self.handle_command_response(cr);
                }
            }
        }
    }

    fn handle_status(&mut self, status: &Value) {
        if self.sync.mark(Milestone::InitialStatusReceived) {
            if !self.sync.get(Milestone::InitialConfigurationReceived) {
                self.queue.enqueue_handshake(protocol::CMD_CONFIGURATION);
            }
            if !self.sync.get(Milestone::FeedbackRegistered) {
                self.queue
                    .enqueue_handshake(protocol::feedback_registration_expression());
                self.queue.enqueue_handshake(protocol::CMD_FEEDBACK_LIST);
            }
        }

        if self.info.apply_status(status) {
            self.emit(CodecEvent::CodecInfoChanged(self.info.clone()));
        }
        if json::at(status, &["SystemUnit", "Software", "Version"]).is_some() {
            self.sync.mark(Milestone::InitialSoftwareVersionReceived);
            let mut changes = match &self.info.firmware {
                Some(firmware) => self.layouts.select_family(firmware),
                None => self.layouts.use_family(LayoutFamily::Legacy),
            };
            if changes.any() || !self.calls.is_empty() {
                let refill = self.layouts.on_calls_changed(!self.calls.is_empty());
                changes.available |= refill.available;
                changes.current |= refill.current;
            }
            self.emit_layout_changes(changes);
        }

        let mut outcomes = self.calls.apply_status(status);
        outcomes.extend(self.calls.apply_media_channels(status));
        self.handle_call_outcomes(outcomes);

        let update = self.presentation.apply_status(status);
        if update.changed {
            self.emit(CodecEvent::PresentationChanged(self.presentation.state().clone()));
        }
        if update.active_changed {
            self.emit(CodecEvent::PresentationActiveChanged(
                self.presentation.state().is_active,
            ));
        }
        if update.clear_layouts {
            let changes = self.layouts.clear();
            self.emit_layout_changes(changes);
        }
        if update.changed {
            self.poll_layouts();
        }

        let changes = self.layouts.apply_status(status, !self.calls.is_empty());
        self.emit_layout_changes(changes);

        if self.tracking.apply_status(status) {
            self.emit(CodecEvent::CameraTrackingChanged(self.tracking.clone()));
        }
        if self.misc.apply_status(status) {
            self.emit(CodecEvent::MiscStatusChanged(self.misc.clone()));
        }
    }

    fn handle_configuration(&mut self, config: &Value) {
        if self.sync.mark(Milestone::InitialConfigurationReceived)
            && !self.sync.get(Milestone::InitialSoftwareVersionReceived)
        {
            self.queue.enqueue_handshake(protocol::CMD_SYSTEM_UNIT);
        }
        if self.info.apply_configuration(config) {
            self.emit(CodecEvent::CodecInfoChanged(self.info.clone()));
        }
    }

    fn handle_event(&mut self, event: &Value) {
        if let Some(id) = json::text(event, &["CallDisconnect", "CallId"]) {
            if let Some(call) = self.calls.remove(&id) {
                self.handle_call_outcomes(vec![CallOutcome::Removed(call)]);
            }
        }
        if json::at(event, &["Bookings"]).is_some() {
            self.queue.enqueue(bookings::CMD_BOOKINGS_LIST);
        }
        if json::at(event, &["CameraPresetListUpdated"]).is_some() {
            log::debug!("camera preset list updated");
        }
    }

    fn handle_command_response(&mut self, cr: &Value) {
        if let Some(result) = cr.get("PhonebookSearchResult") {
            let step = self.directory.handle_bootstrap_result(result);
            if let Some(cmd) = step.next_command {
                self.queue.enqueue(cmd);
            }
            if step.root_changed {
                self.emit(CodecEvent::DirectoryResult(self.directory.root().clone()));
            }
            if step.completed {
                self.emit(CodecEvent::PhonebookSynced(self.directory.sync_state().clone()));
            }
        }
        if let Some(result) = cr.get("CallHistoryRecentsResult") {
            self.history = bookings::parse_call_history(result);
            self.emit(CodecEvent::CallHistoryUpdated(self.history.clone()));
        }
        if let Some(result) = cr.get("BookingsListResult") {
            if self.schedule.replace(bookings::parse_bookings(result)) {
                self.emit(CodecEvent::BookingsUpdated(self.schedule.bookings().to_vec()));
            }
        }
    }

    /// Responses carrying a `ResultId`: tagged requests first, then directory searches.
    fn handle_tagged(&mut self, tag: &str, response: &Response) {
        let failed = !response.errors().is_empty();
        if self.requests.contains(tag) {
            if failed {
                // dropping the entry cancels the waiting receiver
                self.requests.fail(tag);
            } else {
                let payload = response
                    .raw(Section::CommandResponse)
                    .cloned()
                    .unwrap_or_else(|| response.root().clone());
                self.requests.resolve(tag, payload);
            }
            return;
        }
        let search = response
            .raw(Section::CommandResponse)
            .and_then(|cr| cr.get("PhonebookSearchResult"));
        match (search, failed) {
            (Some(_), true) => self.directory.abandon(tag),
            (Some(result), false) => {
                if let Some(page) = self.directory.handle_tagged_result(tag, result) {
                    let page = page.clone();
                    self.emit(CodecEvent::DirectoryResult(page));
                }
            }
            (None, _) => log::debug!("response for unknown tag {}", tag),
        }
    }

    fn handle_call_outcomes(&mut self, outcomes: Vec<CallOutcome>) {
        let mut repoll = false;
        let mut self_view = false;
        let mut membership = false;
        for outcome in outcomes {
            match outcome {
                CallOutcome::Added(call) => {
                    log::info!("call {} added ({})", call.id, call.status.as_str());
                    self.emit(CodecEvent::CallStatusChanged(call));
                    repoll = true;
                    self_view = true;
                    membership = true;
                }
                CallOutcome::Changed(call) => {
                    log::debug!("call {} now {}", call.id, call.status.as_str());
                    self.emit(CodecEvent::CallStatusChanged(call));
                    repoll = true;
                    self_view = true;
                }
                CallOutcome::Removed(call) => {
                    log::info!("call {} ended", call.id);
                    self.emit(CodecEvent::CallDisconnected(call));
                    self.queue.enqueue(bookings::CMD_CALL_HISTORY);
                    self_view = true;
                    membership = true;
                }
                CallOutcome::Unchanged => {}
            }
        }
        if membership {
            let changes = self.layouts.on_calls_changed(!self.calls.is_empty());
            self.emit_layout_changes(changes);
        }
        if self_view {
            self.apply_self_view_policy();
        }
        if repoll && !self.calls.is_empty() {
            self.poll_layouts();
        }
    }

    fn emit_layout_changes(&mut self, changes: LayoutChanges) {
        if changes.available {
            self.emit(CodecEvent::AvailableLayoutsChanged(self.layouts.available().to_vec()));
        }
        if changes.current {
            self.emit(CodecEvent::CurrentLayoutChanged(self.layouts.current().to_string()));
        }
    }

    fn poll_layouts(&self) {
        self.queue.enqueue(self.layouts.poll_command());
    }

    /// Self-view off without calls; with calls it follows the configured default.
    fn apply_self_view_policy(&mut self) {
        let want = !self.calls.is_empty() && self.config.codec.show_self_view_by_default;
        if self.self_view_sent == Some(want) {
            return;
        }
        self.self_view_sent = Some(want);
        self.queue
            .enqueue(format!("xCommand Video Selfview Set Mode: {}", on_off(want)));
    }

    fn check_completion(&mut self) {
        if !self.sync.take_completion() {
            return;
        }
        log::info!("initial sync complete");
        self.emit(CodecEvent::SyncComplete);
        self.queue.enqueue(CMD_CAMERA_DISCOVERY);
        self.queue.enqueue(bookings::CMD_CALL_HISTORY);
        let folders = self.directory.begin_bootstrap();
        self.queue.enqueue(folders);
        self.queue.enqueue(bookings::CMD_BOOKINGS_LIST);
        self.poll_layouts();
        self.apply_self_view_policy();
    }

    // ----- timers ----------------------------------------------------------

    /// Periodic `xFeedback list`; the reply is checked in the feedback-list handler.
    pub fn check_feedback_registration(&self) {
        if self.sync.is_complete() {
            self.queue.enqueue(protocol::CMD_FEEDBACK_LIST);
        }
    }

    /// Re-run the two-phase phonebook fetch.
    pub fn refresh_phonebook(&mut self) {
        if self.sync.is_complete() {
            let cmd = self.directory.begin_bootstrap();
            self.queue.enqueue(cmd);
        }
    }

    pub fn refresh_bookings(&self) {
        if self.sync.is_complete() {
            self.queue.enqueue(bookings::CMD_BOOKINGS_LIST);
        }
    }

    /// Minute tick: meeting reminders.
    pub fn tick_schedule(&mut self, now: DateTime<Utc>) -> Vec<CodecEvent> {
        let warning = chrono::Duration::minutes(self.config.timing.meeting_warning_minutes);
        for booking in self.schedule.due_warnings(now, warning) {
            log::info!("meeting '{}' starts at {}", escape_log(&booking.title), booking.start);
            self.emit(CodecEvent::MeetingStartingSoon(booking));
        }
        self.take_events()
    }

    /// Sweep expired tagged requests.
    pub fn purge_requests(&self, now: Instant) -> usize {
        self.requests.purge_expired(now)
    }

    // ----- outbound --------------------------------------------------------

    /// Send `command` with a fresh `ResultId` tag. The receiver yields the
    /// `CommandResponse` of the reply; it is cancelled if the codec reports an
    /// error or no reply arrives before the request timeout.
    pub fn send_tagged_request(&self, command: &str) -> Result<oneshot::Receiver<Value>> {
        if command.trim().is_empty() {
            return Err(ArgumentError::Empty.into());
        }
        if command.chars().any(|c| c.is_control()) {
            return Err(ArgumentError::ControlCharacters.into());
        }
        let (tag, rx) = self.requests.register();
        self.queue.enqueue(requests::tagged(command, &tag));
        Ok(rx)
    }

    /// Run one outbound operation. Returns the events it produced directly
    /// (directory navigation); everything else surfaces once the codec answers.
    pub fn execute(&mut self, op: Operation) -> Result<Vec<CodecEvent>> {
        match op {
            Operation::Dial(number) => {
                let n = quote_argument(&number, &ArgumentRules::dial())?;
                self.queue.enqueue(format!("xCommand Dial Number: {}", n));
            }
            Operation::EndCall(id) => self.call_command("Disconnect", &id)?,
            Operation::EndAllCalls => {
                let ids: Vec<String> = self.calls.calls().iter().map(|c| c.id.clone()).collect();
                for id in ids {
                    self.call_command("Disconnect", &id)?;
                }
            }
            Operation::AcceptCall(id) => self.call_command("Accept", &id)?,
            Operation::RejectCall(id) => self.call_command("Reject", &id)?,
            Operation::Hold(id) => self.call_command("Hold", &id)?,
            Operation::Resume(id) => self.call_command("Resume", &id)?,
            Operation::StartSharing => {
                let cmd = self
                    .presentation
                    .start_command()
                    .ok_or(CodecError::NoShareSource)?;
                self.queue.enqueue(cmd);
            }
            Operation::StopSharing => self.queue.enqueue(presentation::CMD_PRESENTATION_STOP),
            Operation::SetShareSource(source) => self.presentation.set_desired_source(source),
            Operation::SetSendingMode(mode) => self.presentation.set_sending_mode(mode),
            Operation::SetLayout(label) => {
                let cmd = self
                    .layouts
                    .set_command(&label)?
                    .ok_or(CodecError::UnknownLayout(label))?;
                self.queue.enqueue(cmd);
            }
            Operation::SetSelfView(on) => {
                self.queue
                    .enqueue(format!("xCommand Video Selfview Set Mode: {}", on_off(on)));
            }
            Operation::SetDoNotDisturb(on) => {
                let verb = if on { "Activate" } else { "Deactivate" };
                self.queue
                    .enqueue(format!("xCommand Conference DoNotDisturb {}", verb));
            }
            Operation::Standby(on) => {
                let verb = if on { "Activate" } else { "Deactivate" };
                self.queue.enqueue(format!("xCommand Standby {}", verb));
            }
            Operation::SearchDirectory(text) => {
                if let Some(cmd) = self.directory.search(&text)? {
                    self.queue.enqueue(cmd);
                }
            }
            Operation::GetFolderContents(folder_id) => {
                let cmd = self.directory.folder_contents(&folder_id)?;
                self.queue.enqueue(cmd);
            }
            Operation::DirectoryUp => {
                let page = self.directory.go_up().clone();
                self.emit(CodecEvent::DirectoryResult(page));
            }
            Operation::ResetDirectory => {
                let page = self.directory.reset().clone();
                self.emit(CodecEvent::DirectoryResult(page));
            }
        }
        Ok(self.take_events())
    }

    fn call_command(&self, verb: &str, id: &str) -> Result<()> {
        let id = call_id_arg(id)?;
        self.queue
            .enqueue(format!("xCommand Call {} CallId: {}", verb, id));
        Ok(())
    }
}
