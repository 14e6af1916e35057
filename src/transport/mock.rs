//! In-memory transport. Everything written is recorded; a [`MockHandle`] plays
//! the codec side by injecting received text and connection changes.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::{EventSender, Transport, TransportEvent};
use crate::error::{CodecError, Result};
use crate::protocol::strip_delimiter;

#[derive(Default)]
struct MockState {
    connected: bool,
    sent: Vec<String>,
    connects: usize,
    fail_connect: bool,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    events: EventSender,
    serial: bool,
}

/// Codec-side view of a [`MockTransport`].
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    events: EventSender,
}

impl MockTransport {
    pub fn new(events: EventSender, serial: bool) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        (
            Self {
                state: Arc::clone(&state),
                events: events.clone(),
                serial,
            },
            MockHandle { state, events },
        )
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<()> {
        let mut st = lock(&self.state);
        st.connects += 1;
        if st.fail_connect {
            drop(st);
            let _ = self.events.send(TransportEvent::Connected(false));
            return Err(CodecError::Transport("mock connect refused".to_string()));
        }
        st.connected = true;
        drop(st);
        let _ = self.events.send(TransportEvent::Connected(true));
        Ok(())
    }

    fn disconnect(&mut self) {
        let was = std::mem::replace(&mut lock(&self.state).connected, false);
        if was {
            let _ = self.events.send(TransportEvent::Connected(false));
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let mut st = lock(&self.state);
        if !st.connected {
            return Err(CodecError::NotConnected);
        }
        st.sent.push(text.to_string());
        Ok(())
    }

    fn is_serial(&self) -> bool {
        self.serial
    }
}

impl MockHandle {
    /// Inject bytes as if the codec sent them.
    pub fn receive(&self, text: &str) {
        let _ = self
            .events
            .send(TransportEvent::Received(Bytes::copy_from_slice(text.as_bytes())));
    }

    /// Simulate the link dropping (or coming back) without a `connect()` call.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.state).connected = connected;
        let _ = self.events.send(TransportEvent::Connected(connected));
    }

    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).fail_connect = refuse;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }

    /// Everything written so far, line delimiters stripped.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.state)
            .sent
            .iter()
            .map(|s| strip_delimiter(s).to_string())
            .collect()
    }

    /// Drain the record of written commands.
    pub fn take_sent(&self) -> Vec<String> {
        let sent = std::mem::take(&mut lock(&self.state).sent);
        sent.iter().map(|s| strip_delimiter(s).to_string()).collect()
    }
}
