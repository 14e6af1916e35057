//! Async device worker.
//!
//! [`CodecDevice::run`] owns the engine and the transport and is the single
//! consumer of everything that touches them: transport events, the command
//! queue, control requests from [`DeviceHandle`]s, and the periodic timers.
//! Inbound bytes are therefore processed strictly in arrival order, and timers
//! only ever enqueue commands.

use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

use super::{CodecEngine, CodecEvent, CommandQueue, CommandReceiver, Lane, Operation, Snapshot};
use crate::config::{Config, TimingConfig};
use crate::error::{CodecError, Result};
use crate::logutil::{escape_log, truncate_for_log};
use crate::metrics;
use crate::protocol::DELIMITER;
use crate::transport::{self, Transport, TransportEvent};

/// Requests from handles to the worker.
#[derive(Debug)]
pub enum ControlMessage {
    Execute {
        op: Operation,
        reply: oneshot::Sender<Result<()>>,
    },
    TaggedRequest {
        command: String,
        reply: oneshot::Sender<Result<oneshot::Receiver<Value>>>,
    },
    Snapshot(oneshot::Sender<Snapshot>),
    DirectoryXSig(oneshot::Sender<Vec<u8>>),
    CallsXSig(oneshot::Sender<Vec<u8>>),
    Shutdown,
}

/// Cloneable front door to a running [`CodecDevice`].
#[derive(Clone)]
pub struct DeviceHandle {
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    queue: CommandQueue,
    request_timeout: Duration,
}

impl DeviceHandle {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControlMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.control_tx
            .send(build(tx))
            .map_err(|_| CodecError::ChannelClosed)?;
        rx.await.map_err(|_| CodecError::ChannelClosed)
    }

    /// Run an operation on the worker; validation errors come back here.
    pub async fn execute(&self, op: Operation) -> Result<()> {
        self.call(|reply| ControlMessage::Execute { op, reply }).await?
    }

    /// Append a raw command to the normal lane.
    pub fn enqueue_command(&self, command: impl Into<String>) {
        self.queue.enqueue(command);
    }

    /// Send a tagged request and wait for its `CommandResponse`.
    pub async fn send_tagged_request(&self, command: &str) -> Result<Value> {
        let command = command.to_string();
        let rx = self
            .call(|reply| ControlMessage::TaggedRequest { command, reply })
            .await??;
        // the worker sweeps at the same timeout; the margin covers sweep cadence
        match tokio::time::timeout(self.request_timeout * 2, rx).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(_)) => Err(CodecError::RequestCancelled),
            Err(_) => Err(CodecError::Timeout("tagged response")),
        }
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        self.call(ControlMessage::Snapshot).await
    }

    pub async fn directory_xsig(&self) -> Result<Vec<u8>> {
        self.call(ControlMessage::DirectoryXSig).await
    }

    pub async fn calls_xsig(&self) -> Result<Vec<u8>> {
        self.call(ControlMessage::CallsXSig).await
    }

    pub async fn dial(&self, number: &str) -> Result<()> {
        self.execute(Operation::Dial(number.to_string())).await
    }

    pub async fn end_call(&self, call_id: &str) -> Result<()> {
        self.execute(Operation::EndCall(call_id.to_string())).await
    }

    pub async fn search_directory(&self, text: &str) -> Result<()> {
        self.execute(Operation::SearchDirectory(text.to_string())).await
    }

    pub fn shutdown(&self) {
        let _ = self.control_tx.send(ControlMessage::Shutdown);
    }
}

fn periodic(period: Duration) -> Interval {
    let mut iv = interval_at(Instant::now() + period, period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
    iv
}

pub struct CodecDevice {
    engine: CodecEngine,
    commands: CommandReceiver,
    transport: Box<dyn Transport>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    events_tx: mpsc::UnboundedSender<CodecEvent>,
    timing: TimingConfig,
    handshake_deadline: Option<Instant>,
    reconnect_at: Option<Instant>,
}

impl CodecDevice {
    /// Wire a device around an existing transport. `transport_rx` must be the
    /// receiving end of the channel the transport reports into.
    pub fn new(
        config: &Config,
        transport: Box<dyn Transport>,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<(Self, DeviceHandle, mpsc::UnboundedReceiver<CodecEvent>)> {
        let (queue, commands) = CommandQueue::new();
        let engine = CodecEngine::new(config, queue.clone(), transport.is_serial())?;
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = DeviceHandle {
            control_tx,
            queue,
            request_timeout: config.timing.request_timeout(),
        };
        let device = CodecDevice {
            engine,
            commands,
            transport,
            transport_rx,
            control_rx,
            events_tx,
            timing: config.timing.clone(),
            handshake_deadline: None,
            reconnect_at: None,
        };
        Ok((device, handle, events_rx))
    }

    /// Build the transport named in the configuration and wire a device to it.
    pub fn from_config(
        config: &Config,
    ) -> Result<(Self, DeviceHandle, mpsc::UnboundedReceiver<CodecEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = transport::from_config(&config.codec, tx)?;
        Self::new(config, transport, rx)
    }

    pub fn engine(&self) -> &CodecEngine {
        &self.engine
    }

    fn forward(&mut self, events: Vec<CodecEvent>) {
        for event in events {
            if event == CodecEvent::SyncComplete {
                self.handshake_deadline = None;
            }
            if self.events_tx.send(event).is_err() {
                debug!("event consumer gone");
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        self.reconnect_at = Some(Instant::now() + self.timing.reconnect_delay());
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Received(bytes) => {
                let events = self.engine.handle_received(&bytes);
                self.forward(events);
            }
            TransportEvent::Connected(true) => {
                let stale = self.commands.discard_handshake();
                if stale > 0 {
                    debug!("discarded {} stale handshake command(s)", stale);
                }
                self.reconnect_at = None;
                self.handshake_deadline = Some(Instant::now() + self.timing.handshake_timeout());
                let events = self.engine.handle_connection(true);
                self.forward(events);
            }
            TransportEvent::Connected(false) => {
                let events = self.engine.handle_connection(false);
                self.forward(events);
                self.commands.discard_handshake();
                self.handshake_deadline = None;
                self.schedule_reconnect();
            }
        }
    }

    fn on_control(&mut self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::Execute { op, reply } => {
                let result = self.engine.execute(op).map(|events| self.forward(events));
                if let Err(e) = &result {
                    debug!("operation rejected: {}", e);
                }
                let _ = reply.send(result);
            }
            ControlMessage::TaggedRequest { command, reply } => {
                let _ = reply.send(self.engine.send_tagged_request(&command));
            }
            ControlMessage::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            ControlMessage::DirectoryXSig(reply) => {
                let _ = reply.send(self.engine.directory_xsig());
            }
            ControlMessage::CallsXSig(reply) => {
                let _ = reply.send(self.engine.calls_xsig());
            }
            ControlMessage::Shutdown => return false,
        }
        true
    }

    fn write_command(&mut self, lane: Lane, command: &str) {
        debug!(
            "TX [{:?}] {}",
            lane,
            escape_log(&truncate_for_log(command, 160))
        );
        let mut text = String::with_capacity(command.len() + DELIMITER.len());
        text.push_str(command);
        text.push_str(DELIMITER);
        match self.transport.send_text(&text) {
            Ok(()) => metrics::inc_commands_sent(),
            Err(e) => warn!("dropping command, transport write failed: {}", e),
        }
    }

    /// Force a new connection cycle: nothing is retried in place.
    fn on_handshake_timeout(&mut self) {
        let pending: Vec<String> = self
            .engine
            .sync_state()
            .pending()
            .iter()
            .map(|m| m.to_string())
            .collect();
        warn!(
            "handshake did not complete within {:?} (waiting for: {}); reconnecting",
            self.timing.handshake_timeout(),
            pending.join(", ")
        );
        self.handshake_deadline = None;
        // the transport reports Connected(false), which resets the engine
        self.transport.disconnect();
        self.schedule_reconnect();
    }

    fn reconnect(&mut self) {
        self.reconnect_at = None;
        metrics::inc_reconnects();
        info!("reconnecting to codec");
        if let Err(e) = self.transport.connect() {
            warn!("reconnect failed: {}", e);
            self.schedule_reconnect();
        }
    }

    /// Run until shutdown or until every handle and the transport are gone.
    pub async fn run(mut self) -> Result<()> {
        info!("codec device worker starting");
        if let Err(e) = self.transport.connect() {
            error!("initial connect failed: {}", e);
            self.schedule_reconnect();
        }

        let mut feedback_check = periodic(self.timing.feedback_check_interval());
        let mut phonebook_refresh = periodic(self.timing.phonebook_refresh());
        let mut booking_refresh = periodic(self.timing.booking_refresh());
        let mut schedule_tick = periodic(Duration::from_secs(60));
        let mut request_sweep = periodic(self.timing.request_timeout() / 2);

        loop {
            let allow_normal = self.engine.is_synced();
            let connected = self.engine.is_connected();
            let handshake_deadline = self.handshake_deadline;
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                ev = self.transport_rx.recv() => match ev {
                    Some(ev) => self.on_transport_event(ev),
                    None => {
                        warn!("transport event channel closed, stopping device worker");
                        break;
                    }
                },
                cmd = self.commands.next(allow_normal), if connected => {
                    if let Some((lane, command)) = cmd {
                        self.write_command(lane, &command);
                    }
                }
                msg = self.control_rx.recv() => match msg {
                    Some(msg) => {
                        if !self.on_control(msg) {
                            info!("device shutdown requested");
                            break;
                        }
                    }
                    None => {
                        info!("all device handles dropped, stopping");
                        break;
                    }
                },
                _ = sleep_until(handshake_deadline.unwrap_or_else(Instant::now)), if handshake_deadline.is_some() => {
                    self.on_handshake_timeout();
                }
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect();
                }
                _ = feedback_check.tick() => self.engine.check_feedback_registration(),
                _ = phonebook_refresh.tick() => self.engine.refresh_phonebook(),
                _ = booking_refresh.tick() => self.engine.refresh_bookings(),
                _ = schedule_tick.tick() => {
                    let events = self.engine.tick_schedule(Utc::now());
                    self.forward(events);
                }
                _ = request_sweep.tick() => {
                    self.engine.purge_requests(std::time::Instant::now());
                }
            }
        }

        self.transport.disconnect();
        let events = self.engine.handle_connection(false);
        self.forward(events);
        info!("codec device worker stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[tokio::test]
    async fn worker_stops_on_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (transport, mock) = MockTransport::new(tx, true);
        let (device, handle, mut events) =
            CodecDevice::new(&Config::default(), Box::new(transport), rx).unwrap();
        let task = tokio::spawn(device.run());

        assert_eq!(events.recv().await, Some(CodecEvent::Connected(true)));
        assert!(mock.is_connected());
        let snap = handle.snapshot().await.unwrap();
        assert!(snap.connected && !snap.sync_complete);

        handle.shutdown();
        task.await.unwrap().unwrap();
        assert!(!mock.is_connected());
        assert!(matches!(handle.snapshot().await, Err(CodecError::ChannelClosed)));
    }
}
