//! RS-232 console transport.
//!
//! `serialport` is blocking, so reads run on a blocking task with a short port
//! timeout and a stop flag; writes lock the shared port directly.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use serialport::SerialPort;

use super::{EventSender, Transport, TransportEvent};
use crate::error::{CodecError, Result};
use crate::logutil::hex_snippet;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    events: EventSender,
    port: Option<SharedPort>,
    stop: Arc<AtomicBool>,
}

impl SerialTransport {
    pub fn new(port_name: &str, baud_rate: u32, events: EventSender) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            events,
            port: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open(&self) -> Result<Box<dyn SerialPort>> {
        debug!("Opening serial port {} at {} baud", self.port_name, self.baud_rate);
        let mut builder =
            serialport::new(&self.port_name, self.baud_rate).timeout(Duration::from_millis(200));
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .flow_control(serialport::FlowControl::None);
        }
        builder.open().map_err(|e| {
            CodecError::Transport(format!("failed to open serial port {}: {}", self.port_name, e))
        })
    }
}

fn read_loop(port: SharedPort, stop: Arc<AtomicBool>, events: EventSender) {
    let mut buf = [0u8; 1024];
    while !stop.load(Ordering::Relaxed) {
        let result = match port.lock() {
            Ok(mut p) => p.read(&mut buf),
            Err(_) => break,
        };
        match result {
            Ok(0) => {}
            Ok(n) => {
                log::trace!("RX {} bytes: {}", n, hex_snippet(&buf[..n], 32));
                if events
                    .send(TransportEvent::Received(Bytes::copy_from_slice(&buf[..n])))
                    .is_err()
                {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("Serial read failed: {}", e);
                break;
            }
        }
    }
    if !stop.load(Ordering::Relaxed) {
        let _ = events.send(TransportEvent::Connected(false));
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        self.disconnect();
        let port = match self.open() {
            Ok(p) => p,
            Err(e) => {
                let _ = self.events.send(TransportEvent::Connected(false));
                return Err(e);
            }
        };
        info!("Serial port {} open", self.port_name);
        let shared: SharedPort = Arc::new(Mutex::new(port));
        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Arc::clone(&stop);
        self.port = Some(Arc::clone(&shared));
        let _ = self.events.send(TransportEvent::Connected(true));

        let events = self.events.clone();
        tokio::task::spawn_blocking(move || read_loop(shared, stop, events));
        Ok(())
    }

    fn disconnect(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.port_name);
            let _ = self.events.send(TransportEvent::Connected(false));
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let port = self.port.as_ref().ok_or(CodecError::NotConnected)?;
        let mut guard = port
            .lock()
            .map_err(|_| CodecError::Transport("serial port lock poisoned".to_string()))?;
        guard.write_all(text.as_bytes())?;
        guard.flush()?;
        Ok(())
    }

    fn is_serial(&self) -> bool {
        true
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn missing_port_reports_disconnected() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut t = SerialTransport::new("/dev/does-not-exist-codecsync", 115200, tx);
        assert!(t.is_serial());
        assert!(t.connect().is_err());
        assert_eq!(rx.recv().await, Some(TransportEvent::Connected(false)));
        assert!(matches!(t.send_text("x"), Err(CodecError::NotConnected)));
    }
}
