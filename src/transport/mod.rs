//! # Codec transports
//!
//! The engine only needs four things from a link to the codec: open it, close
//! it, write text, and report what arrived. Implementations push
//! [`TransportEvent`]s into the channel they were built with; the device worker
//! is the only reader of that channel.
//!
//! - [`TcpTransport`] - telnet/raw socket to the codec's terminal port
//! - [`SerialTransport`] - RS-232 console (feature `serial`)
//! - [`MockTransport`] - scripted link for tests and dry runs

pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{CodecError, Result};
use crate::logutil::hex_snippet;

pub use mock::{MockHandle, MockTransport};
#[cfg(feature = "serial")]
pub use serial::SerialTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Raw bytes as read; may hold partial or several lines.
    Received(Bytes),
    Connected(bool),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

pub trait Transport: Send {
    /// Start connecting. The outcome is reported as `Connected(true|false)`.
    fn connect(&mut self) -> Result<()>;
    /// Close the link. Reports `Connected(false)` if it was open.
    fn disconnect(&mut self);
    /// Write `text` exactly as given.
    fn send_text(&mut self, text: &str) -> Result<()>;
    /// Serial consoles require the interactive login.
    fn is_serial(&self) -> bool;
}

/// Build the transport selected in the configuration.
pub fn from_config(
    config: &crate::config::CodecConfig,
    events: EventSender,
) -> Result<Box<dyn Transport>> {
    match config.transport {
        crate::config::TransportKind::Tcp => Ok(Box::new(TcpTransport::new(
            &config.host,
            config.port,
            events,
        ))),
        #[cfg(feature = "serial")]
        crate::config::TransportKind::Serial => Ok(Box::new(SerialTransport::new(
            &config.serial_port,
            config.baud_rate,
            events,
        ))),
        #[cfg(not(feature = "serial"))]
        crate::config::TransportKind::Serial => Err(CodecError::Config(
            "serial transport requested but built without the `serial` feature".to_string(),
        )),
    }
}

pub struct TcpTransport {
    address: String,
    events: EventSender,
    writer_tx: Option<mpsc::UnboundedSender<Bytes>>,
    tasks: Vec<JoinHandle<()>>,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16, events: EventSender) -> Self {
        Self {
            address: format!("{}:{}", host, port),
            events,
            writer_tx: None,
            tasks: Vec::new(),
        }
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        self.abort_tasks();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Bytes>();
        self.writer_tx = Some(writer_tx);
        let address = self.address.clone();
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            info!("Connecting to codec at {}", address);
            let stream = match TcpStream::connect(&address).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("Connection to {} failed: {}", address, e);
                    let _ = events.send(TransportEvent::Connected(false));
                    return;
                }
            };
            let _ = stream.set_nodelay(true);
            let (mut reader, mut writer) = stream.into_split();
            let _ = events.send(TransportEvent::Connected(true));

            let write_task = tokio::spawn(async move {
                while let Some(data) = writer_rx.recv().await {
                    if let Err(e) = writer.write_all(&data).await {
                        warn!("Codec socket write failed: {}", e);
                        break;
                    }
                }
            });

            let mut buf = vec![0u8; 4096];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        info!("Codec closed the connection");
                        break;
                    }
                    Ok(n) => {
                        log::trace!("RX {} bytes: {}", n, hex_snippet(&buf[..n], 32));
                        if events
                            .send(TransportEvent::Received(Bytes::copy_from_slice(&buf[..n])))
                            .is_err()
                        {
                            debug!("transport event receiver gone; stopping reader");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Codec socket read failed: {}", e);
                        break;
                    }
                }
            }
            write_task.abort();
            let _ = events.send(TransportEvent::Connected(false));
        });
        self.tasks.push(task);
        Ok(())
    }

    fn disconnect(&mut self) {
        let was_open = self.writer_tx.take().is_some();
        self.abort_tasks();
        if was_open {
            let _ = self.events.send(TransportEvent::Connected(false));
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        let tx = self.writer_tx.as_ref().ok_or(CodecError::NotConnected)?;
        tx.send(Bytes::copy_from_slice(text.as_bytes()))
            .map_err(|_| CodecError::NotConnected)
    }

    fn is_serial(&self) -> bool {
        false
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new("127.0.0.1", port, tx);
        transport.connect().unwrap();

        let (mut server, _) = listener.accept().await.unwrap();
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(ev, Some(TransportEvent::Connected(true)));

        server.write_all(b"*s SystemUnit ProductId: \"Cisco Codec\"\r\n").await.unwrap();
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(matches!(ev, Some(TransportEvent::Received(b)) if b.starts_with(b"*s SystemUnit")));

        transport.send_text("xStatus\r\n").unwrap();
        let mut buf = [0u8; 9];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"xStatus\r\n");

        drop(server);
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(ev, Some(TransportEvent::Connected(false)));
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new("127.0.0.1", 1, tx);
        assert!(matches!(
            transport.send_text("xStatus"),
            Err(CodecError::NotConnected)
        ));
        assert!(!transport.is_serial());
    }
}
