//! Outbound command queue.
//!
//! Any number of producers (engine handlers, timers, the public device API) append
//! command strings through a cloneable [`CommandQueue`]. A single consumer, the
//! device worker, pulls them through [`CommandReceiver`] one at a time and hands
//! each to the transport before taking the next.
//!
//! Two FIFO lanes:
//! * `Handshake` carries login credentials and the sync handshake and always drains.
//! * `Normal` carries everything else and only drains once initial sync completed,
//!   so feature traffic never interleaves with the handshake.
//!
//! The handshake lane is polled first.

use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Handshake,
    Normal,
}

#[derive(Clone, Debug)]
pub struct CommandQueue {
    handshake: mpsc::UnboundedSender<String>,
    normal: mpsc::UnboundedSender<String>,
}

pub struct CommandReceiver {
    handshake: mpsc::UnboundedReceiver<String>,
    normal: mpsc::UnboundedReceiver<String>,
}

impl CommandQueue {
    pub fn new() -> (Self, CommandReceiver) {
        let (htx, hrx) = mpsc::unbounded_channel();
        let (ntx, nrx) = mpsc::unbounded_channel();
        (
            CommandQueue {
                handshake: htx,
                normal: ntx,
            },
            CommandReceiver {
                handshake: hrx,
                normal: nrx,
            },
        )
    }

    /// Append a feature command. Safe to call from any task.
    pub fn enqueue(&self, cmd: impl Into<String>) {
        self.push(Lane::Normal, cmd.into());
    }

    /// Append a handshake command (credentials, sync probes, registration).
    pub fn enqueue_handshake(&self, cmd: impl Into<String>) {
        self.push(Lane::Handshake, cmd.into());
    }

    fn push(&self, lane: Lane, cmd: String) {
        let tx = match lane {
            Lane::Handshake => &self.handshake,
            Lane::Normal => &self.normal,
        };
        if tx.send(cmd).is_err() {
            log::warn!("command queue consumer gone; dropping {:?} command", lane);
        }
    }
}

impl CommandReceiver {
    /// Wait for the next command. With `allow_normal == false` only the handshake
    /// lane is considered. Returns `None` once every producer is dropped.
    pub async fn next(&mut self, allow_normal: bool) -> Option<(Lane, String)> {
        tokio::select! {
            biased;
            Some(cmd) = self.handshake.recv() => Some((Lane::Handshake, cmd)),
            Some(cmd) = self.normal.recv(), if allow_normal => Some((Lane::Normal, cmd)),
            else => None,
        }
    }

    /// Non-blocking variant of [`CommandReceiver::next`].
    pub fn try_next(&mut self, allow_normal: bool) -> Option<(Lane, String)> {
        if let Ok(cmd) = self.handshake.try_recv() {
            return Some((Lane::Handshake, cmd));
        }
        if allow_normal {
            if let Ok(cmd) = self.normal.try_recv() {
                return Some((Lane::Normal, cmd));
            }
        }
        None
    }

    /// Drop handshake commands left over from a previous connection.
    pub fn discard_handshake(&mut self) -> usize {
        let mut n = 0;
        while self.handshake.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    /// Everything currently queued, handshake lane first.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Some((_, cmd)) = self.try_next(true) {
            out.push(cmd);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_are_fifo_and_handshake_first() {
        let (q, mut rx) = CommandQueue::new();
        q.enqueue("n1");
        q.enqueue_handshake("h1");
        q.enqueue("n2");
        q.enqueue_handshake("h2");
        assert_eq!(rx.drain(), vec!["h1", "h2", "n1", "n2"]);
    }

    #[test]
    fn normal_lane_is_gated() {
        let (q, mut rx) = CommandQueue::new();
        q.enqueue("xCommand Dial Number: 1234");
        assert_eq!(rx.try_next(false), None);
        assert_eq!(
            rx.try_next(true),
            Some((Lane::Normal, "xCommand Dial Number: 1234".to_string()))
        );
    }

    #[test]
    fn stale_handshake_is_discarded() {
        let (q, mut rx) = CommandQueue::new();
        q.enqueue_handshake("xStatus");
        q.enqueue_handshake("xConfiguration");
        q.enqueue("keep");
        assert_eq!(rx.discard_handshake(), 2);
        assert_eq!(rx.drain(), vec!["keep"]);
    }

    #[tokio::test]
    async fn concurrent_producers_preserve_per_producer_order() {
        let (q, mut rx) = CommandQueue::new();
        let mut handles = Vec::new();
        for p in 0..4 {
            let q = q.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    q.enqueue(format!("{}:{}", p, i));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let all = rx.drain();
        assert_eq!(all.len(), 200);
        for p in 0..4 {
            let seq: Vec<u32> = all
                .iter()
                .filter_map(|c| c.strip_prefix(&format!("{}:", p)))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(seq, (0..50).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn next_waits_for_handshake_when_gated() {
        let (q, mut rx) = CommandQueue::new();
        q.enqueue("normal");
        q.enqueue_handshake("hs");
        assert_eq!(rx.next(false).await, Some((Lane::Handshake, "hs".into())));
        let pending =
            tokio::time::timeout(std::time::Duration::from_millis(20), rx.next(false)).await;
        assert!(pending.is_err(), "normal lane must stay gated");
        assert_eq!(rx.next(true).await, Some((Lane::Normal, "normal".into())));
    }
}
