//! Ping-ack dissemination.
//!
//! Each period a node pings one random peer with its table piggybacked and
//! waits up to `Tfail` for an ack carrying the peer's table. Any ack that
//! arrives inside the deadline satisfies the round. On timeout the target
//! is marked Suspicious (suspicion mode) or Failed (direct mode) right away,
//! without waiting for the next sweep.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::service::MembershipService;
use super::types::{Identity, Message, SuspicionState};

/// Result of one ping-ack round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// No peer to probe, or the ping could not be sent.
    Skipped,
    Acked(Identity),
    TimedOut(Identity),
}

/// Single-slot rendezvous between the round awaiting an ack and the receive loop.
#[derive(Default)]
pub(crate) struct AckWaiter {
    pending: Mutex<Option<oneshot::Sender<Identity>>>,
}

impl AckWaiter {
    /// Opens a new round, discarding any previous one.
    pub(crate) fn arm(&self) -> oneshot::Receiver<Identity> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);
        rx
    }

    /// Completes the open round, if any.
    pub(crate) fn resolve(&self, from: Identity) -> bool {
        match self.pending.lock().take() {
            Some(tx) => tx.send(from).is_ok(),
            None => false,
        }
    }

    pub(crate) fn disarm(&self) {
        self.pending.lock().take();
    }
}

impl MembershipService {
    pub async fn ping_round(&self) -> PingOutcome {
        let me = self.ctx.identity();
        self.table.increment_heartbeat(&me);

        let Some(target) = self.pick_peer(&me) else {
            tracing::debug!("Only self in membership table, skipping ping");
            return PingOutcome::Skipped;
        };
        let target_id = target.identity;

        let ack = self.acks.arm();
        let ping = Message::Ping {
            sender: me,
            records: self.table.snapshot(),
        };

        if let Err(e) = self.send_to(&ping, target_id.socket_addr()).await {
            self.acks.disarm();
            tracing::warn!("Ping round skipped: {}", e);
            return PingOutcome::Skipped;
        }
        tracing::debug!("Sent ping to {}", target_id);

        let deadline = self.ctx.timings().fail_timeout;
        match tokio::time::timeout(deadline, ack).await {
            Ok(Ok(from)) => {
                tracing::debug!("Ack received from {}", from);
                PingOutcome::Acked(from)
            }
            _ => {
                self.acks.disarm();
                self.on_ack_timeout(&target_id);
                PingOutcome::TimedOut(target_id)
            }
        }
    }

    fn on_ack_timeout(&self, target: &Identity) {
        let suspicion = self.ctx.suspicion_enabled();

        self.table.update(target, |record| match record.state {
            SuspicionState::Alive if suspicion => {
                record.state = SuspicionState::Suspicious;
                tracing::warn!("Marked {} Suspicious (no ack)", target);
            }
            SuspicionState::Alive | SuspicionState::Suspicious if !suspicion => {
                record.state = SuspicionState::Failed;
                tracing::warn!("Marked {} Failed (no ack)", target);
            }
            _ => {}
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn id(port: u16) -> Identity {
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        Identity::with_epoch(addr, 1)
    }

    #[tokio::test]
    async fn test_ack_waiter_resolves_open_round() {
        let waiter = AckWaiter::default();
        let rx = waiter.arm();

        assert!(waiter.resolve(id(7000)));
        assert_eq!(rx.await.unwrap(), id(7000));
    }

    #[test]
    fn test_ack_waiter_without_round() {
        let waiter = AckWaiter::default();
        assert!(!waiter.resolve(id(7000)));

        let _rx = waiter.arm();
        waiter.disarm();
        assert!(!waiter.resolve(id(7001)));
    }

    #[tokio::test]
    async fn test_rearming_discards_previous_round() {
        let waiter = AckWaiter::default();
        let stale = waiter.arm();
        let fresh = waiter.arm();

        assert!(stale.await.is_err(), "stale round should be cancelled");
        assert!(waiter.resolve(id(7002)));
        assert_eq!(fresh.await.unwrap(), id(7002));
    }
}
