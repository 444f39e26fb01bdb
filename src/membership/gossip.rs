//! Gossip dissemination: each period, push the whole table to one random peer.

use rand::Rng;

use super::service::MembershipService;
use super::types::{Identity, MemberRecord, Message};

impl MembershipService {
    /// One gossip period: bump our heartbeat, then push a snapshot to a random peer.
    pub async fn gossip_round(&self) {
        let me = self.ctx.identity();
        self.table.increment_heartbeat(&me);

        if !self.push_gossip(&me).await {
            tracing::debug!("Only self in membership table, skipping gossip");
        }
    }

    /// Sends the current table to one random peer. Returns false when no peer exists.
    pub(crate) async fn push_gossip(&self, me: &Identity) -> bool {
        let Some(target) = self.pick_peer(me) else {
            return false;
        };

        let records = self.table.snapshot();
        let count = records.len();
        let msg = Message::Gossip {
            records,
            sender: *me,
        };

        match self.send_to(&msg, target.identity.socket_addr()).await {
            Ok(()) => tracing::debug!("Gossiped {} records to {}", count, target.identity),
            Err(e) => tracing::warn!("Gossip round skipped: {}", e),
        }
        true
    }

    /// Uniform choice among distinct endpoints other than our own.
    pub(crate) fn pick_peer(&self, me: &Identity) -> Option<MemberRecord> {
        let mut peers: Vec<MemberRecord> = self
            .table
            .unique_addresses()
            .into_iter()
            .filter(|record| !record.identity.same_endpoint(me))
            .collect();

        if peers.is_empty() {
            return None;
        }

        let idx = rand::thread_rng().gen_range(0..peers.len());
        Some(peers.swap_remove(idx))
    }
}
