//! Self-failure recovery, voluntary leave and rejoin.
//!
//! When reconciliation reports that peers consider this node Failed, the
//! node takes a new identity (same endpoint, newer epoch). The introducer
//! swaps only its own record, since others may still address its old
//! identity; any other node wipes its table and joins again.

use super::error::Result;
use super::service::MembershipService;
use super::types::{Identity, MemberRecord, SuspicionState};

impl MembershipService {
    pub(crate) async fn handle_self_failure(&self) {
        if !self.ctx.in_group() {
            tracing::debug!("Reported failed while outside the group, ignoring");
            return;
        }

        if let Err(e) = self.rebirth().await {
            tracing::error!("Rejoin after self-failure failed: {}", e);
            self.ctx.set_in_group(false);
        }
    }

    /// Mints a new identity and re-enters the group under it.
    pub(crate) async fn rebirth(&self) -> Result<Identity> {
        let old = self.ctx.identity();
        let reborn = old.reborn();

        if self.ctx.is_introducer() {
            self.table.delete(&old);
            self.ctx.set_identity(reborn);
            self.table.insert(MemberRecord::new(reborn));
            self.ctx.set_in_group(true);
            tracing::info!("Introducer reborn as {} (was {})", reborn, old);
        } else {
            self.table.clear();
            self.ctx.set_identity(reborn);
            tracing::info!(
                "Reborn as {} (was {}), rejoining via {}",
                reborn,
                old,
                self.ctx.introducer()
            );
            self.join().await?;
        }

        Ok(reborn)
    }

    /// Leaves the group: marks our own record Failed, tells one peer, stops disseminating.
    pub async fn leave(&self) {
        let me = self.ctx.identity();
        self.ctx.set_in_group(false);
        self.table.update(&me, |record| record.state = SuspicionState::Failed);

        if !self.push_gossip(&me).await {
            tracing::debug!("No peer to notify about leaving");
        }
        tracing::info!("Left the group voluntarily as {}", me);
    }

    /// Re-enters the group under a fresh identity after a leave or a failed rejoin.
    pub async fn rejoin(&self) -> Result<Identity> {
        self.rebirth().await
    }
}
