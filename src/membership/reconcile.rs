//! Reconciliation of a remote membership snapshot into the local table.
//!
//! Each remote record is merged against the local one under a fixed
//! precedence, applied in order:
//!
//! 1. unknown locally and remote is Failed: ignored, no ghosts are created
//! 2. unknown locally: inserted with a fresh timestamp
//! 3. remote Failed: always wins, local becomes Failed
//! 4. local Failed: absorbing until pruned, remote ignored
//! 5. higher remote incarnation: remote replaces local
//! 6. equal incarnation: self-refutation for our own record, otherwise
//!    higher heartbeat wins and Suspicious beats Alive on a heartbeat tie
//! 7. lower remote incarnation: stale, ignored
//!
//! The engine never performs I/O. When rule 3 hits the local node's own
//! record the report says so and the caller runs self-failure recovery.

use std::time::Instant;

use super::table::MembershipTable;
use super::types::{Identity, MemberRecord, SuspicionState};

/// What a single remote record did to the local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Ghost of an unknown, already failed node.
    IgnoredGhost,
    Inserted,
    /// `first` is true when the local record was not Failed before.
    MarkedFailed { first: bool },
    /// Local record is Failed and stays that way.
    Absorbed,
    Replaced,
    /// Our own record was reported Suspicious; incarnation bumped.
    Refuted,
    HeartbeatAdvanced,
    MarkedSuspicious,
    Unchanged,
    Stale,
}

/// Summary of reconciling one snapshot.
#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    pub inserted: Vec<Identity>,
    pub failed: Vec<Identity>,
    pub suspected: Vec<Identity>,
    pub refuted: bool,
    pub updated: usize,
    /// A remote Failed report named the local node's own identity.
    pub self_failed: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.inserted.is_empty()
            || !self.failed.is_empty()
            || !self.suspected.is_empty()
            || self.refuted
            || self.updated > 0
    }
}

/// Merges `remote` into `table` from the point of view of `local`.
///
/// Every record is applied atomically on its own; the snapshot as a whole
/// is a sequence of independent updates.
pub fn reconcile(table: &MembershipTable, remote: Vec<MemberRecord>, local: &Identity) -> ReconcileReport {
    let now = Instant::now();
    let mut report = ReconcileReport::default();

    for record in remote {
        let id = record.identity;
        let outcome = table.with_slot(&id, |slot| merge_record(slot, record, local, now));

        match outcome {
            MergeOutcome::Inserted => {
                tracing::info!("Discovered new member {}", id);
                report.inserted.push(id);
            }
            MergeOutcome::MarkedFailed { first } => {
                if first {
                    tracing::info!("Member {} marked Failed (remote report)", id);
                    report.failed.push(id);
                }
                if id == *local {
                    tracing::warn!("Remote peers report this node ({}) as Failed", id);
                    report.self_failed = true;
                }
            }
            MergeOutcome::Refuted => {
                tracing::info!("Refuted suspicion about self {}", id);
                report.refuted = true;
            }
            MergeOutcome::MarkedSuspicious => {
                tracing::info!("Member {} marked Suspicious (remote report)", id);
                report.suspected.push(id);
            }
            MergeOutcome::Replaced | MergeOutcome::HeartbeatAdvanced => {
                report.updated += 1;
            }
            MergeOutcome::IgnoredGhost
            | MergeOutcome::Absorbed
            | MergeOutcome::Unchanged
            | MergeOutcome::Stale => {}
        }
    }

    report
}

/// Applies the precedence rules to one slot of the table.
pub fn merge_record(
    slot: &mut Option<MemberRecord>,
    mut remote: MemberRecord,
    local_id: &Identity,
    now: Instant,
) -> MergeOutcome {
    let Some(local) = slot.as_mut() else {
        if remote.state == SuspicionState::Failed {
            return MergeOutcome::IgnoredGhost;
        }
        remote.last_update = now;
        *slot = Some(remote);
        return MergeOutcome::Inserted;
    };

    if remote.state == SuspicionState::Failed {
        let first = local.state != SuspicionState::Failed;
        local.state = SuspicionState::Failed;
        local.heartbeat = remote.heartbeat;
        // Never lower the incarnation of a live record.
        local.incarnation = local.incarnation.max(remote.incarnation);
        return MergeOutcome::MarkedFailed { first };
    }

    if local.state == SuspicionState::Failed {
        return MergeOutcome::Absorbed;
    }

    if remote.incarnation > local.incarnation {
        remote.last_update = now;
        *local = remote;
        return MergeOutcome::Replaced;
    }

    if remote.incarnation < local.incarnation {
        return MergeOutcome::Stale;
    }

    if local.identity == *local_id {
        if remote.state == SuspicionState::Suspicious && local.state == SuspicionState::Alive {
            local.incarnation += 1;
            local.state = SuspicionState::Alive;
            local.last_update = now;
            return MergeOutcome::Refuted;
        }
        return MergeOutcome::Unchanged;
    }

    if remote.heartbeat > local.heartbeat {
        local.heartbeat = remote.heartbeat;
        local.state = remote.state;
        local.last_update = now;
        return MergeOutcome::HeartbeatAdvanced;
    }

    if remote.heartbeat == local.heartbeat {
        if remote.state == SuspicionState::Suspicious && local.state == SuspicionState::Alive {
            local.state = SuspicionState::Suspicious;
            local.last_update = now;
            return MergeOutcome::MarkedSuspicious;
        }
        return MergeOutcome::Unchanged;
    }

    MergeOutcome::Stale
}
