//! Passive suspicion sweep.
//!
//! Ages every record except our own through the suspicion state machine,
//! measured from `last_update`:
//!
//! - direct mode: `Alive -> Failed` after `Tfail`
//! - suspicion mode: `Alive -> Suspicious` after `Tsus`
//! - either mode: `Suspicious -> Failed` after `Tfail`
//! - either mode: `Failed -> pruned` after `Tclean`

use std::time::Instant;

use super::config::Timings;
use super::table::MembershipTable;
use super::types::{Identity, SuspicionState};

#[derive(Debug, Default, Clone)]
pub struct SweepReport {
    pub suspected: Vec<Identity>,
    pub failed: Vec<Identity>,
    pub pruned: Vec<Identity>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.suspected.is_empty() && self.failed.is_empty() && self.pruned.is_empty()
    }
}

pub fn sweep(
    table: &MembershipTable,
    local: &Identity,
    suspicion: bool,
    timings: &Timings,
    now: Instant,
) -> SweepReport {
    let mut report = SweepReport::default();

    table.retain(|record| {
        if record.identity == *local {
            return true;
        }

        let elapsed = now.saturating_duration_since(record.last_update);

        match record.state {
            SuspicionState::Alive if suspicion && elapsed > timings.suspect_timeout => {
                tracing::warn!("Member {} suspected (no update for {:?})", record.identity, elapsed);
                record.state = SuspicionState::Suspicious;
                report.suspected.push(record.identity);
            }
            SuspicionState::Alive if !suspicion && elapsed > timings.fail_timeout => {
                tracing::warn!("Member {} marked Failed (no update for {:?})", record.identity, elapsed);
                record.state = SuspicionState::Failed;
                report.failed.push(record.identity);
            }
            SuspicionState::Suspicious if elapsed > timings.fail_timeout => {
                tracing::warn!(
                    "Suspicious member {} marked Failed (no update for {:?})",
                    record.identity,
                    elapsed
                );
                record.state = SuspicionState::Failed;
                report.failed.push(record.identity);
            }
            SuspicionState::Failed if elapsed > timings.cleanup_timeout => {
                tracing::info!("Member {} pruned after {:?}", record.identity, elapsed);
                report.pruned.push(record.identity);
                return false;
            }
            _ => {}
        }

        true
    });

    report
}
