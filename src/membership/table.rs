//! Membership Table & Ring
//!
//! The authoritative map `Identity -> MemberRecord` plus a consistent-hashing
//! ring view. The ring is an index of `(RingPosition, Identity)` pairs kept
//! sorted; it never owns mutable member data. Both live behind one
//! reader-writer lock and the ring is rebuilt on every structural change
//! (insert or delete), so it is always the sorted projection of the map.
//!
//! ## Ring queries
//! - **Successor**: smallest position strictly greater than the probe, wrapping.
//! - **Predecessor**: largest position strictly smaller than the probe, wrapping.
//! - **Successor set**: up to `n` distinct records clockwise from the successor.
//!
//! A probe equal to a member's own position never returns that member as
//! its successor or predecessor unless it is the only member.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use super::types::{Identity, MemberRecord, RingPosition, SuspicionState};

#[derive(Default)]
struct TableInner {
    members: HashMap<Identity, MemberRecord>,
    ring: Vec<(RingPosition, Identity)>,
}

impl TableInner {
    fn rebuild_ring(&mut self) {
        self.ring = self
            .members
            .values()
            .map(|record| (record.ring_position, record.identity))
            .collect();
        self.ring.sort_unstable();
    }

    fn record_at(&self, index: usize) -> Option<MemberRecord> {
        self.ring
            .get(index)
            .and_then(|(_, id)| self.members.get(id))
            .cloned()
    }

    /// Index of the first ring slot strictly after `pos`, wrapping to 0.
    fn successor_index(&self, pos: &RingPosition) -> usize {
        let idx = self.ring.partition_point(|(p, _)| p <= pos);
        if idx == self.ring.len() { 0 } else { idx }
    }
}

/// Thread-safe membership store. Cheap operations only; no I/O.
#[derive(Default)]
pub struct MembershipTable {
    inner: RwLock<TableInner>,
}

impl MembershipTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` only if its identity is unknown. Returns whether it was added.
    pub fn insert(&self, record: MemberRecord) -> bool {
        let mut inner = self.inner.write();
        if inner.members.contains_key(&record.identity) {
            return false;
        }

        tracing::info!("Inserted member {}", record);
        inner.members.insert(record.identity, record);
        inner.rebuild_ring();
        true
    }

    pub fn delete(&self, id: &Identity) -> Option<MemberRecord> {
        let mut inner = self.inner.write();
        let removed = inner.members.remove(id);
        if removed.is_some() {
            inner.rebuild_ring();
            tracing::info!("Deleted member {}", id);
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.members.clear();
        inner.ring.clear();
        tracing::info!("Cleared membership table");
    }

    pub fn get(&self, id: &Identity) -> Option<MemberRecord> {
        self.inner.read().members.get(id).cloned()
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.inner.read().members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Independent copy of every record, in ring order.
    pub fn snapshot(&self) -> Vec<MemberRecord> {
        let inner = self.inner.read();
        inner
            .ring
            .iter()
            .filter_map(|(_, id)| inner.members.get(id))
            .cloned()
            .collect()
    }

    /// Records collapsed by network endpoint, ignoring the incarnation epoch.
    ///
    /// When several identities share an endpoint the newest epoch is kept,
    /// since that is the instance currently running there.
    pub fn unique_addresses(&self) -> Vec<MemberRecord> {
        let mut by_addr: HashMap<SocketAddr, MemberRecord> = HashMap::new();
        for record in self.snapshot() {
            let addr = record.identity.socket_addr();
            match by_addr.get(&addr) {
                Some(kept) if kept.identity.incarnation_epoch >= record.identity.incarnation_epoch => {}
                _ => {
                    by_addr.insert(addr, record);
                }
            }
        }

        let mut unique: Vec<MemberRecord> = by_addr.into_values().collect();
        unique.sort_by_key(|record| record.identity.socket_addr());
        unique
    }

    /// Mutates the record for `id` in place. Returns `None` if it is absent.
    pub fn update<R>(&self, id: &Identity, f: impl FnOnce(&mut MemberRecord) -> R) -> Option<R> {
        let mut inner = self.inner.write();
        inner.members.get_mut(id).map(f)
    }

    /// Runs `f` over the slot for `id` as one atomic step.
    ///
    /// `f` sees `None` for an unknown identity and may fill the slot to
    /// insert it; it may also mutate or empty an existing slot. The ring is
    /// rebuilt when the slot changes between occupied and empty.
    pub fn with_slot<R>(&self, id: &Identity, f: impl FnOnce(&mut Option<MemberRecord>) -> R) -> R {
        let mut inner = self.inner.write();
        let mut slot = inner.members.remove(id);
        let existed = slot.is_some();

        let out = f(&mut slot);

        let exists = slot.is_some();
        if let Some(record) = slot {
            inner.members.insert(*id, record);
        }
        if existed != exists {
            inner.rebuild_ring();
        }
        out
    }

    /// Keeps the records for which `keep` returns true; `keep` may mutate them.
    /// Returns the number of records removed.
    pub fn retain(&self, mut keep: impl FnMut(&mut MemberRecord) -> bool) -> usize {
        let mut inner = self.inner.write();
        let before = inner.members.len();
        inner.members.retain(|_, record| keep(record));
        let removed = before - inner.members.len();
        if removed > 0 {
            inner.rebuild_ring();
        }
        removed
    }

    /// Bumps the heartbeat of `id` unless it is Failed. Returns the new value.
    pub fn increment_heartbeat(&self, id: &Identity) -> Option<u64> {
        self.update(id, |record| {
            if record.state == SuspicionState::Failed {
                return None;
            }
            record.heartbeat += 1;
            record.last_update = Instant::now();
            Some(record.heartbeat)
        })
        .flatten()
    }

    pub fn successor(&self, pos: &RingPosition) -> Option<MemberRecord> {
        let inner = self.inner.read();
        if inner.ring.is_empty() {
            return None;
        }
        inner.record_at(inner.successor_index(pos))
    }

    pub fn predecessor(&self, pos: &RingPosition) -> Option<MemberRecord> {
        let inner = self.inner.read();
        if inner.ring.is_empty() {
            return None;
        }
        let idx = inner.ring.partition_point(|(p, _)| p < pos);
        let idx = if idx == 0 { inner.ring.len() - 1 } else { idx - 1 };
        inner.record_at(idx)
    }

    /// Up to `n` distinct records walking clockwise from `successor(pos)`.
    pub fn successor_set(&self, pos: &RingPosition, n: usize) -> Vec<MemberRecord> {
        let inner = self.inner.read();
        let count = inner.ring.len();
        if count == 0 {
            return Vec::new();
        }

        let start = inner.successor_index(pos);
        (0..n.min(count))
            .filter_map(|i| inner.record_at((start + i) % count))
            .collect()
    }

    /// Identities in ring order.
    pub fn ring(&self) -> Vec<Identity> {
        self.inner.read().ring.iter().map(|(_, id)| *id).collect()
    }
}
