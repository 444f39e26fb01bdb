//! Control Surface Protocol
//!
//! Endpoints and Data Transfer Objects served over HTTP on the node's
//! membership port (TCP). `POST /join` is the bootstrap channel between a
//! joiner and the introducer; the rest lets an operator inspect the table,
//! query the ring and hot-swap modes and timings.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::config::{ProtocolMode, Timings};
use super::stats::TrafficSnapshot;
use super::types::{Identity, MemberRecord, SuspicionState};

// --- API Endpoints ---

/// Bootstrap: body `Message::Join`, reply `Message::UpdatedList`.
pub const ENDPOINT_JOIN: &str = "/join";
pub const ENDPOINT_MEMBERS: &str = "/members";
pub const ENDPOINT_SELF: &str = "/self";
pub const ENDPOINT_SUSPECTS: &str = "/suspects";
/// GET the current modes, POST a [`ModeUpdate`].
pub const ENDPOINT_MODE: &str = "/mode";
/// GET the current timings, POST a [`TimingsUpdate`].
pub const ENDPOINT_TIMINGS: &str = "/timings";
pub const ENDPOINT_LEAVE: &str = "/leave";
pub const ENDPOINT_REJOIN: &str = "/rejoin";
/// Ring queries around a hex position: `/ring/<hex>?n=3`.
pub const ENDPOINT_RING: &str = "/ring";
pub const ENDPOINT_STATS: &str = "/stats";

// --- Data Transfer Objects ---

/// Operator view of a membership record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub identity: Identity,
    pub heartbeat: u64,
    pub incarnation: u64,
    pub state: SuspicionState,
    /// Hex encoded ring position.
    pub ring_position: String,
    /// Milliseconds since the record was last refreshed locally.
    pub last_update_ms: u64,
}

impl From<&MemberRecord> for MemberView {
    fn from(record: &MemberRecord) -> Self {
        Self {
            identity: record.identity,
            heartbeat: record.heartbeat,
            incarnation: record.incarnation,
            state: record.state,
            ring_position: record.ring_position.to_string(),
            last_update_ms: Instant::now()
                .saturating_duration_since(record.last_update)
                .as_millis() as u64,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembersResponse {
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelfResponse {
    pub identity: Identity,
    pub ring_position: String,
    pub introducer: SocketAddr,
    pub is_introducer: bool,
    pub in_group: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeView {
    pub protocol: ProtocolMode,
    pub suspicion: bool,
}

/// Partial mode switch; absent fields keep their value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ModeUpdate {
    pub protocol: Option<ProtocolMode>,
    pub suspicion: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingsView {
    pub suspect_timeout_ms: u64,
    pub fail_timeout_ms: u64,
    pub cleanup_timeout_ms: u64,
    pub dissemination_interval_ms: u64,
    pub sweep_interval_ms: u64,
}

impl From<Timings> for TimingsView {
    fn from(t: Timings) -> Self {
        Self {
            suspect_timeout_ms: t.suspect_timeout.as_millis() as u64,
            fail_timeout_ms: t.fail_timeout.as_millis() as u64,
            cleanup_timeout_ms: t.cleanup_timeout.as_millis() as u64,
            dissemination_interval_ms: t.dissemination_interval.as_millis() as u64,
            sweep_interval_ms: t.sweep_interval.as_millis() as u64,
        }
    }
}

/// Partial timings update in milliseconds; absent fields keep their value.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TimingsUpdate {
    pub suspect_timeout_ms: Option<u64>,
    pub fail_timeout_ms: Option<u64>,
    pub cleanup_timeout_ms: Option<u64>,
    pub dissemination_interval_ms: Option<u64>,
    pub sweep_interval_ms: Option<u64>,
}

impl TimingsUpdate {
    pub fn apply(&self, current: Timings) -> Timings {
        let pick = |value: Option<u64>, old: Duration| value.map(Duration::from_millis).unwrap_or(old);
        Timings {
            suspect_timeout: pick(self.suspect_timeout_ms, current.suspect_timeout),
            fail_timeout: pick(self.fail_timeout_ms, current.fail_timeout),
            cleanup_timeout: pick(self.cleanup_timeout_ms, current.cleanup_timeout),
            dissemination_interval: pick(self.dissemination_interval_ms, current.dissemination_interval),
            sweep_interval: pick(self.sweep_interval_ms, current.sweep_interval),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RingQuery {
    /// Size of the successor set, defaults to 3.
    pub n: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RingResponse {
    pub position: String,
    pub successor: Option<MemberView>,
    pub predecessor: Option<MemberView>,
    pub successors: Vec<MemberView>,
}

/// Acknowledgment for leave / rejoin.
#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipChangeResponse {
    pub success: bool,
    pub identity: Identity,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub members: usize,
    pub alive: usize,
    pub traffic: TrafficSnapshot,
}
