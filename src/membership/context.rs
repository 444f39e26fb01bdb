//! Per-node context shared by every loop.
//!
//! Holds the node's own identity (replaced on rebirth), the introducer
//! address, and the runtime-switchable mode cells. Each cell is locked
//! independently; none of them is ever held across an await point.

use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use super::config::{NodeConfig, ProtocolMode, Timings};
use super::types::Identity;

pub struct NodeContext {
    identity: RwLock<Identity>,
    introducer: SocketAddr,
    suspicion: AtomicBool,
    protocol: RwLock<ProtocolMode>,
    timings: RwLock<Timings>,
    in_group: AtomicBool,
    drop_rate: f64,
}

impl NodeContext {
    pub fn new(identity: Identity, introducer: SocketAddr, config: &NodeConfig) -> Self {
        Self {
            identity: RwLock::new(identity),
            introducer,
            suspicion: AtomicBool::new(config.suspicion),
            protocol: RwLock::new(config.protocol),
            timings: RwLock::new(config.timings),
            in_group: AtomicBool::new(false),
            drop_rate: config.drop_rate.clamp(0.0, 1.0),
        }
    }

    pub fn identity(&self) -> Identity {
        *self.identity.read()
    }

    pub fn set_identity(&self, identity: Identity) {
        *self.identity.write() = identity;
    }

    pub fn introducer(&self) -> SocketAddr {
        self.introducer
    }

    /// True when this node's endpoint is the well-known introducer.
    pub fn is_introducer(&self) -> bool {
        self.identity().socket_addr() == self.introducer
    }

    pub fn suspicion_enabled(&self) -> bool {
        self.suspicion.load(Ordering::Acquire)
    }

    pub fn set_suspicion(&self, enabled: bool) {
        self.suspicion.store(enabled, Ordering::Release);
    }

    pub fn protocol(&self) -> ProtocolMode {
        *self.protocol.read()
    }

    pub fn set_protocol(&self, mode: ProtocolMode) {
        *self.protocol.write() = mode;
    }

    pub fn timings(&self) -> Timings {
        *self.timings.read()
    }

    pub fn set_timings(&self, timings: Timings) {
        *self.timings.write() = timings;
    }

    pub fn in_group(&self) -> bool {
        self.in_group.load(Ordering::Acquire)
    }

    pub fn set_in_group(&self, member: bool) {
        self.in_group.store(member, Ordering::Release);
    }

    pub fn drop_rate(&self) -> f64 {
        self.drop_rate
    }
}
