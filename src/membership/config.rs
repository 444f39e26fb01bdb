use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default bootstrap deadline for a join request.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Dissemination strategy. Exactly one runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    Gossip,
    PingAck,
}

impl FromStr for ProtocolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gossip" => Ok(ProtocolMode::Gossip),
            "pingack" | "ping-ack" | "ping" => Ok(ProtocolMode::PingAck),
            other => Err(format!("unknown protocol mode: {}", other)),
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolMode::Gossip => f.write_str("gossip"),
            ProtocolMode::PingAck => f.write_str("pingack"),
        }
    }
}

/// Failure-detector timing parameters. All of them can be replaced at
/// runtime through the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// `Tsus`: silence before an Alive peer becomes Suspicious.
    pub suspect_timeout: Duration,
    /// `Tfail`: silence before a peer is declared Failed; also the ack deadline.
    pub fail_timeout: Duration,
    /// `Tclean`: time a Failed record stays in the table before pruning.
    pub cleanup_timeout: Duration,
    /// Period of the gossip / ping-ack loop.
    pub dissemination_interval: Duration,
    /// Period of the suspicion sweep.
    pub sweep_interval: Duration,
}

impl Timings {
    /// Fast timings for tests.
    pub fn test_config() -> Self {
        Self {
            suspect_timeout: Duration::from_millis(200),
            fail_timeout: Duration::from_millis(300),
            cleanup_timeout: Duration::from_millis(600),
            dissemination_interval: Duration::from_millis(50),
            sweep_interval: Duration::from_millis(50),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            suspect_timeout: Duration::from_secs(2),
            fail_timeout: Duration::from_secs(3),
            cleanup_timeout: Duration::from_secs(6),
            dissemination_interval: Duration::from_millis(200),
            sweep_interval: Duration::from_millis(500),
        }
    }
}

/// Startup configuration of one node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address of the datagram socket; the control listener uses the same port over TCP.
    pub bind: SocketAddr,
    /// Well-known introducer. A node whose `bind` equals it is the introducer.
    pub introducer: SocketAddr,
    pub suspicion: bool,
    pub protocol: ProtocolMode,
    pub timings: Timings,
    /// Fraction of inbound datagrams discarded before decoding, in `[0, 1]`.
    pub drop_rate: f64,
    pub join_timeout: Duration,
}

impl NodeConfig {
    /// Configuration for a node that is its own introducer.
    pub fn introducer(bind: SocketAddr) -> Self {
        Self::joining(bind, bind)
    }

    pub fn joining(bind: SocketAddr, introducer: SocketAddr) -> Self {
        Self {
            bind,
            introducer,
            suspicion: false,
            protocol: ProtocolMode::Gossip,
            timings: Timings::default(),
            drop_rate: 0.0,
            join_timeout: JOIN_TIMEOUT,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolMode) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_suspicion(mut self, suspicion: bool) -> Self {
        self.suspicion = suspicion;
        self
    }
}
