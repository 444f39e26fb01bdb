use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Width of a ring position in bytes (160 bits).
pub const RING_POSITION_BYTES: usize = 20;

/// Logical name of one running instance of a node.
///
/// Two processes started on the same address at different times carry
/// different `incarnation_epoch` values and are therefore different
/// identities. Equality covers all three fields.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub address: IpAddr,
    pub port: u16,
    /// Nanoseconds since the Unix epoch at process start or at rebirth.
    pub incarnation_epoch: u64,
}

impl Identity {
    /// Creates an identity for `addr` stamped with the current time.
    pub fn new(addr: SocketAddr) -> Self {
        Self::with_epoch(addr, epoch_now())
    }

    pub fn with_epoch(addr: SocketAddr, incarnation_epoch: u64) -> Self {
        Self {
            address: addr.ip(),
            port: addr.port(),
            incarnation_epoch,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Same physical endpoint, regardless of epoch.
    pub fn same_endpoint(&self, other: &Identity) -> bool {
        self.address == other.address && self.port == other.port
    }

    /// Mints the identity this node takes after observing its own failure.
    ///
    /// The epoch is strictly greater than the current one even if the clock
    /// has not advanced.
    pub fn reborn(&self) -> Self {
        let epoch = epoch_now().max(self.incarnation_epoch + 1);
        Self::with_epoch(self.socket_addr(), epoch)
    }

    pub fn ring_position(&self) -> RingPosition {
        RingPosition::of_key(self.to_string().as_bytes())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.port, self.incarnation_epoch)
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Position on the consistent-hashing ring: the first 160 bits of the
/// SHA-256 digest of a key. Ordering is big-endian numeric order.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RingPosition(pub [u8; RING_POSITION_BYTES]);

impl RingPosition {
    /// Places an arbitrary key (an identity string, a file name) on the ring.
    pub fn of_key(key: &[u8]) -> Self {
        let digest = Sha256::digest(key);
        let mut bytes = [0u8; RING_POSITION_BYTES];
        bytes.copy_from_slice(&digest[..RING_POSITION_BYTES]);
        Self(bytes)
    }

    pub const MIN: RingPosition = RingPosition([0u8; RING_POSITION_BYTES]);
    pub const MAX: RingPosition = RingPosition([0xffu8; RING_POSITION_BYTES]);
}

impl fmt::Display for RingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RingPosition({})", &hex::encode(self.0)[..8])
    }
}

impl FromStr for RingPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| e.to_string())?;
        let bytes: [u8; RING_POSITION_BYTES] = raw
            .try_into()
            .map_err(|_| format!("ring position must be {} hex bytes", RING_POSITION_BYTES))?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SuspicionState {
    Alive,
    Suspicious,
    Failed,
}

impl fmt::Display for SuspicionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuspicionState::Alive => "Alive",
            SuspicionState::Suspicious => "Suspicious",
            SuspicionState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// One entry of the membership table.
///
/// `incarnation` is the refutation counter a node bumps when it hears
/// itself suspected; it is unrelated to `Identity::incarnation_epoch`.
/// `last_update` is local bookkeeping and never crosses the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRecord {
    pub identity: Identity,
    pub heartbeat: u64,
    pub state: SuspicionState,
    pub incarnation: u64,
    pub ring_position: RingPosition,

    #[serde(skip, default = "Instant::now")]
    pub last_update: Instant,
}

impl MemberRecord {
    /// First-knowledge record: heartbeat 0, incarnation 0, Alive.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            heartbeat: 0,
            state: SuspicionState::Alive,
            incarnation: 0,
            ring_position: identity.ring_position(),
            last_update: Instant::now(),
        }
    }

    /// Field-wise equality ignoring the local timestamp.
    pub fn same_view(&self, other: &MemberRecord) -> bool {
        self.identity == other.identity
            && self.heartbeat == other.heartbeat
            && self.state == other.state
            && self.incarnation == other.incarnation
            && self.ring_position == other.ring_position
    }
}

impl fmt::Display for MemberRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} | hb={} | inc={} | {} | ring={}]",
            self.identity,
            self.heartbeat,
            self.incarnation,
            self.state,
            &self.ring_position.to_string()[..8]
        )
    }
}

/// Wire protocol between nodes.
///
/// `Gossip`, `Ping` and `Ack` travel as bincode datagrams over UDP, where
/// the variant index is the discriminator. `Join` and `UpdatedList` travel
/// as JSON over the bootstrap HTTP channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Message {
    Join {
        identity: Identity,
    },

    UpdatedList {
        records: Vec<MemberRecord>,
    },

    Gossip {
        records: Vec<MemberRecord>,
        sender: Identity,
    },

    Ping {
        sender: Identity,
        records: Vec<MemberRecord>,
    },

    Ack {
        sender: Identity,
        records: Vec<MemberRecord>,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join { .. } => "join",
            Message::UpdatedList { .. } => "updatedList",
            Message::Gossip { .. } => "gossip",
            Message::Ping { .. } => "ping",
            Message::Ack { .. } => "ack",
        }
    }
}
