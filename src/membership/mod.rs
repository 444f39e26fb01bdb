//! Membership & Failure Detection Module
//!
//! Maintains a weakly-consistent view of cluster membership and detects
//! crashed nodes with epidemic protocols over UDP. The view doubles as a
//! consistent-hashing ring that a storage layer uses for placement.
//!
//! ## Core Mechanisms
//! - **Membership Table**: one lock over the member map and its sorted ring projection.
//! - **Reconciliation**: deterministic merge of any remote view (Failed absorption,
//!   incarnation, self-refutation, heartbeat, Suspicious bias).
//! - **Dissemination**: gossip (push the table to one random peer) or ping-ack
//!   (probe one random peer and wait for an ack), switchable at runtime.
//! - **Suspicion Sweep**: passive timeouts age records Alive -> Suspicious -> Failed -> pruned.
//! - **Bootstrap & Rebirth**: join through a well-known introducer over HTTP, and take a
//!   fresh identity when the group reports this node as failed.
//!
//! ## Submodules
//! - **`types`**: identities, ring positions, records and the wire `Message`.
//! - **`table`**: the `MembershipTable` and ring queries.
//! - **`reconcile`** / **`sweeper`**: pure state transitions over the table.
//! - **`service`**: the node runtime (sockets, loops, message dispatch).
//! - **`gossip`**, **`ping_ack`**, **`join`**, **`recovery`**: protocol rounds on the service.
//! - **`handlers`** / **`protocol`**: the HTTP control surface and its DTOs.

pub mod config;
pub mod context;
pub mod error;
pub mod gossip;
pub mod handlers;
pub mod join;
pub mod ping_ack;
pub mod protocol;
pub mod reconcile;
pub mod recovery;
pub mod service;
pub mod stats;
pub mod sweeper;
pub mod table;
pub mod types;

pub use config::{NodeConfig, ProtocolMode, Timings};
pub use error::MembershipError;
pub use service::MembershipService;
pub use table::MembershipTable;
pub use types::{Identity, MemberRecord, Message, RingPosition, SuspicionState};
