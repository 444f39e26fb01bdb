//! Epidemic Cluster Membership Library
//!
//! This library crate provides the membership and failure-detection core of
//! a cluster node. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`membership`**: The cluster coordination layer. Tracks members and their liveness
//!   with a gossip or ping-ack protocol over UDP, merges conflicting reports with a
//!   deterministic reconciliation, and exposes the members as a consistent-hashing ring
//!   (`successor`, `predecessor`, `successor_set`) for data placement by a storage layer.

pub mod membership;
