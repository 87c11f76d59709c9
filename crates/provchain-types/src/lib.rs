//! Foundation types for ProvChain.
//!
//! This crate provides the identifier and temporal types used throughout the
//! provenance system. Every other ProvChain crate depends on it.
//!
//! # Key Types
//!
//! - [`Cid`] — Content identifier: a deterministic BLAKE3 fingerprint of
//!   stored payload bytes
//! - [`NodeId`] — Artifact node identifier, derived from payload content plus
//!   a creation nonce (unique without a central counter)
//! - [`EdgeId`] — Transformation edge identifier, derived from its endpoints,
//!   relationship, and a UUID v7 disambiguator
//! - [`Timestamp`] — Wall-clock milliseconds with a logical tie-breaker,
//!   bucketable by day for the graph's date index

pub mod error;
pub mod id;
pub mod temporal;

pub use error::TypeError;
pub use id::{Cid, EdgeId, NodeId};
pub use temporal::Timestamp;
