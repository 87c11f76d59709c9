//! Content hashing and possession-proof primitives for ProvChain.
//!
//! Provides the domain-separated [`ContentHasher`] used to bind proofs and
//! transformations to exact byte content, and the [`ChunkTree`] Merkle
//! structure whose root anchors a possession proof to fixed-size payload
//! chunks.

pub mod chunk_tree;
pub mod hasher;

pub use chunk_tree::{ChunkProof, ChunkTree, Side};
pub use hasher::{ContentHasher, HasherError};
