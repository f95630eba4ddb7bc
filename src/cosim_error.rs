//! CosimError: Unified error type for cosim-node public APIs
//!
//! Every failure in the protocol layer maps onto one of four classes:
//! configuration errors (bad topology, unwritable output directory),
//! protocol-ordering violations (advance before synchronize), transport
//! failures during a synchronize round, and physics-backend failures
//! surfaced through advance. All of them are fatal for the run.

use std::fmt::Debug;
use thiserror::Error;

/// Unified error type for co-simulation protocol operations.
#[derive(Debug, Error)]
pub enum CosimError {
    /// Invalid node-count declaration (must be exactly 1 MBS, >=1 terrain).
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    /// A global rank outside the declared total rank count.
    #[error("rank {rank} out of range for topology with {total} ranks")]
    RankOutOfRange { rank: usize, total: usize },
    /// Output directory could not be created or is not writable.
    #[error("output directory error for `{path}`: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Lifecycle method called out of order (e.g. advance before synchronize).
    #[error("protocol ordering violation: {op} called while {phase}")]
    ProtocolOrdering { op: &'static str, phase: &'static str },
    /// Communication with a peer failed during a synchronize round.
    #[error("transport failure with rank {peer}: {source}")]
    Transport {
        peer: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Received payload does not match the negotiated size.
    #[error("payload size mismatch from rank {peer}: expected {expected} bytes, got {actual}")]
    PayloadSize {
        peer: usize,
        expected: usize,
        actual: usize,
    },
    /// Mesh connectivity or contact data referenced an out-of-range vertex.
    #[error("mesh index error: {0}")]
    MeshIndex(String),
    /// The physics backend failed inside advance; the run cannot continue.
    #[error("backend failure in {role} node: {source}")]
    Backend {
        role: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CosimError {
    /// Shorthand for a transport failure with a string description.
    pub fn transport(peer: usize, msg: impl Into<String>) -> Self {
        CosimError::Transport {
            peer,
            source: msg.into().into(),
        }
    }
}
