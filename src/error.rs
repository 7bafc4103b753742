//! Error types for topology generation, seeding, storage, and the control loop.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::topology::EntityId;

/// Errors raised while building or duplicating a topology.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("base topology has no rooms")]
    Empty,

    #[error("invalid {what} count: {count} (must be >= 1)")]
    InvalidCount { what: &'static str, count: usize },

    #[error("entity id space exhausted while allocating replica ids")]
    IdSpaceExhausted,

    #[error("duplicate id {id} ({kind})")]
    DuplicateId { kind: &'static str, id: EntityId },

    #[error("{kind} {id} references missing {target} {target_id}")]
    DanglingReference {
        kind: &'static str,
        id: EntityId,
        target: &'static str,
        target_id: EntityId,
    },
}

/// Errors raised while loading or resolving the geo seed.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("invalid data dir: {}", .0.display())]
    InvalidDataDir(PathBuf),

    #[error("cannot read \"{}\": {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid seed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} {id} has unresolved parent {parent}")]
    UnresolvedParent {
        kind: &'static str,
        id: EntityId,
        parent: EntityId,
    },

    #[error("{kind} {id} must have a {expected} parent")]
    WrongParentKind {
        kind: &'static str,
        id: EntityId,
        expected: &'static str,
    },

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Errors raised by a time-series store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("invalid record at batch index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("non-finite value {value} for point {point}")]
    NonFinite { point: EntityId, value: f64 },

    #[error("store backend error: {message}")]
    Backend { message: String },
}

/// Errors surfaced by the control-loop scheduler.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store call `{operation}` timed out after {timeout_ms} ms")]
    StoreTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("control loop is already running")]
    AlreadyRunning,

    #[error("control loop task aborted: {message}")]
    Task { message: String },
}
