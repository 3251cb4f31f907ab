//! Error types for the load harness.
//!
//! Only set-up code (configuration, connecting, resolving) returns these to a
//! caller. Anything raised inside a tick ends up in a `TaskStatus::Failure`
//! or as a logged, dropped connection attempt.

use shared::Vector3i;
use std::time::Duration;
use thiserror::Error;

/// World data needed for a lookup is not resident yet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("Chunk ({chunk_x}, {chunk_z}) is not loaded")]
    ChunkNotLoaded { chunk_x: i32, chunk_z: i32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error("No standable block near {location}")]
    Unreachable { location: Vector3i },

    #[error("Path exceeds {limit} nodes")]
    TooLong { limit: usize },

    /// The background worker stopped before handing back a result
    #[error("Path search interrupted: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Naming service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Naming service not ready: {0}")]
    NotReady(String),

    #[error("Could not resolve host {host}:{port}")]
    UnknownHost { host: String, port: u16 },

    #[error("Gave up resolving an address after {elapsed:?}: {last}")]
    Exhausted {
        elapsed: Duration,
        last: Box<ResolveError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Packet codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("No join confirmation within {0:?}")]
    Timeout(Duration),

    #[error("Server refused connection: {0}")]
    Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required parameter '{0}'")]
    Missing(String),

    #[error("Parameter '{key}' expects {expected}, got '{value}'")]
    Invalid {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown experiment {0}")]
    UnknownExperiment(u32),
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, expected: &'static str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Experiment already {0}")]
    Lifecycle(&'static str),
}
