use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::lifecycle::WorkerState;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode cache generation: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Cache storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network unavailable: {0}")]
    Offline(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("No network response and nothing cached for {0}")]
    NoResponse(String),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Cannot {event} while the worker is {state}")]
    InvalidState {
        state: WorkerState,
        event: &'static str,
    },
}
