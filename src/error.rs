//! Engine Error Types
//!
//! One closed error enum for everything the engine can fail at. Hook
//! installation and trigger parsing are the two failure kinds callers are
//! expected to branch on; the rest is plumbing.

use thiserror::Error;

/// Errors produced by the macro engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The global input listener could not be installed. Recording and
    /// trigger dispatch cannot function; surfaced once at startup.
    #[error("global input hook unavailable: {0}")]
    HookUnavailable(String),

    /// A persisted trigger string could not be parsed. Callers fall back
    /// to the default trigger instead of crashing.
    #[error("invalid trigger string: {0:?}")]
    InvalidTriggerString(String),

    /// Input synthesis failed mid-playback
    #[error("input injection failed: {0}")]
    Injection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
