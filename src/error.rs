//! Error taxonomy for the control plane.
//!
//! The decision pipeline never returns these: a lookup miss on the hot path
//! is the "no rule applies" case, not an error.

use thiserror::Error;

/// Errors surfaced to administrative callers.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: unknown category/action keyword, empty target,
    /// or a field exceeding its byte bound.
    #[error("invalid rule: {0}")]
    Invalid(String),

    /// A batch line failed to parse; nothing from the batch was applied.
    #[error("parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// No rule with this id in any category.
    #[error("rule {0} not found")]
    NotFound(u32),

    /// An explicit id collided with an existing rule.
    #[error("rule {0} already exists")]
    Exists(u32),

    /// The configured rule cap would be exceeded.
    #[error("rule capacity exhausted (max {0})")]
    Capacity(u32),

    /// Reserved for a future authorization layer.
    #[error("permission denied")]
    Permission,

    #[error("config i/o error")]
    Io(#[from] std::io::Error),

    #[error("config format error")]
    Json(#[from] serde_json::Error),
}
