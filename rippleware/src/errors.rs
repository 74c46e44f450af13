//! Error types shared by every layer of the pipeline engine.
//!
//! Declaration problems surface synchronously from the builder methods;
//! everything else rejects the invocation future. Nothing is recovered.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RippleError {
    /// Invalid construction options.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed stage or param declaration.
    #[error("invalid declaration: {0}")]
    Declaration(String),

    /// Declaration attempted after the pipeline was first invoked.
    #[error("pipeline is locked: {0}")]
    Locked(String),

    #[error(
        "no viable propagation: {declared} param(s) declared, {received} argument(s) received"
    )]
    Propagation { declared: usize, received: usize },

    #[error("no matcher accepted value {0}")]
    NoMatch(Value),

    #[error("predicate matcher returned a non-boolean value: {0}")]
    NonBooleanPredicate(Value),

    #[error("invalid type tag '{tag}': {reason}")]
    TypeTag { tag: String, reason: String },

    #[error("invalid index expression '{expr}': {reason}")]
    IndexExpression { expr: String, reason: String },

    #[error("meta is read-only in this scope")]
    MetaReadOnly,

    #[error("unrecognized param: {0}")]
    UnknownParam(String),

    #[error("handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RippleResult<T> = std::result::Result<T, RippleError>;

impl RippleError {
    /// Shorthand for handler authors reporting a plain message.
    pub fn handler(message: impl std::fmt::Display) -> Self {
        RippleError::Handler(anyhow::anyhow!("{}", message))
    }
}
