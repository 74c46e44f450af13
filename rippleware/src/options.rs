//! Construction options for a pipeline instance.

use crate::errors::{RippleError, RippleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Static pipeline configuration (set once at construction, never changes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeOptions {
    /// Label attached to log records emitted for this pipeline.
    pub name: Option<String>,
    /// Ambient receiver exposed to handlers through `use_receiver()`.
    ///
    /// Nested pipelines without their own receiver adopt their parent's.
    pub receiver: Option<Value>,
    /// Reject a single param facing several channels instead of
    /// broadcasting it once per channel.
    pub strict_arity: bool,
}

impl ComposeOptions {
    /// Validate options before a pipeline is built.
    pub fn sanitize(&self) -> RippleResult<()> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(RippleError::Config(
                "pipeline name must not be empty when provided".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("anonymous")
    }
}
