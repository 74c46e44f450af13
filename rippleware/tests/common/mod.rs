//! Shared helpers for the integration tests.

#![allow(dead_code)] // Not every test file uses every helper

use rippleware::Param;
use serde_json::{Value, json};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
/// Set `RUST_LOG=rippleware=trace` to see stage execution records.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn as_int(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

/// Adds one to a numeric channel.
pub fn inc() -> Param {
    Param::handler(|value, _| Ok(json!(as_int(&value) + 1)))
}

/// Returns its input unchanged.
pub fn passthrough() -> Param {
    Param::handler(|value, _| Ok(value))
}

/// Replaces the channel with its incoming meta.
pub fn read_meta() -> Param {
    Param::handler(|_, hooks| Ok(hooks.use_meta()))
}

/// Passes the value through and sets the outgoing meta.
pub fn write_meta(meta: Value) -> Param {
    Param::handler(move |value, hooks| {
        hooks.set_meta(meta.clone())?;
        Ok(value)
    })
}
