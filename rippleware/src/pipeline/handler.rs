//! Handler trait for pipeline params.

use crate::errors::RippleResult;
use crate::hooks::Hooks;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Unit of work attached to a channel.
///
/// Implement this directly for stateful handler types, or wrap a closure
/// with [`handler`] / [`handler_async`].
#[async_trait]
pub trait Handler: Send + Sync {
    /// Transform one channel value.
    async fn handle(&self, input: Value, hooks: Hooks) -> RippleResult<Value>;
}

pub type HandlerRef = Arc<dyn Handler>;

struct SyncFn<F>(F);

#[async_trait]
impl<F> Handler for SyncFn<F>
where
    F: Fn(Value, &Hooks) -> RippleResult<Value> + Send + Sync,
{
    async fn handle(&self, input: Value, hooks: Hooks) -> RippleResult<Value> {
        (self.0)(input, &hooks)
    }
}

struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> Handler for AsyncFn<F>
where
    F: Fn(Value, Hooks) -> Fut + Send + Sync,
    Fut: Future<Output = RippleResult<Value>> + Send + 'static,
{
    async fn handle(&self, input: Value, hooks: Hooks) -> RippleResult<Value> {
        (self.0)(input, hooks).await
    }
}

/// Wrap a synchronous closure.
pub fn handler<F>(f: F) -> HandlerRef
where
    F: Fn(Value, &Hooks) -> RippleResult<Value> + Send + Sync + 'static,
{
    Arc::new(SyncFn(f))
}

/// Wrap a closure returning a future.
pub fn handler_async<F, Fut>(f: F) -> HandlerRef
where
    F: Fn(Value, Hooks) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RippleResult<Value>> + Send + 'static,
{
    Arc::new(AsyncFn(f))
}
