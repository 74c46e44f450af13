//! Pipeline composition and execution engine.
//!
//! ## Architecture
//!
//! ```text
//! Pipeline → Stages → Params
//!
//! - Pipeline: declarations, hook arenas, global state, entry point
//! - Stage:    params plus a propagation mode (use/sep/all/mix/memo)
//! - Param:    handler, matcher arms, index expression, nested pipeline,
//!             fan-out list or deferred (pre) param
//! ```
//!
//! Each invocation folds propagate → execute over the stages, carrying a
//! `(data, meta)` channel vector.
//!
//! ## Example
//!
//! ```ignore
//! use rippleware::{compose, Param};
//! use serde_json::json;
//!
//! let app = compose()
//!     .stage([Param::handler(|n, _| Ok(json!(n.as_i64().unwrap_or(0) + 1)))])?
//!     .stage([Param::handler(|n, _| Ok(json!(n.as_i64().unwrap_or(0) * 2)))])?;
//!
//! assert_eq!(app.call(vec![json!(1)]).await?, json!(4));
//! ```

mod bridge;
mod channels;
mod executor;
mod handler;
mod instance;
mod param;
mod propagate;
mod stage;

pub(crate) use bridge::NestedInvocation;
pub(crate) use channels::Channels;
pub use handler::{Handler, HandlerRef, handler, handler_async};
pub(crate) use instance::UseKey;
pub use instance::{ContextDecl, Pipeline, PipelineBuilder};
pub use param::{Param, PreFn};
pub use stage::StageMode;
