//! Functional middleware composition.
//!
//! A pipeline is a chain of stages; each stage holds one or more params
//! (handlers, matcher arms, JSONPath index expressions, nested pipelines or
//! fan-out lists) that consume and transform positional arguments. Handlers
//! receive a [`Hooks`] bundle giving them positional state
//! (`use_state`/`use_effect`), a per-channel meta side-channel, the
//! pipeline's global store, its topology and ambient context.
//!
//! ```ignore
//! use rippleware::{compose, handler, Matcher, Param};
//! use serde_json::json;
//!
//! let app = compose().stage([Param::matchers([
//!     (Matcher::tag("String"), handler(|_, _| Ok(json!("You passed a string!")))),
//!     (Matcher::tag("*"), handler(|_, _| Ok(json!("You didn't pass a string!")))),
//! ])])?;
//!
//! assert_eq!(app.call(vec![json!("hi")]).await?, json!("You passed a string!"));
//! ```

pub mod errors;
pub mod hooks;
pub mod matcher;
pub mod options;
pub mod pipeline;
pub mod store;
mod util;

pub use errors::{RippleError, RippleResult};
pub use hooks::{Hooks, KeyGenerator, StateSetter, Topology};
pub use matcher::{IndexExpression, Matcher, TypeTag};
pub use options::ComposeOptions;
pub use pipeline::{
    ContextDecl, Handler, HandlerRef, Param, Pipeline, PipelineBuilder, PreFn, StageMode,
    handler, handler_async,
};
pub use store::{GlobalStore, ReducerStore, SharedStore};
pub use util::{is_rippleware, just_once, noop, pre};

/// Create an empty pipeline without global state.
pub fn compose() -> Pipeline {
    PipelineBuilder::new().assemble()
}

/// Create an empty pipeline whose global state is produced by `factory`.
/// The factory runs exactly once, before this returns.
pub fn compose_with<S, F>(factory: F) -> Pipeline
where
    S: GlobalStore + 'static,
    F: FnOnce() -> S,
{
    PipelineBuilder::new().global(factory).assemble()
}
