//! Ready-made params and helpers.

use crate::compose;
use crate::errors::RippleResult;
use crate::hooks::Hooks;
use crate::pipeline::{Param, Pipeline};
use std::any::Any;

/// Structural check: is `value` a pipeline instance (or a param wrapping
/// one)? Holds whether or not the pipeline has been invoked.
pub fn is_rippleware(value: &dyn Any) -> bool {
    value.is::<Pipeline>() || value.downcast_ref::<Param>().is_some_and(Param::is_rippleware)
}

/// Pass-through handler that also forwards the incoming meta.
pub fn noop() -> Param {
    Param::handler(|input, hooks| {
        hooks.set_meta(hooks.use_meta())?;
        Ok(input)
    })
}

/// Tag `f` for pre-evaluation: it runs once, on the first invocation,
/// and the param it returns takes its place.
pub fn pre<F>(f: F) -> Param
where
    F: Fn(&Hooks) -> RippleResult<Param> + Send + Sync + 'static,
{
    Param::pre(f)
}

/// Handler that runs `params` as a sub-pipeline on its first invocation
/// and passes the input (and meta) straight through afterwards.
pub fn just_once<I, P>(params: I) -> RippleResult<Param>
where
    I: IntoIterator<Item = P>,
    P: Into<Param>,
{
    let app = compose().stage(params)?;

    Ok(Param::handler_async(move |input, hooks| {
        let app = app.clone();
        async move {
            let (done, set_done) = hooks.use_state(false);
            if done {
                hooks.set_meta(hooks.use_meta())?;
                return Ok(input);
            }
            set_done.set(true);
            hooks.call_nested(&app, input).await
        }
    }))
}
