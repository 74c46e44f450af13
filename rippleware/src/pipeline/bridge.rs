//! Nested invocation: running a pipeline as a param of another.
//!
//! Only reachable from inside the crate. Unlike an outside call, the nested
//! pipeline receives the parent's channel meta as its input meta and hands
//! its output meta back instead of dropping it. It adopts the parent's
//! global store, receiver, key generator and context only where it has
//! none of its own.

use super::channels::Channels;
use super::instance::{Pipeline, UseKey};
use crate::errors::RippleResult;
use crate::hooks::Ambient;
use futures::FutureExt;
use futures::future::BoxFuture;

/// Options bundle passed down by the calling pipeline.
pub(crate) struct NestedInvocation {
    pub(crate) ambient: Ambient,
    pub(crate) use_key: UseKey,
}

impl Pipeline {
    pub(crate) fn invoke_nested(
        &self,
        invocation: NestedInvocation,
        input: Channels,
    ) -> BoxFuture<'_, RippleResult<Channels>> {
        let declaration = self.freeze();
        async move {
            tracing::trace!(
                pipeline_id = %self.id(),
                use_key = ?invocation.use_key,
                channels = input.len(),
                "Invoking nested pipeline"
            );
            self.run(declaration, invocation.ambient, invocation.use_key, input)
                .await
        }
        .boxed()
    }
}
