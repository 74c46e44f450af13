//! Hook bundle handed to every handler invocation.
//!
//! `use_state` and `use_effect` consume positional slots from the arena of
//! the stage being executed; the remaining hooks are contextual accessors
//! scoped to the current channel.

mod slots;

pub(crate) use slots::HookSlots;

use crate::errors::{RippleError, RippleResult};
use crate::pipeline::{Channels, NestedInvocation, Pipeline, UseKey};
use crate::store::SharedStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use ulid::Ulid;

pub(crate) type HookArena = Arc<Mutex<HookSlots>>;

pub type KeyGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Position of the executing stage within its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub index: usize,
    pub count: usize,
}

impl From<Topology> for (usize, usize) {
    fn from(topology: Topology) -> Self {
        (topology.index, topology.count)
    }
}

/// Ambient values a nested pipeline may inherit from its parent.
#[derive(Clone, Default)]
pub(crate) struct Ambient {
    pub(crate) global: Option<SharedStore>,
    pub(crate) receiver: Option<Value>,
    pub(crate) context: Option<Value>,
    pub(crate) keys: Option<KeyGenerator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetaAccess {
    ReadWrite,
    ReadOnly,
}

struct HookScope {
    slots: HookArena,
    stage_id: Ulid,
    topology: Topology,
    ambient: Ambient,
    access: MetaAccess,
    meta_in: Value,
    meta_out: Mutex<Option<Value>>,
}

/// Hooks available inside a handler. Cheap to clone; clones share the
/// same channel scope.
#[derive(Clone)]
pub struct Hooks {
    scope: Arc<HookScope>,
}

impl Hooks {
    pub(crate) fn new(
        slots: HookArena,
        stage_id: Ulid,
        topology: Topology,
        ambient: Ambient,
        access: MetaAccess,
        meta_in: Value,
    ) -> Self {
        Self {
            scope: Arc::new(HookScope {
                slots,
                stage_id,
                topology,
                ambient,
                access,
                meta_in,
                meta_out: Mutex::new(None),
            }),
        }
    }

    /// Retained state. `initial` is only used the first time this slot is
    /// reached.
    pub fn use_state<T>(&self, initial: T) -> (T, StateSetter<T>)
    where
        T: Clone + Send + Sync + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Like [`Hooks::use_state`] with a lazily computed initial value.
    pub fn use_state_with<T, F>(&self, init: F) -> (T, StateSetter<T>)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let (index, value) = self.scope.slots.lock().state(init);
        let setter = StateSetter {
            slots: Arc::clone(&self.scope.slots),
            index,
            _marker: PhantomData,
        };
        (value, setter)
    }

    /// Run `callback` when `deps` differ (deep equality) from the previous
    /// invocation's, or every time when `deps` is `None`.
    pub fn use_effect<F>(&self, callback: F, deps: Option<Vec<Value>>)
    where
        F: FnOnce(),
    {
        let fire = self.scope.slots.lock().effect(deps);
        if fire {
            callback();
        }
    }

    /// Meta flowing into this channel.
    pub fn use_meta(&self) -> Value {
        self.scope.meta_in.clone()
    }

    /// Set the meta flowing out of this channel.
    pub fn set_meta(&self, meta: Value) -> RippleResult<()> {
        if self.scope.access == MetaAccess::ReadOnly {
            return Err(RippleError::MetaReadOnly);
        }
        *self.scope.meta_out.lock() = Some(meta);
        Ok(())
    }

    pub fn use_global(&self) -> Option<SharedStore> {
        self.scope.ambient.global.clone()
    }

    pub fn use_topology(&self) -> Topology {
        self.scope.topology
    }

    pub fn use_context(&self) -> Option<Value> {
        self.scope.ambient.context.clone()
    }

    pub fn use_receiver(&self) -> Option<Value> {
        self.scope.ambient.receiver.clone()
    }

    /// Fresh process-unique key from the pipeline's key generator.
    pub fn use_key(&self) -> String {
        match &self.scope.ambient.keys {
            Some(generate) => generate(),
            None => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Run `pipeline` as a nested pipeline of this channel: it inherits the
    /// ambient state it lacks, receives this channel's meta and its output
    /// meta becomes this channel's outgoing meta.
    pub async fn call_nested(&self, pipeline: &Pipeline, input: Value) -> RippleResult<Value> {
        let invocation = NestedInvocation {
            ambient: self.scope.ambient.clone(),
            use_key: UseKey::Handler(self.scope.stage_id),
        };
        let output = pipeline
            .invoke_nested(invocation, Channels::single(input, self.use_meta()))
            .await?;
        let (value, meta) = output.collapse();
        self.set_meta(meta)?;
        Ok(value)
    }

    /// Meta set by the handler, `Null` when it never called `set_meta`.
    pub(crate) fn outgoing_meta(&self) -> Value {
        self.scope.meta_out.lock().clone().unwrap_or(Value::Null)
    }
}

/// Writes back into the slot claimed by a `use_state` call.
pub struct StateSetter<T> {
    slots: HookArena,
    index: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> StateSetter<T>
where
    T: Send + Sync + 'static,
{
    pub fn set(&self, value: T) {
        self.slots.lock().set(self.index, value);
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            index: self.index,
            _marker: PhantomData,
        }
    }
}
