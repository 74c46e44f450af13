//! Global state shared by every handler of a pipeline (and of nested
//! pipelines that do not bring their own).

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Opaque store reachable through `use_global()`.
pub trait GlobalStore: Send + Sync {
    /// Apply an action to the store.
    fn dispatch(&self, action: Value);

    /// Snapshot of the current state.
    fn get_state(&self) -> Value;
}

pub type SharedStore = Arc<dyn GlobalStore>;

type Reducer = Box<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Reducer-driven store: every dispatched action replaces the state with
/// `reducer(state, action)`.
pub struct ReducerStore {
    state: Mutex<Value>,
    reducer: Reducer,
}

impl ReducerStore {
    pub fn new<F>(initial: Value, reducer: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(initial),
            reducer: Box::new(reducer),
        }
    }
}

impl GlobalStore for ReducerStore {
    fn dispatch(&self, action: Value) {
        let mut state = self.state.lock();
        let next = (self.reducer)(&state, &action);
        tracing::trace!(action = %action, "Dispatched global action");
        *state = next;
    }

    fn get_state(&self) -> Value {
        self.state.lock().clone()
    }
}

impl std::fmt::Debug for ReducerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerStore")
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
