//! Positional hook-slot storage.
//!
//! Slots are append-on-first-use and overwrite-by-index afterwards. Identity
//! is purely positional: a handler that skips a hook call on one invocation
//! reads its neighbour's slot on the next. That is the usage contract, it is
//! not guarded here.

use serde_json::Value;
use std::any::Any;

type Slot = Option<Box<dyn Any + Send + Sync>>;

#[derive(Default)]
pub(crate) struct HookSlots {
    slots: Vec<Slot>,
    cursor: usize,
}

impl HookSlots {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Rewind the read cursor. Stored values survive.
    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }

    fn advance(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        index
    }

    /// Claim the next slot as state, initializing it on first use.
    ///
    /// A slot holding a value of another type (call order changed between
    /// invocations) is treated as empty and re-initialized.
    pub(crate) fn state<T, F>(&mut self, init: F) -> (usize, T)
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let index = self.advance();
        let slot = &mut self.slots[index];
        if let Some(current) = slot.as_ref().and_then(|boxed| boxed.downcast_ref::<T>()) {
            return (index, current.clone());
        }
        let value = init();
        *slot = Some(Box::new(value.clone()));
        (index, value)
    }

    pub(crate) fn set<T>(&mut self, index: usize, value: T)
    where
        T: Send + Sync + 'static,
    {
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(Box::new(value));
    }

    /// Claim the next slot as an effect. Returns whether the effect should
    /// fire: always without deps, otherwise when deps differ from the
    /// previous call's.
    pub(crate) fn effect(&mut self, deps: Option<Vec<Value>>) -> bool {
        let index = self.advance();
        let slot = &mut self.slots[index];
        let previous = slot
            .as_ref()
            .and_then(|boxed| boxed.downcast_ref::<Option<Vec<Value>>>());

        let changed = match (&deps, previous) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(next), Some(prev)) => prev.as_ref() != Some(next),
        };
        if changed {
            *slot = Some(Box::new(deps));
        }
        changed
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
