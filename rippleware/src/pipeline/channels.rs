//! Data/meta vectors carried between stages.

use serde_json::Value;

/// Parallel data and meta vectors. Both always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Channels {
    values: Vec<Value>,
    metas: Vec<Value>,
}

impl Channels {
    /// Top-level input: every channel starts with `Null` meta.
    pub(crate) fn from_args(values: Vec<Value>) -> Self {
        let metas = vec![Value::Null; values.len()];
        Self { values, metas }
    }

    /// Pair values with a meta vector of possibly different length.
    pub(crate) fn with_metas(values: Vec<Value>, metas: Vec<Value>) -> Self {
        let metas = reconcile_metas(metas, values.len());
        Self { values, metas }
    }

    pub(crate) fn single(value: Value, meta: Value) -> Self {
        Self {
            values: vec![value],
            metas: vec![meta],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }

    #[cfg(test)]
    pub(crate) fn metas(&self) -> &[Value] {
        &self.metas
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Vec<Value>) {
        (self.values, self.metas)
    }

    /// Right-pad with `Null` data and meta up to `len` channels.
    pub(crate) fn pad_to(&mut self, len: usize) {
        if self.values.len() < len {
            self.values.resize(len, Value::Null);
            self.metas.resize(len, Value::Null);
        }
    }

    /// Singular channel as itself, anything else as arrays.
    pub(crate) fn collapse(self) -> (Value, Value) {
        let (mut values, mut metas) = self.into_parts();
        if values.len() == 1 {
            (values.remove(0), metas.remove(0))
        } else {
            (Value::Array(values), Value::Array(metas))
        }
    }

    /// Outermost result: meta dropped, singular channel unwrapped.
    pub(crate) fn into_result(self) -> Value {
        self.collapse().0
    }

    /// Spread array-valued channels into one channel per element.
    pub(crate) fn flatten(self) -> Self {
        let mut values = Vec::new();
        let mut metas = Vec::new();

        for (value, meta) in self.values.into_iter().zip(self.metas) {
            match value {
                Value::Array(items) => {
                    let split = match meta {
                        Value::Array(parts) if parts.len() == items.len() => parts,
                        other => vec![other; items.len()],
                    };
                    values.extend(items);
                    metas.extend(split);
                }
                scalar => {
                    values.push(scalar);
                    metas.push(meta);
                }
            }
        }

        Self { values, metas }
    }

    /// Merge every channel into a single one.
    pub(crate) fn merge(self) -> Self {
        Self::single(Value::Array(self.values), Value::Array(self.metas))
    }
}

/// Length-reconcile a meta vector against `len` data channels: equal lengths
/// are kept, a single meta is broadcast, anything else is truncated or
/// padded with `Null`.
pub(crate) fn reconcile_metas(mut metas: Vec<Value>, len: usize) -> Vec<Value> {
    if metas.len() == len {
        return metas;
    }
    if metas.len() == 1 {
        return vec![metas.remove(0); len];
    }
    metas.resize(len, Value::Null);
    metas
}
