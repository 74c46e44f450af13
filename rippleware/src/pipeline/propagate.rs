//! Reconciles a stage's declared params against the incoming channels.
//!
//! In priority order:
//! 1. a sole nested pipeline takes the whole vector (spliced);
//! 2. `all` stages hand the whole vector to every param;
//! 3. one param facing several channels is broadcast per channel;
//! 4. equal counts pair positionally, fewer channels are padded with `Null`;
//! 5. more channels than params is an error.

use super::channels::Channels;
use super::param::Node;
use super::stage::{Stage, StageMode};
use crate::errors::{RippleError, RippleResult};
use serde_json::Value;

pub(crate) struct Assignment<'a> {
    pub(crate) node: &'a Node,
    pub(crate) value: Value,
    pub(crate) meta: Value,
}

pub(crate) enum Plan<'a> {
    /// The nested pipeline consumes every channel and its output channels
    /// replace the stage output.
    Spliced { node: &'a Node, input: Channels },
    /// One assignment per output channel, in declared order.
    Paired(Vec<Assignment<'a>>),
}

pub(crate) fn reconcile(stage: &Stage, input: Channels, strict_arity: bool) -> RippleResult<Plan<'_>> {
    if let Some(node) = stage.spliced() {
        return Ok(Plan::Spliced { node, input });
    }

    let declared = stage.nodes.len();
    let received = input.len();

    if stage.mode == StageMode::All {
        let (values, metas) = input.into_parts();
        let value = Value::Array(values);
        let meta = Value::Array(metas);
        let assignments = stage
            .nodes
            .iter()
            .map(|node| Assignment {
                node,
                value: value.clone(),
                meta: meta.clone(),
            })
            .collect();
        return Ok(Plan::Paired(assignments));
    }

    if declared == 1 && received > 1 && !strict_arity {
        let node = &stage.nodes[0];
        let (values, metas) = input.into_parts();
        let assignments = values
            .into_iter()
            .zip(metas)
            .map(|(value, meta)| Assignment { node, value, meta })
            .collect();
        return Ok(Plan::Paired(assignments));
    }

    if declared < received {
        return Err(RippleError::Propagation { declared, received });
    }

    let mut input = input;
    input.pad_to(declared);
    let (values, metas) = input.into_parts();
    let assignments = stage
        .nodes
        .iter()
        .zip(values.into_iter().zip(metas))
        .map(|(node, (value, meta))| Assignment { node, value, meta })
        .collect();
    Ok(Plan::Paired(assignments))
}

/// Apply the stage's output transform to the executed channels.
pub(crate) fn transform_output(mode: StageMode, output: Channels) -> Channels {
    match mode {
        StageMode::Separate => output.flatten(),
        StageMode::Mix => output.merge(),
        StageMode::Use | StageMode::All | StageMode::Memo => output,
    }
}
