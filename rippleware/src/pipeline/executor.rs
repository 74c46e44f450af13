//! Stage execution.
//!
//! Folds the stages of a prepared pipeline over the channel vector. Stages
//! run strictly in order; the assignments of one stage are launched together
//! and joined, and the first failure rejects the whole invocation.

use super::bridge::NestedInvocation;
use super::channels::Channels;
use super::param::Node;
use super::propagate::{Plan, reconcile, transform_output};
use super::stage::{Stage, StageMode, StageState};
use crate::errors::{RippleError, RippleResult};
use crate::hooks::{Ambient, HookArena, Hooks, MetaAccess, Topology};
use crate::matcher::{IndexExpression, select};
use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use ulid::Ulid;

/// Per-invocation state shared by every stage of one pipeline run.
pub(crate) struct RunContext<'a> {
    pub(crate) pipeline_id: Ulid,
    pub(crate) label: &'a str,
    pub(crate) ambient: Ambient,
    pub(crate) states: &'a [StageState],
    pub(crate) strict_arity: bool,
}

/// What a handler of one stage can see.
struct StageScope {
    arena: HookArena,
    stage_id: Ulid,
    topology: Topology,
    ambient: Ambient,
}

impl StageScope {
    fn hooks(&self, access: MetaAccess, meta: Value) -> Hooks {
        Hooks::new(
            self.arena.clone(),
            self.stage_id,
            self.topology,
            self.ambient.clone(),
            access,
            meta,
        )
    }
}

pub(crate) struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute every stage in order, carrying the channel vector along.
    pub(crate) async fn execute(
        ctx: &RunContext<'_>,
        stages: &[Stage],
        input: Channels,
    ) -> RippleResult<Channels> {
        let total_start = Instant::now();
        let count = stages.len();
        let mut channels = input;

        for (index, stage) in stages.iter().enumerate() {
            let topology = Topology { index, count };
            let state = ctx.states.get(index).ok_or_else(|| {
                RippleError::Internal(format!("no stage state for stage {}", index))
            })?;
            let scope = StageScope {
                arena: Arc::clone(&state.hooks),
                stage_id: stage.id,
                topology,
                ambient: ctx.ambient.clone(),
            };

            let stage_start = Instant::now();
            let received = channels.len();

            channels = if stage.mode == StageMode::Memo {
                let input = channels;
                state
                    .memo
                    .get_or_try_init(|| Self::execute_stage(ctx, &scope, stage, input))
                    .await?
                    .clone()
            } else {
                Self::execute_stage(ctx, &scope, stage, channels).await?
            };

            tracing::debug!(
                pipeline = %ctx.label,
                pipeline_id = %ctx.pipeline_id,
                stage = index,
                mode = ?stage.mode,
                received,
                produced = channels.len(),
                duration_ms = stage_start.elapsed().as_millis() as u64,
                "Stage executed"
            );
        }

        tracing::trace!(
            pipeline = %ctx.label,
            stages = count,
            duration_ms = total_start.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );
        Ok(channels)
    }

    async fn execute_stage(
        ctx: &RunContext<'_>,
        scope: &StageScope,
        stage: &Stage,
        input: Channels,
    ) -> RippleResult<Channels> {
        scope.arena.lock().reset();

        let output = match reconcile(stage, input, ctx.strict_arity)? {
            Plan::Spliced { node, input } => Self::execute_spliced(node, scope, input).await?,
            Plan::Paired(assignments) => {
                let futures = assignments.into_iter().map(|assignment| {
                    Self::execute_node(assignment.node, scope, assignment.value, assignment.meta)
                });
                let (values, metas): (Vec<Value>, Vec<Value>) =
                    try_join_all(futures).await?.into_iter().unzip();
                Channels::with_metas(values, metas)
            }
        };

        Ok(transform_output(stage.mode, output))
    }

    async fn execute_spliced(
        node: &Node,
        scope: &StageScope,
        input: Channels,
    ) -> RippleResult<Channels> {
        match node {
            Node::Nested { pipeline, use_key } => {
                let invocation = NestedInvocation {
                    ambient: scope.ambient.clone(),
                    use_key: *use_key,
                };
                let output = pipeline.invoke_nested(invocation, input).await?;
                let (values, metas) = output.into_parts();
                Ok(Channels::with_metas(values, metas))
            }
            other => Err(RippleError::Internal(format!(
                "only a nested pipeline can be spliced, found {}",
                other.kind()
            ))),
        }
    }

    /// Run one param against one channel, yielding `(value, meta)`.
    fn execute_node<'a>(
        node: &'a Node,
        scope: &'a StageScope,
        value: Value,
        meta: Value,
    ) -> BoxFuture<'a, RippleResult<(Value, Value)>> {
        async move {
            tracing::trace!(kind = node.kind(), stage = scope.topology.index, "Dispatching param");
            match node {
                Node::Handler(handler) => {
                    let hooks = scope.hooks(MetaAccess::ReadWrite, meta);
                    let output = handler.handle(value, hooks.clone()).await?;
                    Ok((output, hooks.outgoing_meta()))
                }
                Node::Matchers(arms) => {
                    let handler = select(arms, &value)?;
                    let hooks = scope.hooks(MetaAccess::ReadOnly, meta.clone());
                    let output = handler.handle(value, hooks).await?;
                    Ok((output, meta))
                }
                Node::Index(expr) => Ok((expr.apply(&value), meta)),
                Node::Aggregate(groups) => Ok((aggregate(groups, &value), meta)),
                Node::Fanout(children) => {
                    let futures = children
                        .iter()
                        .map(|child| Self::execute_node(child, scope, value.clone(), meta.clone()));
                    let (values, metas): (Vec<Value>, Vec<Value>) =
                        try_join_all(futures).await?.into_iter().unzip();
                    Ok((Value::Array(values), Value::Array(metas)))
                }
                Node::Nested { pipeline, use_key } => {
                    let invocation = NestedInvocation {
                        ambient: scope.ambient.clone(),
                        use_key: *use_key,
                    };
                    let output = pipeline
                        .invoke_nested(invocation, Channels::single(value, meta))
                        .await?;
                    Ok(output.collapse())
                }
                Node::Pre(_) => Err(RippleError::UnknownParam(
                    "pre-param reached execution without being evaluated".into(),
                )),
            }
        }
        .boxed()
    }
}

static MISSING: Value = Value::Null;

/// Group `i` reads `value[i]` and expression `j` of that group reads
/// `value[i][j]`; every match is concatenated into one flat array.
/// Missing positions query `Null` and contribute nothing.
fn aggregate(groups: &[Vec<IndexExpression>], value: &Value) -> Value {
    let matches = groups
        .iter()
        .enumerate()
        .flat_map(|(i, group)| {
            let slice = value.get(i).unwrap_or(&MISSING);
            group
                .iter()
                .enumerate()
                .flat_map(move |(j, expr)| expr.query(slice.get(j).unwrap_or(&MISSING)))
        })
        .collect();
    Value::Array(matches)
}
