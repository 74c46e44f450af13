//! Pipeline instance: declaration phase, one-time preparation and the
//! callable entry point.
//!
//! ```text
//! Building ──first invocation──► Invoked
//!   stage/sep/all/mix/memo/pre/ctx      declarations rejected
//! ```

use super::channels::Channels;
use super::executor::{PipelineExecutor, RunContext};
use super::param::{Node, Param, PreFn};
use super::stage::{Stage, StageMode, StageState};
use crate::errors::{RippleError, RippleResult};
use crate::hooks::{Ambient, HookArena, HookSlots, Hooks, KeyGenerator, MetaAccess, Topology};
use crate::options::ComposeOptions;
use crate::store::{GlobalStore, SharedStore};
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use ulid::Ulid;

/// Identifies one use of a pipeline; each use owns its own hook arenas,
/// memoized stage output and pre-evaluated params.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum UseKey {
    /// Called directly by the outside world.
    Root,
    /// Declared as a param of another pipeline.
    Param(Ulid),
    /// Called from inside a handler of the given stage.
    Handler(Ulid),
}

/// Ambient context declared with `ctx()`.
#[derive(Clone)]
pub enum ContextDecl {
    Value(Value),
    /// Evaluated once, on the first invocation.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl ContextDecl {
    pub fn factory<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        ContextDecl::Factory(Arc::new(f))
    }

    fn evaluate(&self) -> Value {
        match self {
            ContextDecl::Value(value) => value.clone(),
            ContextDecl::Factory(factory) => factory(),
        }
    }
}

impl From<Value> for ContextDecl {
    fn from(value: Value) -> Self {
        ContextDecl::Value(value)
    }
}

#[derive(Default)]
pub(super) struct Declaration {
    stages: Vec<Stage>,
    context: Option<ContextDecl>,
}

enum Phase {
    Building(Declaration),
    Invoked(Arc<Declaration>),
}

/// Declarations after pre-params and the context factory were evaluated.
struct Prepared {
    stages: Vec<Stage>,
    context: Option<Value>,
}

/// Everything one use of the pipeline keeps across invocations. Uses never
/// share hook slots, memoized output or pre-evaluated params.
struct UseScope {
    prepared: OnceCell<Prepared>,
    pre_hooks: HookArena,
    stages: Vec<StageState>,
}

impl UseScope {
    fn new(stage_count: usize) -> Self {
        Self {
            prepared: OnceCell::new(),
            pre_hooks: Arc::new(Mutex::new(HookSlots::new())),
            stages: (0..stage_count).map(|_| StageState::default()).collect(),
        }
    }
}

struct PipelineInner {
    id: Ulid,
    options: ComposeOptions,
    global: Option<SharedStore>,
    keys: Option<KeyGenerator>,
    phase: Mutex<Phase>,
    uses: Mutex<HashMap<UseKey, Arc<UseScope>>>,
}

/// A composable, eventually invocable pipeline.
///
/// **Cloning**: cheap via `Arc`; all clones are the same instance and share
/// declarations, hook state and global state.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

/// Assembles a [`Pipeline`] from options, a global-store factory and a key
/// generator.
#[derive(Default)]
pub struct PipelineBuilder {
    options: ComposeOptions,
    global: Option<SharedStore>,
    keys: Option<KeyGenerator>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    /// Create the pipeline's global state. The factory runs exactly once,
    /// right here.
    pub fn global<S, F>(mut self, factory: F) -> Self
    where
        S: GlobalStore + 'static,
        F: FnOnce() -> S,
    {
        self.global = Some(Arc::new(factory()));
        self
    }

    /// Use an already shared store.
    pub fn shared_global(mut self, store: SharedStore) -> Self {
        self.global = Some(store);
        self
    }

    pub fn key_generator<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.keys = Some(Arc::new(generate));
        self
    }

    pub fn build(self) -> RippleResult<Pipeline> {
        self.options.sanitize()?;
        Ok(self.assemble())
    }

    /// Build without validating options; default options are always valid.
    pub(crate) fn assemble(self) -> Pipeline {
        let pipeline = Pipeline {
            inner: Arc::new(PipelineInner {
                id: Ulid::new(),
                options: self.options,
                global: self.global,
                keys: self.keys,
                phase: Mutex::new(Phase::Building(Declaration::default())),
                uses: Mutex::new(HashMap::new()),
            }),
        };
        tracing::trace!(
            pipeline = %pipeline.label(),
            pipeline_id = %pipeline.id(),
            has_global = pipeline.inner.global.is_some(),
            "Pipeline created"
        );
        pipeline
    }
}

impl Pipeline {
    pub fn id(&self) -> Ulid {
        self.inner.id
    }

    pub fn options(&self) -> &ComposeOptions {
        &self.inner.options
    }

    /// Whether the pipeline has been invoked (and is therefore locked).
    pub fn is_invoked(&self) -> bool {
        matches!(*self.inner.phase.lock(), Phase::Invoked(_))
    }

    fn label(&self) -> &str {
        self.inner.options.label()
    }

    // ========================================================================
    // DECLARATION
    // ========================================================================

    /// Append a stage (the `use` declaration).
    pub fn stage<I, P>(&self, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_stage("stage", StageMode::Use, params)
    }

    /// Append a stage whose array results are spread into separate channels.
    pub fn sep<I, P>(&self, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_stage("sep", StageMode::Separate, params)
    }

    /// Append a stage where every param receives the whole upstream vector.
    pub fn all<I, P>(&self, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_stage("all", StageMode::All, params)
    }

    /// Append a stage whose output channels are merged into one.
    pub fn mix<I, P>(&self, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_stage("mix", StageMode::Mix, params)
    }

    /// Append a stage that runs on the first invocation only; later
    /// invocations replay its first output.
    pub fn memo<I, P>(&self, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.push_stage("memo", StageMode::Memo, params)
    }

    /// Append a stage whose single param is produced by `f`, evaluated once
    /// against the hook context on the first invocation.
    pub fn pre<F>(&self, f: F) -> RippleResult<Pipeline>
    where
        F: Fn(&Hooks) -> RippleResult<Param> + Send + Sync + 'static,
    {
        self.push_stage("pre", StageMode::Use, [Param::pre(f)])
    }

    /// Declare the ambient context returned by `use_context()`. Must be the
    /// first declaration.
    pub fn ctx(&self, context: impl Into<ContextDecl>) -> RippleResult<Pipeline> {
        let context = context.into();
        self.declare("ctx", move |declaration| {
            if declaration.context.is_some() {
                return Err(RippleError::Declaration(
                    "ctx() may only be declared once".into(),
                ));
            }
            if !declaration.stages.is_empty() {
                return Err(RippleError::Declaration(
                    "ctx() must be the first declaration".into(),
                ));
            }
            declaration.context = Some(context);
            Ok(())
        })
    }

    fn push_stage<I, P>(&self, method: &str, mode: StageMode, params: I) -> RippleResult<Pipeline>
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        self.ensure_building(method)?;

        let params: Vec<Param> = params.into_iter().map(Into::into).collect();
        if params.is_empty() {
            return Err(RippleError::Declaration(format!(
                "a call to {}() must specify at least a single handler",
                method
            )));
        }
        let nodes = params
            .into_iter()
            .map(Node::resolve)
            .collect::<RippleResult<Vec<_>>>()?;
        let stage = Stage::new(mode, nodes);

        self.declare(method, move |declaration| {
            declaration.stages.push(stage);
            Ok(())
        })
    }

    fn ensure_building(&self, method: &str) -> RippleResult<()> {
        match *self.inner.phase.lock() {
            Phase::Building(_) => Ok(()),
            Phase::Invoked(_) => Err(locked(method)),
        }
    }

    fn declare<F>(&self, method: &str, apply: F) -> RippleResult<Pipeline>
    where
        F: FnOnce(&mut Declaration) -> RippleResult<()>,
    {
        let mut phase = self.inner.phase.lock();
        match &mut *phase {
            Phase::Building(declaration) => apply(declaration)?,
            Phase::Invoked(_) => return Err(locked(method)),
        }
        Ok(self.clone())
    }

    // ========================================================================
    // INVOCATION
    // ========================================================================

    /// Invoke the pipeline with positional arguments.
    ///
    /// The pipeline is locked as soon as this is called, before the returned
    /// future is polled. One output channel resolves to its value; any other
    /// count resolves to an array of the channel values. Meta never reaches
    /// the caller.
    pub fn call(&self, args: Vec<Value>) -> BoxFuture<'_, RippleResult<Value>> {
        let declaration = self.freeze();
        async move {
            let output = self
                .run(declaration, Ambient::default(), UseKey::Root, Channels::from_args(args))
                .await?;
            Ok(output.into_result())
        }
        .boxed()
    }

    /// Blocking variant of [`Pipeline::call`]. Drives the invocation on the
    /// current thread; do not use from inside an async runtime worker.
    pub fn call_blocking(&self, args: Vec<Value>) -> RippleResult<Value> {
        futures::executor::block_on(self.call(args))
    }

    pub(super) async fn run(
        &self,
        declaration: Arc<Declaration>,
        parent: Ambient,
        use_key: UseKey,
        input: Channels,
    ) -> RippleResult<Channels> {
        let mut ambient = self.adopt(parent);
        let scope = self.scope_for(use_key, declaration.stages.len());
        let prepared = self.prepare(&scope, &declaration, &ambient).await?;
        if let Some(context) = &prepared.context {
            ambient.context = Some(context.clone());
        }

        let ctx = RunContext {
            pipeline_id: self.inner.id,
            label: self.label(),
            ambient,
            states: &scope.stages,
            strict_arity: self.inner.options.strict_arity,
        };
        PipelineExecutor::execute(&ctx, &prepared.stages, input).await
    }

    /// Transition to `Invoked`, returning the frozen declarations.
    pub(super) fn freeze(&self) -> Arc<Declaration> {
        let mut phase = self.inner.phase.lock();
        let frozen = match &mut *phase {
            Phase::Invoked(declaration) => return Arc::clone(declaration),
            Phase::Building(declaration) => Arc::new(std::mem::take(declaration)),
        };
        *phase = Phase::Invoked(Arc::clone(&frozen));

        tracing::debug!(
            pipeline = %self.label(),
            pipeline_id = %self.inner.id,
            stages = frozen.stages.len(),
            "Pipeline frozen on first invocation"
        );
        frozen
    }

    /// Own construction-time values win over the parent's.
    fn adopt(&self, parent: Ambient) -> Ambient {
        Ambient {
            global: self.inner.global.clone().or(parent.global),
            receiver: self.inner.options.receiver.clone().or(parent.receiver),
            context: parent.context,
            keys: self.inner.keys.clone().or(parent.keys),
        }
    }

    /// Evaluate the context factory and pre-params once per use, against
    /// the ambient state of that use's first invocation.
    async fn prepare<'s>(
        &self,
        scope: &'s UseScope,
        declaration: &Declaration,
        ambient: &Ambient,
    ) -> RippleResult<&'s Prepared> {
        scope
            .prepared
            .get_or_try_init(|| async {
                let context = declaration.context.as_ref().map(ContextDecl::evaluate);
                let mut ambient = ambient.clone();
                if context.is_some() {
                    ambient.context = context.clone();
                }

                scope.pre_hooks.lock().reset();
                let count = declaration.stages.len();
                let stages = declaration
                    .stages
                    .iter()
                    .enumerate()
                    .map(|(index, stage)| {
                        let topology = Topology { index, count };
                        self.evaluate_pre(stage, topology, &scope.pre_hooks, &ambient)
                    })
                    .collect::<RippleResult<Vec<_>>>()?;

                Ok::<_, RippleError>(Prepared { stages, context })
            })
            .await
    }

    fn evaluate_pre(
        &self,
        stage: &Stage,
        topology: Topology,
        pre_hooks: &HookArena,
        ambient: &Ambient,
    ) -> RippleResult<Stage> {
        if !stage.has_pre() {
            return Ok(stage.clone());
        }

        tracing::debug!(
            pipeline = %self.label(),
            stage = topology.index,
            "Evaluating pre-params"
        );
        let hooks = Hooks::new(
            Arc::clone(pre_hooks),
            stage.id,
            topology,
            ambient.clone(),
            MetaAccess::ReadOnly,
            Value::Null,
        );
        let nodes = stage
            .nodes
            .iter()
            .map(|node| node.evaluate_pre(&mut |pre: &PreFn| pre(&hooks)))
            .collect::<RippleResult<Vec<_>>>()?;

        Ok(Stage {
            nodes,
            ..stage.clone()
        })
    }

    fn scope_for(&self, use_key: UseKey, stage_count: usize) -> Arc<UseScope> {
        let mut uses = self.inner.uses.lock();
        let scope = uses
            .entry(use_key)
            .or_insert_with(|| Arc::new(UseScope::new(stage_count)));
        Arc::clone(scope)
    }
}

fn locked(method: &str) -> RippleError {
    RippleError::Locked(format!(
        "{}() cannot be called after the pipeline has been invoked",
        method
    ))
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.inner.id)
            .field("name", &self.inner.options.name)
            .field("invoked", &self.is_invoked())
            .finish_non_exhaustive()
    }
}
