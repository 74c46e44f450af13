//! Param declarations and their resolved form.
//!
//! A [`Param`] is what callers declare. When a stage is appended, every param
//! is resolved into a [`Node`]: type tags are parsed, JSONPath expressions
//! compiled and bare lists classified, so execution never re-inspects shapes.

use super::handler::{HandlerRef, handler, handler_async};
use super::instance::{Pipeline, UseKey};
use crate::errors::{RippleError, RippleResult};
use crate::hooks::Hooks;
use crate::matcher::{CompiledMatcher, IndexExpression, Matcher};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use ulid::Ulid;

/// Deferred param, evaluated once against the hook context on the first
/// invocation.
pub type PreFn = Arc<dyn Fn(&Hooks) -> RippleResult<Param> + Send + Sync>;

/// A declared unit of work within a stage.
#[derive(Clone)]
pub enum Param {
    Handler(HandlerRef),
    /// JSONPath query, bare (`$.a`) or regex-literal (`/$.a/`).
    Index(String),
    Nested(Pipeline),
    /// Ordered `(matcher, handler)` arms; first match wins.
    Matchers(Vec<(Matcher, HandlerRef)>),
    /// Bare list: aggregate index, singleton shorthand or fan-out.
    List(Vec<Param>),
    Pre(PreFn),
}

impl Param {
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(Value, &Hooks) -> RippleResult<Value> + Send + Sync + 'static,
    {
        Param::Handler(handler(f))
    }

    pub fn handler_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, Hooks) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RippleResult<Value>> + Send + 'static,
    {
        Param::Handler(handler_async(f))
    }

    pub fn index(expr: impl Into<String>) -> Self {
        Param::Index(expr.into())
    }

    pub fn matchers<I, M>(arms: I) -> Self
    where
        I: IntoIterator<Item = (M, HandlerRef)>,
        M: Into<Matcher>,
    {
        Param::Matchers(
            arms.into_iter()
                .map(|(matcher, handler)| (matcher.into(), handler))
                .collect(),
        )
    }

    pub fn list<I, P>(params: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Param>,
    {
        Param::List(params.into_iter().map(Into::into).collect())
    }

    pub fn pre<F>(f: F) -> Self
    where
        F: Fn(&Hooks) -> RippleResult<Param> + Send + Sync + 'static,
    {
        Param::Pre(Arc::new(f))
    }

    /// Whether this param is a pipeline instance.
    pub fn is_rippleware(&self) -> bool {
        matches!(self, Param::Nested(_))
    }

    fn is_index_list(&self) -> bool {
        match self {
            Param::List(items) => {
                !items.is_empty() && items.iter().all(|item| matches!(item, Param::Index(_)))
            }
            _ => false,
        }
    }
}

impl From<Pipeline> for Param {
    fn from(pipeline: Pipeline) -> Self {
        Param::Nested(pipeline)
    }
}

impl From<&Pipeline> for Param {
    fn from(pipeline: &Pipeline) -> Self {
        Param::Nested(pipeline.clone())
    }
}

impl From<HandlerRef> for Param {
    fn from(handler: HandlerRef) -> Self {
        Param::Handler(handler)
    }
}

impl From<Vec<Param>> for Param {
    fn from(params: Vec<Param>) -> Self {
        Param::List(params)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Handler(_) => f.write_str("Handler"),
            Param::Index(expr) => f.debug_tuple("Index").field(expr).finish(),
            Param::Nested(pipeline) => f.debug_tuple("Nested").field(&pipeline.id()).finish(),
            Param::Matchers(arms) => {
                let matchers: Vec<&Matcher> = arms.iter().map(|(m, _)| m).collect();
                f.debug_tuple("Matchers").field(&matchers).finish()
            }
            Param::List(items) => f.debug_tuple("List").field(items).finish(),
            Param::Pre(_) => f.write_str("Pre"),
        }
    }
}

/// Resolved param, ready for execution.
#[derive(Clone)]
pub(crate) enum Node {
    Handler(HandlerRef),
    Index(IndexExpression),
    Aggregate(Vec<Vec<IndexExpression>>),
    Nested { pipeline: Pipeline, use_key: UseKey },
    Matchers(Vec<(CompiledMatcher, HandlerRef)>),
    Fanout(Vec<Node>),
    Pre(PreFn),
}

impl Node {
    pub(crate) fn resolve(param: Param) -> RippleResult<Node> {
        match param {
            Param::Handler(handler) => Ok(Node::Handler(handler)),
            Param::Index(expr) => Ok(Node::Index(IndexExpression::parse(&expr)?)),
            Param::Nested(pipeline) => Ok(Node::Nested {
                pipeline,
                use_key: UseKey::Param(Ulid::new()),
            }),
            Param::Matchers(arms) => {
                if arms.is_empty() {
                    return Err(RippleError::Declaration(
                        "a matcher declaration needs at least one (matcher, handler) arm".into(),
                    ));
                }
                let arms = arms
                    .into_iter()
                    .map(|(matcher, handler)| Ok((matcher.compile()?, handler)))
                    .collect::<RippleResult<Vec<_>>>()?;
                Ok(Node::Matchers(arms))
            }
            Param::List(items) => Self::resolve_list(items),
            Param::Pre(eval) => Ok(Node::Pre(eval)),
        }
    }

    fn resolve_list(mut items: Vec<Param>) -> RippleResult<Node> {
        if items.is_empty() {
            return Err(RippleError::Declaration(
                "a list param must not be empty".into(),
            ));
        }

        if items.iter().all(Param::is_index_list) {
            let groups = items
                .into_iter()
                .map(|group| match group {
                    Param::List(exprs) => exprs
                        .into_iter()
                        .map(|expr| match expr {
                            Param::Index(source) => IndexExpression::parse(&source),
                            other => Err(RippleError::Internal(format!(
                                "expected an index expression, found {:?}",
                                other
                            ))),
                        })
                        .collect::<RippleResult<Vec<_>>>(),
                    other => Err(RippleError::Internal(format!(
                        "expected an index list, found {:?}",
                        other
                    ))),
                })
                .collect::<RippleResult<Vec<_>>>()?;
            return Ok(Node::Aggregate(groups));
        }

        if items.len() == 1 {
            let only = items.remove(0);
            tracing::warn!(param = ?only, "Unwrapping singleton list param; declare it directly");
            return Self::resolve(only);
        }

        let children = items
            .into_iter()
            .map(Self::resolve)
            .collect::<RippleResult<Vec<_>>>()?;
        Ok(Node::Fanout(children))
    }

    pub(crate) fn has_pre(&self) -> bool {
        match self {
            Node::Pre(_) => true,
            Node::Fanout(children) => children.iter().any(Node::has_pre),
            _ => false,
        }
    }

    /// Replace every pending pre-param with the node its evaluation yields.
    pub(crate) fn evaluate_pre<F>(&self, eval: &mut F) -> RippleResult<Node>
    where
        F: FnMut(&PreFn) -> RippleResult<Param>,
    {
        match self {
            Node::Pre(pre) => {
                let param = eval(pre)?;
                Node::resolve(param)?.evaluate_pre(eval)
            }
            Node::Fanout(children) => Ok(Node::Fanout(
                children
                    .iter()
                    .map(|child| child.evaluate_pre(eval))
                    .collect::<RippleResult<Vec<_>>>()?,
            )),
            other => Ok(other.clone()),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Node::Handler(_) => "handler",
            Node::Index(_) => "index",
            Node::Aggregate(_) => "aggregate",
            Node::Nested { .. } => "nested",
            Node::Matchers(_) => "matchers",
            Node::Fanout(_) => "fanout",
            Node::Pre(_) => "pre",
        }
    }
}
