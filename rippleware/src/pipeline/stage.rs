//! Stage definition.

use super::channels::Channels;
use super::param::Node;
use crate::hooks::HookArena;
use tokio::sync::OnceCell;
use ulid::Ulid;

/// Propagation mode of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// Positional pairing with broadcast and padding.
    Use,
    /// Like `Use`, then array results are spread into separate channels.
    Separate,
    /// Every param receives the whole upstream vector.
    All,
    /// Like `Use`, then every output channel is merged into one.
    Mix,
    /// Like `Use`, but only executed once; later invocations replay the
    /// first output.
    Memo,
}

/// A stage holds its resolved params and a propagation mode.
///
/// Stages are executed in declaration order; the params of one stage run
/// concurrently.
#[derive(Clone)]
pub(crate) struct Stage {
    pub(crate) id: Ulid,
    pub(crate) nodes: Vec<Node>,
    pub(crate) mode: StageMode,
}

impl Stage {
    pub(crate) fn new(mode: StageMode, nodes: Vec<Node>) -> Self {
        Self {
            id: Ulid::new(),
            nodes,
            mode,
        }
    }

    pub(crate) fn has_pre(&self) -> bool {
        self.nodes.iter().any(Node::has_pre)
    }

    /// Sole nested pipeline that takes over the whole channel vector.
    pub(crate) fn spliced(&self) -> Option<&Node> {
        match (self.mode, self.nodes.as_slice()) {
            (StageMode::All, _) => None,
            (_, [node @ Node::Nested { .. }]) => Some(node),
            _ => None,
        }
    }
}

/// State one use of a pipeline keeps for one of its stages.
#[derive(Default)]
pub(crate) struct StageState {
    pub(crate) hooks: HookArena,
    /// First output of a `memo` stage, replayed afterwards.
    pub(crate) memo: OnceCell<Channels>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&str> = self.nodes.iter().map(Node::kind).collect();
        f.debug_struct("Stage")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("nodes", &kinds)
            .finish()
    }
}
