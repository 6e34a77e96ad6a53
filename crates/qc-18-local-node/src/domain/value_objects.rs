//! # Value Objects
//!
//! Lifecycle states of a local node.

use std::fmt;

/// Lifecycle state of a [`LocalNode`](crate::LocalNode).
///
/// `Uninitialized -> Bootstrapping -> Running -> Stopped`. A failed
/// bootstrap never yields a node, and `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Uninitialized,
    Bootstrapping,
    Running,
    Stopped,
}

impl NodeState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Uninitialized, NodeState::Bootstrapping)
                | (NodeState::Bootstrapping, NodeState::Running)
                | (NodeState::Running, NodeState::Stopped)
        )
    }

    #[must_use]
    pub fn is_running(self) -> bool {
        self == NodeState::Running
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Uninitialized => "uninitialized",
            NodeState::Bootstrapping => "bootstrapping",
            NodeState::Running => "running",
            NodeState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
