//! Tree nodes.
//!
//! Nodes live in the Command's arena and are addressed by [`NodeId`]. The id
//! is the arena slot, assigned once at creation; rewriting a node's children
//! (or even its op) never moves it.

use serde::{Deserialize, Serialize};

use crate::ops::Op;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    op: Op,
    children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, op: Op, children: Vec<NodeId>) -> Self {
        Self { id, op, children }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Rewrites go through `Command::set_op`, which keeps the command's
    /// bookkeeping in step.
    pub(crate) fn set_op(&mut self, op: Op) {
        self.op = op;
    }

    pub(crate) fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.children
    }

    pub fn child(&self, index: usize) -> NodeId {
        self.children[index]
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}
