use serde::Serialize;

use crate::element::Element;

/// Index of a node in its [`Tree`]'s arena.
///
/// Parent and child relations are plain indices into the owning tree's node
/// vector, so there is no ownership cycle to manage: the tree owns every
/// node, and back-references are lookups only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What shape of line a node came from.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A `key: value` line.
    Simple { value: String },
    /// A `key:` line opening an indented block. Owns its children in order.
    Section { children: Vec<NodeId> },
    /// Any other statement line; `effect` is the whole trimmed line.
    Effect { effect: String },
}

/// One structural node: a single non-blank source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The `key` part for simple/section lines, or the whole line for effects.
    pub key: String,
    /// 1-indexed source line.
    pub line: usize,
    /// Normalized depth: every root is 0, every child is parent + 1. Set by
    /// [`Tree::normalize_indents`] after the build pass, independent of the
    /// raw whitespace width.
    pub indent: usize,
    /// Enclosing section, if any. Lookup only, never ownership.
    pub parent: Option<NodeId>,
    /// Semantic payload attached once an analyzer claims this node.
    pub element: Option<Element>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_section(&self) -> bool {
        matches!(self.kind, NodeKind::Section { .. })
    }

    /// The `value` of a `key: value` line, if this is a simple node.
    pub fn simple_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Simple { value } => Some(value),
            _ => None,
        }
    }

    /// The statement text of an effect node.
    pub fn effect_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Effect { effect } => Some(effect),
            _ => None,
        }
    }
}

/// An ordered forest of structural nodes backed by a flat arena.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child ids of a node (empty for non-sections).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Section { children } => children,
            _ => &[],
        }
    }

    /// Append a node, attaching it under `parent` (or to the root forest).
    /// `parent` must be a section node when given.
    pub fn push(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = parent;
        self.nodes.push(node);
        match parent {
            Some(pid) => match &mut self.node_mut(pid).kind {
                NodeKind::Section { children } => children.push(id),
                _ => panic!("parent {:?} is not a section", pid),
            },
            None => self.roots.push(id),
        }
        id
    }

    /// Recompute every node's `indent` by a top-down walk: roots are depth 0,
    /// children are parent depth + 1. Raw whitespace widths used during the
    /// build are discarded here.
    pub fn normalize_indents(&mut self) {
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            self.node_mut(id).indent = depth;
            for &child in self.children(id).to_vec().iter() {
                stack.push((child, depth + 1));
            }
        }
    }

    /// All node ids in depth-first document order.
    pub fn iter_depth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// The node on the given 1-indexed source line, if any.
    pub fn node_at_line(&self, line: usize) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.line == line)
            .map(|i| NodeId(i as u32))
    }

    /// The last source line covered by a node's subtree (the node's own line
    /// for leaves).
    pub fn subtree_end_line(&self, id: NodeId) -> usize {
        let mut end = self.node(id).line;
        for &child in self.children(id) {
            end = end.max(self.subtree_end_line(child));
        }
        end
    }

    /// The named section child of a section, if present.
    pub fn section_child(&self, id: NodeId, key: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.node(c).is_section() && self.node(c).key == key)
    }
}
