//! Trace tree, stored as an arena of nodes.
//!
//! Nodes own their children through [`NodeId`] lists. The parent link is a
//! plain index used for upward lookups only.
use crate::error::{TimelineError, TimelineResult};
use crate::model::Span;
use std::collections::VecDeque;

/// Index of a node within a [`SpanTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A node of the trace tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanNode {
    span: Option<Span>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SpanNode {
    /// Returns the span, or `None` for a synthetic root.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// Returns the parent, or `None` for the root or a detached node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the children in display order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A trace tree with exactly one top-level node.
///
/// The root holds the real root span, or no span at all when the trace is
/// headless and several spans ended up at the top.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanTree {
    nodes: Vec<SpanNode>,
    root: NodeId,
}

impl SpanTree {
    /// Creates a tree holding only a root node. `None` makes a synthetic root.
    pub fn new(root: Option<Span>) -> Self {
        SpanTree {
            nodes: vec![SpanNode {
                span: root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Adds a detached node and returns its id. Attach it with [`SpanTree::add_child`].
    pub fn push(&mut self, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SpanNode {
            span: Some(span),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Appends `child` to the children of `parent`.
    ///
    /// Fails with [`TimelineError::CyclicSpan`] when `child` is `parent`.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> TimelineResult<()> {
        if parent == child {
            return Err(TimelineError::CyclicSpan {
                span_id: self.describe(child),
            });
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Returns the top-level node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn node(&self, id: NodeId) -> &SpanNode {
        &self.nodes[id.0]
    }

    /// Returns the span of `id`, or `None` for a synthetic root.
    pub fn span(&self, id: NodeId) -> Option<&Span> {
        self.nodes[id.0].span.as_ref()
    }

    pub(crate) fn span_mut(&mut self, id: NodeId) -> Option<&mut Span> {
        self.nodes[id.0].span.as_mut()
    }

    /// Returns the children of `id`.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Returns the parent of `id`.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Returns the number of spans in the tree, not counting a synthetic root.
    pub fn span_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.span.is_some()).count()
    }

    /// Returns the root, or the children of a synthetic root.
    ///
    /// Fails with [`TimelineError::EmptyTrace`] when there is no span at all.
    pub fn queue_root_most(&self) -> TimelineResult<Vec<NodeId>> {
        let queue = if self.span(self.root).is_some() {
            vec![self.root]
        } else {
            self.children(self.root).to_vec()
        };
        if queue.is_empty() {
            return Err(TimelineError::EmptyTrace);
        }
        Ok(queue)
    }

    /// Visits every span breadth-first, starting at the root-most spans.
    pub fn traverse(&self) -> Traverse<'_> {
        Traverse {
            tree: self,
            queue: self
                .queue_root_most()
                .map(VecDeque::from)
                .unwrap_or_default(),
        }
    }

    /// Returns `start` and all its descendants, depth-first in child order.
    pub fn pre_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Orders every child list by span timestamp, missing timestamps first.
    pub(crate) fn sort_children_by_timestamp(&mut self) {
        for index in 0..self.nodes.len() {
            let mut children = std::mem::take(&mut self.nodes[index].children);
            children.sort_by_key(|child| self.span(*child).and_then(|span| span.timestamp));
            self.nodes[index].children = children;
        }
    }

    fn describe(&self, id: NodeId) -> String {
        self.span(id)
            .map(|span| span.id.clone())
            .unwrap_or_else(|| "<synthetic root>".to_owned())
    }
}

/// Breadth-first iterator over the spans of a [`SpanTree`].
#[derive(Debug)]
pub struct Traverse<'a> {
    tree: &'a SpanTree,
    queue: VecDeque<NodeId>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.queue.pop_front()?;
            self.queue.extend(self.tree.children(id));
            if let Some(span) = self.tree.span(id) {
                return Some(span);
            }
        }
    }
}
