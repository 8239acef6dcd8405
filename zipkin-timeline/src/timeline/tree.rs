use crate::cleaner::merge;
use crate::model::{Kind, Span};
use crate::node::{NodeId, SpanTree};
use std::collections::HashMap;

/// A span placed in a display tree, with its depth from the tree's root.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanTreeNode {
    span: Span,
    depth: usize,
    max_depth: usize,
    children: Vec<SpanTreeNode>,
}

impl SpanTreeNode {
    /// Returns the span of this node.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns the distance from the root of this node's tree.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the depth of the deepest node in this subtree.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns the children, in input order.
    pub fn children(&self) -> &[SpanTreeNode] {
        &self.children
    }

    /// Returns the number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&SpanTreeNode> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Returns the first node with span id `id` in pre-order, this node included.
    pub fn find(&self, id: &str) -> Option<&SpanTreeNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.span.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

/// Flattens a trace tree into one span per span id, in display order.
///
/// A shared server span is merged into its client's row, and its children
/// are pulled up and re-sorted by timestamp with the client's own children.
/// The merged row keeps the client's timing but is labeled by the server:
/// it takes the server's name, kind and local endpoint, and the caller
/// becomes its remote endpoint.
pub fn flatten(tree: &SpanTree) -> Vec<Span> {
    let mut spans = Vec::with_capacity(tree.span_count());
    let mut stack: Vec<NodeId> = tree.queue_root_most().unwrap_or_default();
    stack.reverse();
    while let Some(id) = stack.pop() {
        let Some(span) = tree.span(id) else {
            continue;
        };
        let mut row = span.clone();
        let mut children = Vec::new();
        let mut pending: Vec<NodeId> = tree.children(id).iter().rev().copied().collect();
        while let Some(child) = pending.pop() {
            match tree.span(child) {
                Some(shared) if shared.id == row.id => {
                    row = merge_rpc_row(row, shared.clone());
                    pending.extend(tree.children(child).iter().rev());
                }
                _ => children.push(child),
            }
        }
        // pulling up children may affect their order
        children.sort_by_key(|child| tree.span(*child).and_then(|span| span.timestamp));
        stack.extend(children.into_iter().rev());
        spans.push(row);
    }
    spans
}

fn merge_rpc_row(client: Span, server: Span) -> Span {
    let labels = server.is_kind(Kind::Server).then(|| {
        (
            server.name.clone(),
            server.local_endpoint.clone(),
            client
                .local_endpoint
                .clone()
                .or_else(|| server.remote_endpoint.clone()),
        )
    });
    let mut row = merge(client, server);
    if let Some((name, local_endpoint, caller)) = labels {
        if name.is_some() {
            row.name = name;
        }
        if local_endpoint.is_some() {
            row.kind = Some(Kind::Server);
            row.local_endpoint = local_endpoint;
            row.remote_endpoint = caller;
        }
    }
    row
}

/// Groups spans into a forest using their parent ids.
///
/// Spans whose parent is not among `spans` become additional roots, so
/// truncated or filtered input still yields every span exactly once.
/// Children keep the order of `spans`.
pub fn to_tree(spans: &[Span]) -> Vec<SpanTreeNode> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(spans.len());
    for (index, span) in spans.iter().enumerate() {
        index_of.entry(span.id.as_str()).or_insert(index);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); spans.len()];
    let mut roots = Vec::new();
    for (index, span) in spans.iter().enumerate() {
        let parent = span
            .parent_id
            .as_deref()
            .and_then(|parent_id| index_of.get(parent_id).copied())
            .filter(|parent| *parent != index);
        match parent {
            Some(parent) => children[parent].push(index),
            None => roots.push(index),
        }
    }

    let mut visited = vec![false; spans.len()];
    let mut forest = Vec::with_capacity(roots.len());
    // spans only reachable through a parent cycle are rooted in input order
    for root in roots.into_iter().chain(0..spans.len()) {
        if !visited[root] {
            forest.push(build_tree(spans, &children, &mut visited, root));
        }
    }
    forest
}

fn build_tree(
    spans: &[Span],
    children: &[Vec<usize>],
    visited: &mut [bool],
    root: usize,
) -> SpanTreeNode {
    // pre-order, so that every child comes after its parent
    let mut order: Vec<(usize, usize, Vec<usize>)> = Vec::new();
    let mut stack = vec![(root, 0)];
    visited[root] = true;
    while let Some((index, depth)) = stack.pop() {
        let kids: Vec<usize> = children[index]
            .iter()
            .copied()
            .filter(|child| !visited[*child])
            .collect();
        for child in &kids {
            visited[*child] = true;
        }
        stack.extend(kids.iter().rev().map(|child| (*child, depth + 1)));
        order.push((index, depth, kids));
    }

    let mut built: Vec<Option<SpanTreeNode>> = vec![None; spans.len()];
    let mut tree = None;
    for (index, depth, kids) in order.into_iter().rev() {
        let children: Vec<SpanTreeNode> = kids
            .into_iter()
            .filter_map(|child| built[child].take())
            .collect();
        let max_depth = children
            .iter()
            .map(|child| child.max_depth)
            .max()
            .unwrap_or(depth);
        let node = SpanTreeNode {
            span: spans[index].clone(),
            depth,
            max_depth,
            children,
        };
        if index == root {
            tree = Some(node);
        } else {
            built[index] = Some(node);
        }
    }
    tree.unwrap_or_else(|| SpanTreeNode {
        span: spans[root].clone(),
        depth: 0,
        max_depth: 0,
        children: Vec::new(),
    })
}
