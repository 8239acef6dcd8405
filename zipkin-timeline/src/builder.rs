//! Builds the trace tree from a flat list of spans.
use crate::cleaner::merge_by_id;
use crate::error::{TimelineError, TimelineResult};
use crate::model::{Endpoint, Span};
use crate::node::{NodeId, SpanTree};
use crate::timeline_debug;
use std::collections::HashMap;

/// Identity of a span within a trace.
///
/// In B3, a server may reuse the span id of its client. If two servers answer
/// the same client id, only their endpoint tells them apart, so shared spans
/// are keyed by endpoint too.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct SpanKey {
    id: String,
    shared: bool,
    endpoint: Option<Endpoint>,
}

impl SpanKey {
    fn of(span: &Span) -> Self {
        if span.shared {
            SpanKey::shared(&span.id, span.local_endpoint.as_ref())
        } else {
            SpanKey::plain(&span.id)
        }
    }

    fn plain(id: &str) -> Self {
        SpanKey {
            id: id.to_owned(),
            shared: false,
            endpoint: None,
        }
    }

    fn shared(id: &str, endpoint: Option<&Endpoint>) -> Self {
        SpanKey {
            id: id.to_owned(),
            shared: true,
            endpoint: endpoint.cloned(),
        }
    }
}

/// Places each span at the most appropriate position of a trace tree.
///
/// Building is defensive of typical reporting problems. Spans are often
/// reported depth-first, so a parent may be missing; such spans are attached
/// to the root, which may be synthetic.
#[derive(Debug, Default)]
pub struct SpanNodeBuilder {
    key_to_index: HashMap<SpanKey, usize>,
}

impl SpanNodeBuilder {
    /// Creates a builder.
    pub fn new() -> Self {
        SpanNodeBuilder::default()
    }

    /// Merges the input and builds its trace tree.
    ///
    /// The input may be incomplete or redundant but must belong to one trace.
    pub fn build(mut self, spans: Vec<Span>) -> TimelineResult<SpanTree> {
        if spans.is_empty() {
            return Err(TimelineError::EmptyTrace);
        }
        // merging first avoids redundant leaves
        let spans = merge_by_id(spans);
        let trace_id = spans[0].trace_id.clone();
        timeline_debug!(
            name: "SpanNodeBuilder.Build",
            trace_id = trace_id.as_str(),
            span_count = spans.len(),
        );

        // index everything first: resolving a parent needs the keys of all spans
        for (index, span) in spans.iter().enumerate() {
            self.key_to_index.entry(SpanKey::of(span)).or_insert(index);
        }

        let mut root_index = None;
        let mut parents = Vec::with_capacity(spans.len());
        for (index, span) in spans.iter().enumerate() {
            let parent = match self.parent_key(span) {
                Some(key) => match self.key_to_index.get(&key) {
                    Some(parent) => Some(*parent),
                    None => {
                        timeline_debug!(
                            name: "SpanNodeBuilder.MissingParent",
                            trace_id = trace_id.as_str(),
                            id = span.id.as_str(),
                            parent_id = key.id.as_str(),
                        );
                        None
                    }
                },
                // the first root is assumed to be the real one
                None if root_index.is_none() => {
                    root_index = Some(index);
                    None
                }
                None => {
                    timeline_debug!(
                        name: "SpanNodeBuilder.ExtraRoot",
                        trace_id = trace_id.as_str(),
                        id = span.id.as_str(),
                    );
                    None
                }
            };
            parents.push(parent);
        }
        break_cycles(&spans, &mut parents);

        if root_index.is_none() {
            let mut top_level = (0..spans.len()).filter(|index| parents[*index].is_none());
            if let (Some(only), None) = (top_level.next(), top_level.next()) {
                root_index = Some(only);
            } else {
                timeline_debug!(
                    name: "SpanNodeBuilder.SyntheticRoot",
                    trace_id = trace_id.as_str(),
                );
            }
        }

        let mut slots: Vec<Option<Span>> = spans.into_iter().map(Some).collect();
        let mut tree = SpanTree::new(root_index.and_then(|index| slots[index].take()));
        let root = tree.root();
        let ids: Vec<NodeId> = slots
            .into_iter()
            .map(|slot| match slot {
                Some(span) => tree.push(span),
                None => root,
            })
            .collect();

        for (index, parent) in parents.into_iter().enumerate() {
            if Some(index) == root_index {
                continue;
            }
            let parent = parent.map_or(root, |parent| ids[parent]);
            tree.add_child(parent, ids[index])?;
        }
        tree.sort_children_by_timestamp();
        Ok(tree)
    }

    /// Returns the key of the best parent for `span`, or `None` for a root.
    fn parent_key(&self, span: &Span) -> Option<SpanKey> {
        if span.shared {
            // a client is never ambiguous for a given span id
            return Some(SpanKey::plain(&span.id));
        }
        let parent_id = span.parent_id.as_deref()?;
        // the most specific case: a local span under the server side of its parent
        let shared_parent = SpanKey::shared(parent_id, span.local_endpoint.as_ref());
        if self.key_to_index.contains_key(&shared_parent) {
            Some(shared_parent)
        } else {
            Some(SpanKey::plain(parent_id))
        }
    }
}

/// Detaches spans whose ancestry loops back on itself, so they attach to the root.
fn break_cycles(spans: &[Span], parents: &mut [Option<usize>]) {
    const UNVISITED: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNVISITED; parents.len()];
    let mut path = Vec::new();
    for start in 0..parents.len() {
        let mut current = start;
        loop {
            match state[current] {
                DONE => break,
                ON_PATH => {
                    timeline_debug!(
                        name: "SpanNodeBuilder.CyclicParent",
                        id = spans[current].id.as_str(),
                    );
                    parents[current] = None;
                    break;
                }
                _ => {
                    state[current] = ON_PATH;
                    path.push(current);
                    match parents[current] {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
            }
        }
        for visited in path.drain(..) {
            state[visited] = DONE;
        }
    }
}
