//! Clock skew correction.
//!
//! Hosts in a trace rarely agree on the time. When a server appears to
//! receive a request before its client sent it, the server side and every
//! span on the same host are shifted until the causal order holds again.
use crate::model::{ips_match, Endpoint, Kind, Span};
use crate::node::{NodeId, SpanTree};
use crate::timeline_debug;

/// Skew detected between a client and the server it called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockSkew {
    /// The host whose clock is off: always the server side.
    pub endpoint: Endpoint,
    /// Microseconds to subtract from timestamps reported on `endpoint`.
    pub skew: i64,
}

/// Returns the skew between `node` and its parent, if `node` is the server
/// side of a client call made from another host.
pub fn clock_skew(tree: &SpanTree, node: NodeId) -> Option<ClockSkew> {
    let client = tree.span(tree.parent(node)?)?;
    let server = tree.span(node)?;
    // skew is only evaluated between a client and server
    if !client.is_kind(Kind::Client) || !server.is_kind(Kind::Server) {
        return None;
    }
    let server_endpoint = server
        .local_endpoint
        .as_ref()
        .or(client.remote_endpoint.as_ref())?;
    let client_endpoint = client.local_endpoint.as_ref()?;
    // skew on the same host is an instrumentation bug, not a clock problem
    if ips_match(Some(server_endpoint), Some(client_endpoint)) {
        return None;
    }

    let skew = skew_between(client, server)?;
    Some(ClockSkew {
        endpoint: server_endpoint.clone(),
        skew,
    })
}

fn skew_between(client: &Span, server: &Span) -> Option<i64> {
    let (ct, st) = (client.timestamp?, server.timestamp?);
    if st > ct {
        return None;
    }
    let skew = st.saturating_sub(ct);
    let (Some(cd), Some(sd)) = (client.duration, server.duration) else {
        // one-way: assume it takes at least 1us to reach the server
        return (skew <= 0).then_some(skew.saturating_sub(1));
    };
    if cd < sd {
        // async: the server outlives the client, so only the start is known
        return Some(skew.saturating_sub(1));
    }
    // center the server by splitting the rest of the client duration
    let latency = cd.saturating_sub(sd) / 2;
    if latency < 0 {
        return None;
    }
    let skew = st.saturating_sub(latency).saturating_sub(ct);
    (skew != 0).then_some(skew)
}

/// Adjusts server timestamps so that no server appears to start before its
/// client.
///
/// The input is returned unchanged when there is no reliable root to
/// measure against: a headless trace, or one with more than one root.
pub fn correct_for_clock_skew(mut tree: SpanTree) -> SpanTree {
    let root = tree.root();
    let Some(root_span) = tree.span(root) else {
        timeline_debug!(
            name: "ClockSkew.SkipMissingRoot",
            reason = "missing root span",
        );
        return tree;
    };
    if root_span.parent_id.is_some() {
        timeline_debug!(
            name: "ClockSkew.SkipMissingRoot",
            trace_id = root_span.trace_id.as_str(),
            reason = "root span has a missing parent",
        );
        return tree;
    }

    let is_top = |span: &Span| span.parent_id.is_none() && !span.shared;
    let tops = usize::from(is_top(root_span))
        + tree
            .children(root)
            .iter()
            .filter_map(|child| tree.span(*child))
            .filter(|&span| is_top(span))
            .count();
    if tops > 1 {
        timeline_debug!(
            name: "ClockSkew.SkipRedundantRoot",
            trace_id = root_span.trace_id.as_str(),
            root_count = tops,
        );
        return tree;
    }

    let mut stack: Vec<(NodeId, Option<ClockSkew>)> = vec![(root, None)];
    while let Some((id, from_parent)) = stack.pop() {
        let skew = match clock_skew(&tree, id) {
            Some(skew) => {
                timeline_debug!(
                    name: "ClockSkew.Detected",
                    id = tree.span(id).map_or("", |span| span.id.as_str()),
                    skew = skew.skew,
                );
                shift(&mut tree, id, skew.skew);
                Some(skew)
            }
            None => {
                if let Some(skew) = &from_parent {
                    let same_host = tree.span(id).is_some_and(|span| {
                        ips_match(Some(&skew.endpoint), span.local_endpoint.as_ref())
                    });
                    if same_host {
                        shift(&mut tree, id, skew.skew);
                    }
                }
                from_parent
            }
        };
        stack.extend(
            tree.children(id)
                .iter()
                .rev()
                .map(|child| (*child, skew.clone())),
        );
    }
    tree
}

fn shift(tree: &mut SpanTree, id: NodeId, skew: i64) {
    if let Some(span) = tree.span_mut(id) {
        span.shift(skew);
    }
}
