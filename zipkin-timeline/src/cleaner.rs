//! Normalizes and merges span fragments reported for one trace.
//!
//! Spans can be reported in several parts, and an RPC client and server may
//! share one span id. [`merge_by_id`] turns such input into one span per
//! logical operation, ordered root first.
use crate::model::annotation::sort_and_dedup;
use crate::model::endpoint::compare_endpoints;
use crate::model::{Endpoint, Kind, Span};
use std::cmp::Ordering;

const SPAN_ID_LEN: usize = 16;
const TRACE_ID_128_LEN: usize = 32;
const ZERO_HIGH_BITS: &str = "0000000000000000";

/// Left-pads a trace id to 16 or 32 hex characters.
///
/// A padded 128-bit id whose high 64 bits are zero is reduced to its low 64
/// bits, as it was only widened on the way.
pub fn normalize_trace_id(trace_id: &str) -> String {
    if trace_id.len() > SPAN_ID_LEN {
        let padded = format!("{:0>width$}", trace_id, width = TRACE_ID_128_LEN);
        match padded.strip_prefix(ZERO_HIGH_BITS) {
            Some(low) => low.to_owned(),
            None => padded,
        }
    } else {
        pad_span_id(trace_id)
    }
}

fn pad_span_id(id: &str) -> String {
    format!("{:0>width$}", id, width = SPAN_ID_LEN)
}

/// Cleans a single span. This does not merge it with other fragments.
pub fn clean(span: Span) -> Span {
    let id = pad_span_id(&span.id);
    // a span that is its own parent would create a cycle
    let parent_id = span
        .parent_id
        .filter(|parent_id| !parent_id.is_empty())
        .map(|parent_id| pad_span_id(&parent_id))
        .filter(|parent_id| *parent_id != id);
    let mut annotations = span.annotations;
    sort_and_dedup(&mut annotations);

    Span {
        trace_id: normalize_trace_id(&span.trace_id),
        parent_id,
        id,
        kind: span.kind,
        name: span
            .name
            .filter(|name| !name.is_empty() && name != "unknown"),
        timestamp: span.timestamp.filter(|timestamp| *timestamp != 0),
        duration: span.duration.filter(|duration| *duration != 0),
        local_endpoint: span.local_endpoint.filter(|e| !e.is_empty()),
        remote_endpoint: span.remote_endpoint.filter(|e| !e.is_empty()),
        annotations,
        tags: span.tags,
        debug: span.debug,
        // shared only applies to the server side
        shared: span.shared && span.kind != Some(Kind::Client),
    }
}

/// Combines two clean fragments of the same span. Fields set on `left` win.
pub(crate) fn merge(left: Span, right: Span) -> Span {
    let mut annotations = left.annotations;
    if annotations.is_empty() {
        annotations = right.annotations;
    } else if !right.annotations.is_empty() {
        annotations.extend(right.annotations);
        sort_and_dedup(&mut annotations);
    }
    let mut tags = left.tags;
    for (key, value) in right.tags {
        tags.entry(key).or_insert(value);
    }

    Span {
        trace_id: if right.trace_id.len() > left.trace_id.len() {
            right.trace_id
        } else {
            left.trace_id
        },
        parent_id: left.parent_id.or(right.parent_id),
        id: left.id,
        kind: left.kind.or(right.kind),
        name: left.name.or(right.name),
        timestamp: left.timestamp.or(right.timestamp),
        duration: left.duration.or(right.duration),
        local_endpoint: merge_endpoints(left.local_endpoint, right.local_endpoint),
        remote_endpoint: merge_endpoints(left.remote_endpoint, right.remote_endpoint),
        annotations,
        tags,
        debug: left.debug || right.debug,
        shared: left.shared || right.shared,
    }
}

fn merge_endpoints(left: Option<Endpoint>, right: Option<Endpoint>) -> Option<Endpoint> {
    match (left, right) {
        (Some(mut left), Some(right)) => {
            left.absorb(&right);
            Some(left)
        }
        (left, right) => left.or(right),
    }
}

/// Folds `endpoint` into `current` unless they contradict each other.
fn try_merge(current: &mut Endpoint, endpoint: Option<&Endpoint>) -> bool {
    let Some(endpoint) = endpoint else {
        return true;
    };
    if !current.is_compatible(endpoint) {
        return false;
    }
    current.absorb(endpoint);
    true
}

/// Non-shared before shared. Among non-shared spans, the client comes first.
fn compare_shared(left: &Span, right: &Span) -> Ordering {
    match (left.shared, right.shared) {
        (false, false) => {
            let rank = |span: &Span| u8::from(!span.is_kind(Kind::Client));
            rank(left).cmp(&rank(right))
        }
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
    }
}

/// Brings fragments of the same span next to each other, client side first.
///
/// Spans without an endpoint go first so that their data lands on the first
/// span with the same id. A server receiving the same request on another port
/// is not told apart.
pub(crate) fn cleanup_comparator(left: &Span, right: &Span) -> Ordering {
    left.id
        .cmp(&right.id)
        .then_with(|| compare_shared(left, right))
        .then_with(|| {
            compare_endpoints(left.local_endpoint.as_ref(), right.local_endpoint.as_ref())
        })
}

/// Merges fragments sharing an id and orders the result root first.
///
/// Returns an empty vector when `spans` is empty.
pub fn merge_by_id(spans: Vec<Span>) -> Vec<Span> {
    if spans.is_empty() {
        return spans;
    }

    let mut cleaned: Vec<Span> = spans.into_iter().map(clean).collect();
    // the longest trace id is the most precise one
    let trace_id = cleaned
        .iter()
        .map(|span| span.trace_id.as_str())
        .max_by_key(|trace_id| trace_id.len())
        .map(str::to_owned)
        .unwrap_or_default();
    cleaned.sort_by(cleanup_comparator);

    let mut merged: Vec<Span> = Vec::with_capacity(cleaned.len());
    let mut iter = cleaned.into_iter().peekable();
    while let Some(mut span) = iter.next() {
        let mut local_endpoint = span.local_endpoint.clone().unwrap_or_default();
        // cautiously merge the next span if it looks like another part of this one
        while let Some(next) = iter.next_if(|next| {
            next.id == span.id
                && next.shared == span.shared
                && try_merge(&mut local_endpoint, next.local_endpoint.as_ref())
        }) {
            span = merge(span, next);
        }
        if span.trace_id != trace_id {
            span.trace_id.clone_from(&trace_id);
        }

        // B3 originally reused the client's span id on the server. Since the
        // input is ordered client first, repair what instrumentation left out.
        if let Some(last) = merged.last().filter(|last| last.id == span.id) {
            if last.is_kind(Kind::Client) && span.is_kind(Kind::Server) && !span.shared {
                span.shared = true;
            }
            if span.shared && span.parent_id.is_none() {
                span.parent_id.clone_from(&last.parent_id);
            }
        }
        merged.push(span);
    }

    let mut sorted = sort_root_first(merged);

    // a lone shared root is a server whose client never reported
    let lone_root = sorted.len() == 1 || sorted[1].parent_id.is_some();
    if sorted[0].parent_id.is_none() && sorted[0].shared && lone_root {
        sorted[0].shared = false;
    }
    sorted
}

/// Orders groups of same-id spans by root first, then timestamp, then name,
/// keeping each group in client-first order.
///
/// Roots come first even when their timestamp is skewed later than a child.
fn sort_root_first(spans: Vec<Span>) -> Vec<Span> {
    let mut groups: Vec<Vec<Span>> = Vec::new();
    for span in spans {
        match groups.last_mut() {
            Some(group) if group[0].id == span.id => group.push(span),
            _ => groups.push(vec![span]),
        }
    }
    groups.sort_by(|a, b| {
        let (a, b) = (&a[0], &b[0]);
        b.parent_id
            .is_none()
            .cmp(&a.parent_id.is_none())
            .then_with(|| {
                if a.parent_id.is_none() && b.parent_id.is_none() {
                    a.shared.cmp(&b.shared)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.name.cmp(&b.name))
    });
    groups.into_iter().flatten().collect()
}
