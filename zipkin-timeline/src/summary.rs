//! Summary of a trace, as shown in a list of search results.
use crate::error::{TimelineError, TimelineResult};
use crate::model::Span;
use crate::node::SpanTree;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;

const UNKNOWN: &str = "unknown";

/// The most severe error reported in a trace.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// No span reported an error.
    #[default]
    None,
    /// A span logged an `error` annotation but completed.
    Transient,
    /// A span was tagged `error`.
    Critical,
}

impl ErrorType {
    /// Classifies the error reported by a single span.
    pub fn of(span: &Span) -> Self {
        if span.tags.contains_key("error") {
            ErrorType::Critical
        } else if span
            .annotations
            .iter()
            .any(|annotation| annotation.value == "error")
        {
            ErrorType::Transient
        } else {
            ErrorType::None
        }
    }
}

/// Activity of one service within a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    /// Local or remote service name.
    pub service_name: String,
    /// Spans reported by or sent to this service.
    pub span_count: usize,
    /// Longest duration of those spans, in microseconds.
    pub max_span_duration: i64,
}

/// Overview of a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    /// The trace id.
    pub trace_id: String,
    /// Earliest timestamp in the trace.
    pub timestamp: i64,
    /// From the earliest timestamp to the latest span end.
    pub duration: i64,
    /// Number of spans in the tree.
    pub span_count: usize,
    /// The worst error found in any span.
    pub error_type: ErrorType,
    /// Service of the root-most span, or `"unknown"`.
    pub root_service_name: String,
    /// Name of the root-most span, or `"unknown"`.
    pub root_span_name: String,
    /// Services ordered by longest span first, then by name.
    pub service_summaries: Vec<ServiceSummary>,
}

impl TraceSummary {
    /// Summarizes a trace tree.
    ///
    /// Fails with [`TimelineError::EmptyTrace`] when the tree has no span, and
    /// with [`TimelineError::MissingTimestamp`] when no span has a timestamp.
    pub fn new(tree: &SpanTree) -> TimelineResult<Self> {
        let root_most = tree.queue_root_most()?;
        let root = tree.span(root_most[0]).ok_or(TimelineError::EmptyTrace)?;

        let mut span_count = 0;
        let mut error_type = ErrorType::None;
        let mut min: Option<i64> = None;
        let mut max: Option<i64> = None;
        let mut durations: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        for span in tree.traverse() {
            span_count += 1;
            error_type = error_type.max(ErrorType::of(span));
            for timestamp in [span.timestamp, span.end_timestamp()].into_iter().flatten() {
                min = Some(min.map_or(timestamp, |min| min.min(timestamp)));
                max = Some(max.map_or(timestamp, |max| max.max(timestamp)));
            }
            // remote services count too, as they may not be instrumented
            let services = [&span.local_endpoint, &span.remote_endpoint]
                .into_iter()
                .filter_map(|endpoint| endpoint.as_ref()?.service_name.as_deref());
            for service in services {
                durations
                    .entry(service)
                    .or_default()
                    .push(span.duration.unwrap_or_default());
            }
        }

        let (Some(min), Some(max)) = (min, max) else {
            return Err(TimelineError::MissingTimestamp {
                trace_id: root.trace_id.clone(),
            });
        };

        let mut service_summaries: Vec<ServiceSummary> = durations
            .into_iter()
            .map(|(service_name, durations)| ServiceSummary {
                service_name: service_name.to_owned(),
                span_count: durations.len(),
                max_span_duration: durations.into_iter().max().unwrap_or_default(),
            })
            .collect();
        service_summaries.sort_by_key(|summary| Reverse(summary.max_span_duration));

        let root_service_name = [&root.local_endpoint, &root.remote_endpoint]
            .into_iter()
            .find_map(|endpoint| endpoint.as_ref()?.service_name.clone())
            .unwrap_or_else(|| UNKNOWN.to_owned());
        Ok(TraceSummary {
            trace_id: root.trace_id.clone(),
            timestamp: min,
            duration: max.saturating_sub(min),
            span_count,
            error_type,
            root_service_name,
            root_span_name: root.name.clone().unwrap_or_else(|| UNKNOWN.to_owned()),
            service_summaries,
        })
    }
}
