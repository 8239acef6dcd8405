//! A trace prepared for display.
use crate::builder::SpanNodeBuilder;
use crate::config::TimelineConfig;
use crate::error::{TimelineError, TimelineResult};
use crate::model::{spans_from_json, Span};
use crate::node::SpanTree;
use crate::skew::correct_for_clock_skew;
use crate::timeline::{
    flatten, to_rows, to_tree, SpanBar, SpanRow, SpanTreeNode, TimelineRows,
};
use crate::timeline_debug;
use std::collections::HashSet;

/// A trace merged, built into a tree, corrected for clock skew and grouped
/// for layout.
///
/// This is the expensive part of displaying a trace and is done once. Rows
/// are then produced by [`AdjustedTrace::rows`] as often as the view
/// changes.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjustedTrace {
    trace_id: String,
    tree: SpanTree,
    spans: Vec<Span>,
    forest: Vec<SpanTreeNode>,
    config: TimelineConfig,
}

impl AdjustedTrace {
    /// Prepares the spans of one trace for display.
    ///
    /// Fails with [`TimelineError::EmptyTrace`] on empty input and with
    /// [`TimelineError::MissingTimestamp`] when the root-most span has no
    /// timestamp to anchor the timeline.
    pub fn new(spans: Vec<Span>, config: &TimelineConfig) -> TimelineResult<Self> {
        let mut tree = SpanNodeBuilder::new().build(spans)?;
        if config.correct_skew() {
            tree = correct_for_clock_skew(tree);
        }

        let root_most = tree.queue_root_most()?;
        let root = tree
            .span(root_most[0])
            .ok_or(TimelineError::EmptyTrace)?;
        let trace_id = root.trace_id.clone();
        if root.timestamp.is_none() {
            return Err(TimelineError::MissingTimestamp { trace_id });
        }

        let spans = flatten(&tree);
        let forest = to_tree(&spans);
        timeline_debug!(
            name: "AdjustedTrace.New",
            trace_id = trace_id.as_str(),
            row_count = spans.len(),
            tree_count = forest.len(),
        );
        Ok(AdjustedTrace {
            trace_id,
            tree,
            spans,
            forest,
            config: config.clone(),
        })
    }

    /// Reads a JSON array of Zipkin v2 spans and prepares it for display.
    pub fn from_json(json: &[u8], config: &TimelineConfig) -> TimelineResult<Self> {
        AdjustedTrace::new(spans_from_json(json)?, config)
    }

    /// Lays out the visible rows. See [`to_rows`].
    pub fn rows(&self, closed: &HashSet<String>, reroot: Option<&str>) -> TimelineRows {
        to_rows(&self.forest, closed, reroot)
    }

    /// Places `row` on the timeline of `rows`, no narrower than the
    /// configured minimum bar width.
    pub fn bar(&self, rows: &TimelineRows, row: &SpanRow) -> SpanBar {
        row.bar(
            rows.min_timestamp,
            rows.max_timestamp,
            self.config.min_bar_width(),
        )
    }

    /// Returns the trace id shared by all spans.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns the corrected trace tree.
    pub fn tree(&self) -> &SpanTree {
        &self.tree
    }

    /// Returns one span per span id, in display order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns the display forest built from [`AdjustedTrace::spans`].
    pub fn forest(&self) -> &[SpanTreeNode] {
        &self.forest
    }
}
