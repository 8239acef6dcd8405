use crate::model::{Endpoint, Kind, Span};
use crate::summary::ErrorType;
use crate::timeline::tree::SpanTreeNode;
use serde::Serialize;
use std::collections::HashSet;

/// Line drawn in one depth column of a row to connect it to its relatives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeEdgeShape {
    /// A line starts here and goes down to the children.
    Begin,
    /// A line passes through, with a branch to this row.
    Middle,
    /// A line ends at this row.
    End,
    /// Nothing is drawn.
    Empty,
}

impl TreeEdgeShape {
    /// How a column of the parent row continues in a child row.
    fn continued(self) -> Self {
        match self {
            TreeEdgeShape::Begin => TreeEdgeShape::Middle,
            TreeEdgeShape::End => TreeEdgeShape::Empty,
            other => other,
        }
    }
}

/// One visible line of the timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRow {
    /// The span drawn on this row.
    pub span: Span,
    /// One shape per depth column of the displayed tree.
    pub tree_edge_shape: Vec<TreeEdgeShape>,
    /// Distance from the displayed root.
    pub depth: usize,
    /// The row is collapsed and its descendants are not shown.
    pub is_closed: bool,
    /// The row has descendants, so it can be collapsed.
    pub is_collapsible: bool,
    /// Number of descendants hidden under a closed row, 0 otherwise.
    pub num_of_children: usize,
    /// Service this row is labeled with.
    ///
    /// The server's service for an RPC row, the called service for a client
    /// with no children, otherwise the local service.
    pub service_name: Option<String>,
    /// Every local and remote service of the row, sorted and distinct.
    pub service_names: Vec<String>,
    /// The error reported by the row's span.
    pub error_type: ErrorType,
}

/// Horizontal placement of a span bar, in percent of the timeline width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpanBar {
    /// Offset from the start of the timeline.
    pub left: f64,
    /// Width of the bar.
    pub width: f64,
}

impl SpanRow {
    fn new(span: &Span, is_leaf: bool) -> Self {
        let local = service_name(span.local_endpoint.as_ref());
        let remote = service_name(span.remote_endpoint.as_ref());
        let label = match span.kind {
            Some(Kind::Client) if is_leaf => remote.or(local),
            _ => local,
        };
        let mut service_names: Vec<String> =
            local.into_iter().chain(remote).map(str::to_owned).collect();
        service_names.sort();
        service_names.dedup();

        SpanRow {
            span: span.clone(),
            tree_edge_shape: Vec::new(),
            depth: 0,
            is_closed: false,
            is_collapsible: !is_leaf,
            num_of_children: 0,
            service_name: label.map(str::to_owned),
            service_names,
            error_type: ErrorType::of(span),
        }
    }

    /// Places this row's span on a timeline from `min_timestamp` to
    /// `max_timestamp`. Bars are never narrower than `min_width`.
    pub fn bar(&self, min_timestamp: i64, max_timestamp: i64, min_width: f64) -> SpanBar {
        let range = max_timestamp.saturating_sub(min_timestamp) as f64;
        if range <= 0.0 {
            return SpanBar {
                left: 0.0,
                width: 100.0,
            };
        }
        let left = self
            .span
            .timestamp
            .map_or(0.0, |timestamp| {
                timestamp.saturating_sub(min_timestamp) as f64 / range * 100.0
            });
        let width = self
            .span
            .duration
            .map_or(min_width, |duration| (duration as f64 / range * 100.0).max(min_width));
        SpanBar { left, width }
    }
}

fn service_name(endpoint: Option<&Endpoint>) -> Option<&str> {
    endpoint?.service_name.as_deref()
}

/// Rows of a timeline and the time window they cover.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRows {
    /// Visible rows, in pre-order.
    pub rows: Vec<SpanRow>,
    /// Earliest timestamp in the displayed forest, 0 when none is known.
    pub min_timestamp: i64,
    /// Latest timestamp or span end in the displayed forest, 0 when none is known.
    pub max_timestamp: i64,
}

#[derive(Default)]
struct Bounds {
    min: Option<i64>,
    max: Option<i64>,
}

impl Bounds {
    fn add(&mut self, span: &Span) {
        for timestamp in [span.timestamp, span.end_timestamp()].into_iter().flatten() {
            self.min = Some(self.min.map_or(timestamp, |min| min.min(timestamp)));
            self.max = Some(self.max.map_or(timestamp, |max| max.max(timestamp)));
        }
    }
}

struct Pending<'a> {
    node: &'a SpanTreeNode,
    shape: Vec<TreeEdgeShape>,
    hidden: bool,
}

/// Lays out `forest` as timeline rows.
///
/// With `reroot`, only the first span with that id and its descendants are
/// laid out, and no rows are returned when there is no such span. Spans
/// below a row listed in `closed` are left out and counted in that row's
/// `num_of_children`. The time window covers every laid out span, shown or
/// not.
pub fn to_rows(
    forest: &[SpanTreeNode],
    closed: &HashSet<String>,
    reroot: Option<&str>,
) -> TimelineRows {
    let roots: Vec<&SpanTreeNode> = match reroot {
        Some(id) => forest.iter().find_map(|root| root.find(id)).into_iter().collect(),
        None => forest.iter().collect(),
    };

    let mut rows = Vec::new();
    let mut bounds = Bounds::default();
    for root in roots {
        let root_depth = root.depth();
        let mut shape = vec![TreeEdgeShape::Empty; root.max_depth() - root_depth];
        if !root.children().is_empty() {
            shape[0] = TreeEdgeShape::Begin;
        }

        let mut stack = vec![Pending {
            node: root,
            shape,
            hidden: false,
        }];
        while let Some(Pending {
            node,
            shape,
            hidden,
        }) = stack.pop()
        {
            bounds.add(node.span());
            let is_closed = closed.contains(&node.span().id);
            let last = node.children().len().saturating_sub(1);
            for (index, child) in node.children().iter().enumerate().rev() {
                let column = child.depth() - root_depth;
                let mut child_shape: Vec<TreeEdgeShape> =
                    shape.iter().map(|edge| edge.continued()).collect();
                child_shape[column - 1] = if index == last {
                    TreeEdgeShape::End
                } else {
                    TreeEdgeShape::Middle
                };
                if !child.children().is_empty() {
                    child_shape[column] = TreeEdgeShape::Begin;
                }
                stack.push(Pending {
                    node: child,
                    shape: child_shape,
                    hidden: hidden || is_closed,
                });
            }

            if !hidden {
                let mut row = SpanRow::new(node.span(), node.children().is_empty());
                row.tree_edge_shape = shape;
                row.depth = node.depth() - root_depth;
                row.is_closed = is_closed;
                if is_closed {
                    row.num_of_children = node.descendant_count();
                }
                rows.push(row);
            }
        }
    }

    TimelineRows {
        rows,
        min_timestamp: bounds.min.unwrap_or_default(),
        max_timestamp: bounds.max.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::TreeEdgeShape::{Begin as B, Empty as E, End as N, Middle as M};
    use super::*;
    use crate::timeline::tree::to_tree;
    use rstest::rstest;

    fn span(parent_id: Option<&str>, id: &str, timestamp: i64, duration: i64) -> Span {
        let mut span = Span::builder()
            .trace_id("1")
            .id(id)
            .timestamp(timestamp)
            .duration(duration)
            .build();
        span.parent_id = parent_id.map(str::to_owned);
        span
    }

    /*
     * Depths 0, 1, 2, 3, 2, 3, 1 in pre-order:
     *
     *        a
     *       / \
     *      b   g
     *     / \
     *    c   e
     *    |   |
     *    d   f
     */
    fn forest() -> Vec<SpanTreeNode> {
        to_tree(&[
            span(None, "a", 10, 100),
            span(Some("a"), "b", 20, 50),
            span(Some("b"), "c", 25, 10),
            span(Some("c"), "d", 30, 5),
            span(Some("b"), "e", 40, 20),
            span(Some("e"), "f", 45, 30),
            span(Some("a"), "g", 80, 40),
        ])
    }

    fn ids(rows: &TimelineRows) -> Vec<&str> {
        rows.rows.iter().map(|row| row.span.id.as_str()).collect()
    }

    fn closed(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| (*id).to_owned()).collect()
    }

    #[test]
    fn draws_tree_edges() {
        let rows = to_rows(&forest(), &HashSet::new(), None);

        let depths: Vec<_> = rows.rows.iter().map(|row| row.depth).collect();
        assert_eq!(depths, [0, 1, 2, 3, 2, 3, 1]);
        let shapes: Vec<_> = rows
            .rows
            .iter()
            .map(|row| row.tree_edge_shape.clone())
            .collect();
        assert_eq!(
            shapes,
            [
                vec![B, E, E],
                vec![M, B, E],
                vec![M, M, B],
                vec![M, M, N],
                vec![M, N, B],
                vec![M, E, N],
                vec![N, E, E],
            ]
        );
        assert_eq!((rows.min_timestamp, rows.max_timestamp), (10, 120));
    }

    #[test]
    fn marks_rows_with_children_collapsible() {
        let rows = to_rows(&forest(), &HashSet::new(), None);

        let collapsible: Vec<_> = rows
            .rows
            .iter()
            .filter(|row| row.is_collapsible)
            .map(|row| row.span.id.as_str())
            .collect();
        assert_eq!(collapsible, ["a", "b", "c", "e"]);
        assert!(rows.rows.iter().all(|row| row.num_of_children == 0));
    }

    #[test]
    fn collapses_and_reopens() {
        let forest = forest();
        let open = to_rows(&forest, &HashSet::new(), None);

        let collapsed = to_rows(&forest, &closed(&["b"]), None);

        assert_eq!(ids(&collapsed), ["a", "b", "g"]);
        let b = &collapsed.rows[1];
        assert!(b.is_closed);
        assert_eq!(b.num_of_children, 4);
        // hidden spans still count in the time window
        assert_eq!(
            (collapsed.min_timestamp, collapsed.max_timestamp),
            (open.min_timestamp, open.max_timestamp)
        );

        let reopened = to_rows(&forest, &HashSet::new(), None);
        assert_eq!(reopened, open);
    }

    #[test]
    fn collapsing_span_with_three_descendants_hides_three_rows() {
        let forest = to_tree(&[
            span(None, "a", 1, 10),
            span(Some("a"), "b", 2, 5),
            span(Some("b"), "c", 3, 1),
            span(Some("b"), "d", 4, 1),
            span(Some("d"), "e", 5, 1),
            span(Some("a"), "f", 6, 1),
        ]);
        let open = to_rows(&forest, &HashSet::new(), None);

        let collapsed = to_rows(&forest, &closed(&["b"]), None);

        assert_eq!(collapsed.rows.len(), open.rows.len() - 3);
        assert_eq!(ids(&collapsed), ["a", "b", "f"]);
        assert_eq!(collapsed.rows[1].num_of_children, 3);
        // the remaining rows keep their geometry
        assert_eq!(collapsed.rows[2].tree_edge_shape, open.rows[5].tree_edge_shape);
        assert_eq!(to_rows(&forest, &HashSet::new(), None), open);
    }

    #[test]
    fn nested_closed_rows_count_into_outermost_visible_row() {
        let rows = to_rows(&forest(), &closed(&["a", "b"]), None);

        assert_eq!(ids(&rows), ["a"]);
        assert_eq!(rows.rows[0].num_of_children, 6);
    }

    #[test]
    fn reroots_to_subtree() {
        let rows = to_rows(&forest(), &HashSet::new(), Some("e"));

        assert_eq!(ids(&rows), ["e", "f"]);
        assert_eq!(rows.rows[0].depth, 0);
        assert_eq!(rows.rows[0].tree_edge_shape, [B]);
        assert_eq!(rows.rows[1].tree_edge_shape, [N]);
        assert_eq!((rows.min_timestamp, rows.max_timestamp), (40, 75));
    }

    #[test]
    fn reroots_to_leaf() {
        let rows = to_rows(&forest(), &HashSet::new(), Some("g"));

        assert_eq!(ids(&rows), ["g"]);
        assert!(rows.rows[0].tree_edge_shape.is_empty());
        assert_eq!((rows.min_timestamp, rows.max_timestamp), (80, 120));
    }

    #[test]
    fn reroot_to_unknown_span_yields_nothing() {
        assert_eq!(
            to_rows(&forest(), &HashSet::new(), Some("z")),
            TimelineRows::default()
        );
    }

    #[test]
    fn lays_out_each_tree_of_a_forest() {
        let forest = to_tree(&[
            span(Some("x"), "a", 5, 1),
            span(Some("a"), "b", 6, 1),
            span(Some("y"), "c", 1, 1),
        ]);

        let rows = to_rows(&forest, &HashSet::new(), None);

        assert_eq!(ids(&rows), ["a", "b", "c"]);
        assert_eq!(rows.rows[2].tree_edge_shape, Vec::<TreeEdgeShape>::new());
        assert_eq!((rows.min_timestamp, rows.max_timestamp), (1, 7));
    }

    #[test]
    fn time_window_without_timestamps_is_empty() {
        let forest = to_tree(&[Span::builder().trace_id("1").id("a").build()]);

        let rows = to_rows(&forest, &HashSet::new(), None);

        assert_eq!((rows.min_timestamp, rows.max_timestamp), (0, 0));
    }

    #[rstest]
    #[case(Some(10), Some(50), (0.0, 50.0))]
    #[case(Some(60), Some(0), (50.0, 1.0))]
    #[case(Some(60), None, (50.0, 1.0))]
    #[case(None, Some(25), (0.0, 25.0))]
    fn places_bars(
        #[case] timestamp: Option<i64>,
        #[case] duration: Option<i64>,
        #[case] expected: (f64, f64),
    ) {
        let mut span = Span::builder().trace_id("1").id("a").build();
        span.timestamp = timestamp;
        span.duration = duration;
        let row = SpanRow::new(&span, true);

        let bar = row.bar(10, 110, 1.0);

        assert_eq!((bar.left, bar.width), expected);
    }

    fn endpoint(service_name: &str) -> Endpoint {
        Endpoint::builder().service_name(service_name).build()
    }

    #[test]
    fn labels_rows_with_services() {
        let server = Span::builder()
            .trace_id("1")
            .id("a")
            .kind(Kind::Server)
            .timestamp(1)
            .local_endpoint(endpoint("frontend"))
            .remote_endpoint(endpoint("browser"))
            .build();
        let client = |id: &str, parent_id: &str| {
            Span::builder()
                .trace_id("1")
                .parent_id(parent_id)
                .id(id)
                .kind(Kind::Client)
                .timestamp(2)
                .local_endpoint(endpoint("frontend"))
                .remote_endpoint(endpoint("mysql"))
                .build()
        };
        let forest = to_tree(&[server, client("b", "a"), client("c", "b")]);

        let rows = to_rows(&forest, &HashSet::new(), None);

        let labels: Vec<_> = rows
            .rows
            .iter()
            .map(|row| (row.service_name.as_deref(), row.service_names.clone()))
            .collect();
        assert_eq!(
            labels,
            [
                (Some("frontend"), vec!["browser".to_owned(), "frontend".to_owned()]),
                // a client with children is labeled with its own service
                (Some("frontend"), vec!["frontend".to_owned(), "mysql".to_owned()]),
                (Some("mysql"), vec!["frontend".to_owned(), "mysql".to_owned()]),
            ]
        );
    }

    #[test]
    fn rows_without_endpoints_have_no_service() {
        let forest = to_tree(&[Span::builder().trace_id("1").id("a").timestamp(1).build()]);

        let rows = to_rows(&forest, &HashSet::new(), None);

        assert_eq!(rows.rows[0].service_name, None);
        assert!(rows.rows[0].service_names.is_empty());
    }

    #[test]
    fn rows_carry_their_error() {
        let mut failed = span(Some("a"), "b", 2, 1);
        failed.tags.insert("error".to_owned(), "timeout".to_owned());
        let forest = to_tree(&[span(None, "a", 1, 10), failed]);

        let rows = to_rows(&forest, &HashSet::new(), None);

        let errors: Vec<_> = rows.rows.iter().map(|row| row.error_type).collect();
        assert_eq!(errors, [ErrorType::None, ErrorType::Critical]);
    }

    #[test]
    fn single_instant_gets_full_width() {
        let forest = to_tree(&[Span::builder().trace_id("1").id("a").timestamp(5).build()]);
        let rows = to_rows(&forest, &HashSet::new(), None);

        let bar = rows.rows[0].bar(rows.min_timestamp, rows.max_timestamp, 1.0);

        assert_eq!(bar, SpanBar { left: 0.0, width: 100.0 });
    }
}
