//! Timeline layout.
//!
//! A corrected [`SpanTree`](crate::SpanTree) is laid out in two steps:
//! [`flatten`] and [`to_tree`] run once per trace, while [`to_rows`] is cheap
//! and re-runs whenever the caller collapses a row or focuses on a subtree.
//!
//! ```
//! use std::collections::HashSet;
//! use zipkin_timeline::timeline::{to_rows, to_tree};
//! use zipkin_timeline::Span;
//!
//! let spans = vec![
//!     Span::builder().trace_id("1").id("a").timestamp(1).duration(10).build(),
//!     Span::builder().trace_id("1").parent_id("a").id("b").timestamp(2).duration(5).build(),
//! ];
//! let forest = to_tree(&spans);
//! let rows = to_rows(&forest, &HashSet::new(), None);
//! assert_eq!(rows.rows.len(), 2);
//! assert_eq!((rows.min_timestamp, rows.max_timestamp), (1, 11));
//! ```
mod rows;
mod tree;

pub use rows::{to_rows, SpanBar, SpanRow, TimelineRows, TreeEdgeShape};
pub use tree::{flatten, to_tree, SpanTreeNode};
