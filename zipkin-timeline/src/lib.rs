//! # Zipkin Timeline
//!
//! Reconstructs a [Zipkin](https://zipkin.io/) trace for display. The spans
//! of one trace, as returned by the Zipkin query API, are typically
//! fragmentary, redundant and reported by hosts whose clocks disagree. This
//! crate turns them into a single causally ordered tree and lays that tree
//! out as rows of a proportional timeline.
//!
//! The pipeline has four stages:
//!
//! 1. [`cleaner::merge_by_id`] normalizes ids and merges fragments of the
//!    same span.
//! 2. [`SpanNodeBuilder`] places every span in a [`SpanTree`], attaching
//!    spans with missing parents to the root.
//! 3. [`correct_for_clock_skew`] shifts servers that appear to start before
//!    their client.
//! 4. [`timeline::to_rows`] computes visible rows, tree edges and the time
//!    window, honoring collapsed rows and re-rooting.
//!
//! [`AdjustedTrace`] runs the first three stages once, so that only the cheap
//! last one runs when the view changes.
//!
//! ## Quickstart
//!
//! ```
//! use std::collections::HashSet;
//! use zipkin_timeline::{AdjustedTrace, TimelineConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let json = br#"[
//!         {"traceId": "1", "id": "1", "kind": "SERVER", "name": "get /", "timestamp": 10, "duration": 100,
//!          "localEndpoint": {"serviceName": "frontend", "ipv4": "172.17.0.13"}},
//!         {"traceId": "1", "parentId": "1", "id": "2", "kind": "CLIENT", "timestamp": 20, "duration": 50,
//!          "localEndpoint": {"serviceName": "frontend", "ipv4": "172.17.0.13"}},
//!         {"traceId": "1", "parentId": "1", "id": "2", "kind": "SERVER", "shared": true, "timestamp": 5, "duration": 30,
//!          "localEndpoint": {"serviceName": "backend", "ipv4": "172.17.0.9"}}
//!     ]"#;
//!
//!     let trace = AdjustedTrace::from_json(json, &TimelineConfig::default())?;
//!     let rows = trace.rows(&HashSet::new(), None);
//!
//!     // the shared server span is drawn on its client's row
//!     assert_eq!(rows.rows.len(), 2);
//!     for row in &rows.rows {
//!         let bar = trace.bar(&rows, row);
//!         let service = row.service_name.as_deref().unwrap_or("unknown");
//!         println!("{:?} {service} {:.1}% {:.1}%", row.tree_edge_shape, bar.left, bar.width);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! [`TimelineConfig`] is read from the environment when built with
//! [`TimelineConfigBuilder::default`]:
//!
//! * `ZIPKIN_TIMELINE_CORRECT_SKEW`: `false` displays timestamps as reported.
//! * `ZIPKIN_TIMELINE_MIN_BAR_WIDTH`: narrowest bar, in percent.
//!
//! ## Diagnostics
//!
//! With the default `internal-logs` feature, repairs made to imperfect data,
//! such as a synthetic root or a skipped skew correction, are emitted as
//! [`tracing`](https://docs.rs/tracing) debug events with target
//! `zipkin-timeline`.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub mod cleaner;
mod config;
mod error;
mod internal_logging;
pub mod model;
mod node;
pub mod skew;
mod summary;
pub mod timeline;
mod trace;

pub use builder::SpanNodeBuilder;
pub use config::{TimelineConfig, TimelineConfigBuilder};
pub use error::{TimelineError, TimelineResult};
pub use model::{Annotation, Endpoint, Kind, Span};
pub use node::{NodeId, SpanNode, SpanTree, Traverse};
pub use skew::{correct_for_clock_skew, ClockSkew};
pub use summary::{ErrorType, ServiceSummary, TraceSummary};
pub use trace::AdjustedTrace;

#[cfg(feature = "internal-logs")]
#[doc(hidden)]
pub mod _private {
    pub use tracing::{debug, warn};
}
