//! Zipkin v2 span model, as returned by the Zipkin query API.
use crate::error::TimelineResult;

pub(crate) mod annotation;
pub(crate) mod endpoint;
pub(crate) mod span;

pub use annotation::Annotation;
pub use endpoint::{ips_match, Endpoint};
pub use span::{Kind, Span};

/// Reads one trace, a JSON array of Zipkin v2 spans such as the body of
/// `GET /api/v2/trace/{traceId}`.
pub fn spans_from_json(json: &[u8]) -> TimelineResult<Vec<Span>> {
    Ok(serde_json::from_slice(json)?)
}
