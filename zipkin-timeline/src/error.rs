use thiserror::Error;

/// A specialized `Result` type for trace reconstruction.
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Errors that prevent a trace from being displayed.
///
/// Data problems that can be worked around, such as a missing root span or a
/// dangling parent id, are logged instead and never surface here.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TimelineError {
    /// The trace had no spans at all.
    #[error("Trace was empty")]
    EmptyTrace,

    /// The root-most span has no timestamp, so relative times cannot be anchored.
    #[error("Trace {trace_id} is missing a timestamp")]
    MissingTimestamp {
        /// The trace that could not be anchored.
        trace_id: String,
    },

    /// Building the tree would have made a span its own child.
    #[error("circular dependency on span {span_id}")]
    CyclicSpan {
        /// The span that referenced itself.
        span_id: String,
    },

    /// The input was not a JSON array of Zipkin v2 spans.
    #[error("invalid span json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
