use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// A timestamped event explaining latency with respect to the span.
///
/// Annotations order by timestamp first, then by value.
#[derive(
    TypedBuilder, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Epoch microseconds of this event.
    pub timestamp: i64,
    /// Usually a short tag indicating an event, like "wire send".
    #[builder(setter(into))]
    pub value: String,
}

impl Annotation {
    /// Creates an annotation at `timestamp`.
    pub fn new(timestamp: i64, value: impl Into<String>) -> Self {
        Annotation {
            timestamp,
            value: value.into(),
        }
    }
}

/// Sorts by `(timestamp, value)` and drops exact duplicates.
pub(crate) fn sort_and_dedup(annotations: &mut Vec<Annotation>) {
    annotations.sort();
    annotations.dedup();
}
