use crate::model::{annotation::Annotation, endpoint::Endpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use typed_builder::TypedBuilder;

/// The role a span plays in an RPC or messaging exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Kind {
    /// The span covers the client side of an RPC.
    Client,
    /// The span covers the server side of an RPC.
    Server,
    /// The span covers sending a message to a broker.
    Producer,
    /// The span covers receiving a message from a broker.
    Consumer,
}

/// A Zipkin v2 span, as reported by one instrumented process.
///
/// The same shape is used before and after [`crate::cleaner`] normalization.
/// Timestamps and durations are epoch microseconds.
#[derive(TypedBuilder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Hex trace identifier, 16 or 32 characters once cleaned.
    #[builder(setter(into))]
    pub trace_id: String,
    /// Hex identifier of the parent span, absent on a root span.
    #[builder(setter(into, strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Hex span identifier, 16 characters once cleaned.
    #[builder(setter(into))]
    pub id: String,
    /// RPC role, absent for local spans.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Kind>,
    /// Logical operation name.
    #[builder(setter(into, strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Epoch microseconds of the start of this span.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Duration in microseconds of the critical path.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// The host that recorded this span.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_endpoint: Option<Endpoint>,
    /// The other side of the connection, when known.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_endpoint: Option<Endpoint>,
    /// Events explaining latency with respect to this span.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    /// Tags give context to a span, such as `http.path`.
    #[builder(default)]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Forces the trace to be recorded.
    #[builder(default = false)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub debug: bool,
    /// Marks a server span that reuses the span id issued by its client.
    #[builder(default = false)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub shared: bool,
}

impl Span {
    pub(crate) fn is_kind(&self, kind: Kind) -> bool {
        self.kind == Some(kind)
    }

    /// Returns the end of this span, when both timestamp and duration are known.
    ///
    /// Saturates at the bounds of `i64`.
    pub fn end_timestamp(&self) -> Option<i64> {
        Some(self.timestamp?.saturating_add(self.duration?))
    }

    /// Shifts this span and its annotations back by `skew` microseconds.
    pub(crate) fn shift(&mut self, skew: i64) {
        if let Some(timestamp) = self.timestamp.as_mut() {
            *timestamp = timestamp.saturating_sub(skew);
        }
        for annotation in &mut self.annotations {
            annotation.timestamp = annotation.timestamp.saturating_sub(skew);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::annotation::Annotation;
    use crate::model::endpoint::Endpoint;
    use crate::model::span::{Kind, Span};
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;

    #[test]
    fn test_minimal() {
        test_json_serialization(
            Span::builder().trace_id("1").id("2").build(),
            "{\"traceId\":\"1\",\"id\":\"2\"}",
        );
    }

    #[test]
    fn test_full_span() {
        let mut tags = BTreeMap::new();
        tags.insert("a".to_owned(), "b".to_owned());
        test_json_serialization(
            Span::builder()
                .trace_id("4e441824ec2b6a44ffdc9bb9a6453df3")
                .parent_id("ffdc9bb9a6453df3")
                .id("efdc9cd9a1849df3")
                .kind(Kind::Server)
                .name("main")
                .timestamp(1_502_787_600_000_000)
                .duration(150_000)
                .local_endpoint(
                    Endpoint::builder()
                        .service_name("remote-service")
                        .ipv4(Ipv4Addr::new(192, 168, 0, 1))
                        .port(8080)
                        .build()
                )
                .remote_endpoint(
                    Endpoint::builder()
                        .service_name("open-telemetry")
                        .ipv4(Ipv4Addr::new(127, 0, 0, 1))
                        .port(8080)
                        .build()
                )
                .annotations(vec![Annotation::new(1_502_780_000_000_000, "interesting event")])
                .tags(tags)
                .shared(true)
                .build(),
            "{\"traceId\":\"4e441824ec2b6a44ffdc9bb9a6453df3\",\"parentId\":\"ffdc9bb9a6453df3\",\"id\":\"efdc9cd9a1849df3\",\"kind\":\"SERVER\",\"name\":\"main\",\"timestamp\":1502787600000000,\"duration\":150000,\"localEndpoint\":{\"serviceName\":\"remote-service\",\"ipv4\":\"192.168.0.1\",\"port\":8080},\"remoteEndpoint\":{\"serviceName\":\"open-telemetry\",\"ipv4\":\"127.0.0.1\",\"port\":8080},\"annotations\":[{\"timestamp\":1502780000000000,\"value\":\"interesting event\"}],\"tags\":{\"a\":\"b\"},\"shared\":true}",
        );
    }

    #[test]
    fn test_deserialize_defaults_collections() {
        let span: Span =
            serde_json::from_str("{\"traceId\":\"a\",\"id\":\"b\",\"kind\":\"CLIENT\"}").unwrap();
        assert_eq!(span.kind, Some(Kind::Client));
        assert!(span.annotations.is_empty());
        assert!(span.tags.is_empty());
        assert!(!span.shared);
    }

    #[test]
    fn test_shift_moves_annotations() {
        let mut span = Span::builder()
            .trace_id("1")
            .id("2")
            .timestamp(10)
            .duration(5)
            .annotations(vec![Annotation::new(12, "ws")])
            .build();
        span.shift(-15);
        assert_eq!(span.timestamp, Some(25));
        assert_eq!(span.end_timestamp(), Some(30));
        assert_eq!(span.annotations[0].timestamp, 27);
    }

    #[test]
    fn test_timestamps_saturate() {
        let mut span = Span::builder()
            .trace_id("1")
            .id("2")
            .timestamp(i64::MAX - 1_000)
            .duration(10_000)
            .annotations(vec![Annotation::new(i64::MIN + 1, "ws")])
            .build();
        assert_eq!(span.end_timestamp(), Some(i64::MAX));

        span.shift(-10_000);
        assert_eq!(span.timestamp, Some(i64::MAX));
        span.shift(i64::MAX);
        assert_eq!(span.annotations[0].timestamp, i64::MIN);
    }

    fn test_json_serialization(span: Span, desired: &str) {
        let result = serde_json::to_string(&span).unwrap();
        assert_eq!(result, desired.to_owned());
    }
}
