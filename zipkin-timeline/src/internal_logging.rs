//! Diagnostics emitted while repairing imperfect trace data.
//!
//! With the `internal-logs` feature (on by default) these macros forward to
//! [`tracing`] with the crate name as target. In tests they also print to
//! stdout, visible with `--nocapture`. Otherwise they compile to nothing.
//!
//! Every event has a name such as `SpanNodeBuilder.SyntheticRoot` and at
//! least one field identifying what was repaired.

/// Macro for logging debug messages, such as a headless trace being attached
/// to a synthetic root.
///
/// # Example:
/// ```rust
/// use zipkin_timeline::timeline_debug;
/// timeline_debug!(name: "SpanNodeBuilder.SyntheticRoot", trace_id = "000000000000000a");
/// ```
#[macro_export]
macro_rules! timeline_debug {
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("timeline_debug: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    };
}

/// Macro for logging warnings, such as a malformed configuration value.
///
/// # Example:
/// ```rust
/// use zipkin_timeline::timeline_warn;
/// timeline_warn!(name: "TimelineConfig.InvalidValue", key = "ZIPKIN_TIMELINE_MIN_BAR_WIDTH");
/// ```
#[macro_export]
macro_rules! timeline_warn {
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("timeline_warn: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    };
}
