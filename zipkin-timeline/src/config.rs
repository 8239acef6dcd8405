//! Configuration for [`AdjustedTrace`](crate::AdjustedTrace) and row geometry.
use crate::timeline_warn;
use std::env;
use std::str::FromStr;

/// Whether clock skew is corrected before layout.
pub(crate) const ZIPKIN_TIMELINE_CORRECT_SKEW: &str = "ZIPKIN_TIMELINE_CORRECT_SKEW";
/// Default for [`ZIPKIN_TIMELINE_CORRECT_SKEW`].
pub(crate) const ZIPKIN_TIMELINE_CORRECT_SKEW_DEFAULT: bool = true;
/// Narrowest bar, in percent of the timeline width.
pub(crate) const ZIPKIN_TIMELINE_MIN_BAR_WIDTH: &str = "ZIPKIN_TIMELINE_MIN_BAR_WIDTH";
/// Default for [`ZIPKIN_TIMELINE_MIN_BAR_WIDTH`].
pub(crate) const ZIPKIN_TIMELINE_MIN_BAR_WIDTH_DEFAULT: f64 = 1.0;

/// Options applied while adjusting a trace for display.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineConfig {
    /// Shift server spans so that they start after their client.
    pub(crate) correct_skew: bool,

    /// Spans without a duration, or too short to see, are drawn this wide.
    pub(crate) min_bar_width: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfigBuilder::default().build()
    }
}

impl TimelineConfig {
    /// Returns `true` if clock skew correction is enabled.
    pub fn correct_skew(&self) -> bool {
        self.correct_skew
    }

    /// Returns the narrowest bar width, in percent.
    pub fn min_bar_width(&self) -> f64 {
        self.min_bar_width
    }
}

/// A builder for creating [`TimelineConfig`] instances.
#[derive(Debug)]
pub struct TimelineConfigBuilder {
    correct_skew: bool,
    min_bar_width: f64,
}

impl Default for TimelineConfigBuilder {
    /// Create a new [`TimelineConfigBuilder`] initialized with default values.
    /// The values are overridden by environment variables if set.
    /// The supported environment variables are:
    /// * `ZIPKIN_TIMELINE_CORRECT_SKEW`
    /// * `ZIPKIN_TIMELINE_MIN_BAR_WIDTH`
    fn default() -> Self {
        TimelineConfigBuilder {
            correct_skew: ZIPKIN_TIMELINE_CORRECT_SKEW_DEFAULT,
            min_bar_width: ZIPKIN_TIMELINE_MIN_BAR_WIDTH_DEFAULT,
        }
        .init_from_env_vars()
    }
}

impl TimelineConfigBuilder {
    /// Set correct_skew for [`TimelineConfigBuilder`].
    /// When disabled, timestamps are displayed as reported.
    /// The default value is `true`.
    pub fn with_correct_skew(mut self, correct_skew: bool) -> Self {
        self.correct_skew = correct_skew;
        self
    }

    /// Set min_bar_width for [`TimelineConfigBuilder`], in percent.
    /// Negative or non-finite values are ignored.
    /// The default value is 1.0.
    pub fn with_min_bar_width(mut self, min_bar_width: f64) -> Self {
        if min_bar_width.is_finite() && min_bar_width >= 0.0 {
            self.min_bar_width = min_bar_width.min(100.0);
        }
        self
    }

    /// Builds a [`TimelineConfig`].
    pub fn build(self) -> TimelineConfig {
        TimelineConfig {
            correct_skew: self.correct_skew,
            min_bar_width: self.min_bar_width,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(correct_skew) = parse_env::<bool>(ZIPKIN_TIMELINE_CORRECT_SKEW) {
            self.correct_skew = correct_skew;
        }
        if let Some(min_bar_width) = parse_env::<f64>(ZIPKIN_TIMELINE_MIN_BAR_WIDTH) {
            self = self.with_min_bar_width(min_bar_width);
        }
        self
    }
}

fn parse_env<T: FromStr>(key: &'static str) -> Option<T> {
    let value = env::var(key).ok().filter(|value| !value.is_empty())?;
    match value.trim().to_lowercase().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            timeline_warn!(
                name: "TimelineConfig.InvalidEnvValue",
                key = key,
                value = value.as_str(),
            );
            None
        }
    }
}
