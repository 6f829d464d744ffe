//! Per-request stage timings.
//!
//! Every search records how long each pipeline stage took. The numbers ride
//! along on the response and the CLI prints them with `--timing` (or when
//! `BRAID_TIMING` is truthy).

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde_json::json;

/// Pipeline stage names, in execution order.
pub const STAGE_RETRIEVE: &str = "retrieve";
pub const STAGE_FUSE: &str = "fuse";
pub const STAGE_ENRICH: &str = "enrich";

/// Wall-clock time spent in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    pub name: &'static str,
    pub elapsed: Duration,
}

/// Stage timings for a single request, in the order stages ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTimings {
    pub stages: Vec<StageTiming>,
}

impl StageTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` and record its duration under `name`.
    pub fn timed<R>(&mut self, name: &'static str, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = f();
        self.record(name, started.elapsed());
        result
    }

    /// Record a duration measured elsewhere.
    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        self.stages.push(StageTiming { name, elapsed });
    }

    /// Duration recorded for `name`, if the stage ran.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Duration> {
        self.stages
            .iter()
            .find(|stage| stage.name == name)
            .map(|stage| stage.elapsed)
    }

    #[must_use]
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|stage| stage.elapsed).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Render as JSON, durations in microseconds.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let stages = self
            .stages
            .iter()
            .map(|stage| {
                json!({
                    "stage": stage.name,
                    "elapsed_us": stage.elapsed.as_micros(),
                })
            })
            .collect::<Vec<_>>();

        json!({ "stages": stages, "total_us": self.total().as_micros() })
    }

    /// Render as a small table for terminal output.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.stages.is_empty() {
            return "No stages recorded.".to_string();
        }

        let mut out = String::new();
        out.push_str("stage          elapsed\n");
        out.push_str("----------------------\n");
        for stage in &self.stages {
            let _ = writeln!(out, "{:<12} {:>9}", stage.name, format_duration(stage.elapsed));
        }
        let _ = writeln!(out, "{:<12} {:>9}", "total", format_duration(self.total()));
        out
    }
}

/// Returns true when `BRAID_TIMING` asks for timings.
///
/// Supported truthy values: `1`, `true`, `yes`, `on` (case-insensitive).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("BRAID_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();

    if micros >= 1_000_000 {
        let secs = micros / 1_000_000;
        let millis = (micros % 1_000_000) / 1_000;
        format!("{secs}.{millis:03}s")
    } else if micros >= 1_000 {
        let millis = micros / 1_000;
        let rem = micros % 1_000;
        format!("{millis}.{rem:03}ms")
    } else {
        format!("{micros}µs")
    }
}

fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|truthy| value.trim().eq_ignore_ascii_case(truthy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_records_stage_and_returns_value() {
        let mut timings = StageTimings::new();
        let value = timings.timed(STAGE_FUSE, || 7_u8);

        assert_eq!(value, 7);
        assert_eq!(timings.stages.len(), 1);
        assert_eq!(timings.stages[0].name, STAGE_FUSE);
        assert!(timings.get(STAGE_ENRICH).is_none());
    }

    #[test]
    fn total_sums_stages() {
        let mut timings = StageTimings::new();
        timings.record(STAGE_RETRIEVE, Duration::from_micros(1_500));
        timings.record(STAGE_ENRICH, Duration::from_micros(500));

        assert_eq!(timings.total(), Duration::from_micros(2_000));
        assert_eq!(timings.get(STAGE_RETRIEVE), Some(Duration::from_micros(1_500)));
    }

    #[test]
    fn table_and_json_have_expected_fields() {
        let mut timings = StageTimings::new();
        timings.record(STAGE_RETRIEVE, Duration::from_micros(2_250));

        let table = timings.display_table();
        assert!(table.contains("retrieve"));
        assert!(table.contains("2.250ms"));
        assert!(table.contains("total"));

        let json = timings.to_json();
        assert_eq!(json["stages"][0]["stage"], "retrieve");
        assert_eq!(json["stages"][0]["elapsed_us"], 2_250);
        assert_eq!(json["total_us"], 2_250);
    }

    #[test]
    fn empty_table_says_so() {
        assert_eq!(StageTimings::new().display_table(), "No stages recorded.");
    }

    #[test]
    fn duration_formatting_picks_units() {
        assert_eq!(format_duration(Duration::from_micros(42)), "42µs");
        assert_eq!(format_duration(Duration::from_micros(1_042)), "1.042ms");
        assert_eq!(format_duration(Duration::from_millis(2_005)), "2.005s");
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("TrUe"));
        assert!(is_truthy(" 1 "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("off"));
    }
}
