//! Debugging recorder helpers for metrics assertions.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::fixture;

/// A fresh recorder and the snapshotter reading from it.
#[fixture]
pub fn recorder() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Sum of every counter named `name`, across all label sets.
#[must_use]
pub fn counter_total(snapshotter: &Snapshotter, name: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, ..)| key.key().name() == name)
        .filter_map(|(.., value)| match value {
            DebugValue::Counter(count) => Some(count),
            _ => None,
        })
        .sum()
}

/// Value of the counter named `name` carrying `label = value`.
#[must_use]
pub fn labelled_counter(snapshotter: &Snapshotter, name: &str, label: &str, value: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, ..)| {
            key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .filter_map(|(.., value)| match value {
            DebugValue::Counter(count) => Some(count),
            _ => None,
        })
        .sum()
}

/// Last value recorded for the gauge named `name`, if any.
#[must_use]
pub fn gauge_value(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, ..)| key.key().name() == name)
        .and_then(|(.., value)| match value {
            DebugValue::Gauge(gauge) => Some(gauge.into_inner()),
            _ => None,
        })
}
