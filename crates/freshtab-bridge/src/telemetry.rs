//! Telemetry probe recording.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

/// Probe names recorded by this subsystem.
pub mod probes {
    /// Incremented once per page impression.
    pub const PAGE_SHOWN: &str = "NEWTAB_PAGE_SHOWN";
    /// Page life-span in half-second buckets.
    pub const PAGE_LIFE_SPAN: &str = "NEWTAB_PAGE_LIFE_SPAN";
    /// Life-span variant recorded when a suggested tile was visible.
    pub const PAGE_LIFE_SPAN_SUGGESTED: &str = "NEWTAB_PAGE_LIFE_SPAN_SUGGESTED";
}

/// Sink for histogram samples. The production host hands the samples to
/// its metrics pipeline; [`Histograms`] is an in-process recorder.
pub trait TelemetrySink: Send + Sync {
    fn add(&self, probe: &str, value: i64);
}

/// In-process histogram recorder.
#[derive(Default)]
pub struct Histograms {
    samples: Mutex<HashMap<String, Vec<i64>>>,
}

impl Histograms {
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples recorded for a probe, in arrival order.
    pub fn samples(&self, probe: &str) -> Vec<i64> {
        self.samples
            .lock()
            .unwrap()
            .get(probe)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, probe: &str) -> usize {
        self.samples
            .lock()
            .unwrap()
            .get(probe)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl TelemetrySink for Histograms {
    fn add(&self, probe: &str, value: i64) {
        debug!(probe, value, "telemetry probe");
        self.samples
            .lock()
            .unwrap()
            .entry(probe.to_string())
            .or_default()
            .push(value);
    }
}
