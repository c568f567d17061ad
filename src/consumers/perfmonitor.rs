/*!
Interface stub for the performance-monitoring consumer (`bvc_perfmonitor.c`). Gauge
emission against a metrics backend is an explicit Non-goal (spec.md §1) — this only
carries the shape a real implementation would plug into.
*/
use crate::error::CoreError;
use crate::models::View;

use super::ViewConsumer;

/// Would emit per-view timing/size gauges to a metrics backend; `bvc_perfmonitor.c`'s
/// own job is entirely that emission, which this crate does not implement.
#[derive(Debug, Default)]
pub struct PerfMonitor {
    views_processed: u64,
}

impl PerfMonitor {
    pub fn new() -> Self {
        PerfMonitor::default()
    }

    pub fn views_processed(&self) -> u64 {
        self.views_processed
    }
}

impl ViewConsumer for PerfMonitor {
    fn process_view(&mut self, _view: &View) -> Result<(), CoreError> {
        self.views_processed += 1;
        Ok(())
    }
}
