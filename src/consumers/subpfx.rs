/*!
Interface stub for the sub-prefix consumer (`bvc_subpfx.c`). The patricia-tree
minimum-covering-prefix search that drives it is an explicit Non-goal (spec.md §1); what's
worth carrying forward is its double-buffered `CUR_SUBPFXS`/`PREV_SUBPFXS` state, which
this crate expresses with [`super::FlipFlop`].
*/
use crate::error::CoreError;
use crate::models::{Prefix, View};

use super::{FlipFlop, ViewConsumer};

/// Tracks which sub-prefixes are observed covered by a more general prefix. The mapping
/// itself is never populated here — building it requires the patricia-tree search that is
/// out of scope — but the flip-flop buffer that a real implementation diffs against is.
#[derive(Debug, Default)]
pub struct SubPfxTracker {
    observations: FlipFlop<Vec<Prefix>>,
}

impl SubPfxTracker {
    pub fn new() -> Self {
        SubPfxTracker::default()
    }

    pub fn current(&self) -> Option<&Vec<Prefix>> {
        self.observations.current()
    }

    pub fn previous(&self) -> Option<&Vec<Prefix>> {
        self.observations.previous()
    }
}

impl ViewConsumer for SubPfxTracker {
    fn process_view(&mut self, view: &View) -> Result<(), CoreError> {
        let snapshot: Vec<Prefix> = view
            .iter_prefixes(crate::models::IpFamily::Both, crate::models::FieldFilter::Active)
            .collect();
        self.observations.push(snapshot);
        Ok(())
    }
}
