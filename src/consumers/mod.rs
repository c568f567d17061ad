/*!
Downstream view consumers: components that receive a fully reassembled [`View`] and do
something with it, as opposed to the codec/producer/consumer machinery that reassembles
one in the first place. Grounded on the C library's `bvc_*` consumer plugins
(`examples/original_source/lib/consumers/`).
*/
pub mod archiver;
pub mod perfmonitor;
pub mod subpfx;

use crate::error::CoreError;
use crate::models::View;

/// A downstream consumer that only ever looks at a view's own content — no peer-store or
/// path-store context required. The archival sink does not implement this: writing the
/// wire format needs the interning stores the codec resolves through, so it exposes its
/// own `write(view, peers, paths)` instead (spec.md §4.7).
pub trait ViewConsumer {
    fn process_view(&mut self, view: &View) -> Result<(), CoreError>;
}

/// A two-slot owned-value toggle: consumers (like the sub-prefix tracker) that need to
/// diff a view against their own prior output keep `current` and `previous` rather than
/// cloning history indefinitely. Swapping is `O(1)` and never reallocates the slots
/// themselves (SPEC_FULL.md §9 Design Notes, Glossary "Flip-flop buffer").
#[derive(Debug, Default)]
pub struct FlipFlop<T> {
    current: Option<T>,
    previous: Option<T>,
}

impl<T> FlipFlop<T> {
    pub fn new() -> Self {
        FlipFlop {
            current: None,
            previous: None,
        }
    }

    /// Pushes `value` into the current slot, demoting whatever was there to `previous`.
    pub fn push(&mut self, value: T) {
        self.previous = self.current.take();
        self.current = Some(value);
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&T> {
        self.previous.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_demotes_current_to_previous() {
        let mut ff: FlipFlop<u32> = FlipFlop::new();
        assert!(ff.current().is_none());
        ff.push(1);
        assert_eq!(ff.current(), Some(&1));
        assert!(ff.previous().is_none());
        ff.push(2);
        assert_eq!(ff.current(), Some(&2));
        assert_eq!(ff.previous(), Some(&1));
    }
}
