//! Scroll-position observations and the end-of-sequence trigger.

use std::fmt;

/// A single scroll-position report from the consumer's view system.
///
/// Observations carry no ordering guarantee beyond their emission order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollObservation {
    /// Index of the last item currently visible.
    pub last_visible: usize,
    /// Number of items currently visible.
    pub visible_count: usize,
    /// Total number of items in the sequence.
    pub total_count: usize,
}

impl ScrollObservation {
    /// True when the visible range has reached the last item.
    ///
    /// An empty sequence never reports `true`; consumers prime the first
    /// page explicitly (e.g. via
    /// [`PageLoader::request_more`](crate::paging::PageLoader::request_more)).
    pub fn at_end(&self) -> bool {
        self.total_count > 0 && self.last_visible == self.total_count - 1
    }
}

/// Upstream consumer of raw scroll observations.
///
/// Every observation is forwarded here, regardless of whether it trips the
/// end-of-sequence trigger.
pub trait ScrollListener: Send {
    /// Called for every observation, before the trigger decision.
    fn on_scroll(&self, observation: ScrollObservation);
}

/// Detects the end-of-sequence condition from a stream of observations.
///
/// The trigger itself is stateless; suppressing duplicate page loads is the
/// job of the slot driving the actual fetch.
#[derive(Default)]
pub struct ScrollTrigger {
    listener: Option<Box<dyn ScrollListener>>,
}

impl fmt::Debug for ScrollTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollTrigger")
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl ScrollTrigger {
    /// Creates a trigger without an upstream listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the upstream listener observations are forwarded to.
    pub fn set_listener(&mut self, listener: Box<dyn ScrollListener>) {
        self.listener = Some(listener);
    }

    /// Forwards the observation upstream and reports whether the
    /// end-of-sequence condition fired.
    pub fn observe(&self, observation: ScrollObservation) -> bool {
        if let Some(listener) = &self.listener {
            listener.on_scroll(observation);
        }
        observation.at_end()
    }
}
