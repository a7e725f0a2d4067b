//! "Load more on scroll" paging through a single-flight slot.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::fetch::FetchError;
use crate::scroll::{ScrollListener, ScrollObservation, ScrollTrigger};
use crate::slot::{Completion, TaskSlot};

/// The consumer-supplied fetch body and callbacks for paging.
///
/// Unlike keyed resource loading, the fetch here *is* the handler:
/// [`run`](Self::run) performs the page fetch itself. There is no request
/// key; the slot's busy state alone decides whether a new page load starts.
pub trait MoreHandler: Send + Sync + 'static {
    /// Called on the submitting context right before [`run`](Self::run) is
    /// spawned. Show a loading indicator here.
    fn on_pre_execute(&self) {}

    /// The page fetch body; runs on a worker, never on the control context.
    fn run(&self) -> BoxFuture<'_, Result<(), FetchError>>;

    /// Called on the control context after [`run`](Self::run) succeeded.
    /// Apply the freshly fetched page here.
    fn on_post_execute(&self);

    /// Called on the control context when [`run`](Self::run) failed.
    fn on_error(&self, _error: &FetchError) {}
}

/// Requests the next page when scrolling reaches the end of the sequence.
///
/// Page loads are guarded against duplicates: while one is running, further
/// trigger firings are dropped rather than queued. Results are picked up on
/// the control context via [`deliver_next`](Self::deliver_next) or
/// [`try_deliver`](Self::try_deliver).
pub struct PageLoader<H: MoreHandler> {
    handler: Arc<H>,
    trigger: ScrollTrigger,
    slot: TaskSlot<()>,
}

impl<H: MoreHandler> fmt::Debug for PageLoader<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLoader")
            .field("trigger", &self.trigger)
            .field("slot", &self.slot)
            .finish()
    }
}

impl<H: MoreHandler> PageLoader<H> {
    /// Creates a loader driving the given handler.
    pub fn new(runtime: tokio::runtime::Handle, handler: Arc<H>) -> Self {
        PageLoader {
            handler,
            trigger: ScrollTrigger::new(),
            slot: TaskSlot::new(runtime),
        }
    }

    /// Registers an upstream listener that receives every observation fed to
    /// [`observe`](Self::observe), independent of the trigger decision.
    pub fn set_scroll_listener(&mut self, listener: Box<dyn ScrollListener>) {
        self.trigger.set_listener(listener);
    }

    /// Feeds one scroll observation.
    ///
    /// The observation is forwarded to the upstream listener first; if it
    /// trips the end-of-sequence condition and no page load is running, the
    /// next page is requested.
    pub fn observe(&self, observation: ScrollObservation) {
        if self.trigger.observe(observation) {
            self.request_more();
        }
    }

    /// Explicitly requests the next page, subject to the same busy guard as
    /// scroll-triggered requests.
    ///
    /// Returns `false` when the request was dropped because a page load is
    /// already running. Use this to prime the first page of an empty
    /// sequence.
    pub fn request_more(&self) -> bool {
        let handler = Arc::clone(&self.handler);
        let pre = {
            let handler = Arc::clone(&self.handler);
            move || handler.on_pre_execute()
        };
        self.slot
            .submit_if_idle(pre, move |_token| async move { handler.run().await })
            .is_some()
    }

    /// True while a page load is running.
    pub fn is_loading(&self) -> bool {
        !self.slot.is_idle()
    }

    /// Awaits the next terminal result and dispatches it to the handler.
    ///
    /// Must be driven from the control context.
    pub async fn deliver_next(&mut self) {
        let completion = self.slot.next_completed().await;
        self.dispatch(completion);
    }

    /// Dispatches all already-queued results without waiting.
    ///
    /// Returns the number of callbacks fired.
    pub fn try_deliver(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(completion) = self.slot.try_completed() {
            self.dispatch(completion);
            delivered += 1;
        }
        delivered
    }

    fn dispatch(&self, completion: Completion<()>) {
        match completion.outcome {
            Ok(()) => self.handler.on_post_execute(),
            Err(error) => self.handler.on_error(&error),
        }
    }
}
