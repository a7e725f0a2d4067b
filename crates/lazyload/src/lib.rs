//! Asynchronous, cached, cancellable resource loading for interactive
//! consumers.
//!
//! This crate implements the coordination pattern shared by "load an asset
//! for this key" and "load the next page when scrolling bottoms out": a
//! foreground component requests a resource, a worker fetches it, at most
//! one fetch per consumer is in flight at a time, newer requests supersede
//! older ones, and results come back to the requesting context, but only if
//! they are still wanted.
//!
//! ## Building blocks
//!
//! - [`TaskSlot`](slot::TaskSlot) is the per-consumer coordinator enforcing
//!   the single-flight rule. It owns at most one [`Task`](task::Task);
//!   installing a new one cancels the previous one, and results of cancelled
//!   tasks are discarded silently.
//! - [`resolve`](fetch::resolve) is the cache-aware fetch path: consult the
//!   injected [`Cache`](lazyload_cache::Cache), call the
//!   [`Fetcher`](fetch::Fetcher) on a miss, write back on success.
//! - [`ResourceLoader`](loader::ResourceLoader) combines the two with
//!   last-writer-wins semantics: only the most recently requested key is
//!   ever delivered to its [`DownloadHandler`](loader::DownloadHandler).
//! - [`PageLoader`](paging::PageLoader) instead drops requests arriving
//!   while a page fetch is running, driven by a
//!   [`ScrollTrigger`](scroll::ScrollTrigger) watching for the
//!   end-of-sequence condition.
//!
//! ## Delivery model
//!
//! Workers never invoke consumer callbacks directly. Terminal results are
//! queued and handed to whichever handler is registered when the control
//! context drives delivery (`deliver_next` / `try_deliver`), the moral
//! equivalent of posting completions back to a UI thread's message queue.
//! Every accepted request ends in exactly one of: value delivered, failure
//! delivered, or silently superseded.
//!
//! Cancellation is cooperative: superseding a task flips a flag that the
//! fetch body checks before each side-effecting step. The underlying fetch
//! may still run to completion in the background, but its result never
//! reaches a callback or the shared cache.

pub mod config;
pub mod fetch;
pub mod loader;
pub mod logging;
pub mod paging;
pub mod scroll;
pub mod slot;
pub mod task;

pub use self::config::Config;
pub use self::fetch::{FetchError, Fetcher, resolve};
pub use self::loader::{DownloadHandler, ResourceLoader};
pub use self::paging::{MoreHandler, PageLoader};
pub use self::scroll::{ScrollListener, ScrollObservation, ScrollTrigger};
pub use self::slot::{Completion, TaskSlot};
pub use self::task::{CancelToken, Task, TaskState};
