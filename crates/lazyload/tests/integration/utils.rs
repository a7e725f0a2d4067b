use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use lazyload::fetch::{FetchError, Fetcher};
use lazyload::loader::DownloadHandler;
use lazyload::paging::MoreHandler;

/// A fetcher serving a fixed key → bytes map, counting invocations.
pub struct ByteFetcher {
    entries: BTreeMap<String, Vec<u8>>,
    fetches: AtomicUsize,
}

impl ByteFetcher {
    pub fn new() -> Self {
        ByteFetcher {
            entries: BTreeMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn insert(mut self, key: &str, value: &[u8]) -> Self {
        self.entries.insert(key.to_owned(), value.to_vec());
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Fetcher for ByteFetcher {
    type Value = Vec<u8>;

    fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.entries.get(key).cloned().ok_or(FetchError::NotFound)
        })
    }
}

/// A fetcher that parks every fetch until it is released.
///
/// Lets a test hold a fetch in flight while issuing further requests, to
/// exercise supersession and busy-guard behavior deterministically.
pub struct GatedFetcher {
    entries: BTreeMap<String, Vec<u8>>,
    gate: Semaphore,
    fetches: AtomicUsize,
}

impl GatedFetcher {
    pub fn new() -> Self {
        GatedFetcher {
            entries: BTreeMap::new(),
            gate: Semaphore::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn insert(mut self, key: &str, value: &[u8]) -> Self {
        self.entries.insert(key.to_owned(), value.to_vec());
        self
    }

    /// Lets one parked fetch proceed; releases accumulate.
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Fetcher for GatedFetcher {
    type Value = Vec<u8>;

    fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.gate.acquire().await.unwrap().forget();
            self.entries.get(key).cloned().ok_or(FetchError::NotFound)
        })
    }
}

/// A terminal callback observed by a [`RecordingHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadEvent {
    Loaded(Option<Vec<u8>>),
    Failed(FetchError),
}

/// Records every terminal callback in delivery order.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl DownloadHandler<Vec<u8>> for RecordingHandler {
    fn on_downloaded(&self, value: Option<Vec<u8>>) {
        self.events.lock().unwrap().push(LoadEvent::Loaded(value));
    }

    fn on_error(&self, error: &FetchError) {
        self.events
            .lock()
            .unwrap()
            .push(LoadEvent::Failed(error.clone()));
    }
}

/// A paging callback observed by a [`RecordingMoreHandler`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    Pre,
    Run,
    Post,
    Error(FetchError),
}

/// A paging handler that records its callbacks and can be gated or scripted
/// to fail.
#[derive(Debug)]
pub struct RecordingMoreHandler {
    events: Mutex<Vec<PageEvent>>,
    gate: Option<Semaphore>,
    fail_next: Mutex<Option<FetchError>>,
}

impl RecordingMoreHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingMoreHandler {
            events: Mutex::new(Vec::new()),
            gate: None,
            fail_next: Mutex::new(None),
        })
    }

    /// A handler whose `run` parks until [`release`](Self::release)d.
    pub fn gated() -> Arc<Self> {
        Arc::new(RecordingMoreHandler {
            events: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
            fail_next: Mutex::new(None),
        })
    }

    /// Makes the next `run` fail with the given error.
    pub fn fail_next(&self, error: FetchError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Lets one parked `run` proceed; releases accumulate.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn events(&self) -> Vec<PageEvent> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: PageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MoreHandler for RecordingMoreHandler {
    fn on_pre_execute(&self) {
        self.push(PageEvent::Pre);
    }

    fn run(&self) -> BoxFuture<'_, Result<(), FetchError>> {
        Box::pin(async move {
            self.push(PageEvent::Run);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            match self.fail_next.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }

    fn on_post_execute(&self) {
        self.push(PageEvent::Post);
    }

    fn on_error(&self, error: &FetchError) {
        self.push(PageEvent::Error(error.clone()));
    }
}
