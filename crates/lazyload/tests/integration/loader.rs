use std::sync::Arc;
use std::time::Duration;

use lazyload::fetch::FetchError;
use lazyload::loader::ResourceLoader;
use lazyload_cache::{Cache, MemoryCache};
use lazyload_test::ExhaustibleCache;

use crate::utils::{ByteFetcher, GatedFetcher, LoadEvent, RecordingHandler};

fn runtime() -> tokio::runtime::Handle {
    tokio::runtime::Handle::current()
}

#[tokio::test]
async fn test_loads_and_caches() {
    lazyload_test::setup();

    let fetcher = Arc::new(ByteFetcher::new().insert("img1", b"pixels"));
    let cache: Arc<MemoryCache<Vec<u8>>> = Arc::new(MemoryCache::new(1024));
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), Arc::clone(&fetcher));
    loader.set_cache(Arc::clone(&cache) as Arc<dyn Cache<Vec<u8>>>);
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    loader.set_source("img1");
    loader.deliver_next().await;

    assert_eq!(handler.events(), vec![LoadEvent::Loaded(Some(b"pixels".to_vec()))]);
    assert_eq!(fetcher.fetches(), 1);

    // Requesting the same key again is served from the cache.
    loader.set_source("img1");
    loader.deliver_next().await;

    assert_eq!(handler.events().len(), 2);
    assert_eq!(fetcher.fetches(), 1);
}

#[tokio::test]
async fn test_last_writer_wins() {
    lazyload_test::setup();

    let fetcher = Arc::new(
        GatedFetcher::new()
            .insert("img1", b"first")
            .insert("img2", b"second"),
    );
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), Arc::clone(&fetcher));
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    // The first request is still in flight when the second arrives.
    loader.set_source("img1");
    loader.set_source("img2");

    fetcher.release();
    fetcher.release();

    loader.deliver_next().await;

    // The superseded fetch ran to completion in the background, but only the
    // latest request ever surfaces.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fetcher.fetches(), 2);
    assert_eq!(loader.try_deliver(), 0);
    assert_eq!(handler.events(), vec![LoadEvent::Loaded(Some(b"second".to_vec()))]);
}

#[tokio::test]
async fn test_failure_is_delivered() {
    lazyload_test::setup();

    let fetcher = Arc::new(ByteFetcher::new());
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), fetcher);
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    loader.set_source("missing");
    loader.deliver_next().await;

    assert_eq!(handler.events(), vec![LoadEvent::Failed(FetchError::NotFound)]);
}

#[tokio::test]
async fn test_empty_key_yields_none() {
    lazyload_test::setup();

    let fetcher = Arc::new(ByteFetcher::new().insert("img1", b"pixels"));
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), Arc::clone(&fetcher));
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    loader.set_source("");
    loader.deliver_next().await;

    assert_eq!(handler.events(), vec![LoadEvent::Loaded(None)]);
    assert_eq!(fetcher.fetches(), 0);
}

#[tokio::test]
async fn test_cache_exhaustion_clears_and_still_succeeds() {
    lazyload_test::setup();

    let fetcher = Arc::new(
        ByteFetcher::new()
            .insert("img1", b"first")
            .insert("img2", b"second"),
    );
    let cache: Arc<ExhaustibleCache<Vec<u8>>> = Arc::new(ExhaustibleCache::new(1024));
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), fetcher);
    loader.set_cache(Arc::clone(&cache) as Arc<dyn Cache<Vec<u8>>>);
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    loader.set_source("img1");
    loader.deliver_next().await;
    assert!(cache.get("img1").is_some());

    cache.set_exhausted(true);
    loader.set_source("img2");
    loader.deliver_next().await;

    // The refused write cleared the whole cache, but the fetch itself still
    // succeeded for its caller.
    assert_eq!(
        handler.events(),
        vec![
            LoadEvent::Loaded(Some(b"first".to_vec())),
            LoadEvent::Loaded(Some(b"second".to_vec())),
        ]
    );
    assert_eq!(cache.rejected_puts(), 1);
    assert_eq!(cache.get("img1"), None);
    assert_eq!(cache.entry_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_surfaces_as_failure() {
    lazyload_test::setup();

    let fetcher = Arc::new(GatedFetcher::new().insert("img1", b"pixels"));
    let handler = RecordingHandler::new();

    let mut loader = ResourceLoader::new(runtime(), fetcher);
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);
    loader.set_fetch_timeout(Duration::from_secs(5));

    // The gate is never released; the deadline runs out instead.
    loader.set_source("img1");
    loader.deliver_next().await;

    assert_eq!(
        handler.events(),
        vec![LoadEvent::Failed(FetchError::Timeout(Duration::from_secs(5)))]
    );
}

#[tokio::test]
async fn test_delivery_targets_current_handler() {
    lazyload_test::setup();

    let fetcher = Arc::new(ByteFetcher::new().insert("img1", b"pixels"));

    let mut loader = ResourceLoader::new(runtime(), fetcher);
    loader.set_source("img1");

    while loader.is_loading() {
        tokio::task::yield_now().await;
    }

    // The result was queued before any handler existed; it reaches the one
    // registered at delivery time.
    let handler = RecordingHandler::new();
    loader.set_handler(Arc::clone(&handler) as Arc<dyn lazyload::loader::DownloadHandler<Vec<u8>>>);

    assert_eq!(loader.try_deliver(), 1);
    assert_eq!(handler.events(), vec![LoadEvent::Loaded(Some(b"pixels".to_vec()))]);
}
