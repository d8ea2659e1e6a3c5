mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use url::Url;
use vacancy_scraper::collection::collect;
use vacancy_scraper::hh::DetailExtractor;
use vacancy_scraper::{
    CompensationPolicy, FetchError, ListingId, NoopObserver, PageFetcher, PipelineConfig,
};

fn listing_ids(range: std::ops::RangeInclusive<u32>) -> Vec<ListingId> {
    let base = Url::parse(BASE).unwrap();
    range
        .map(|n| ListingId::canonicalize(&vacancy_url(n), &base).unwrap())
        .collect()
}

fn extractor() -> Arc<DetailExtractor> {
    Arc::new(DetailExtractor::new(CompensationPolicy::Keep).unwrap())
}

fn seed_details(fetcher: &FakeFetcher, range: std::ops::RangeInclusive<u32>) {
    for n in range {
        fetcher.page(vacancy_url(n), detail_page(n));
    }
}

#[tokio::test]
async fn timeouts_are_skipped_not_fatal() {
    let fetcher = Arc::new(FakeFetcher::new());
    seed_details(&fetcher, 1..=10);
    for n in [2, 5, 9] {
        fetcher.fail(vacancy_url(n), FetchError::Timeout("5s".into()));
    }

    let result = collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &test_config(),
        listing_ids(1..=10),
        &NoopObserver,
    )
    .await;

    assert_eq!(result.discovered, 10);
    assert_eq!(result.processed, 7);
    assert_eq!(result.skipped, 3);
    assert_eq!(result.records.len(), 7);
    assert_eq!(fetcher.call_count(), 10);
}

#[tokio::test]
async fn every_successful_item_appears_exactly_once() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(5)));
    seed_details(&fetcher, 1..=25);
    fetcher.page(vacancy_url(13), "<html><body>Вакансия в архиве</body></html>");
    fetcher.fail(vacancy_url(20), FetchError::HttpStatus(403));

    let result = collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &test_config().with_workers(6),
        listing_ids(1..=25),
        &NoopObserver,
    )
    .await;

    assert_eq!(result.processed + result.skipped, 25);
    assert_eq!(result.processed, 23);
    let sources: HashSet<String> = result.records.iter().map(|r| r.source.to_string()).collect();
    assert_eq!(sources.len(), 23);
    assert!(!sources.contains(&vacancy_url(13)));
    assert!(!sources.contains(&vacancy_url(20)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_fetches_bounded_by_worker_count() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(20)));
    seed_details(&fetcher, 1..=30);

    let result = collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &test_config().with_workers(4),
        listing_ids(1..=30),
        &NoopObserver,
    )
    .await;

    assert_eq!(result.processed, 30);
    assert!(fetcher.max_in_flight() <= 4, "max in flight {}", fetcher.max_in_flight());
    assert!(fetcher.max_in_flight() > 1);
}

#[tokio::test]
async fn worker_count_never_exceeds_item_count() {
    let fetcher = Arc::new(FakeFetcher::with_delay(Duration::from_millis(10)));
    seed_details(&fetcher, 1..=2);

    let result = collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &test_config().with_workers(10),
        listing_ids(1..=2),
        &NoopObserver,
    )
    .await;

    assert_eq!(result.processed, 2);
    assert!(fetcher.max_in_flight() <= 2);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_total() {
    let fetcher = Arc::new(FakeFetcher::new());
    seed_details(&fetcher, 1..=60);
    fetcher.fail(vacancy_url(33), FetchError::Network("reset".into()));
    let observer = RecordingObserver::default();

    collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &test_config().with_progress_step_percent(10),
        listing_ids(1..=60),
        &observer,
    )
    .await;

    let progress = observer.progress();
    assert!(progress.windows(2).all(|w| w[0].0 < w[1].0));
    assert!(progress.iter().all(|(_, total)| *total == 60));
    assert_eq!(progress.last(), Some(&(60, 60)));
    assert_eq!(progress.len(), 10);
}

#[tokio::test]
async fn retries_are_attempted_then_item_skipped() {
    let fetcher = Arc::new(FakeFetcher::new());
    seed_details(&fetcher, 1..=3);
    fetcher.fail(vacancy_url(2), FetchError::HttpStatus(502));
    let config = PipelineConfig::default().with_fetch_retries(2, Duration::from_millis(1));

    let result = collect(
        fetcher.clone() as Arc<dyn PageFetcher>,
        extractor(),
        &config,
        listing_ids(1..=3),
        &NoopObserver,
    )
    .await;

    // 502 は毎回返るので最終的にスキップ、ただし3回試行される
    assert_eq!(result.skipped, 1);
    let attempts = fetcher
        .calls()
        .iter()
        .filter(|u| **u == vacancy_url(2))
        .count();
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn empty_input_produces_empty_result() {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(FakeFetcher::new());
    let result = collect(fetcher, extractor(), &test_config(), Vec::new(), &NoopObserver).await;
    assert_eq!(result.discovered, 0);
    assert_eq!(result.processed, 0);
    assert!(result.records.is_empty());
}
