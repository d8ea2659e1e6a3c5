mod common;

use common::*;
use vacancy_scraper::discovery::discover;
use vacancy_scraper::hh::ListingExtractor;
use vacancy_scraper::{DiscoveryOutcome, FetchError, PipelineConfig, SearchRequest};

async fn run(
    fetcher: &FakeFetcher,
    config: &PipelineConfig,
    query: &str,
    pages: u32,
) -> DiscoveryOutcome {
    let request = SearchRequest::new(query, pages).validate(config).unwrap();
    let extractor = ListingExtractor::new(&config.base_url).unwrap();
    discover(fetcher, &extractor, config, &request).await
}

fn ids(outcome: &DiscoveryOutcome) -> Vec<String> {
    match outcome {
        DiscoveryOutcome::Found(report) => {
            report.listings.iter().map(|id| id.to_string()).collect()
        }
        other => panic!("expected listings, got {:?}", other),
    }
}

#[tokio::test]
async fn two_pages_without_overlap_yield_all_listings() {
    let fetcher = FakeFetcher::new();
    seed_search(&fetcher, "backend engineer", &[&[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10]]);

    let outcome = run(&fetcher, &test_config(), "backend engineer", 2).await;

    let expected: Vec<String> = (1..=10).map(vacancy_url).collect();
    assert_eq!(ids(&outcome), expected);
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn duplicates_across_pages_keep_first_position() {
    let fetcher = FakeFetcher::new();
    seed_search(&fetcher, "rust", &[&[1, 2, 3], &[3, 4, 1], &[5]]);

    let outcome = run(&fetcher, &test_config(), "rust", 3).await;

    assert_eq!(
        ids(&outcome),
        vec![vacancy_url(1), vacancy_url(2), vacancy_url(3), vacancy_url(4), vacancy_url(5)]
    );
}

#[tokio::test]
async fn no_results_marker_short_circuits() {
    let fetcher = FakeFetcher::new();
    fetcher.page(search_url("zzqx", 3, 0), no_results_page());
    fetcher.page(search_url("zzqx", 3, 1), serp_page(&[1]));

    let outcome = run(&fetcher, &test_config(), "zzqx", 3).await;

    assert_eq!(outcome, DiscoveryOutcome::NotFound);
    assert_eq!(fetcher.calls(), vec![search_url("zzqx", 3, 0)]);
}

#[tokio::test]
async fn failed_page_does_not_abort_discovery() {
    let fetcher = FakeFetcher::new();
    fetcher.fail(search_url("go", 3, 0), FetchError::HttpStatus(503));
    fetcher.page(search_url("go", 3, 1), "<html><body>captcha</body></html>");
    fetcher.page(search_url("go", 3, 2), serp_page(&[8, 9]));

    let outcome = run(&fetcher, &test_config(), "go", 3).await;

    let DiscoveryOutcome::Found(report) = outcome else {
        panic!("expected listings");
    };
    assert_eq!(report.listings.len(), 2);
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(report.pages_failed, 2);
}

#[tokio::test]
async fn all_pages_failing_is_discovery_failure() {
    let fetcher = FakeFetcher::new();
    fetcher.fail(search_url("go", 2, 0), FetchError::Timeout("5s".into()));
    fetcher.fail(search_url("go", 2, 1), FetchError::Network("reset".into()));

    let outcome = run(&fetcher, &test_config(), "go", 2).await;

    assert!(matches!(outcome, DiscoveryOutcome::Failed { .. }));
    assert_eq!(fetcher.call_count(), 2);
}

#[tokio::test]
async fn fetches_at_most_page_count() {
    let fetcher = FakeFetcher::new();
    for page in 0..10 {
        fetcher.page(search_url("java", 4, page), serp_page(&[page + 100]));
    }

    let outcome = run(&fetcher, &test_config(), "java", 4).await;

    assert_eq!(ids(&outcome).len(), 4);
    assert_eq!(fetcher.call_count(), 4);
}

#[tokio::test]
async fn page_count_clamped_to_configured_maximum() {
    let fetcher = FakeFetcher::new();
    for page in 0..10 {
        fetcher.page(search_url("java", 4, page), serp_page(&[page + 100]));
    }
    let config = test_config().with_max_pages(3);

    run(&fetcher, &config, "java", 40).await;

    assert_eq!(fetcher.call_count(), 3);
}

#[tokio::test]
async fn discovered_listings_truncated_to_limit() {
    let fetcher = FakeFetcher::new();
    seed_search(&fetcher, "qa", &[&[1, 2, 3, 4], &[5, 6, 7, 8]]);
    let config = test_config().with_max_listings(5);

    let outcome = run(&fetcher, &config, "qa", 2).await;

    let DiscoveryOutcome::Found(report) = outcome else {
        panic!("expected listings");
    };
    assert_eq!(report.listings.len(), 5);
    assert_eq!(report.unique_found, 8);
    assert_eq!(report.listings[4].to_string(), vacancy_url(5));
}
