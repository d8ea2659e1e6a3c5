use indexmap::IndexSet;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::fetcher::fetch_with_retry;
use crate::hh::{ListingExtractor, ListingPage};
use crate::traits::PageFetcher;
use crate::types::{ListingId, ValidatedRequest};

/// 探索の集計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// 初出順・重複なし・`max_listings` 以内
    pub listings: Vec<ListingId>,
    /// 上限で切り捨てる前の件数
    pub unique_found: usize,
    pub pages_fetched: u32,
    pub pages_failed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Found(DiscoveryReport),
    NotFound,
    Failed { reason: String },
}

/// 検索結果ページを順番に取得して求人URLを集める
///
/// ページ単位の失敗は記録して次へ進む。「該当なし」を見たら残りのページは取得しない。
pub async fn discover(
    fetcher: &dyn PageFetcher,
    extractor: &ListingExtractor,
    config: &PipelineConfig,
    request: &ValidatedRequest,
) -> DiscoveryOutcome {
    let mut seen: IndexSet<ListingId> = IndexSet::new();
    let mut pages_fetched = 0u32;
    let mut pages_failed = 0u32;
    let mut last_error = None;

    for page in 0..request.pages {
        let url = extractor.search_url(request, page);
        pages_fetched += 1;

        let body = match fetch_with_retry(
            fetcher,
            &url,
            config.timeout,
            config.fetch_retries,
            config.retry_backoff,
        )
        .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(page, url = %url, "search page fetch failed: {}", e);
                pages_failed += 1;
                last_error = Some(e.to_string());
                continue;
            }
        };

        match extractor.extract(&body) {
            Ok(ListingPage::NoResults) => {
                info!(page, "no results marker, stopping discovery");
                return DiscoveryOutcome::NotFound;
            }
            Ok(ListingPage::Listings(ids)) => {
                let before = seen.len();
                seen.extend(ids);
                info!(page, new = seen.len() - before, total = seen.len(), "search page parsed");
            }
            Err(e) => {
                warn!(page, url = %url, "search page unusable: {}", e);
                pages_failed += 1;
                last_error = Some(e.to_string());
            }
        }
    }

    if pages_failed == pages_fetched {
        return DiscoveryOutcome::Failed {
            reason: format!(
                "all {} search page(s) failed: {}",
                pages_failed,
                last_error.unwrap_or_default()
            ),
        };
    }
    if seen.is_empty() {
        return DiscoveryOutcome::NotFound;
    }

    let unique_found = seen.len();
    let mut listings: Vec<ListingId> = seen.into_iter().collect();
    if listings.len() > config.max_listings {
        info!(
            found = unique_found,
            limit = config.max_listings,
            "truncating discovered listings"
        );
        listings.truncate(config.max_listings);
    }

    DiscoveryOutcome::Found(DiscoveryReport {
        listings,
        unique_found,
        pages_fetched,
        pages_failed,
    })
}
