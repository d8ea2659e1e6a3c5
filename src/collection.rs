use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::FetchError;
use crate::fetcher::fetch_with_retry;
use crate::hh::{DetailExtractor, DetailOutcome};
use crate::progress::ProgressThrottle;
use crate::traits::{PageFetcher, PipelineObserver};
use crate::types::{CollectionResult, ListingId, VacancyRecord};

/// 1件の処理結果
#[derive(Debug)]
enum ItemOutcome {
    Parsed(Box<VacancyRecord>),
    Unusable(ListingId),
    FetchFailed(ListingId, FetchError),
}

/// 求人ページを並列に取得・解析する
///
/// 同時実行は `min(workers, ids.len())`。1件の失敗は skipped に数えるだけで全体は止めない。
/// recordsは完了順。
pub async fn collect(
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<DetailExtractor>,
    config: &PipelineConfig,
    ids: Vec<ListingId>,
    observer: &dyn PipelineObserver,
) -> CollectionResult {
    let total = ids.len();
    let mut result = CollectionResult {
        discovered: total,
        ..Default::default()
    };
    if total == 0 {
        return result;
    }

    let worker_count = config.workers.clamp(1, total);
    info!(total, workers = worker_count, "collecting vacancy details");

    let (job_tx, job_rx) = mpsc::channel::<ListingId>(total);
    for id in ids {
        // 容量 = 件数なので埋まらない
        if job_tx.try_send(id).is_err() {
            error!("job queue rejected a listing");
        }
    }
    drop(job_tx);

    let (done_tx, mut done_rx) = mpsc::channel::<ItemOutcome>(worker_count * 2);
    let jobs = Arc::new(Mutex::new(job_rx));
    let mut workers = JoinSet::new();

    for worker in 0..worker_count {
        let jobs = Arc::clone(&jobs);
        let done = done_tx.clone();
        let fetcher = Arc::clone(&fetcher);
        let extractor = Arc::clone(&extractor);
        let timeout = config.timeout;
        let retries = config.fetch_retries;
        let backoff = config.retry_backoff;

        workers.spawn(async move {
            loop {
                let next = {
                    let mut guard = jobs.lock().await;
                    guard.recv().await
                };
                let Some(id) = next else {
                    debug!(worker, "job queue drained");
                    break;
                };

                let outcome =
                    match fetch_with_retry(fetcher.as_ref(), id.as_str(), timeout, retries, backoff)
                        .await
                    {
                        Ok(page) => match extractor.extract(&id, &page) {
                            DetailOutcome::Record(record) => ItemOutcome::Parsed(Box::new(record)),
                            DetailOutcome::Unusable => ItemOutcome::Unusable(id),
                        },
                        Err(e) => ItemOutcome::FetchFailed(id, e),
                    };

                if done.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(done_tx);

    let mut throttle = ProgressThrottle::new(total, config.progress_step_percent);
    let mut completed = 0usize;

    while let Some(outcome) = done_rx.recv().await {
        completed += 1;
        match outcome {
            ItemOutcome::Parsed(record) => {
                debug!(url = %record.source, "vacancy parsed");
                result.records.push(*record);
                result.processed += 1;
            }
            ItemOutcome::Unusable(id) => {
                warn!(url = %id, "vacancy page had no usable data");
                result.skipped += 1;
            }
            ItemOutcome::FetchFailed(id, e) => {
                warn!(url = %id, "vacancy fetch failed: {}", e);
                result.skipped += 1;
            }
        }

        if throttle.should_report(completed) {
            observer.on_progress(completed, total).await;
        }
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!("collection worker aborted: {}", e);
        }
    }

    // 異常終了したワーカーが持っていた分
    let lost = total - completed;
    if lost > 0 {
        warn!(lost, "items lost to aborted workers, counting as skipped");
        result.skipped += lost;
        observer.on_progress(total, total).await;
    }

    info!(
        processed = result.processed,
        skipped = result.skipped,
        "collection finished"
    );
    result
}
