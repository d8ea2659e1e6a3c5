use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

/// 1回のHTTP GET
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// ページ本文を取得（リトライなし）
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// フロントエンドへ渡すライフサイクルイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    DiscoveryStarted { query: String, pages: u32 },
    ListingsFound { count: usize },
    CollectionStarted { total: usize },
    CollectionSummary {
        found: usize,
        processed: usize,
        skipped: usize,
    },
    ExportReady { artifacts: Vec<String> },
    Failed { reason: String },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::DiscoveryStarted { query, pages } => {
                write!(f, "Searching '{}' across {} page(s)", query, pages)
            }
            StatusEvent::ListingsFound { count } => write!(f, "Found {} vacancies", count),
            StatusEvent::CollectionStarted { total } => {
                write!(f, "Collecting details for {} vacancies", total)
            }
            StatusEvent::CollectionSummary {
                found,
                processed,
                skipped,
            } => write!(
                f,
                "Collected {} of {} vacancies ({} skipped)",
                processed, found, skipped
            ),
            StatusEvent::ExportReady { artifacts } => {
                write!(f, "Export ready: {}", artifacts.join(", "))
            }
            StatusEvent::Failed { reason } => write!(f, "Failed: {}", reason),
        }
    }
}

/// 進捗・ステータスの受け手（配送はフロントエンドの責務）
#[async_trait]
pub trait PipelineObserver: Send + Sync {
    async fn on_status(&self, _event: StatusEvent) {}

    async fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// 何もしないオブザーバー
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

#[async_trait]
impl PipelineObserver for NoopObserver {}
