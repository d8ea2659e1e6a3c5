//! 探索 → 詳細収集 → エクスポート を1リクエスト分順番に実行する

use std::sync::Arc;

use tracing::{info, warn};

use crate::collection::collect;
use crate::config::PipelineConfig;
use crate::discovery::{discover, DiscoveryOutcome};
use crate::error::{ExportError, PipelineError};
use crate::export::{ExportBundle, ExportWriter};
use crate::fetcher::HttpFetcher;
use crate::hh::{DetailExtractor, ListingExtractor};
use crate::session::{SessionGuard, SessionId, SessionRegistry};
use crate::traits::{PageFetcher, PipelineObserver, StatusEvent};
use crate::types::{CollectionResult, SearchRequest};

/// 1回の実行の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStage {
    Idle,
    Discovering,
    Collecting,
    Exporting,
    Done,
    Aborted,
}

impl RunStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStage::Done | RunStage::Aborted)
    }

    /// 許される遷移: 前進は1段ずつ、Aborted は非終端からならどこからでも
    pub fn can_advance_to(&self, next: RunStage) -> bool {
        use RunStage::*;
        match (self, next) {
            (Idle, Discovering)
            | (Discovering, Collecting)
            | (Collecting, Exporting)
            | (Exporting, Done) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// 1回の実行の終端
#[derive(Debug)]
pub enum PipelineOutcome {
    Success {
        result: CollectionResult,
        exports: ExportBundle,
    },
    NoListingsFound,
    NoUsableRecords,
    DiscoveryFailed {
        reason: String,
    },
}

impl PipelineOutcome {
    pub fn stage(&self) -> RunStage {
        match self {
            PipelineOutcome::Success { .. } => RunStage::Done,
            _ => RunStage::Aborted,
        }
    }

    /// ユーザー向けメッセージ
    pub fn message(&self) -> String {
        match self {
            PipelineOutcome::Success { result, exports } => format!(
                "Done: {} vacancies exported ({} skipped) as {}",
                result.processed,
                result.skipped,
                exports.file_names().join(", ")
            ),
            PipelineOutcome::NoListingsFound => {
                "No vacancies found. Try changing the query.".to_string()
            }
            PipelineOutcome::NoUsableRecords => {
                "Could not collect data for any of the vacancies found.".to_string()
            }
            PipelineOutcome::DiscoveryFailed { reason } => {
                format!("Search pages could not be loaded: {}", reason)
            }
        }
    }
}

/// 実行中の段階（不正な遷移はログに残して無視）
struct RunState<'a> {
    stage: RunStage,
    session: Option<&'a SessionGuard>,
}

impl RunState<'_> {
    async fn advance(&mut self, next: RunStage) {
        if !self.stage.can_advance_to(next) {
            warn!(from = ?self.stage, to = ?next, "illegal stage transition ignored");
            return;
        }
        info!(from = ?self.stage, to = ?next, "stage transition");
        self.stage = next;
        if let Some(guard) = self.session {
            guard.advance(next).await;
        }
    }
}

pub struct VacancyPipeline {
    config: Arc<PipelineConfig>,
    fetcher: Arc<dyn PageFetcher>,
    listings: ListingExtractor,
    details: Arc<DetailExtractor>,
    sessions: SessionRegistry,
}

impl VacancyPipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let listings = ListingExtractor::new(&config.base_url)?;
        let details = Arc::new(DetailExtractor::new(config.compensation_policy)?);
        let sessions = SessionRegistry::new(config.session_idle_ttl);
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            listings,
            details,
            sessions,
        })
    }

    /// reqwestフェッチャーで構築
    pub fn with_http(config: PipelineConfig) -> Result<Self, PipelineError> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        Self::new(config, fetcher)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn run(
        &self,
        request: &SearchRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut state = RunState {
            stage: RunStage::Idle,
            session: None,
        };
        self.drive(&mut state, request, observer).await
    }

    /// セッション表に登録して実行し、どの終わり方でも登録を外す
    ///
    /// 返る前に future が破棄された場合もガードの破棄で登録が外れる。
    pub async fn run_for_session(
        &self,
        session: &SessionId,
        request: &SearchRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineOutcome, PipelineError> {
        let guard = self.sessions.begin(session, &request.query).await?;
        let mut state = RunState {
            stage: RunStage::Idle,
            session: Some(&guard),
        };
        let outcome = self.drive(&mut state, request, observer).await;
        guard.finish().await;
        outcome
    }

    async fn drive(
        &self,
        state: &mut RunState<'_>,
        request: &SearchRequest,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineOutcome, PipelineError> {
        let request = match request.validate(&self.config) {
            Ok(request) => request,
            Err(e) => {
                state.advance(RunStage::Aborted).await;
                observer
                    .on_status(StatusEvent::Failed {
                        reason: e.to_string(),
                    })
                    .await;
                return Err(e);
            }
        };

        state.advance(RunStage::Discovering).await;
        info!(
            query = %request.query,
            pages = request.pages,
            area = %request.area,
            "discovery started"
        );
        observer
            .on_status(StatusEvent::DiscoveryStarted {
                query: request.query.clone(),
                pages: request.pages,
            })
            .await;

        let report = match discover(self.fetcher.as_ref(), &self.listings, &self.config, &request)
            .await
        {
            DiscoveryOutcome::Found(report) => report,
            DiscoveryOutcome::NotFound => {
                return Ok(self.abort(state, observer, PipelineOutcome::NoListingsFound).await)
            }
            DiscoveryOutcome::Failed { reason } => {
                return Ok(self
                    .abort(state, observer, PipelineOutcome::DiscoveryFailed { reason })
                    .await)
            }
        };
        observer
            .on_status(StatusEvent::ListingsFound {
                count: report.listings.len(),
            })
            .await;

        state.advance(RunStage::Collecting).await;
        observer
            .on_status(StatusEvent::CollectionStarted {
                total: report.listings.len(),
            })
            .await;
        let result = collect(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.details),
            &self.config,
            report.listings,
            observer,
        )
        .await;
        observer
            .on_status(StatusEvent::CollectionSummary {
                found: result.discovered,
                processed: result.processed,
                skipped: result.skipped,
            })
            .await;

        if result.processed == 0 {
            return Ok(self.abort(state, observer, PipelineOutcome::NoUsableRecords).await);
        }

        state.advance(RunStage::Exporting).await;
        let writer = ExportWriter::new(&self.config);
        let records = result.records.clone();
        let exported = tokio::task::spawn_blocking(move || writer.export(&records))
            .await
            .map_err(|e| ExportError::Worker(e.to_string()))
            .and_then(|r| r);

        let exports = match exported {
            Ok(bundle) => bundle,
            Err(e) => {
                state.advance(RunStage::Aborted).await;
                observer
                    .on_status(StatusEvent::Failed {
                        reason: e.to_string(),
                    })
                    .await;
                return Err(e.into());
            }
        };

        observer
            .on_status(StatusEvent::ExportReady {
                artifacts: exports.file_names(),
            })
            .await;
        state.advance(RunStage::Done).await;

        Ok(PipelineOutcome::Success { result, exports })
    }

    async fn abort(
        &self,
        state: &mut RunState<'_>,
        observer: &dyn PipelineObserver,
        outcome: PipelineOutcome,
    ) -> PipelineOutcome {
        state.advance(RunStage::Aborted).await;
        let reason = outcome.message();
        info!(reason = %reason, "pipeline aborted");
        observer.on_status(StatusEvent::Failed { reason }).await;
        outcome
    }
}
