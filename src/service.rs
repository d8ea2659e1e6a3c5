use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tracing::info;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::pipeline::{PipelineOutcome, VacancyPipeline};
use crate::session::SessionId;
use crate::traits::{NoopObserver, PipelineObserver};
use crate::types::SearchRequest;

/// tower::Serviceを実装した求人検索サービス
#[derive(Clone)]
pub struct VacancyService {
    pipeline: Arc<VacancyPipeline>,
    observer: Arc<dyn PipelineObserver>,
}

impl VacancyService {
    pub fn new(pipeline: Arc<VacancyPipeline>) -> Self {
        Self {
            pipeline,
            observer: Arc::new(NoopObserver),
        }
    }

    /// reqwestフェッチャーで構築
    pub fn with_http(config: PipelineConfig) -> Result<Self, PipelineError> {
        Ok(Self::new(Arc::new(VacancyPipeline::with_http(config)?)))
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn pipeline(&self) -> &Arc<VacancyPipeline> {
        &self.pipeline
    }
}

/// セッション付きリクエスト
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub session: SessionId,
    pub request: SearchRequest,
}

impl Service<SearchRequest> for VacancyService {
    type Response = PipelineOutcome;
    type Error = PipelineError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SearchRequest) -> Self::Future {
        info!(query = %req.query, pages = req.pages, "search request received");
        let pipeline = Arc::clone(&self.pipeline);
        let observer = Arc::clone(&self.observer);

        Box::pin(async move { pipeline.run(&req, observer.as_ref()).await })
    }
}

impl Service<SessionRequest> for VacancyService {
    type Response = PipelineOutcome;
    type Error = PipelineError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SessionRequest) -> Self::Future {
        info!(session = %req.session, query = %req.request.query, "session request received");
        let pipeline = Arc::clone(&self.pipeline);
        let observer = Arc::clone(&self.observer);

        Box::pin(async move {
            pipeline
                .run_for_session(&req.session, &req.request, observer.as_ref())
                .await
        })
    }
}
