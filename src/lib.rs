//! 求人検索スクレイパーライブラリ
//!
//! - hh.ru の検索結果ページから求人URLを収集（重複排除、ページ単位の失敗は継続）
//! - 求人ページを上限付きの並列ワーカーで取得・解析（1件の失敗は全体を止めない）
//! - 結果をCSV/XLSXに書き出してフロントエンドへ渡す
//!
//! # 使用例
//!
//! ```rust,ignore
//! use vacancy_scraper::{NoopObserver, PipelineConfig, PipelineOutcome, SearchRequest, VacancyPipeline};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pipeline = VacancyPipeline::with_http(PipelineConfig::default()).unwrap();
//!     let request = SearchRequest::new("rust developer", 2);
//!
//!     match pipeline.run(&request, &NoopObserver).await.unwrap() {
//!         PipelineOutcome::Success { result, exports } => {
//!             println!("{} vacancies", result.processed);
//!             for artifact in exports.artifacts() {
//!                 println!("{:?}", artifact.path);
//!             }
//!             // exports を破棄すると一時ファイルも削除される
//!         }
//!         other => println!("{}", other.message()),
//!     }
//! }
//! ```
//!
//! # tower::Service として使う
//!
//! ```rust,ignore
//! use tower::Service;
//! use vacancy_scraper::{PipelineConfig, SearchRequest, VacancyService};
//!
//! let mut service = VacancyService::with_http(PipelineConfig::from_env()?)?;
//! let outcome = service.call(SearchRequest::new("python", 3)).await?;
//! ```

pub mod collection;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod hh;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod session;
pub mod traits;
pub mod types;

// 主要な型をリエクスポート
pub use config::{CompensationPolicy, ExportFormat, PipelineConfig};
pub use discovery::{DiscoveryOutcome, DiscoveryReport};
pub use error::{ExportError, FetchError, ListingError, PipelineError};
pub use export::{ExportArtifact, ExportBundle, ExportWriter};
pub use fetcher::HttpFetcher;
pub use pipeline::{PipelineOutcome, RunStage, VacancyPipeline};
pub use progress::ProgressThrottle;
pub use service::{SessionRequest, VacancyService};
pub use session::{RunToken, SessionGuard, SessionId, SessionRegistry};
pub use traits::{NoopObserver, PageFetcher, PipelineObserver, StatusEvent};
pub use types::{
    CollectionResult, Compensation, DisclosureKind, ListingId, SearchRequest, ValidatedRequest,
    VacancyRecord,
};
