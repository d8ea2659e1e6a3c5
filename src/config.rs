use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

pub const DEFAULT_BASE_URL: &str = "https://hh.ru";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 給与が取れなかった求人の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompensationPolicy {
    /// 給与なしでもレコードを残す
    #[default]
    Keep,
    /// 給与なしのページは使えないものとして捨てる
    RequireCompensation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 検索・求人ページのベースURL
    pub base_url: String,
    /// リクエストで指定がないときの地域コード
    pub default_area: String,
    /// 送信するUser-Agent（ボット判定回避）
    pub user_agent: String,
    /// 1回のGETのタイムアウト
    pub timeout: Duration,
    pub max_pages: u32,
    /// 詳細収集に渡す求人数の上限
    pub max_listings: usize,
    /// 同時フェッチ数の上限
    pub workers: usize,
    /// 進捗通知の間隔（全体に対する%）
    pub progress_step_percent: u8,
    /// 1件あたりの追加リトライ回数（0 = リトライなし）
    pub fetch_retries: u32,
    pub retry_backoff: Duration,
    pub compensation_policy: CompensationPolicy,
    /// 無操作セッションを破棄するまでの時間
    pub session_idle_ttl: Duration,
    pub export_formats: Vec<ExportFormat>,
    pub export_base_name: String,
    /// 一時エクスポートディレクトリの親（None ならシステムの一時ディレクトリ）
    pub export_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_area: "1".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            max_pages: 50,
            max_listings: 500,
            workers: 10,
            progress_step_percent: 5,
            fetch_retries: 0,
            retry_backoff: Duration::from_secs(1),
            compensation_policy: CompensationPolicy::Keep,
            session_idle_ttl: Duration::from_secs(30 * 60),
            export_formats: vec![ExportFormat::Csv, ExportFormat::Xlsx],
            export_base_name: "vacancies".to_string(),
            export_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// `VACANCY_*` 環境変数でデフォルトを上書き
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VACANCY_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = lookup("VACANCY_AREA") {
            config.default_area = v;
        }
        if let Some(v) = lookup("VACANCY_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = lookup("VACANCY_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("VACANCY_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("VACANCY_MAX_PAGES") {
            config.max_pages = parse_var("VACANCY_MAX_PAGES", &v)?;
        }
        if let Some(v) = lookup("VACANCY_MAX_LISTINGS") {
            config.max_listings = parse_var("VACANCY_MAX_LISTINGS", &v)?;
        }
        if let Some(v) = lookup("VACANCY_WORKERS") {
            config.workers = parse_var("VACANCY_WORKERS", &v)?;
        }
        if let Some(v) = lookup("VACANCY_PROGRESS_STEP_PERCENT") {
            config.progress_step_percent = parse_var("VACANCY_PROGRESS_STEP_PERCENT", &v)?;
        }
        if let Some(v) = lookup("VACANCY_FETCH_RETRIES") {
            config.fetch_retries = parse_var("VACANCY_FETCH_RETRIES", &v)?;
        }
        if let Some(v) = lookup("VACANCY_REQUIRE_COMPENSATION") {
            let require: bool = parse_var("VACANCY_REQUIRE_COMPENSATION", &v)?;
            config.compensation_policy = if require {
                CompensationPolicy::RequireCompensation
            } else {
                CompensationPolicy::Keep
            };
        }
        if let Some(v) = lookup("VACANCY_EXPORT_DIR") {
            config.export_dir = Some(PathBuf::from(v));
        }

        config.validate()?;
        Ok(config)
    }

    /// 上限値の整合性チェック
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_pages == 0 {
            return Err(PipelineError::Config("max_pages must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(PipelineError::Config("workers must be at least 1".into()));
        }
        if self.max_listings == 0 {
            return Err(PipelineError::Config("max_listings must be at least 1".into()));
        }
        if self.progress_step_percent == 0 || self.progress_step_percent > 100 {
            return Err(PipelineError::Config(
                "progress_step_percent must be within 1..=100".into(),
            ));
        }
        if self.export_formats.is_empty() {
            return Err(PipelineError::Config("no export formats configured".into()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| PipelineError::Config(format!("base_url: {}", e)))?;
        Ok(())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_area(mut self, area: impl Into<String>) -> Self {
        self.default_area = area.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_listings(mut self, max_listings: usize) -> Self {
        self.max_listings = max_listings;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_progress_step_percent(mut self, percent: u8) -> Self {
        self.progress_step_percent = percent;
        self
    }

    pub fn with_fetch_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.fetch_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    pub fn with_compensation_policy(mut self, policy: CompensationPolicy) -> Self {
        self.compensation_policy = policy;
        self
    }

    pub fn with_session_idle_ttl(mut self, ttl: Duration) -> Self {
        self.session_idle_ttl = ttl;
        self
    }

    pub fn with_export_formats(mut self, formats: Vec<ExportFormat>) -> Self {
        self.export_formats = formats;
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, PipelineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PipelineError::Config(format!("{}={:?}: {}", key, value, e)))
}
