//! パイプライン共通の型定義

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PipelineConfig;
use crate::error::PipelineError;

/// フロントエンドから受け取る検索リクエスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub pages: u32,
    /// 地域コード（None なら設定のデフォルト）
    #[serde(default)]
    pub area: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, pages: u32) -> Self {
        Self {
            query: query.into(),
            pages,
            area: None,
        }
    }

    pub fn with_area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    /// 空クエリ・0ページを拒否し、ページ数を上限に丸めた検証済みリクエストを返す
    pub fn validate(&self, config: &PipelineConfig) -> Result<ValidatedRequest, PipelineError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(PipelineError::InvalidRequest("query is empty".into()));
        }
        if self.pages == 0 {
            return Err(PipelineError::InvalidRequest(
                "page count must be at least 1".into(),
            ));
        }

        let area = self
            .area
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(config.default_area.as_str());

        Ok(ValidatedRequest {
            query: query.to_string(),
            pages: self.pages.min(config.max_pages),
            area: area.to_string(),
        })
    }
}

/// 検証済みで以後変更されないリクエスト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub query: String,
    pub pages: u32,
    pub area: String,
}

/// クエリ文字列を落とした求人URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(String);

impl ListingId {
    /// `href` を `base` 基準で解決し、`/vacancy/<数字>` 形式なら正規化して返す
    pub fn canonicalize(href: &str, base: &Url) -> Option<Self> {
        let mut url = base.join(href.trim()).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }

        let host = url.host_str()?.to_ascii_lowercase();
        let site = base
            .host_str()?
            .to_ascii_lowercase()
            .trim_start_matches("www.")
            .to_string();
        if host != site && !host.ends_with(&format!(".{}", site)) {
            return None;
        }

        let path = url.path().trim_end_matches('/').to_string();
        let id = path.strip_prefix("/vacancy/")?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        url.set_query(None);
        url.set_fragment(None);
        url.set_path(&path);
        Some(Self(url.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 給与が手取りか税引前か
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisclosureKind {
    Net,
    Gross,
    #[default]
    Unspecified,
}

impl DisclosureKind {
    pub fn label(&self) -> &'static str {
        match self {
            DisclosureKind::Net => "на руки",
            DisclosureKind::Gross => "до вычета налогов",
            DisclosureKind::Unspecified => "не указано",
        }
    }
}

/// 給与（下限・上限の少なくとも一方を持つ）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compensation {
    pub from: Option<u64>,
    pub to: Option<u64>,
    /// ISO 4217（RUB, USD, ...）
    pub currency: String,
    pub disclosure: DisclosureKind,
}

impl Compensation {
    /// 表示用: "150 000 – 200 000 RUB", "от 90 000 RUB", "до 120 000 RUB"
    pub fn display(&self) -> String {
        let amount = match (self.from, self.to) {
            (Some(from), Some(to)) if from == to => group_thousands(from),
            (Some(from), Some(to)) => {
                format!("{} – {}", group_thousands(from), group_thousands(to))
            }
            (Some(from), None) => format!("от {}", group_thousands(from)),
            (None, Some(to)) => format!("до {}", group_thousands(to)),
            (None, None) => return String::new(),
        };
        if self.currency.is_empty() {
            amount
        } else {
            format!("{} {}", amount, self.currency)
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

/// 1件の求人詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub compensation: Option<Compensation>,
    pub source: ListingId,
}

/// 表の列（エクスポートの列順）
pub const COLUMNS: [&str; 6] = [
    "title",
    "company",
    "location",
    "compensation",
    "disclosure",
    "url",
];

pub const COMPENSATION_PLACEHOLDER: &str = "Не указана";

impl VacancyRecord {
    pub fn compensation_display(&self) -> String {
        self.compensation
            .as_ref()
            .map(Compensation::display)
            .unwrap_or_else(|| COMPENSATION_PLACEHOLDER.to_string())
    }

    pub fn disclosure(&self) -> DisclosureKind {
        self.compensation
            .as_ref()
            .map(|c| c.disclosure)
            .unwrap_or_default()
    }

    /// `COLUMNS` 順の1行
    pub fn row(&self) -> [String; 6] {
        [
            self.title.clone(),
            self.company.clone(),
            self.location.clone(),
            self.compensation_display(),
            self.disclosure().label().to_string(),
            self.source.to_string(),
        ]
    }
}

/// 詳細収集の結果（recordsは完了順）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionResult {
    pub records: Vec<VacancyRecord>,
    pub discovered: usize,
    pub processed: usize,
    pub skipped: usize,
}
