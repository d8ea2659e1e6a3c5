//! 求人詳細ページの解析
//!
//! 抽出方式は2つ。登録順（マークアップ → 埋め込み構造化データ）に、
//! ページ上で利用可能なものだけを使い、フィールドごとに先に取れた値を採用する。
//! 給与の手取り/税引前が未確定なら、後続方式の判定で補う。

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::CompensationPolicy;
use crate::error::PipelineError;
use crate::types::{Compensation, DisclosureKind, ListingId, VacancyRecord};

pub const TITLE_PLACEHOLDER: &str = "Не указано";
pub const COMPANY_PLACEHOLDER: &str = "Не указана";
pub const LOCATION_PLACEHOLDER: &str = "Не указан";

/// 1方式が取り出せた分だけのフィールド
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialVacancy {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub compensation: Option<Compensation>,
}

impl PartialVacancy {
    fn merge(&mut self, other: PartialVacancy) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.company.is_none() {
            self.company = other.company;
        }
        if self.location.is_none() {
            self.location = other.location;
        }
        if let Some(found) = other.compensation {
            match self.compensation.as_mut() {
                Some(current) => {
                    if current.disclosure == DisclosureKind::Unspecified {
                        current.disclosure = found.disclosure;
                    }
                }
                None => self.compensation = Some(found),
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.title.is_some()
            && self.company.is_some()
            && self.location.is_some()
            && self
                .compensation
                .as_ref()
                .is_some_and(|c| c.disclosure != DisclosureKind::Unspecified)
    }
}

/// 詳細ページからフィールドを取り出す方式
pub trait DetailStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// このページで使える目印があるか
    fn is_available(&self, page: &str) -> bool;

    fn extract(&self, page: &str) -> PartialVacancy;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    Record(VacancyRecord),
    /// タイトルも給与も取れなかった
    Unusable,
}

#[derive(Debug)]
pub struct DetailExtractor {
    strategies: Vec<Box<dyn DetailStrategy>>,
    policy: CompensationPolicy,
}

impl DetailExtractor {
    /// マークアップ → 構造化データの順
    pub fn new(policy: CompensationPolicy) -> Result<Self, PipelineError> {
        Ok(Self::with_strategies(
            vec![
                Box::new(MarkupStrategy::new()?),
                Box::new(StructuredDataStrategy::new()?),
            ],
            policy,
        ))
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn DetailStrategy>>,
        policy: CompensationPolicy,
    ) -> Self {
        Self { strategies, policy }
    }

    pub fn extract(&self, source: &ListingId, page: &str) -> DetailOutcome {
        let mut merged = PartialVacancy::default();
        for strategy in &self.strategies {
            if !strategy.is_available(page) {
                debug!(url = %source, strategy = strategy.name(), "strategy unavailable");
                continue;
            }
            merged.merge(strategy.extract(page));
            if merged.is_complete() {
                break;
            }
        }

        if merged.title.is_none() && merged.compensation.is_none() {
            return DetailOutcome::Unusable;
        }
        if self.policy == CompensationPolicy::RequireCompensation && merged.compensation.is_none()
        {
            return DetailOutcome::Unusable;
        }

        DetailOutcome::Record(VacancyRecord {
            title: merged.title.unwrap_or_else(|| TITLE_PLACEHOLDER.to_string()),
            company: merged.company.unwrap_or_else(|| COMPANY_PLACEHOLDER.to_string()),
            location: merged
                .location
                .unwrap_or_else(|| LOCATION_PLACEHOLDER.to_string()),
            compensation: merged.compensation,
            source: source.clone(),
        })
    }
}

fn selector(css: &str) -> Result<Selector, PipelineError> {
    Selector::parse(css).map_err(|e| PipelineError::Config(format!("selector {}: {}", css, e)))
}

fn pattern(re: &str) -> Result<Regex, PipelineError> {
    Regex::new(re).map_err(|e| PipelineError::Config(format!("pattern {}: {}", re, e)))
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// `data-qa` 属性によるマークアップ解析
#[derive(Debug)]
pub struct MarkupStrategy {
    title: Selector,
    company: Selector,
    location: Vec<Selector>,
    salary: Vec<Selector>,
}

impl MarkupStrategy {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            title: selector(r#"h1[data-qa="vacancy-title"]"#)?,
            company: selector(r#"[data-qa="vacancy-company-name"]"#)?,
            location: vec![
                selector(r#"p[data-qa="vacancy-view-location"]"#)?,
                selector(r#"span[data-qa="vacancy-view-raw-address"]"#)?,
            ],
            salary: vec![
                selector(r#"[data-qa="vacancy-salary-compensation"]"#)?,
                selector(r#"[data-qa="vacancy-salary"]"#)?,
            ],
        })
    }

    fn first_text(document: &Html, selectors: &[Selector]) -> Option<String> {
        selectors
            .iter()
            .find_map(|s| document.select(s).find_map(element_text))
    }
}

impl DetailStrategy for MarkupStrategy {
    fn name(&self) -> &'static str {
        "markup"
    }

    fn is_available(&self, page: &str) -> bool {
        page.contains(r#"data-qa="vacancy-"#)
    }

    fn extract(&self, page: &str) -> PartialVacancy {
        let document = Html::parse_document(page);
        PartialVacancy {
            title: Self::first_text(&document, std::slice::from_ref(&self.title)),
            company: Self::first_text(&document, std::slice::from_ref(&self.company)),
            location: Self::first_text(&document, &self.location),
            compensation: Self::first_text(&document, &self.salary)
                .and_then(|text| parse_salary_text(&text)),
        }
    }
}

/// 3桁区切り（空白・NBSP・狭いNBSP）の金額
static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\s\d{3})*").expect("valid regex"));

/// 給与表記の解析: "от 150 000 ₽ на руки", "100 000 – 150 000 ₽ до вычета налогов"
pub fn parse_salary_text(text: &str) -> Option<Compensation> {
    let lower = text.to_lowercase();
    let matches: Vec<_> = AMOUNT.find_iter(&lower).collect();
    let amounts: Vec<u64> = matches
        .iter()
        .filter_map(|m| {
            m.as_str()
                .chars()
                .filter(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .ok()
        })
        .collect();
    let prefix = matches
        .first()
        .map(|m| lower[..m.start()].trim_end())
        .unwrap_or_default();

    let (from, to) = match amounts.as_slice() {
        [] => return None,
        [only] if prefix.ends_with("до") => (None, Some(*only)),
        [only] if prefix.ends_with("от") => (Some(*only), None),
        [only] => (Some(*only), Some(*only)),
        [from, to, ..] => (Some(*from), Some(*to)),
    };

    Some(Compensation {
        from,
        to,
        currency: currency_from_text(&lower),
        disclosure: disclosure_from_text(&lower),
    })
}

/// 通貨の目印（記号はそのまま、略称は単語単位で判定）
static CURRENCY_MARKERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"₽|\bруб", "RUB"),
        (r"\$|\busd\b", "USD"),
        (r"€|\beur\b", "EUR"),
        (r"₸|\bkzt\b|\bтенге\b", "KZT"),
        (r"\bсум\b|\buzs\b", "UZS"),
        (r"\bbr\b|\bbyn\b", "BYN"),
    ]
    .into_iter()
    .map(|(pattern, code)| (Regex::new(pattern).expect("valid regex"), code))
    .collect()
});

fn currency_from_text(lower: &str) -> String {
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| marker.is_match(lower))
        .map(|(_, code)| code.to_string())
        .unwrap_or_default()
}

fn disclosure_from_text(lower: &str) -> DisclosureKind {
    if lower.contains("на руки") || lower.contains("после вычета") {
        DisclosureKind::Net
    } else if lower.contains("до вычета") {
        DisclosureKind::Gross
    } else {
        DisclosureKind::Unspecified
    }
}

fn normalize_currency(code: &str) -> String {
    match code.trim().to_ascii_uppercase().as_str() {
        "RUR" => "RUB".to_string(),
        other => other.to_string(),
    }
}

/// 埋め込みJSON（JSON-LD の JobPosting と、ページ状態の給与オブジェクト）を
/// 正規表現で切り出して読む
#[derive(Debug)]
pub struct StructuredDataStrategy {
    ld_json: Regex,
    state_compensation: Regex,
}

/// ページ状態に埋め込まれた給与
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateCompensation {
    from: Option<f64>,
    to: Option<f64>,
    currency_code: Option<String>,
    gross: Option<bool>,
}

impl StructuredDataStrategy {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            ld_json: pattern(
                r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#,
            )?,
            state_compensation: pattern(r#""compensation"\s*:\s*(\{[^{}]*\})"#)?,
        })
    }

    fn job_postings(&self, page: &str) -> Vec<Value> {
        let mut found = Vec::new();
        for caps in self.ld_json.captures_iter(page) {
            let Some(body) = caps.get(1) else { continue };
            match serde_json::from_str::<Value>(body.as_str().trim()) {
                Ok(value) => collect_job_postings(value, &mut found),
                Err(e) => debug!("skipping malformed ld+json block: {}", e),
            }
        }
        found
    }

    fn state_compensation(&self, page: &str) -> Option<StateCompensation> {
        self.state_compensation
            .captures_iter(page)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| serde_json::from_str::<StateCompensation>(m.as_str()).ok())
            .find(|c| c.from.is_some() || c.to.is_some() || c.gross.is_some())
    }
}

fn collect_job_postings(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_job_postings(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                collect_job_postings(graph, out);
            }
            let is_posting = match map.get("@type") {
                Some(Value::String(t)) => t == "JobPosting",
                Some(Value::Array(types)) => types.iter().any(|t| t == "JobPosting"),
                _ => false,
            };
            if is_posting {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

fn json_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.split_whitespace().collect::<Vec<_>>().join(" "),
        Value::Object(map) => return json_text(map.get("name")),
        Value::Array(items) => return json_text(items.first()),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn json_amount(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| *v >= 0.0).map(|v| v.round() as u64),
        Value::String(s) => s
            .chars()
            .filter(char::is_ascii_digit)
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    }
}

fn posting_location(posting: &Value) -> Option<String> {
    let location = match posting.get("jobLocation")? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let address = location.get("address")?;
    if let Value::String(s) = address {
        return json_text(Some(&Value::String(s.clone())));
    }
    json_text(address.get("streetAddress")).or_else(|| json_text(address.get("addressLocality")))
}

fn posting_compensation(posting: &Value) -> Option<Compensation> {
    let salary = posting.get("baseSalary")?;
    let value = salary.get("value");
    let (from, to) = match value {
        Some(Value::Object(q)) => {
            let exact = json_amount(q.get("value"));
            (
                json_amount(q.get("minValue")).or(exact),
                json_amount(q.get("maxValue")).or(exact),
            )
        }
        other => {
            let exact = json_amount(other);
            (exact, exact)
        }
    };
    if from.is_none() && to.is_none() {
        return None;
    }
    Some(Compensation {
        from,
        to,
        currency: salary
            .get("currency")
            .and_then(Value::as_str)
            .map(normalize_currency)
            .unwrap_or_default(),
        disclosure: DisclosureKind::Unspecified,
    })
}

impl DetailStrategy for StructuredDataStrategy {
    fn name(&self) -> &'static str {
        "structured-data"
    }

    fn is_available(&self, page: &str) -> bool {
        self.ld_json.is_match(page) || self.state_compensation.is_match(page)
    }

    fn extract(&self, page: &str) -> PartialVacancy {
        let mut partial = PartialVacancy::default();

        for posting in self.job_postings(page) {
            partial.merge(PartialVacancy {
                title: json_text(posting.get("title")),
                company: json_text(posting.get("hiringOrganization")),
                location: posting_location(&posting),
                compensation: posting_compensation(&posting),
            });
        }

        if let Some(state) = self.state_compensation(page) {
            let disclosure = match state.gross {
                Some(true) => DisclosureKind::Gross,
                Some(false) => DisclosureKind::Net,
                None => DisclosureKind::Unspecified,
            };
            let from = state.from.filter(|v| *v >= 0.0).map(|v| v.round() as u64);
            let to = state.to.filter(|v| *v >= 0.0).map(|v| v.round() as u64);
            match partial.compensation.as_mut() {
                Some(current) => {
                    if current.disclosure == DisclosureKind::Unspecified {
                        current.disclosure = disclosure;
                    }
                }
                None if from.is_some() || to.is_some() => {
                    partial.compensation = Some(Compensation {
                        from,
                        to,
                        currency: state
                            .currency_code
                            .as_deref()
                            .map(normalize_currency)
                            .unwrap_or_default(),
                        disclosure,
                    });
                }
                None => {}
            }
        }

        partial
    }
}
