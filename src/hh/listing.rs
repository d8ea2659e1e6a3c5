//! 検索結果ページの解析

use indexmap::IndexSet;
use scraper::{Html, Selector};
use url::Url;

use crate::error::{ListingError, PipelineError};
use crate::types::{ListingId, ValidatedRequest};

const LISTING_TITLE_SELECTOR: &str = r#"a[data-qa="serp-item__title"]"#;

const NO_RESULTS_SELECTOR: &str = r#"[data-qa="vacancy-serp__no-results"]"#;

/// 「該当なし」の文言（表示されるテキストに対してのみ判定）
const NO_RESULTS_PHRASE: &str = "ничего не найдено";

/// 1ページ分の解析結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingPage {
    /// ページ内の出現順、重複なし
    Listings(Vec<ListingId>),
    NoResults,
}

#[derive(Debug, Clone)]
pub struct ListingExtractor {
    base: Url,
    title_selector: Selector,
    no_results_selector: Selector,
}

impl ListingExtractor {
    pub fn new(base_url: &str) -> Result<Self, PipelineError> {
        let base = Url::parse(base_url)
            .map_err(|e| PipelineError::Config(format!("base_url: {}", e)))?;
        let title_selector = Selector::parse(LISTING_TITLE_SELECTOR)
            .map_err(|e| PipelineError::Config(format!("listing selector: {}", e)))?;
        let no_results_selector = Selector::parse(NO_RESULTS_SELECTOR)
            .map_err(|e| PipelineError::Config(format!("no-results selector: {}", e)))?;
        Ok(Self {
            base,
            title_selector,
            no_results_selector,
        })
    }

    /// 検索URL: `{base}/search/vacancy?text=..&area=..&page=..`
    pub fn search_url(&self, request: &ValidatedRequest, page: u32) -> String {
        let mut url = self.base.clone();
        url.set_path("/search/vacancy");
        url.query_pairs_mut()
            .clear()
            .append_pair("text", &request.query)
            .append_pair("area", &request.area)
            .append_pair("page", &page.to_string());
        url.to_string()
    }

    /// リンクが1件でもあれば `Listings`。リンクがなく「該当なし」の目印があれば `NoResults`
    pub fn extract(&self, page: &str) -> Result<ListingPage, ListingError> {
        let document = Html::parse_document(page);
        let mut anchors = 0usize;
        let mut ids = IndexSet::new();
        for anchor in document.select(&self.title_selector) {
            anchors += 1;
            if let Some(id) = anchor
                .value()
                .attr("href")
                .and_then(|href| ListingId::canonicalize(href, &self.base))
            {
                ids.insert(id);
            }
        }

        if anchors > 0 {
            return Ok(ListingPage::Listings(ids.into_iter().collect()));
        }
        if document.select(&self.no_results_selector).next().is_some()
            || visible_text_contains(&document, NO_RESULTS_PHRASE)
        {
            return Ok(ListingPage::NoResults);
        }
        Err(ListingError::UnrecognizedPage)
    }
}

/// script/style 内を除いたテキストノードに `phrase` があるか
fn visible_text_contains(document: &Html, phrase: &str) -> bool {
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let parent = node
                .parent()
                .and_then(|p| p.value().as_element().map(|e| e.name()));
            match parent {
                Some("script" | "style" | "noscript" | "template") => None,
                _ => Some(text),
            }
        })
        .any(|text| text.to_lowercase().contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::types::SearchRequest;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new("https://hh.ru").unwrap()
    }

    #[test]
    fn test_search_url_encodes_query() {
        let request = SearchRequest::new("python разработчик", 3)
            .validate(&PipelineConfig::default())
            .unwrap();
        let url = extractor().search_url(&request, 2);
        assert!(url.starts_with("https://hh.ru/search/vacancy?text=python+"));
        assert!(url.ends_with("&area=1&page=2"));
    }

    #[test]
    fn test_extract_dedups_and_filters() {
        let html = r#"<html><body>
            <a data-qa="serp-item__title" href="https://hh.ru/vacancy/1?from=serp">A</a>
            <a data-qa="serp-item__title" href="https://adsrv.example.com/click?id=9">Ad</a>
            <a data-qa="serp-item__title" href="/vacancy/2">B</a>
            <a data-qa="serp-item__title" href="https://hh.ru/vacancy/1?from=other">A again</a>
            <a href="https://hh.ru/vacancy/3">not a title</a>
        </body></html>"#;

        let page = extractor().extract(html).unwrap();
        let ListingPage::Listings(ids) = page else {
            panic!("expected listings");
        };
        let ids: Vec<&str> = ids.iter().map(ListingId::as_str).collect();
        assert_eq!(ids, vec!["https://hh.ru/vacancy/1", "https://hh.ru/vacancy/2"]);
    }

    #[test]
    fn test_no_results_marker() {
        let html = r#"<html><body><h1>По запросу «zzqx» ничего не найдено</h1></body></html>"#;
        assert_eq!(extractor().extract(html), Ok(ListingPage::NoResults));
    }

    #[test]
    fn test_no_results_element_without_phrase() {
        let html = r#"<html><body><div data-qa="vacancy-serp__no-results"></div></body></html>"#;
        assert_eq!(extractor().extract(html), Ok(ListingPage::NoResults));
    }

    #[test]
    fn test_listings_win_over_no_results_text() {
        let html = r#"<html><head>
            <script>window.i18n = {"serp.empty": "По запросу ничего не найдено"};</script>
            </head><body>
            <a data-qa="serp-item__title" href="/vacancy/77">Rust</a>
            </body></html>"#;
        let ListingPage::Listings(ids) = extractor().extract(html).unwrap() else {
            panic!("expected listings");
        };
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn test_phrase_in_script_is_not_a_marker() {
        let html = r#"<html><head>
            <script>var msg = "ничего не найдено";</script>
            </head><body><form id="captcha"></form></body></html>"#;
        assert_eq!(extractor().extract(html), Err(ListingError::UnrecognizedPage));
    }

    #[test]
    fn test_unrecognized_page_is_error() {
        let html = "<html><body><form id=\"captcha\"></form></body></html>";
        assert_eq!(extractor().extract(html), Err(ListingError::UnrecognizedPage));
    }

    #[test]
    fn test_extract_is_pure() {
        let html = r#"<a data-qa="serp-item__title" href="/vacancy/5">x</a>"#;
        let ex = extractor();
        assert_eq!(ex.extract(html), ex.extract(html));
    }
}
