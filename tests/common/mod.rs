#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use vacancy_scraper::hh::ListingExtractor;
use vacancy_scraper::{
    FetchError, PageFetcher, PipelineConfig, PipelineObserver, SearchRequest, StatusEvent,
};

pub const BASE: &str = "https://hh.ru";

#[derive(Debug, Clone)]
pub enum Reply {
    Page(String),
    Fail(FetchError),
}

/// URLごとに固定の応答を返すフェッチャー
#[derive(Default)]
pub struct FakeFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn page(&self, url: impl Into<String>, body: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.into(), Reply::Page(body.into()));
    }

    pub fn fail(&self, url: impl Into<String>, error: FetchError) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.into(), Reply::Fail(error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.replies.lock().unwrap().get(url).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Some(Reply::Page(body)) => Ok(body),
            Some(Reply::Fail(e)) => Err(e),
            None => Err(FetchError::HttpStatus(404)),
        }
    }
}

/// 受け取った通知を記録する
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<StatusEvent>>,
    pub progress: Mutex<Vec<(usize, usize)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineObserver for RecordingObserver {
    async fn on_status(&self, event: StatusEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn on_progress(&self, completed: usize, total: usize) {
        self.progress.lock().unwrap().push((completed, total));
    }
}

pub fn search_url(query: &str, pages: u32, page: u32) -> String {
    let request = SearchRequest::new(query, pages)
        .validate(&PipelineConfig::default())
        .unwrap();
    ListingExtractor::new(BASE).unwrap().search_url(&request, page)
}

pub fn vacancy_url(n: u32) -> String {
    format!("{}/vacancy/{}", BASE, n)
}

pub fn serp_page(ids: &[u32]) -> String {
    let links: String = ids
        .iter()
        .map(|n| {
            format!(
                r#"<div class="serp-item"><a data-qa="serp-item__title" href="{}?query=x&hhtmFrom=vacancy_search_list">Vacancy {}</a></div>"#,
                vacancy_url(*n),
                n
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", links)
}

pub fn no_results_page() -> String {
    r#"<html><body><div data-qa="vacancy-serp__no-results">По запросу ничего не найдено</div></body></html>"#
        .to_string()
}

pub fn detail_page(n: u32) -> String {
    format!(
        r#"<html><body>
        <h1 data-qa="vacancy-title">Backend engineer {n}</h1>
        <a data-qa="vacancy-company-name">Company {n}</a>
        <p data-qa="vacancy-view-location">Москва</p>
        <span data-qa="vacancy-salary-compensation">от {n}00 000 ₽ до вычета налогов</span>
        </body></html>"#
    )
}

/// 検索ページと求人ページを一式登録する
pub fn seed_search(fetcher: &FakeFetcher, query: &str, pages: &[&[u32]]) {
    let total = pages.len() as u32;
    for (i, ids) in pages.iter().enumerate() {
        fetcher.page(search_url(query, total, i as u32), serp_page(ids));
        for n in ids.iter() {
            fetcher.page(vacancy_url(*n), detail_page(*n));
        }
    }
}

pub fn test_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_base_url(BASE)
        .with_timeout(Duration::from_secs(5))
}
