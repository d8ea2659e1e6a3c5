use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{FetchError, PipelineError};
use crate::traits::PageFetcher;

/// reqwestによるフェッチャー
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,ru;q=0.9,en;q=0.5"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| PipelineError::Config(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        response.text().await.map_err(|e| classify(e, timeout))
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(format!("no response within {:?}", timeout))
    } else {
        FetchError::Network(err.to_string())
    }
}

/// 指数バックオフ付きフェッチ（`retries` = 初回以外の試行回数）
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
    retries: u32,
    backoff: Duration,
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch(url, timeout).await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt < retries => {
                let delay = backoff * 2u32.pow(attempt);
                warn!(
                    url = %url,
                    "attempt {} failed, retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
