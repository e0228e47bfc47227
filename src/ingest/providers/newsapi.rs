// src/ingest/providers/newsapi.rs
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::histogram;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{classify_status, classify_transport, http_client};
use crate::error::SourceError;
use crate::ingest::config::NewsApiConfig;
use crate::ingest::types::{Retrieved, Source};
use crate::ingest::{clean_text, CONTENT_MAX_CHARS, TITLE_MAX_CHARS};
use crate::record::Record;

pub const SOURCE_NAME: &str = "newsapi";
const NO_CONTENT: &str = "No content available";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<String>,
    message: Option<String>,
    articles: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
}

/// NewsAPI `everything` endpoint. One GET per `retrieve`; never retries itself.
pub struct NewsApiSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    query: String,
    language: String,
    page_size: u32,
    timeout: Duration,
}

impl NewsApiSource {
    pub fn from_config(cfg: &NewsApiConfig) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.timeout_secs);
        Ok(Self {
            client: http_client(concat!("multi-source-ingest/", env!("CARGO_PKG_VERSION")), timeout)?,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            query: cfg.query.clone(),
            language: cfg.language.clone(),
            page_size: cfg.page_size,
            timeout,
        })
    }

    /// Per-request timeout; the client's connect timeout is left as built.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn parse_body(body: &str) -> Result<Vec<Value>, SourceError> {
        let t0 = std::time::Instant::now();
        let env: Envelope = serde_json::from_str(body)
            .map_err(|e| SourceError::malformed_resource(format!("newsapi body is not JSON: {e}")))?;

        if let Some(status) = env.status.as_deref() {
            if status != "ok" {
                return Err(SourceError::malformed_resource(format!(
                    "newsapi status {status:?}: {}",
                    env.message.as_deref().unwrap_or("unknown error")
                )));
            }
        }
        let articles = env
            .articles
            .ok_or_else(|| SourceError::malformed_resource("newsapi body has no `articles` list"))?;

        histogram!("ingest_parse_ms", "source" => SOURCE_NAME)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(articles)
    }
}

#[async_trait]
impl Source for NewsApiSource {
    type Raw = Value;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn retrieve(&self) -> Result<Retrieved<Value>, SourceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(SourceError::unauthorized("NEWSAPI_API_KEY is not configured"));
        };

        tracing::info!(
            source = SOURCE_NAME,
            query = %self.query,
            page_size = self.page_size,
            "fetching articles"
        );

        let page_size = self.page_size.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .timeout(self.timeout)
            .header("X-Api-Key", key)
            .query(&[
                ("q", self.query.as_str()),
                ("language", self.language.as_str()),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(e, "newsapi request"))?;

        if let Some(err) = classify_status(&resp, "newsapi") {
            return Err(err);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(e, "newsapi body"))?;
        let articles = Self::parse_body(&body)?;
        Ok(Retrieved::new(articles))
    }

    fn normalize(&self, raw: Value) -> Result<Record, SourceError> {
        let a: Article = serde_json::from_value(raw)
            .map_err(|e| SourceError::malformed_item(format!("article has unexpected shape: {e}")))?;

        let title = clean_text(a.title.as_deref().unwrap_or_default(), TITLE_MAX_CHARS);
        if title.is_empty() {
            return Err(SourceError::malformed_item("article has no title"));
        }

        // Full `content` is truncated by the API; the description reads better.
        let content = [a.description.as_deref(), a.content.as_deref()]
            .into_iter()
            .flatten()
            .map(|s| clean_text(s, CONTENT_MAX_CHARS))
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| NO_CONTENT.to_string());

        let url = a.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        Ok(Record::new(title, content, SOURCE_NAME, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source() -> NewsApiSource {
        NewsApiSource::from_config(&NewsApiConfig::default()).unwrap()
    }

    #[test]
    fn description_is_preferred_then_content_then_placeholder() {
        let s = source();
        let r = s
            .normalize(json!({"title": "T", "description": "D", "content": "C", "url": "https://a.test"}))
            .unwrap();
        assert_eq!(r.content, "D");
        let r = s.normalize(json!({"title": "T", "description": "", "content": "C"})).unwrap();
        assert_eq!(r.content, "C");
        assert_eq!(r.url, "");
        let r = s.normalize(json!({"title": "T"})).unwrap();
        assert_eq!(r.content, "No content available");
    }

    #[test]
    fn missing_title_or_wrong_shape_is_item_level() {
        let s = source();
        assert!(s.normalize(json!({"description": "D"})).unwrap_err().is_item_level());
        assert!(s.normalize(json!({"title": 42})).unwrap_err().is_item_level());
        assert!(s.normalize(json!("just a string")).unwrap_err().is_item_level());
    }

    #[test]
    fn normalization_is_stable_apart_from_timestamp() {
        let s = source();
        let raw = json!({"title": " <b>Same</b> ", "description": "Body", "url": "https://a.test/1"});
        let a = s.normalize(raw.clone()).unwrap();
        let b = s.normalize(raw).unwrap();
        assert!(a.same_payload(&b));
        assert_eq!(a.title, "Same");
    }

    #[test]
    fn error_status_body_is_resource_level() {
        let err = NewsApiSource::parse_body(r#"{"status":"error","message":"bad"}"#).unwrap_err();
        assert!(!err.is_item_level());
        assert!(NewsApiSource::parse_body("<html>").is_err());
        assert!(NewsApiSource::parse_body(r#"{"status":"ok"}"#).is_err());
        assert_eq!(
            NewsApiSource::parse_body(r#"{"status":"ok","articles":[{},{}]}"#).unwrap().len(),
            2
        );
    }
}
