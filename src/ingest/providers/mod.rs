// src/ingest/providers/mod.rs
pub mod csv_file;
pub mod newsapi;
pub mod web_page;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header::RETRY_AFTER, Response, StatusCode};

use crate::error::{ErrorClass, SourceError};
use crate::ingest::config::IngestConfig;
use crate::ingest::types::SourceProvider;

use self::{csv_file::CsvFileSource, newsapi::NewsApiSource, web_page::WebPageSource};

/// Build the enabled providers in their fixed run order: API, file, page.
pub fn build_providers(cfg: &IngestConfig) -> Result<Vec<Box<dyn SourceProvider>>> {
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    if cfg.newsapi.enabled {
        out.push(Box::new(NewsApiSource::from_config(&cfg.newsapi)?));
    }
    if cfg.csv.enabled {
        out.push(Box::new(CsvFileSource::from_config(&cfg.csv)?));
    }
    if cfg.web.enabled {
        out.push(Box::new(WebPageSource::from_config(&cfg.web)?));
    }
    Ok(out)
}

pub(crate) fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("building http client")
}

/// Transport-level failures (timeout, refused connection, reset, body read)
/// are all treated as transient.
pub(crate) fn classify_transport(err: reqwest::Error, what: &str) -> SourceError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    SourceError::transient(format!("{what}: {kind}: {err}"))
}

/// Map a non-success HTTP status to its class. `None` for 2xx.
pub(crate) fn classify_status(resp: &Response, what: &str) -> Option<SourceError> {
    let status = resp.status();
    if status.is_success() {
        return None;
    }
    let class = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorClass::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ErrorClass::RateLimited {
            retry_after: retry_after(resp),
        },
        StatusCode::NOT_FOUND => ErrorClass::NotFound,
        s if s.is_server_error() => ErrorClass::Transient,
        _ => ErrorClass::Malformed(crate::error::Scope::Resource),
    };
    Some(SourceError::new(class, format!("{what}: HTTP {status}")))
}

/// Only the delta-seconds form of `Retry-After` is honoured.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
