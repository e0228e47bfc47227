// src/ingest/providers/web_page.rs
//! Headline scraper for news index pages.
//!
//! Items are extracted with an ordered list of CSS selectors: the first
//! selector that matches anything on a page is used for that page. A page
//! where nothing matches is recorded as `StructureChanged` and contributes
//! nothing; it is never retried. A page that answers 404 is treated the
//! same way, so items from earlier pages survive.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};

use super::{classify_status, classify_transport, http_client};
use crate::error::{ErrorClass, SourceError};
use crate::ingest::config::WebConfig;
use crate::ingest::types::{Retrieved, Source};
use crate::ingest::{clean_text, TITLE_MAX_CHARS};
use crate::record::Record;

pub const SOURCE_NAME: &str = "web";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageItem {
    pub title: String,
    /// Absolute link, if the element carried or sat inside one.
    pub url: Option<String>,
}

pub struct WebPageSource {
    client: Client,
    urls: Vec<Url>,
    selectors: Vec<(String, Selector)>,
    max_items: usize,
    politeness_delay: Duration,
    content_prefix: String,
}

impl WebPageSource {
    pub fn from_config(cfg: &WebConfig) -> Result<Self> {
        let urls = cfg
            .urls
            .iter()
            .map(|u| Url::parse(u).map_err(|e| anyhow!("invalid page url {u:?}: {e}")))
            .collect::<Result<Vec<_>>>()?;
        let selectors = cfg
            .selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map(|sel| (s.clone(), sel))
                    .map_err(|e| anyhow!("invalid css selector {s:?}: {e:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if selectors.is_empty() {
            return Err(anyhow!("web source needs at least one selector"));
        }
        Ok(Self {
            client: http_client(&cfg.user_agent, Duration::from_secs(cfg.timeout_secs))?,
            urls,
            selectors,
            max_items: cfg.max_items,
            politeness_delay: Duration::from_millis(cfg.politeness_delay_ms),
            content_prefix: cfg.content_prefix.clone(),
        })
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_transport(e, "page request"))?;
        if let Some(err) = classify_status(&resp, url.as_str()) {
            return Err(err);
        }
        resp.text()
            .await
            .map_err(|e| classify_transport(e, "page body"))
    }

    fn extract(&self, html: &str, page: &Url, limit: usize) -> Option<(&str, Vec<PageItem>)> {
        let t0 = std::time::Instant::now();
        let doc = Html::parse_document(html);
        let out = self.selectors.iter().find_map(|(raw, sel)| {
            let matched: Vec<ElementRef> = doc.select(sel).collect();
            if matched.is_empty() {
                tracing::debug!(source = SOURCE_NAME, selector = %raw, "selector matched nothing");
                return None;
            }
            let items = matched
                .into_iter()
                .filter_map(|el| item_from_element(el, page))
                .take(limit)
                .collect();
            Some((raw.as_str(), items))
        });
        histogram!("ingest_parse_ms", "source" => SOURCE_NAME)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        out
    }
}

fn item_from_element(el: ElementRef, page: &Url) -> Option<PageItem> {
    static SPAN: once_cell::sync::Lazy<Selector> =
        once_cell::sync::Lazy::new(|| Selector::parse("span").unwrap());
    static LINK: once_cell::sync::Lazy<Selector> =
        once_cell::sync::Lazy::new(|| Selector::parse("a[href]").unwrap());

    let title_el = el.select(&SPAN).next().unwrap_or(el);
    let title: String = title_el.text().collect::<Vec<_>>().join(" ");
    let title = title.trim();
    if title.is_empty() {
        tracing::debug!(source = SOURCE_NAME, element = el.value().name(), "element has no text");
        return None;
    }

    let href = el
        .value()
        .attr("href")
        .filter(|_| el.value().name() == "a")
        .or_else(|| {
            el.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "a")
                .and_then(|a| a.value().attr("href"))
        })
        .or_else(|| el.select(&LINK).next().and_then(|a| a.value().attr("href")));

    let url = href
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .and_then(|h| page.join(h).ok())
        .map(String::from);

    Some(PageItem {
        title: title.to_string(),
        url,
    })
}

#[async_trait]
impl Source for WebPageSource {
    type Raw = PageItem;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn retrieve(&self) -> Result<Retrieved<PageItem>, SourceError> {
        let mut out = Retrieved::empty();
        for (i, page) in self.urls.iter().enumerate() {
            if out.items.len() >= self.max_items {
                break;
            }
            if i > 0 && !self.politeness_delay.is_zero() {
                tokio::time::sleep(self.politeness_delay).await;
            }

            tracing::info!(source = SOURCE_NAME, url = %page, "fetching page");
            let body = match self.fetch_page(page).await {
                Ok(body) => body,
                // Keep what earlier pages yielded; a gone page is just empty.
                Err(e) if e.class() == Some(ErrorClass::NotFound) => {
                    tracing::warn!(source = SOURCE_NAME, url = %page, error = %e, "page not found");
                    out.issues.push(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let remaining = self.max_items - out.items.len();
            match self.extract(&body, page, remaining) {
                Some((selector, mut items)) => {
                    tracing::info!(
                        source = SOURCE_NAME,
                        url = %page,
                        selector,
                        items = items.len(),
                        "page extracted"
                    );
                    out.items.append(&mut items);
                }
                None => out.issues.push(SourceError::new(
                    ErrorClass::StructureChanged,
                    format!("no selector matched on {page}"),
                )),
            }
        }
        Ok(out)
    }

    fn normalize(&self, raw: PageItem) -> Result<Record, SourceError> {
        let title = clean_text(&raw.title, TITLE_MAX_CHARS);
        if title.is_empty() {
            return Err(SourceError::malformed_item("page item has no title"));
        }
        let content = format!("{}: {}", self.content_prefix, title);
        Ok(Record::new(title, content, SOURCE_NAME, raw.url))
    }
}
