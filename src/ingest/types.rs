// src/ingest/types.rs
use async_trait::async_trait;
use serde::Serialize;

use crate::error::SourceError;
use crate::record::Record;

/// What one successful `retrieve()` call yields: the raw items plus any
/// non-fatal, classified observations (skipped rows, missing selectors).
#[derive(Debug)]
pub struct Retrieved<R> {
    pub items: Vec<R>,
    pub issues: Vec<SourceError>,
}

impl<R> Retrieved<R> {
    pub fn new(items: Vec<R>) -> Self {
        Self {
            items,
            issues: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// One origin of raw data. `retrieve` is the only call that is retried;
/// `normalize` is applied once per raw item after retrieval succeeded.
#[async_trait]
pub trait Source: Send + Sync {
    type Raw: Send;

    fn name(&self) -> &'static str;

    async fn retrieve(&self) -> Result<Retrieved<Self::Raw>, SourceError>;

    /// Fails only with item-level `Malformed`.
    fn normalize(&self, raw: Self::Raw) -> Result<Record, SourceError>;
}

/// Retrieval output after per-item normalization, raw type erased.
#[derive(Debug)]
pub struct Harvest {
    pub candidates: Vec<Result<Record, SourceError>>,
    pub issues: Vec<SourceError>,
}

/// Object-safe view of a [`Source`], so an ordered `Vec<Box<dyn SourceProvider>>`
/// can mix origins with different raw item types.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One retrieval attempt followed by normalization of every item.
    async fn harvest(&self) -> Result<Harvest, SourceError>;
}

#[async_trait]
impl<S: Source> SourceProvider for S {
    fn name(&self) -> &'static str {
        Source::name(self)
    }

    async fn harvest(&self) -> Result<Harvest, SourceError> {
        let Retrieved { items, issues } = self.retrieve().await?;
        let candidates = items.into_iter().map(|raw| self.normalize(raw)).collect();
        Ok(Harvest { candidates, issues })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Succeeded,
    SucceededPartial,
    FailedFast,
    Exhausted,
}

/// Per-source terminal summary. Reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub count: usize,
    pub skipped: usize,
    pub attempts: u32,
    pub status: OutcomeStatus,
    pub cause: Option<String>,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub records: Vec<Record>,
    pub outcomes: Vec<SourceOutcome>,
}

impl IngestReport {
    pub fn outcome(&self, source: &str) -> Option<&SourceOutcome> {
        self.outcomes.iter().find(|o| o.source == source)
    }

    pub fn records_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.source == source)
    }
}
