// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod error;
pub mod ingest;
pub mod output;
pub mod record;
pub mod retry;

// ---- Re-exports for stable public API ----
pub use crate::error::{ErrorClass, Scope, SourceError};
pub use crate::ingest::run_once;
pub use crate::ingest::types::{
    IngestReport, OutcomeStatus, Retrieved, Source, SourceOutcome, SourceProvider,
};
pub use crate::record::{validate, Record, URL_NOT_AVAILABLE};
pub use crate::retry::{Decision, RetryPolicy};

use tracing::info;

/// Load config, build the configured sources, run them once and write the
/// merged records. Per-source failures are reported in the returned
/// [`IngestReport`], never as an `Err`.
pub async fn run_configured(cfg: &ingest::config::IngestConfig) -> anyhow::Result<IngestReport> {
    let providers = ingest::providers::build_providers(cfg)?;
    info!(sources = providers.len(), "starting ingest run");

    let report = run_once(&providers, &cfg.retry).await;
    ingest::log_summary(&report);
    output::write_records(&cfg.output_path, &report.records)?;
    Ok(report)
}
