// src/ingest/mod.rs
pub mod config;
pub mod providers;
pub mod types;

use std::any::Any;
use std::panic::AssertUnwindSafe;

use crate::error::SourceError;
use crate::ingest::types::{Harvest, IngestReport, OutcomeStatus, SourceOutcome, SourceProvider};
use crate::record::{validate, Record};
use crate::retry::{Decision, RetryPolicy};
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub const TITLE_MAX_CHARS: usize = 1_000;
pub const CONTENT_MAX_CHARS: usize = 50_000;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_records_total",
            "Records that passed validation, per source."
        );
        describe_counter!(
            "ingest_retries_total",
            "Retrieval attempts repeated after a retryable failure."
        );
        describe_counter!(
            "ingest_skipped_total",
            "Items dropped by row checks, normalization or validation."
        );
        describe_counter!(
            "ingest_source_failures_total",
            "Sources that ended FailedFast or Exhausted."
        );
        describe_histogram!("ingest_parse_ms", "Provider parse time in milliseconds.");
    });
}

/// Clean free text from any origin: decode entities, strip tags, fold
/// typographic quotes, collapse whitespace, cap at `max_chars`.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }

    out
}

/// Drive every provider once, in order, and merge what each yields.
///
/// Retrieval is retried according to `policy`; a provider that fails fast or
/// exhausts its budget contributes zero records and the run moves on.
/// Records keep provider order, then per-provider retrieval order.
pub async fn run_once(providers: &[Box<dyn SourceProvider>], policy: &RetryPolicy) -> IngestReport {
    ensure_metrics_described();

    let mut report = IngestReport::default();
    for p in providers {
        let (mut records, outcome) = run_provider(p.as_ref(), policy).await;

        tracing::info!(
            target: "ingest",
            source = %outcome.source,
            status = ?outcome.status,
            count = outcome.count,
            skipped = outcome.skipped,
            attempts = outcome.attempts,
            "source finished"
        );
        report.records.append(&mut records);
        report.outcomes.push(outcome);
    }
    report
}

async fn run_provider(p: &dyn SourceProvider, policy: &RetryPolicy) -> (Vec<Record>, SourceOutcome) {
    let name = p.name();
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let err = match AssertUnwindSafe(p.harvest()).catch_unwind().await {
            Ok(Ok(harvest)) => return finish(name, attempt, harvest),
            Ok(Err(e)) => e,
            Err(panic) => SourceError::from(anyhow::anyhow!(
                "source panicked: {}",
                panic_message(panic.as_ref())
            )),
        };

        let decision = match err.class() {
            Some(class) => policy.decide(class, attempt),
            None => Decision::FailFast,
        };

        match decision {
            Decision::RetryAfter(delay) => {
                tracing::warn!(
                    target: "ingest",
                    source = name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrieval failed, retrying"
                );
                counter!("ingest_retries_total", "source" => name).increment(1);
                tokio::time::sleep(delay).await;
            }
            Decision::SkipItem => {
                tracing::warn!(
                    target: "ingest",
                    source = name,
                    attempt,
                    error = %err,
                    "source yielded nothing"
                );
                return (
                    Vec::new(),
                    outcome(name, 0, 0, attempt, OutcomeStatus::Succeeded, Some(&err)),
                );
            }
            Decision::FailFast | Decision::Exhausted => {
                let status = if decision == Decision::Exhausted {
                    OutcomeStatus::Exhausted
                } else {
                    OutcomeStatus::FailedFast
                };
                tracing::error!(
                    target: "ingest",
                    source = name,
                    attempt,
                    status = ?status,
                    error = %err,
                    "source failed"
                );
                counter!("ingest_source_failures_total", "source" => name).increment(1);
                return (Vec::new(), outcome(name, 0, 0, attempt, status, Some(&err)));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn finish(name: &'static str, attempts: u32, harvest: Harvest) -> (Vec<Record>, SourceOutcome) {
    let Harvest { candidates, issues } = harvest;
    let mut skipped = 0usize;

    for issue in &issues {
        if issue.is_item_level() {
            skipped += 1;
        }
        tracing::warn!(target: "ingest", source = name, issue = %issue, "retrieval issue");
    }

    let mut records = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.into_iter().enumerate() {
        match candidate.and_then(validate) {
            Ok(r) => records.push(r),
            Err(e) => {
                skipped += 1;
                tracing::warn!(target: "ingest", source = name, item = index, error = %e, "skipping item");
            }
        }
    }

    counter!("ingest_records_total", "source" => name).increment(records.len() as u64);
    counter!("ingest_skipped_total", "source" => name).increment(skipped as u64);

    let status = if skipped == 0 {
        OutcomeStatus::Succeeded
    } else {
        OutcomeStatus::SucceededPartial
    };
    let cause = issues.iter().find(|i| !i.is_item_level());
    let out = outcome(name, records.len(), skipped, attempts, status, cause);
    (records, out)
}

fn outcome(
    name: &str,
    count: usize,
    skipped: usize,
    attempts: u32,
    status: OutcomeStatus,
    cause: Option<&SourceError>,
) -> SourceOutcome {
    SourceOutcome {
        source: name.to_string(),
        count,
        skipped,
        attempts,
        status,
        cause: cause.map(|e| e.to_string()),
    }
}

/// Log the per-source summary, one line per source plus a total.
pub fn log_summary(report: &IngestReport) {
    for o in &report.outcomes {
        tracing::info!(
            target: "ingest",
            source = %o.source,
            status = ?o.status,
            count = o.count,
            skipped = o.skipped,
            attempts = o.attempts,
            cause = o.cause.as_deref().unwrap_or("-"),
            "summary"
        );
    }
    tracing::info!(
        target: "ingest",
        total = report.records.len(),
        sources = report.outcomes.len(),
        "ingest run complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup_and_folds_whitespace() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>\n\t&ldquo;ok&rdquo;  ";
        assert_eq!(clean_text(s, 100), r#"Hello, world "ok""#);
    }

    #[test]
    fn clean_text_keeps_sentence_punctuation() {
        assert_eq!(clean_text("Rates rise again!", 100), "Rates rise again!");
    }

    #[test]
    fn clean_text_keeps_comparisons() {
        assert_eq!(clean_text("a < b and c > d", 100), "a < b and c > d");
    }

    #[test]
    fn clean_text_caps_by_chars() {
        let s = "é".repeat(20);
        assert_eq!(clean_text(&s, 5).chars().count(), 5);
    }
}
