//! Multi-source ingest — Binary Entrypoint
//! Loads config, runs every configured source once, writes the merged JSON
//! and logs a per-source summary.
//!
//! Exit status reflects whether the process itself failed (config, output
//! write), not whether individual sources degraded.

use multi_source_ingest::ingest::config::load_config_default;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact human logs by default; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = load_config_default()?;
    let report = multi_source_ingest::run_configured(&cfg).await?;

    tracing::info!(
        records = report.records.len(),
        output = %cfg.output_path.display(),
        "done"
    );
    Ok(())
}
