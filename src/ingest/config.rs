// src/ingest/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::retry::RetryPolicy;

const ENV_PATH: &str = "INGEST_CONFIG_PATH";
const ENV_API_KEY: &str = "NEWSAPI_API_KEY";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub output_path: PathBuf,
    pub retry: RetryPolicy,
    pub newsapi: NewsApiConfig,
    pub csv: CsvConfig,
    pub web: WebConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output/articles.json"),
            retry: RetryPolicy::default(),
            newsapi: NewsApiConfig::default(),
            csv: CsvConfig::default(),
            web: WebConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    pub enabled: bool,
    pub base_url: String,
    /// "ENV" (or absent) means: read from NEWSAPI_API_KEY.
    pub api_key: Option<String>,
    pub query: String,
    pub language: String,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://newsapi.org/v2/everything".to_string(),
            api_key: None,
            query: "India".to_string(),
            language: "en".to_string(),
            page_size: 5,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub enabled: bool,
    pub path: PathBuf,
    /// Tried in order; labels as understood by `encoding_rs` (WHATWG labels).
    pub encodings: Vec<String>,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("sample_data.csv"),
            encodings: vec![
                "utf-8".to_string(),
                "windows-1252".to_string(),
                "iso-8859-15".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    pub urls: Vec<String>,
    /// CSS selectors in priority order; the first one with matches wins.
    pub selectors: Vec<String>,
    pub max_items: usize,
    pub timeout_secs: u64,
    pub politeness_delay_ms: u64,
    pub user_agent: String,
    pub content_prefix: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            urls: vec!["https://www.bbc.com/news/world/asia/india".to_string()],
            selectors: vec![
                "h2[data-testid]".to_string(),
                "a.sc-4fedabbc-3".to_string(),
                "article h3".to_string(),
            ],
            max_items: 3,
            timeout_secs: 10,
            politeness_delay_ms: 1_000,
            user_agent: "multi-source-ingest/0.1 (educational; polite crawler)".to_string(),
            content_prefix: "News from BBC India".to_string(),
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $INGEST_CONFIG_PATH
/// 2) config/ingest.toml
/// 3) config/ingest.json
/// 4) built-in defaults
///
/// Environment overrides are applied on top in every case.
pub fn load_config_default() -> Result<IngestConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/ingest.toml");
        let json_p = PathBuf::from("config/ingest.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            IngestConfig::default()
        }
    };
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok())?;
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = toml::from_str(s) {
                return Ok(v);
            }
            serde_json::from_str(s).map_err(|_| anyhow!("unsupported config format"))
        }
    }
}

/// Apply process-environment overrides. `lookup` is `std::env::var` in
/// production; tests pass a map.
pub fn apply_env_overrides<F>(cfg: &mut IngestConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

    if let Some(v) = non_empty("OUTPUT_FILE_PATH") {
        cfg.output_path = PathBuf::from(v);
    }
    if let Some(v) = non_empty("CSV_FILE_PATH") {
        cfg.csv.path = PathBuf::from(v);
    }
    if let Some(v) = non_empty("NEWSAPI_TIMEOUT") {
        cfg.newsapi.timeout_secs = parse_secs("NEWSAPI_TIMEOUT", &v)?;
    }
    if let Some(v) = non_empty("WEB_SCRAPER_TIMEOUT") {
        cfg.web.timeout_secs = parse_secs("WEB_SCRAPER_TIMEOUT", &v)?;
    }

    // Resolve api key if "ENV" or absent
    let wants_env = cfg
        .newsapi
        .api_key
        .as_deref()
        .map(|k| k.trim().is_empty() || k.trim().eq_ignore_ascii_case("env"))
        .unwrap_or(true);
    if wants_env {
        cfg.newsapi.api_key = non_empty(ENV_API_KEY);
    }
    Ok(())
}

fn parse_secs(key: &str, v: &str) -> Result<u64> {
    match v.trim().parse::<u64>() {
        Ok(0) => bail!("{key} must be a positive number of seconds"),
        Ok(n) => Ok(n),
        Err(e) => Err(anyhow!("{key}={v:?} is not a number of seconds: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::{env, fs};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn toml_sections_override_defaults() {
        let toml = r#"
output_path = "out/all.json"

[retry]
max_attempts = 5

[csv]
path = "data/news.csv"

[web]
max_items = 2
selectors = ["div.card h3"]
"#;
        let cfg = parse_config(toml, "toml").unwrap();
        assert_eq!(cfg.output_path, PathBuf::from("out/all.json"));
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.base_delay_ms, 2_000);
        assert_eq!(cfg.csv.path, PathBuf::from("data/news.csv"));
        assert_eq!(cfg.csv.encodings.len(), 3);
        assert_eq!(cfg.web.max_items, 2);
        assert_eq!(cfg.web.selectors, vec!["div.card h3".to_string()]);
        assert_eq!(cfg.newsapi.query, "India");
    }

    #[test]
    fn json_without_extension_hint_parses() {
        let cfg = parse_config(r#"{"newsapi": {"page_size": 9}}"#, "").unwrap();
        assert_eq!(cfg.newsapi.page_size, 9);
    }

    #[test]
    fn env_overrides_and_api_key_resolution() {
        let mut cfg = IngestConfig::default();
        cfg.newsapi.api_key = Some("ENV".to_string());
        apply_env_overrides(
            &mut cfg,
            lookup(&[
                ("NEWSAPI_API_KEY", "k-123"),
                ("OUTPUT_FILE_PATH", "/tmp/out.json"),
                ("WEB_SCRAPER_TIMEOUT", "4"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.newsapi.api_key.as_deref(), Some("k-123"));
        assert_eq!(cfg.output_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(cfg.web.timeout_secs, 4);
    }

    #[test]
    fn explicit_api_key_is_kept_and_missing_key_stays_none() {
        let mut cfg = IngestConfig::default();
        cfg.newsapi.api_key = Some("inline".to_string());
        apply_env_overrides(&mut cfg, lookup(&[("NEWSAPI_API_KEY", "env-key")])).unwrap();
        assert_eq!(cfg.newsapi.api_key.as_deref(), Some("inline"));

        let mut cfg = IngestConfig::default();
        apply_env_overrides(&mut cfg, lookup(&[])).unwrap();
        assert!(cfg.newsapi.api_key.is_none());
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let mut cfg = IngestConfig::default();
        let err = apply_env_overrides(&mut cfg, lookup(&[("NEWSAPI_TIMEOUT", "soon")]));
        assert!(err.is_err());
        let err = apply_env_overrides(&mut cfg, lookup(&[("NEWSAPI_TIMEOUT", "0")]));
        assert!(err.is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so a real config/ in the repo does not leak in
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        env::remove_var(ENV_PATH);

        // No files → defaults
        let v = load_config_default().unwrap();
        assert_eq!(v.web.max_items, 3);

        // Fallback TOML in ./config/
        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/ingest.toml"),
            "[web]\nmax_items = 1\n",
        )
        .unwrap();
        assert_eq!(load_config_default().unwrap().web.max_items, 1);

        // Env path wins
        let p_json = tmp.path().join("other.json");
        fs::write(&p_json, r#"{"web": {"max_items": 7}}"#).unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        assert_eq!(load_config_default().unwrap().web.max_items, 7);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_config_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
