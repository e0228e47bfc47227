// src/ingest/providers/csv_file.rs
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use metrics::histogram;

use crate::error::SourceError;
use crate::ingest::config::CsvConfig;
use crate::ingest::types::{Retrieved, Source};
use crate::ingest::{clean_text, CONTENT_MAX_CHARS, TITLE_MAX_CHARS};
use crate::record::Record;

pub const SOURCE_NAME: &str = "csv";
const REQUIRED_COLUMNS: [&str; 3] = ["title", "content", "url"];

/// One data row that carried both mandatory fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// 1-based line of the row in the file (header is line 1).
    pub row: usize,
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Local delimited file with a `title,content,url` header.
pub struct CsvFileSource {
    path: PathBuf,
    encodings: Vec<&'static Encoding>,
}

impl CsvFileSource {
    pub fn from_config(cfg: &CsvConfig) -> Result<Self> {
        let encodings = cfg
            .encodings
            .iter()
            .map(|label| {
                Encoding::for_label(label.trim().as_bytes())
                    .ok_or_else(|| anyhow!("unknown csv encoding label {label:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if encodings.is_empty() {
            return Err(anyhow!("csv source needs at least one encoding"));
        }
        Ok(Self::new(&cfg.path, encodings))
    }

    pub fn new(path: impl AsRef<Path>, encodings: Vec<&'static Encoding>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            encodings,
        }
    }

    /// First encoding under which the whole file decodes cleanly.
    fn decode<'a>(&self, bytes: &'a [u8]) -> Result<(Cow<'a, str>, &'static Encoding), SourceError> {
        for enc in &self.encodings {
            let body = if *enc == UTF_8 {
                bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
            } else {
                bytes
            };
            if let Some(text) = enc.decode_without_bom_handling_and_without_replacement(body) {
                return Ok((text, *enc));
            }
            tracing::debug!(source = SOURCE_NAME, encoding = enc.name(), "decode failed, trying next");
        }
        let tried: Vec<&str> = self.encodings.iter().map(|e| e.name()).collect();
        Err(SourceError::malformed_resource(format!(
            "{} does not decode under any of {tried:?}",
            self.path.display()
        )))
    }

    fn parse(&self, text: &str) -> Result<Retrieved<CsvRow>, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| SourceError::malformed_resource(format!("csv header unreadable: {e}")))?
            .clone();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(SourceError::malformed_resource("csv file is empty"));
        }

        let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| column(c).is_none())
            .collect();
        if !missing.is_empty() {
            // Detected before any row is read: nothing to salvage, but not fatal.
            return Err(SourceError::not_found(format!(
                "csv missing required columns: {}",
                missing.join(", ")
            )));
        }
        let (i_title, i_content, i_url) = match (column("title"), column("content"), column("url")) {
            (Some(t), Some(c), Some(u)) => (t, c, u),
            _ => return Err(SourceError::malformed_resource("csv header lookup failed")),
        };

        let mut out = Retrieved::empty();
        for rec in reader.records() {
            // File line where the record starts; blank lines and quoted
            // newlines make this differ from the record ordinal.
            let line = match &rec {
                Ok(r) => r.position().map(|p| p.line()),
                Err(e) => e.position().map(|p| p.line()),
            };
            let row = line.map_or(0, |l| l as usize);
            let rec = match rec {
                Ok(r) => r,
                Err(e) => {
                    out.issues
                        .push(SourceError::malformed_item(format!("row {row}: unreadable: {e}")));
                    continue;
                }
            };
            if rec.iter().all(|f| f.is_empty()) {
                out.issues
                    .push(SourceError::malformed_item(format!("row {row}: empty row")));
                continue;
            }

            let field = |idx: usize| rec.get(idx).unwrap_or_default().to_string();
            let (title, content, url) = (field(i_title), field(i_content), field(i_url));
            if title.is_empty() || content.is_empty() {
                out.issues.push(SourceError::malformed_item(format!(
                    "row {row}: missing title or content"
                )));
                continue;
            }
            out.items.push(CsvRow {
                row,
                title,
                content,
                url,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl Source for CsvFileSource {
    type Raw = CsvRow;

    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn retrieve(&self) -> Result<Retrieved<CsvRow>, SourceError> {
        tracing::info!(source = SOURCE_NAME, path = %self.path.display(), "reading csv");

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SourceError::not_found(format!(
                    "csv file not found: {}",
                    self.path.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(SourceError::unauthorized(format!(
                    "csv file not readable: {}: {e}",
                    self.path.display()
                )))
            }
            Err(e) => {
                return Err(SourceError::malformed_resource(format!(
                    "reading {}: {e}",
                    self.path.display()
                )))
            }
        };

        let t0 = std::time::Instant::now();
        let (text, encoding) = self.decode(&bytes)?;
        let out = self.parse(&text)?;
        histogram!("ingest_parse_ms", "source" => SOURCE_NAME)
            .record(t0.elapsed().as_secs_f64() * 1_000.0);

        tracing::info!(
            source = SOURCE_NAME,
            encoding = encoding.name(),
            rows = out.items.len(),
            skipped = out.issues.len(),
            "csv parsed"
        );
        Ok(out)
    }

    fn normalize(&self, raw: CsvRow) -> Result<Record, SourceError> {
        let title = clean_text(&raw.title, TITLE_MAX_CHARS);
        let content = clean_text(&raw.content, CONTENT_MAX_CHARS);
        if title.is_empty() || content.is_empty() {
            return Err(SourceError::malformed_item(format!(
                "row {}: title or content empty after cleanup",
                raw.row
            )));
        }
        let url = Some(raw.url).filter(|u| !u.is_empty());
        Ok(Record::new(title, content, SOURCE_NAME, url))
    }
}
