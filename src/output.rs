// src/output.rs
use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::record::Record;

/// Write records as a pretty-printed JSON array, creating parent dirs.
/// An empty slice still writes `[]`.
pub fn write_records(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, records).context("serializing records")?;
    w.write_all(b"\n")?;
    w.flush().with_context(|| format!("writing {}", path.display()))?;

    tracing::info!(count = records.len(), path = %path.display(), "saved records");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_array_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested/out/articles.json");
        let recs = vec![Record::new("Tĩtle", "body", "csv", Some("https://a.test".into()))];
        write_records(&p, &recs).unwrap();

        let text = fs::read_to_string(&p).unwrap();
        assert!(text.contains("Tĩtle"), "non-ASCII must be kept verbatim");
        let back: Vec<Record> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), 1);
        assert!(back[0].same_payload(&recs[0]));
    }

    #[test]
    fn empty_run_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("empty.json");
        write_records(&p, &[]).unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap().trim(), "[]");
    }
}
