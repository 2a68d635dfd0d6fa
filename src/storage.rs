//! On-disk storage for reviewed results: one pretty JSON file per save.

use crate::collaborator::Persistence;
use crate::model::{SavedResult, WizardSettings};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Directory holding saved results, honouring the configured override.
pub fn results_dir(settings: &WizardSettings) -> Result<PathBuf> {
    if let Some(dir) = settings.data_dir.as_ref() {
        return Ok(dir.join("results"));
    }
    let base = dirs::data_local_dir().context("no local data directory on this platform")?;
    Ok(base.join("nusantarago-wizard").join("results"))
}

fn file_name(record: &SavedResult) -> String {
    format!(
        "{}-{}-{}.json",
        record.wizard,
        record.saved_at_utc.replace(':', "-"),
        record.id
    )
}

pub fn save_result(dir: &Path, record: &SavedResult) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(file_name(record));
    export_json(&path, record)?;
    Ok(path)
}

pub fn export_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_vec_pretty(value).context("serialize JSON")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Most recent results first. Unreadable files are skipped.
pub fn load_recent(dir: &Path, limit: usize) -> Result<Vec<SavedResult>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        if let Ok(record) = serde_json::from_slice::<SavedResult>(&bytes) {
            out.push(record);
        }
    }
    out.sort_by(|a, b| b.saved_at_utc.cmp(&a.saved_at_utc));
    out.truncate(limit);
    Ok(out)
}

pub fn delete_result(dir: &Path, record: &SavedResult) -> Result<()> {
    let path = dir.join(file_name(record));
    std::fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))
}

/// Persistence collaborator backed by [`save_result`].
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl Persistence for JsonFilePersistence {
    async fn save(&self, record: &SavedResult) -> Result<()> {
        let dir = self.dir.clone();
        let record = record.clone();
        let path = tokio::task::spawn_blocking(move || save_result(&dir, &record))
            .await
            .context("storage task failed")??;
        tracing::debug!(path = %path.display(), "result saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, at: &str) -> SavedResult {
        SavedResult {
            id: id.to_string(),
            wizard: "bnpl".to_string(),
            saved_at_utc: at.to_string(),
            draft: json!({"amount": 1}),
            result: json!({"total_amount": 1}),
        }
    }

    #[test]
    fn load_recent_orders_newest_first_and_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("results");
        save_result(&dir, &record("a", "2026-01-01T00:00:00Z")).unwrap();
        save_result(&dir, &record("b", "2026-03-01T00:00:00Z")).unwrap();
        save_result(&dir, &record("c", "2026-02-01T00:00:00Z")).unwrap();
        std::fs::write(dir.join("junk.json"), b"not json").unwrap();

        let recent = load_recent(&dir, 2).unwrap();
        let ids: Vec<_> = recent.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn delete_removes_the_saved_file() {
        let tmp = tempfile::tempdir().unwrap();
        let rec = record("x", "2026-01-01T00:00:00Z");
        save_result(tmp.path(), &rec).unwrap();
        delete_result(tmp.path(), &rec).unwrap();
        assert!(load_recent(tmp.path(), 10).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_empty_history() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_recent(&tmp.path().join("nope"), 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_persistence_writes_into_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFilePersistence::new(tmp.path().to_path_buf());
        store.save(&record("p", "2026-05-05T10:00:00Z")).await.unwrap();
        assert_eq!(load_recent(tmp.path(), 5).unwrap().len(), 1);
    }
}
