use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::DownloadSection;
use crate::error::{HarnessError, HarnessResult};

/// One tracked comic in the extension's import/export payload.
///
/// The exporter adds a storage-assigned `id`; importable payloads omit
/// it, and comparisons ignore it (see [`normalized`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub label: String,
    pub chapter: Vec<String>,
    pub page: Option<String>,
    #[serde(rename = "_sources")]
    pub sources: Vec<TrackingSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingSource {
    pub name: String,
    pub reader: String,
    pub info: SourceInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub id: String,
    pub has_updates: bool,
}

pub fn load_entries<P: AsRef<Path>>(path: P) -> HarnessResult<Vec<TrackingEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_entries<P: AsRef<Path>>(path: P, entries: &[TrackingEntry]) -> HarnessResult<()> {
    let raw = serde_json::to_string(entries)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// Canonical form for round-trip comparison: storage-assigned ids
/// stripped, entries sorted by their unique labels.
pub fn normalized(mut entries: Vec<TrackingEntry>) -> Vec<TrackingEntry> {
    for entry in &mut entries {
        entry.id = None;
    }
    entries.sort_by(|a, b| a.label.cmp(&b.label));
    entries
}

/// Whether two payloads describe the same tracked state, ignoring ids
/// and entry order.
pub fn entries_equivalent(a: Vec<TrackingEntry>, b: Vec<TrackingEntry>) -> bool {
    normalized(a) == normalized(b)
}

fn exported_files(dir: &Path) -> HashSet<PathBuf> {
    let pattern = dir.join("bmc-data*.json");
    glob::glob(&pattern.to_string_lossy())
        .map(|paths| paths.flatten().collect())
        .unwrap_or_default()
}

/// Snapshot of the download directory, taken before triggering an
/// export so the new file can be told apart from older ones.
pub fn snapshot_downloads(downloads: &DownloadSection) -> HarnessResult<HashSet<PathBuf>> {
    let dir = downloads.dir.as_deref().ok_or_else(|| {
        HarnessError::Configuration("download directory not configured".to_string())
    })?;
    Ok(exported_files(dir))
}

/// Polls the download directory until a new `bmc-data*.json` shows up.
/// Browser downloads have no completion signal reachable from the
/// automation layer, so this is the only portable option.
pub async fn wait_for_download(
    downloads: &DownloadSection,
    before: &HashSet<PathBuf>,
) -> HarnessResult<PathBuf> {
    let dir = downloads.dir.as_deref().ok_or_else(|| {
        HarnessError::Configuration("download directory not configured".to_string())
    })?;
    let deadline = Instant::now() + Duration::from_secs(downloads.poll_secs);
    loop {
        let after = exported_files(dir);
        if let Some(fresh) = after.difference(before).next() {
            debug!(path = %fresh.display(), "export download completed");
            return Ok(fresh.clone());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Timeout(
                "bmc-data*.json export download".to_string(),
            ));
        }
        sleep(Duration::from_secs(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<TrackingEntry> {
        vec![
            TrackingEntry {
                id: None,
                label: "LABEL2".to_string(),
                chapter: vec!["3".to_string()],
                page: None,
                sources: vec![TrackingSource {
                    name: "a5".to_string(),
                    reader: "localhost".to_string(),
                    info: SourceInfo {
                        id: "a5".to_string(),
                        has_updates: true,
                    },
                }],
            },
            TrackingEntry {
                id: None,
                label: "LABEL1".to_string(),
                chapter: vec!["2".to_string()],
                page: None,
                sources: vec![TrackingSource {
                    name: "a2".to_string(),
                    reader: "localhost".to_string(),
                    info: SourceInfo {
                        id: "a2".to_string(),
                        has_updates: true,
                    },
                }],
            },
        ]
    }

    #[test]
    fn sources_serialize_under_their_underscore_key() {
        let raw = serde_json::to_value(&sample()[0]).unwrap();
        assert!(raw.get("_sources").is_some());
        assert!(raw.get("id").is_none());
    }

    #[test]
    fn payload_deserializes_with_export_ids() {
        let raw = json!([{
            "id": "generated-0",
            "label": "LABEL1",
            "chapter": ["2"],
            "page": null,
            "_sources": [
                {"name": "a1", "reader": "localhost", "info": {"id": "a1", "has_updates": false}}
            ]
        }]);
        let entries: Vec<TrackingEntry> = serde_json::from_value(raw).unwrap();
        assert_eq!(entries[0].id, Some(json!("generated-0")));
        assert_eq!(entries[0].sources[0].info.id, "a1");
    }

    #[test]
    fn equivalence_ignores_ids_and_order() {
        let mut exported = sample();
        exported[0].id = Some(json!("x1"));
        exported[1].id = Some(json!("x2"));
        exported.reverse();
        assert!(entries_equivalent(exported, sample()));
    }

    #[test]
    fn equivalence_sees_content_changes() {
        let mut changed = sample();
        changed[0].chapter = vec!["4".to_string()];
        assert!(!entries_equivalent(changed, sample()));
    }
}
