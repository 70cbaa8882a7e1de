use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::{format_mem, Totals};

/// The published cache record read by the status bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seconds since the Unix epoch at generation time
    pub ts: f64,
    /// pane id -> formatted memory
    pub pane: BTreeMap<String, String>,
    /// "session:window_index" -> formatted memory
    pub window: BTreeMap<String, String>,
    /// Formatted memory across all panes
    pub total: String,
}

impl Snapshot {
    pub fn from_totals(totals: &Totals, at: SystemTime) -> Self {
        let ts = at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        Self {
            ts,
            pane: format_all(&totals.panes),
            window: format_all(&totals.windows),
            total: format_mem(totals.grand_total),
        }
    }
}

fn format_all(values: &BTreeMap<String, f64>) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|(k, &v)| (k.clone(), format_mem(v)))
        .collect()
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read the published snapshot
pub fn read_snapshot(path: &Path) -> Result<Snapshot, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `path` was modified less than `window` ago.
///
/// A missing file is stale. A modification time in the future counts as fresh.
pub fn is_fresh(path: &Path, window: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age < window,
        Err(_) => true,
    }
}

/// Atomically replace `path` with `snapshot`.
///
/// Writes a sibling temp file and renames it over `path`, so readers see
/// either the old or the new record in full.
pub fn publish(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let tmp = temp_path(path);

    if let Err(e) = write_json(&tmp, snapshot) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to rename into {}", path.display()));
    }

    Ok(())
}

fn write_json(tmp: &Path, snapshot: &Snapshot) -> Result<()> {
    let file =
        File::create(tmp).with_context(|| format!("Failed to create {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot).context("Failed to serialize snapshot")?;
    writer.flush().context("Failed to flush snapshot")?;
    writer
        .get_ref()
        .sync_all()
        .context("Failed to sync snapshot")?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
