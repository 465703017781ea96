//! JSON-backed reading positions, one entry per text.

use crate::conductor::ProgressStore;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Saved position for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Character offset of the last shown token.
    pub position: usize,
    /// Last fractional jump, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Seconds since the Unix epoch.
    pub updated_at: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressFile {
    #[serde(default)]
    entries: BTreeMap<String, ProgressEntry>,
}

/// Stable identifier for a text (64-bit FNV-1a, hex).
pub fn fingerprint(text: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = text
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    format!("{hash:016x}")
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persists positions for one text into a shared JSON file.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
    key: String,
}

impl FileProgressStore {
    /// Store for `text` inside the file at `path`.
    pub fn new(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            key: fingerprint(text),
        }
    }

    /// `~/.local/share/flow-rsvp/progress.json` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flow-rsvp")
            .join("progress.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved entry for this text, if any.
    pub fn load_entry(&self) -> Result<Option<ProgressEntry>> {
        Ok(self.read()?.entries.remove(&self.key))
    }

    /// Saved position for this text, if any.
    pub fn load_position(&self) -> Result<Option<usize>> {
        Ok(self.load_entry()?.map(|entry| entry.position))
    }

    fn read(&self) -> Result<ProgressFile> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProgressFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut ProgressEntry)) -> Result<()> {
        let mut file = self.read()?;
        let entry = file
            .entries
            .entry(self.key.clone())
            .or_insert(ProgressEntry {
                position: 0,
                progress: None,
                updated_at: 0,
            });
        apply(entry);
        entry.updated_at = now_secs();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&file)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ProgressStore for FileProgressStore {
    fn save_progress(&mut self, position: usize, is_user_action: bool) {
        debug!(position, is_user_action, path = %self.path.display(), "writing progress");
        if let Err(e) = self.update(|entry| entry.position = position) {
            warn!("Failed to save reading position: {e}");
        }
    }

    fn jump(&mut self, progress: f64) {
        if let Err(e) = self.update(|entry| entry.progress = Some(progress)) {
            warn!("Failed to save reading progress: {e}");
        }
    }
}
