//! Media library adapters.
//!
//! [`YamlLibrary`] backs the host binary: rules and media live in one YAML
//! document that is re-read on every rule fetch, `last-used-at` updates are
//! written back in place and history goes to an append-only JSON-lines file.
//! [`MemoryLibrary`] keeps everything in process for the dry run and tests.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rule_model::{HistoryEntry, MediaRecord, Rule};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::collaborators::MediaLibrary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LibraryDocument {
    pub rules: Vec<Rule>,
    pub media: Vec<MediaRecord>,
}

impl LibraryDocument {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read media library {}", path.display()))?;
        serde_yaml::from_str(&s)
            .with_context(|| format!("failed to parse media library {}", path.display()))
    }

    fn pool(&self, collection_id: Option<&str>) -> Vec<MediaRecord> {
        match collection_id {
            Some(id) => self
                .media
                .iter()
                .filter(|media| media.in_collection(id))
                .cloned()
                .collect(),
            None => self.media.clone(),
        }
    }

    /// Replaces the stored record with the same id. Returns false if unknown.
    fn replace(&mut self, media: &MediaRecord) -> bool {
        match self.media.iter_mut().find(|m| m.id == media.id) {
            Some(slot) => {
                *slot = media.clone();
                true
            }
            None => false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct YamlLibrary {
    path: PathBuf,
    history_path: Option<PathBuf>,
    document: Mutex<LibraryDocument>,
}

impl YamlLibrary {
    pub fn open(path: impl Into<PathBuf>, history_path: Option<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = LibraryDocument::from_yaml_file(&path)?;
        info!(
            path = %path.display(),
            rules = document.rules.len(),
            media = document.media.len(),
            "loaded media library"
        );
        Ok(Self {
            path,
            history_path,
            document: Mutex::new(document),
        })
    }

    pub fn snapshot(&self) -> LibraryDocument {
        lock(&self.document).clone()
    }

    fn reload(&self) -> Result<()> {
        let fresh = LibraryDocument::from_yaml_file(&self.path)?;
        *lock(&self.document) = fresh;
        Ok(())
    }

    fn write_back(&self, document: &LibraryDocument) -> Result<()> {
        let yaml = serde_yaml::to_string(document).context("failed to serialize media library")?;
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl MediaLibrary for YamlLibrary {
    fn fetch_rules(&self) -> Result<Vec<Rule>> {
        self.reload()?;
        Ok(lock(&self.document).rules.clone())
    }

    fn fetch_media_pool(&self, collection_id: Option<&str>) -> Result<Vec<MediaRecord>> {
        Ok(lock(&self.document).pool(collection_id))
    }

    fn save(&self, media: &MediaRecord) -> Result<()> {
        let mut document = lock(&self.document);
        if !document.replace(media) {
            anyhow::bail!("media {} is not in the library", media.id);
        }
        self.write_back(&document)?;
        debug!(media = %media.id, "persisted media record");
        Ok(())
    }

    fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        let Some(path) = &self.history_path else {
            debug!(media = %entry.media_id, result = ?entry.result, "history file not configured");
            return Ok(());
        };
        let mut line = serde_json::to_string(&entry).context("failed to encode history entry")?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open history file {}", path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        Ok(())
    }
}

/// In-process library. Saves and history stay in memory.
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    document: Mutex<LibraryDocument>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl MemoryLibrary {
    pub fn new(rules: Vec<Rule>, media: Vec<MediaRecord>) -> Self {
        Self::from_document(LibraryDocument { rules, media })
    }

    pub fn from_document(document: LibraryDocument) -> Self {
        Self {
            document: Mutex::new(document),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn media(&self, id: &str) -> Option<MediaRecord> {
        lock(&self.document)
            .media
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        lock(&self.history).clone()
    }

    pub fn set_rules(&self, rules: Vec<Rule>) {
        lock(&self.document).rules = rules;
    }
}

impl MediaLibrary for MemoryLibrary {
    fn fetch_rules(&self) -> Result<Vec<Rule>> {
        Ok(lock(&self.document).rules.clone())
    }

    fn fetch_media_pool(&self, collection_id: Option<&str>) -> Result<Vec<MediaRecord>> {
        Ok(lock(&self.document).pool(collection_id))
    }

    fn save(&self, media: &MediaRecord) -> Result<()> {
        if !lock(&self.document).replace(media) {
            anyhow::bail!("media {} is not in the library", media.id);
        }
        Ok(())
    }

    fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        lock(&self.history).push(entry);
        Ok(())
    }
}
