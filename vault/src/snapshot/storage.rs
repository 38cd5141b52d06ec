use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::snapshot::models::Document;

/// Summary of a stored snapshot, cheap enough to show in listings.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub id: String,
    pub guild_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub roles: usize,
    pub channels: usize,
    pub emojis: usize,
    pub bans: usize,
}

/// File-backed snapshot store: one pretty-printed JSON document per
/// opaque identifier. Identifiers are never reused after deletion.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        // Identifiers are opaque but they become file names; anything
        // that could escape the store directory is rejected outright.
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(Error::NotFound(format!("snapshot {id}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    pub fn save(&self, document: &Document) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&document.id)?;
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&path, json)?;
        info!(id = %document.id, path = %path.display(), "snapshot saved");
        Ok(path)
    }

    pub fn load(&self, id: &str) -> Result<Document> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("snapshot {id}")));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Identifiers of every stored snapshot. A missing store directory
    /// is an empty store, not an error.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(Error::NotFound(format!("snapshot {id}")));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    pub fn info(&self, id: &str) -> Result<SnapshotInfo> {
        let document = self.load(id)?;
        let size_bytes = fs::metadata(self.path_for(id)?)?.len();
        let channels = document.channels.others.len()
            + document
                .channels
                .categories
                .iter()
                .map(|c| 1 + c.children.len())
                .sum::<usize>();
        Ok(SnapshotInfo {
            id: document.id,
            guild_id: document.guild_id,
            name: document.name,
            created_at: document.created_at,
            size_bytes,
            roles: document.roles.len(),
            channels,
            emojis: document.emojis.len(),
            bans: document.bans.len(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
