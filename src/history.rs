use crate::{eid::Eid, podcasts::Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchOutcome {
    Created,
    Refreshed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchHistoryEntry {
    pub id: String,
    pub user: String,
    pub url: String,
    pub platform: Platform,
    pub external_id: String,
    pub outcome: FetchOutcome,
    pub fetched_at: DateTime<Utc>,
}

impl FetchHistoryEntry {
    pub fn new(
        user: &str,
        url: &str,
        platform: Platform,
        external_id: &str,
        outcome: FetchOutcome,
    ) -> Self {
        Self {
            id: Eid::new().to_string(),
            user: user.to_string(),
            url: url.to_string(),
            platform,
            external_id: external_id.to_string(),
            outcome,
            fetched_at: Utc::now(),
        }
    }
}

/// Append-only fetch log. This is a secondary write: callers log append
/// failures and carry on, they never fail the primary operation over it.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Arc<RwLock<Vec<FetchHistoryEntry>>>,
    path: PathBuf,
}

impl HistoryLog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let entries: Vec<FetchHistoryEntry> = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(HistoryLog {
            entries: Arc::new(RwLock::new(entries)),
            path: path.to_path_buf(),
        })
    }

    pub fn append(&self, entry: FetchHistoryEntry) -> anyhow::Result<()> {
        self.entries.write().unwrap().push(entry);

        let entries = self.entries.read().unwrap();
        let tmp_path = self.path.with_extension("json-tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&*entries)?)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn for_user(&self, user: &str) -> Vec<FetchHistoryEntry> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.user == user)
            .cloned()
            .collect()
    }
}
