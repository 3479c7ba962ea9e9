//! Per-account usage counters
//!
//! Successful upstream requests are counted per account name. A static
//! old-name -> new-name migration map is applied on every read and write so
//! account renames never strand historical counts. Counters optionally
//! persist to a small JSON file, best-effort: a write failure is logged and
//! the in-memory counters stay authoritative.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Renamed accounts: counters recorded under the old name accrue to the new.
const ACCOUNT_NAME_MIGRATIONS: &[(&str, &str)] = &[
    ("primary", "account-1"),
    ("backup", "account-2"),
];

/// Resolve an account name through the migration map.
pub fn canonical_account_name(name: &str) -> &str {
    for (old, new) in ACCOUNT_NAME_MIGRATIONS {
        if *old == name {
            return new;
        }
    }
    name
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatsFile {
    #[serde(default)]
    successes: HashMap<String, u64>,
}

/// Per-account success counters with optional JSON persistence
pub struct AccountStats {
    counters: Mutex<HashMap<String, u64>>,
    path: Option<PathBuf>,
}

impl AccountStats {
    /// Counters that live and die with the process
    pub fn in_memory() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Load historical counters from `path` (missing file is an empty
    /// start), applying name migrations so renamed accounts keep their
    /// history. Writes go back to the same file.
    pub fn load(path: &Path) -> Self {
        let mut merged: HashMap<String, u64> = HashMap::new();
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<StatsFile>(&bytes) {
                Ok(file) => {
                    for (name, count) in file.successes {
                        let canonical = canonical_account_name(&name).to_string();
                        *merged.entry(canonical).or_insert(0) += count;
                    }
                    info!(path = %path.display(), accounts = merged.len(), "loaded account stats");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable stats file, starting fresh");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read stats file, starting fresh");
            }
        }
        Self {
            counters: Mutex::new(merged),
            path: Some(path.to_path_buf()),
        }
    }

    /// Count one successful upstream request for `name`.
    pub async fn record_success(&self, name: &str) {
        let canonical = canonical_account_name(name).to_string();
        let snapshot = {
            let mut counters = self.counters.lock().await;
            *counters.entry(canonical).or_insert(0) += 1;
            self.path.as_ref().map(|_| counters.clone())
        };
        if let (Some(path), Some(counters)) = (&self.path, snapshot) {
            persist(path, counters).await;
        }
    }

    /// Successes recorded for `name` (after migration)
    pub async fn successes(&self, name: &str) -> u64 {
        let canonical = canonical_account_name(name);
        *self.counters.lock().await.get(canonical).unwrap_or(&0)
    }

    /// Full counter snapshot for introspection endpoints
    pub async fn snapshot(&self) -> HashMap<String, u64> {
        self.counters.lock().await.clone()
    }
}

async fn persist(path: &Path, counters: HashMap<String, u64>) {
    let file = StatsFile { successes: counters };
    let bytes = match serde_json::to_vec_pretty(&file) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to serialize account stats");
            return;
        }
    };
    if let Err(e) = tokio::fs::write(path, bytes).await {
        warn!(path = %path.display(), error = %e, "failed to persist account stats");
    }
}
