//! Flat-file persistence of Q-tables

use arena_rl_core::{QTable, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Token in a table name that selects the shared table
pub const SHARED_MARKER: &str = "shared";

/// How an agent's table is persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableMode {
    /// Saved and loaded by the owning agent under `file_name`
    Private {
        /// File name inside the storage directory
        file_name: String,
    },
    /// Handed to the table manager at teardown, never written by the agent
    Shared,
}

impl TableMode {
    /// Pick the mode from a configured table name. The shared marker
    /// matches in any case.
    #[must_use]
    pub fn from_table_name(name: &str) -> Self {
        if name.to_ascii_lowercase().contains(SHARED_MARKER) {
            TableMode::Shared
        } else {
            TableMode::Private {
                file_name: name.to_string(),
            }
        }
    }

    /// Whether this is the shared mode
    #[must_use]
    pub fn is_shared(&self) -> bool {
        matches!(self, TableMode::Shared)
    }
}

/// Table files in one storage directory
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of table `name`
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Create the storage directory if needed
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Write `table` under `name`, replacing any existing file. The document
    /// goes to a temporary sibling first and is renamed into place, so a
    /// reader never sees a half-written table.
    pub async fn save(&self, name: &str, table: &QTable) -> Result<PathBuf> {
        self.init().await?;
        let path = self.path_for(name);
        let tmp = self.path_for(&format!("{name}.tmp"));

        fs::write(&tmp, table.to_json()?).await?;
        fs::rename(&tmp, &path).await?;

        info!(path = %path.display(), states = table.len(), "saved table");
        Ok(path)
    }

    /// Read table `name`. `Ok(None)` when the file does not exist; an error
    /// when it exists but does not parse as a whole.
    pub async fn load(&self, name: &str) -> Result<Option<QTable>> {
        let path = self.path_for(name);
        match fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(QTable::from_json(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read table `name`, falling back to an empty table when it is missing
    /// or malformed
    pub async fn load_or_empty(&self, name: &str) -> QTable {
        let path = self.path_for(name);
        match self.load(name).await {
            Ok(Some(table)) => {
                info!(path = %path.display(), states = table.len(), "loaded table");
                table
            }
            Ok(None) => {
                info!(path = %path.display(), "no table on disk, starting cold");
                QTable::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable table, starting cold");
                QTable::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_rl_core::{Action, State};

    fn sample_table() -> QTable {
        let mut table = QTable::new();
        let state = State {
            health_percent: 80,
            heals_left: 2,
            ..State::default()
        };
        table.entry_or_default(state).set(Action::Attack, 1.25);
        table
    }

    #[test]
    fn mode_from_name() {
        assert!(TableMode::from_table_name("SharedQTable.json").is_shared());
        assert!(TableMode::from_table_name("arena_SHARED").is_shared());
        assert_eq!(
            TableMode::from_table_name("Brute_QTable.json"),
            TableMode::Private {
                file_name: "Brute_QTable.json".to_string()
            }
        );
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path().join("tables"));
        let table = sample_table();

        let path = store.save("Brute_QTable.json", &table).await.unwrap();
        assert!(path.exists());
        assert!(!store.path_for("Brute_QTable.json.tmp").exists());

        let loaded = store.load("Brute_QTable.json").await.unwrap();
        assert_eq!(loaded, Some(table));
    }

    #[tokio::test]
    async fn save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        store.save("t.json", &sample_table()).await.unwrap();
        store.save("t.json", &QTable::new()).await.unwrap();

        assert_eq!(store.load("t.json").await.unwrap(), Some(QTable::new()));
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        assert_eq!(store.load("absent.json").await.unwrap(), None);
        assert!(store.load_or_empty("absent.json").await.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        tokio::fs::write(
            store.path_for("bad.json"),
            r#"{ "80_0_2_0_0_0_0_0": { "0": 1.0 }, "1_2_3": { "0": 1.0 } }"#,
        )
        .await
        .unwrap();

        assert!(store.load("bad.json").await.is_err());
        assert!(store.load_or_empty("bad.json").await.is_empty());
    }
}
