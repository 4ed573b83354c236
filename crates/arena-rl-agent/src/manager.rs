//! World-scoped owner of the shared Q-table
//!
//! Shared-table agents never write the shared file. At teardown they hand
//! their table to the manager through a [`ManagerHandle`]; the manager
//! merges submissions one at a time on its own tick and is the only writer
//! of the shared file.

use arena_rl_core::{ArenaError, QTable, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::store::TableStore;

/// One agent's table handed over at teardown
#[derive(Debug)]
pub struct Submission {
    /// Name of the submitting agent
    pub agent: String,
    /// Its final table
    pub table: QTable,
}

/// Cloneable handle shared-table agents use to reach the manager
#[derive(Debug, Clone)]
pub struct ManagerHandle {
    tx: mpsc::UnboundedSender<Submission>,
    shared_filename: String,
}

impl ManagerHandle {
    /// Queue `table` for merging
    pub fn submit(&self, agent: impl Into<String>, table: QTable) -> Result<()> {
        self.tx
            .send(Submission {
                agent: agent.into(),
                table,
            })
            .map_err(|_| ArenaError::ManagerClosed)
    }

    /// File the shared table is persisted to, and loaded from at agent start
    #[must_use]
    pub fn shared_filename(&self) -> &str {
        &self.shared_filename
    }
}

/// Merges shared-table submissions and persists the result
#[derive(Debug)]
pub struct TableManager {
    merged: QTable,
    store: TableStore,
    shared_filename: String,
    merges: usize,
    tx: mpsc::UnboundedSender<Submission>,
    rx: mpsc::UnboundedReceiver<Submission>,
}

impl TableManager {
    /// Manager with an empty merged table
    pub fn new(store: TableStore, shared_filename: impl Into<String>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            merged: QTable::new(),
            store,
            shared_filename: shared_filename.into(),
            merges: 0,
            tx,
            rx,
        }
    }

    /// Handle to inject into shared-table agents
    #[must_use]
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle {
            tx: self.tx.clone(),
            shared_filename: self.shared_filename.clone(),
        }
    }

    /// Current merged table
    #[must_use]
    pub fn merged(&self) -> &QTable {
        &self.merged
    }

    /// Number of tables merged so far
    #[must_use]
    pub fn merges(&self) -> usize {
        self.merges
    }

    /// Fold `other` into the merged table. New states are copied wholesale;
    /// for known states each action becomes `(existing + incoming) / 2`.
    ///
    /// The average is not weighted by how often either side visited the
    /// state, so later submissions count as much as everything before them.
    pub fn merge_from_agent(&mut self, other: &QTable) {
        for (state, incoming) in other.iter() {
            match self.merged.get_mut(state) {
                Some(existing) => {
                    for (action, value) in incoming.iter() {
                        let q = existing.get_mut(action);
                        *q = (*q + value) / 2.0;
                    }
                }
                None => self.merged.insert(*state, *incoming),
            }
        }
        self.merges += 1;
    }

    /// Merge every queued submission, one at a time. Returns how many were
    /// merged.
    pub fn tick(&mut self) -> usize {
        let mut merged = 0;
        while let Ok(submission) = self.rx.try_recv() {
            debug!(
                agent = %submission.agent,
                states = submission.table.len(),
                "merging shared table submission"
            );
            self.merge_from_agent(&submission.table);
            merged += 1;
        }
        merged
    }

    /// Write the merged table to the shared file
    pub async fn persist(&self) -> Result<PathBuf> {
        let path = self.store.save(&self.shared_filename, &self.merged).await?;
        info!(
            path = %path.display(),
            states = self.merged.len(),
            merges = self.merges,
            "persisted shared table"
        );
        Ok(path)
    }

    /// World teardown: merge what is still queued, then persist
    pub async fn shutdown(mut self) -> Result<QTable> {
        self.tick();
        self.persist().await?;
        Ok(self.merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use arena_rl_core::{Action, ActionValues, State};

    fn state() -> State {
        State {
            health_percent: 70,
            target_health_percent: 30,
            ..State::default()
        }
    }

    fn table_with_attack(value: f32) -> QTable {
        let mut table = QTable::new();
        table.entry_or_default(state()).set(Action::Attack, value);
        table
    }

    fn manager(dir: &std::path::Path) -> TableManager {
        TableManager::new(TableStore::new(dir), "SharedQTable.json")
    }

    #[test]
    fn merge_into_empty_copies() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        manager.merge_from_agent(&table_with_attack(2.0));

        assert_eq!(manager.merged().value(&state(), Action::Attack), Some(2.0));
        assert_eq!(manager.merged().len(), 1);
    }

    #[test]
    fn merge_into_existing_averages() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        manager.merge_from_agent(&table_with_attack(2.0));
        manager.merge_from_agent(&table_with_attack(4.0));

        assert_relative_eq!(manager.merged().value(&state(), Action::Attack).unwrap(), 3.0);
        assert_eq!(manager.merges(), 2);
    }

    #[test]
    fn merge_averages_every_action() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let mut a = QTable::new();
        a.insert(state(), ActionValues::from_array([1.0, 2.0, 3.0, 4.0, 5.0]));
        let mut b = QTable::new();
        b.insert(state(), ActionValues::from_array([3.0, 2.0, 1.0, 0.0, -1.0]));

        manager.merge_from_agent(&a);
        manager.merge_from_agent(&b);
        assert_eq!(
            manager.merged().get(&state()).unwrap().as_array(),
            &[2.0, 2.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn submissions_merge_on_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = manager(dir.path());
        let handle = manager.handle();

        handle.submit("a", table_with_attack(2.0)).unwrap();
        handle.submit("b", table_with_attack(4.0)).unwrap();
        assert!(manager.merged().is_empty());

        assert_eq!(manager.tick(), 2);
        assert_relative_eq!(manager.merged().value(&state(), Action::Attack).unwrap(), 3.0);
        assert_eq!(manager.tick(), 0);
    }

    #[tokio::test]
    async fn shutdown_persists_shared_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let handle = manager.handle();
        handle.submit("a", table_with_attack(1.5)).unwrap();

        let merged = manager.shutdown().await.unwrap();
        assert_eq!(merged.value(&state(), Action::Attack), Some(1.5));

        let store = TableStore::new(dir.path());
        assert_eq!(store.load("SharedQTable.json").await.unwrap(), Some(merged));
        assert!(handle.submit("late", QTable::new()).is_err());
    }
}
