// In memory query model storage with transactional sessions.
//
// Purpose
// - Exercise the dispatcher and denormalizers without a database.
//
// Responsibilities
// - Store projection rows in a map keyed by identifier.
// - Stage writes per session and apply them only when the session commits its transaction.
// - Count sessions and committed transactions so tests can observe batching.
//
// Testing guidance
// - toggle_offline makes staging and committing fail, like an unreachable database.

use crate::application::dispatcher::repository::{
    ProjectionsUnitOfWork, ProjectionsUnitOfWorkFactory,
};
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Shared {
    is_offline: AtomicBool,
    sessions_opened: AtomicUsize,
    transactions_committed: AtomicUsize,
}

impl Shared {
    fn ensure_online(&self) -> anyhow::Result<()> {
        if self.is_offline.load(Ordering::SeqCst) {
            return Err(anyhow!("Projections repository offline"));
        }
        Ok(())
    }
}

pub struct InMemoryProjections<R> {
    rows: Arc<RwLock<HashMap<String, R>>>,
    shared: Arc<Shared>,
}

impl<R> Default for InMemoryProjections<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            shared: Arc::new(Shared::default()),
        }
    }
}

impl<R: Clone + Send + Sync + 'static> InMemoryProjections<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&self) {
        self.shared.is_offline.fetch_xor(true, Ordering::SeqCst);
    }

    pub async fn get(&self, id: &str) -> anyhow::Result<Option<R>> {
        self.shared.ensure_online()?;
        Ok(self.rows.read().await.get(id).cloned())
    }

    pub async fn all(&self) -> anyhow::Result<Vec<(String, R)>> {
        self.shared.ensure_online()?;
        let mut rows: Vec<(String, R)> = self
            .rows
            .read()
            .await
            .iter()
            .map(|(id, row)| (id.clone(), row.clone()))
            .collect();
        rows.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(rows)
    }

    /// Edits a stored row in place, outside any transaction. Returns false when the row is missing.
    pub async fn overwrite(&self, id: &str, edit: impl FnOnce(&mut R)) -> bool {
        match self.rows.write().await.get_mut(id) {
            Some(row) => {
                edit(row);
                true
            }
            None => false,
        }
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn transactions_committed(&self) -> usize {
        self.shared.transactions_committed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl<R: Clone + Send + Sync + 'static> ProjectionsUnitOfWorkFactory for InMemoryProjections<R> {
    type UnitOfWork = InMemoryProjectionSession<R>;

    async fn create(&self) -> anyhow::Result<Self::UnitOfWork> {
        self.shared.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(InMemoryProjectionSession {
            rows: self.rows.clone(),
            shared: self.shared.clone(),
            staged: Vec::new(),
            in_transaction: false,
        })
    }
}

/// One session against the store. Writes require an open transaction.
pub struct InMemoryProjectionSession<R> {
    rows: Arc<RwLock<HashMap<String, R>>>,
    shared: Arc<Shared>,
    staged: Vec<(String, Option<R>)>,
    in_transaction: bool,
}

impl<R: Clone + Send + Sync + 'static> InMemoryProjectionSession<R> {
    /// Reads through the session: staged writes win over stored rows.
    pub async fn get(&self, id: &str) -> anyhow::Result<Option<R>> {
        self.shared.ensure_online()?;
        if let Some((_, staged)) = self.staged.iter().rev().find(|(staged_id, _)| staged_id == id) {
            return Ok(staged.clone());
        }
        Ok(self.rows.read().await.get(id).cloned())
    }

    pub async fn upsert(&mut self, id: impl Into<String>, row: R) -> anyhow::Result<()> {
        self.stage(id.into(), Some(row))
    }

    pub async fn delete(&mut self, id: impl Into<String>) -> anyhow::Result<()> {
        self.stage(id.into(), None)
    }

    fn stage(&mut self, id: String, row: Option<R>) -> anyhow::Result<()> {
        self.shared.ensure_online()?;
        if !self.in_transaction {
            return Err(anyhow!("No open projection transaction"));
        }
        self.staged.push((id, row));
        Ok(())
    }
}

#[async_trait::async_trait]
impl<R: Clone + Send + Sync + 'static> ProjectionsUnitOfWork for InMemoryProjectionSession<R> {
    async fn enlist_transaction(&mut self) -> anyhow::Result<()> {
        self.shared.ensure_online()?;
        if self.in_transaction {
            return Err(anyhow!("Projection transaction already open"));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> anyhow::Result<()> {
        if !self.in_transaction {
            return Err(anyhow!("No open projection transaction"));
        }
        self.shared.ensure_online()?;

        let mut guard = self.rows.write().await;
        for (id, row) in self.staged.drain(..) {
            match row {
                Some(row) => guard.insert(id, row),
                None => guard.remove(&id),
            };
        }
        self.in_transaction = false;
        self.shared.transactions_committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> anyhow::Result<()> {
        self.staged.clear();
        self.in_transaction = false;
        Ok(())
    }

    fn has_transaction(&self) -> bool {
        self.in_transaction
    }
}
