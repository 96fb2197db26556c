// Commit log wrappers that fail on demand.

use crate::core::commit::{CheckpointToken, Commit, CommitAttempt};
use crate::core::ports::{PersistStreams, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegates to `inner`, except that the nth call to `commit` fails with `StorageUnavailable`.
pub struct UnreliableCommitLog<E> {
    inner: Arc<dyn PersistStreams<E>>,
    commits: AtomicUsize,
    fail_on_commit: usize,
}

impl<E: Send + Sync + 'static> UnreliableCommitLog<E> {
    pub fn failing_on_commit(inner: Arc<dyn PersistStreams<E>>, fail_on_commit: usize) -> Self {
        Self {
            inner,
            commits: AtomicUsize::new(0),
            fail_on_commit,
        }
    }
}

#[async_trait]
impl<E: Send + Sync + 'static> PersistStreams<E> for UnreliableCommitLog<E> {
    async fn get_from(
        &self,
        stream_id: &str,
        min_revision: i64,
        max_revision: i64,
    ) -> Result<Vec<Commit<E>>, StoreError> {
        self.inner
            .get_from(stream_id, min_revision, max_revision)
            .await
    }

    async fn commit(&self, attempt: CommitAttempt<E>) -> Result<Commit<E>, StoreError> {
        let call = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_commit {
            let reason = format!("commit call {call} dropped");
            return Err(StoreError::StorageUnavailable(reason));
        }
        self.inner.commit(attempt).await
    }

    async fn get_undispatched_commits(&self) -> Result<Vec<Commit<E>>, StoreError> {
        self.inner.get_undispatched_commits().await
    }

    async fn mark_commit_as_dispatched(&self, commit: &Commit<E>) -> Result<(), StoreError> {
        self.inner.mark_commit_as_dispatched(commit).await
    }

    async fn get_from_checkpoint(
        &self,
        checkpoint: Option<CheckpointToken>,
    ) -> Result<Vec<Commit<E>>, StoreError> {
        self.inner.get_from_checkpoint(checkpoint).await
    }

    async fn get_from_to(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Commit<E>>, StoreError> {
        self.inner.get_from_to(start, end).await
    }

    async fn get_since(&self, start: DateTime<Utc>) -> Result<Vec<Commit<E>>, StoreError> {
        self.inner.get_since(start).await
    }
}
