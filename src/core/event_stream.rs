// Optimistic event stream: the committed history of one stream plus a staging area.
//
// Purpose
// - Rebuild a stream from the commit log and append new events as one commit.
//
// Responsibilities
// - Assign contiguous revisions and the next commit sequence to staged events.
// - Reject commit ids already seen on this stream.
// - Fold acknowledged commits back into committed state.
//
// Boundaries
// - Never retries. A concurrency conflict refreshes committed state and is surfaced.
// - Owned by one unit of work; not shared across tasks.

use crate::core::commit::{Commit, CommitAttempt, EventMessage, Headers};
use crate::core::ports::{PersistStreams, StoreError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub struct OptimisticEventStream<E: Send + Sync + 'static> {
    stream_id: String,
    stream_revision: i64,
    commit_sequence: i64,
    committed: Vec<EventMessage<E>>,
    committed_headers: Headers,
    events: Vec<EventMessage<E>>,
    uncommitted_headers: Headers,
    identifiers: HashSet<Uuid>,
    persistence: Arc<dyn PersistStreams<E>>,
}

impl<E> OptimisticEventStream<E>
where
    E: Clone + Send + Sync + 'static,
{
    /// An empty stream at revision 0.
    pub fn new(stream_id: impl Into<String>, persistence: Arc<dyn PersistStreams<E>>) -> Self {
        Self {
            stream_id: stream_id.into(),
            stream_revision: 0,
            commit_sequence: 0,
            committed: Vec::new(),
            committed_headers: Headers::new(),
            events: Vec::new(),
            uncommitted_headers: Headers::new(),
            identifiers: HashSet::new(),
            persistence,
        }
    }

    /// A stream hydrated with the events in `[min_revision, max_revision]`.
    pub async fn open(
        stream_id: impl Into<String>,
        persistence: Arc<dyn PersistStreams<E>>,
        min_revision: i64,
        max_revision: i64,
    ) -> Result<Self, StoreError> {
        let mut stream = Self::new(stream_id, persistence);
        let commits = stream
            .persistence
            .get_from(&stream.stream_id, min_revision, max_revision)
            .await?;
        stream.populate(min_revision, max_revision, &commits);

        if min_revision > 0 && stream.committed.is_empty() {
            return Err(StoreError::StreamNotFound {
                stream_id: stream.stream_id,
                min_revision,
            });
        }

        tracing::debug!(
            stream_id = %stream.stream_id,
            stream_revision = stream.stream_revision,
            commit_sequence = stream.commit_sequence,
            commits = commits.len(),
            "Opened event stream"
        );
        Ok(stream)
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn stream_revision(&self) -> i64 {
        self.stream_revision
    }

    pub fn commit_sequence(&self) -> i64 {
        self.commit_sequence
    }

    pub fn committed_events(&self) -> &[EventMessage<E>] {
        &self.committed
    }

    pub fn committed_headers(&self) -> &Headers {
        &self.committed_headers
    }

    pub fn uncommitted_events(&self) -> &[EventMessage<E>] {
        &self.events
    }

    pub fn uncommitted_headers(&self) -> &Headers {
        &self.uncommitted_headers
    }

    pub fn uncommitted_headers_mut(&mut self) -> &mut Headers {
        &mut self.uncommitted_headers
    }

    pub fn has_changes(&self) -> bool {
        !self.events.is_empty()
    }

    /// Stages an event. Messages without a body are ignored.
    pub fn add(&mut self, event: EventMessage<E>) {
        if event.is_empty() {
            return;
        }
        self.events.push(event);
    }

    /// Discards staged events and headers without persisting them.
    pub fn clear_changes(&mut self) {
        self.events.clear();
        self.uncommitted_headers.clear();
    }

    /// Persists staged events as the next commit of this stream.
    ///
    /// Returns `None` when nothing was staged.
    pub async fn commit_changes(
        &mut self,
        commit_id: Uuid,
    ) -> Result<Option<Commit<E>>, StoreError> {
        if !self.has_changes() {
            return Ok(None);
        }

        if self.identifiers.contains(&commit_id) {
            return Err(StoreError::DuplicateCommitAttempt {
                stream_id: self.stream_id.clone(),
                commit_id,
            });
        }

        let attempt = self.build_commit_attempt(commit_id);
        let target_revision = attempt.stream_revision;

        match self.persistence.commit(attempt).await {
            Ok(commit) => {
                let min_revision = self.stream_revision + 1;
                let acknowledged = std::slice::from_ref(&commit);
                self.populate(min_revision, target_revision, acknowledged);
                self.clear_changes();
                Ok(Some(commit))
            }
            Err(StoreError::DuplicateCommit { commit_sequence, .. }) => {
                tracing::info!(
                    stream_id = %self.stream_id,
                    commit_id = %commit_id,
                    commit_sequence,
                    "Commit was already persisted, treating retry as success"
                );
                let newer = self.refresh().await?;
                self.clear_changes();
                Ok(newer.into_iter().find(|c| c.commit_id == commit_id))
            }
            Err(conflict @ StoreError::ConcurrencyConflict { .. }) => {
                tracing::warn!(
                    stream_id = %self.stream_id,
                    stream_revision = self.stream_revision,
                    error = %conflict,
                    "Concurrent write detected"
                );
                if let Err(error) = self.refresh().await {
                    tracing::warn!(
                        stream_id = %self.stream_id,
                        error = %error,
                        "Failed to refresh stream after concurrency conflict"
                    );
                }
                Err(conflict)
            }
            Err(error) => Err(error),
        }
    }

    /// Folds commits newer than the current revision into committed state and returns them.
    pub async fn refresh(&mut self) -> Result<Vec<Commit<E>>, StoreError> {
        let min_revision = self.stream_revision + 1;
        let commits = self
            .persistence
            .get_from(&self.stream_id, min_revision, i64::MAX)
            .await?;
        self.populate(min_revision, i64::MAX, &commits);
        Ok(commits)
    }

    fn populate(&mut self, min_revision: i64, max_revision: i64, commits: &[Commit<E>]) {
        for commit in commits {
            self.identifiers.insert(commit.commit_id);

            let mut current_revision = commit.first_revision();
            if current_revision > max_revision {
                return;
            }
            self.commit_sequence = commit.commit_sequence;

            for (key, value) in &commit.headers {
                self.committed_headers.insert(key.clone(), value.clone());
            }

            for event in &commit.events {
                if current_revision > max_revision {
                    break;
                }
                if current_revision >= min_revision {
                    self.committed.push(event.clone());
                    self.stream_revision = current_revision;
                }
                current_revision += 1;
            }
        }
    }

    fn build_commit_attempt(&self, commit_id: Uuid) -> CommitAttempt<E> {
        CommitAttempt {
            stream_id: self.stream_id.clone(),
            stream_revision: self.stream_revision + self.events.len() as i64,
            commit_id,
            commit_sequence: self.commit_sequence + 1,
            commit_stamp: Utc::now(),
            headers: self.uncommitted_headers.clone(),
            events: self.events.clone(),
        }
    }
}
