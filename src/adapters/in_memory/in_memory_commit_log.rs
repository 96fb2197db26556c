// In memory implementation of the PersistStreams port.
//
// Purpose
// - Support stream, unit of work and dispatcher tests and local development without a database.
//
// Responsibilities
// - Store serialized commit rows in checkpoint order.
// - Key rows by whatever StreamIdHasher the log was built with (SHA-1 with a width check by
//   default).
// - Enforce the (hashed stream id, commit sequence) uniqueness key and classify a violation as a
//   duplicate (same commit id) or a concurrency conflict (different commit id).
// - Assign strictly increasing checkpoint numbers.
//
// Testing guidance
// - toggle_offline makes every call fail with StorageUnavailable.

use crate::adapters::persistence::commit_record::CommitRecord;
use crate::adapters::serialization::json_serializer::JsonSerializer;
use crate::core::commit::{CheckpointToken, Commit, CommitAttempt};
use crate::core::ports::{PersistStreams, Serializer, StoreError, StreamIdHasher};
use crate::core::stream_id_hasher::DefaultStreamIdHasher;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

type Commits<E> = Result<Vec<Commit<E>>, StoreError>;

pub struct InMemoryCommitLog<E, S = JsonSerializer, H = DefaultStreamIdHasher> {
    records: RwLock<Vec<CommitRecord>>,
    serializer: S,
    hasher: H,
    is_offline: AtomicBool,
    _events: PhantomData<fn() -> E>,
}

impl<E> InMemoryCommitLog<E> {
    pub fn new() -> Self {
        Self::with_parts(JsonSerializer, DefaultStreamIdHasher::default())
    }
}

impl<E> Default for InMemoryCommitLog<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, S, H> InMemoryCommitLog<E, S, H>
where
    S: Serializer,
    H: StreamIdHasher,
{
    pub fn with_parts(serializer: S, hasher: H) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            serializer,
            hasher,
            is_offline: AtomicBool::new(false),
            _events: PhantomData,
        }
    }

    pub fn toggle_offline(&self) {
        self.is_offline.fetch_xor(true, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.is_offline.load(Ordering::SeqCst) {
            let reason = "Commit log offline".to_string();
            return Err(StoreError::StorageUnavailable(reason));
        }
        Ok(())
    }
}

impl<E, S, H> InMemoryCommitLog<E, S, H>
where
    E: DeserializeOwned,
    S: Serializer,
    H: StreamIdHasher,
{
    fn to_commits<'a>(&self, records: impl Iterator<Item = &'a CommitRecord>) -> Commits<E> {
        records
            .map(|record| record.to_commit(&self.serializer))
            .collect()
    }

    async fn stamped_within(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Commits<E> {
        self.ensure_online()?;
        let start = floor_to_second(start);
        let guard = self.records.read().await;
        let mut matching: Vec<&CommitRecord> = guard
            .iter()
            .filter(|record| record.commit_stamp >= start)
            .filter(|record| end.is_none_or(|end| record.commit_stamp <= end))
            .collect();
        matching.sort_by_key(|record| {
            (
                record.commit_stamp,
                record.stream_id.clone(),
                record.commit_sequence,
            )
        });
        self.to_commits(matching.into_iter())
    }
}

fn floor_to_second(instant: DateTime<Utc>) -> DateTime<Utc> {
    let seconds = instant.timestamp().max(0);
    DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[async_trait::async_trait]
impl<E, S, H> PersistStreams<E> for InMemoryCommitLog<E, S, H>
where
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
    S: Serializer + 'static,
    H: StreamIdHasher + 'static,
{
    async fn get_from(&self, stream_id: &str, min_revision: i64, max_revision: i64) -> Commits<E> {
        self.ensure_online()?;
        let key = self.hasher.hash(stream_id)?;
        let guard = self.records.read().await;
        let mut matching: Vec<&CommitRecord> = guard
            .iter()
            .filter(|record| record.stream_id == key)
            .filter(|record| record.intersects(min_revision, max_revision))
            .collect();
        matching.sort_by_key(|record| record.commit_sequence);

        tracing::debug!(
            stream_id,
            min_revision,
            max_revision,
            commits = matching.len(),
            "Read commits"
        );
        self.to_commits(matching.into_iter())
    }

    async fn commit(&self, attempt: CommitAttempt<E>) -> Result<Commit<E>, StoreError> {
        attempt.validate()?;
        self.ensure_online()?;
        let key = self.hasher.hash(&attempt.stream_id)?;

        let mut guard = self.records.write().await;
        let existing = guard
            .iter()
            .filter(|record| record.stream_id == key)
            .filter(|record| record.commit_sequence >= attempt.commit_sequence)
            .min_by_key(|record| record.commit_sequence);
        if let Some(existing) = existing {
            let same_sequence = existing.commit_sequence == attempt.commit_sequence;
            if same_sequence && existing.commit_id == attempt.commit_id {
                return Err(StoreError::DuplicateCommit {
                    stream_id: attempt.stream_id,
                    commit_id: attempt.commit_id,
                    commit_sequence: attempt.commit_sequence,
                });
            }
            return Err(StoreError::ConcurrencyConflict {
                stream_id: attempt.stream_id,
                commit_sequence: attempt.commit_sequence,
            });
        }

        let last_checkpoint = guard.last().map_or(0, |record| record.checkpoint_number);
        let checkpoint_number = last_checkpoint + 1;
        let serializer = &self.serializer;
        let record = CommitRecord::from_attempt(&attempt, key, checkpoint_number, serializer)?;
        guard.push(record);

        tracing::info!(
            stream_id = %attempt.stream_id,
            commit_id = %attempt.commit_id,
            commit_sequence = attempt.commit_sequence,
            stream_revision = attempt.stream_revision,
            checkpoint = checkpoint_number,
            "Persisted commit"
        );
        Ok(attempt.into_commit(CheckpointToken(checkpoint_number)))
    }

    async fn get_undispatched_commits(&self) -> Commits<E> {
        self.ensure_online()?;
        let guard = self.records.read().await;
        self.to_commits(guard.iter().filter(|record| !record.is_dispatched))
    }

    async fn mark_commit_as_dispatched(&self, commit: &Commit<E>) -> Result<(), StoreError> {
        self.ensure_online()?;
        let checkpoint = commit.checkpoint_token.value();
        let mut guard = self.records.write().await;
        if let Some(record) = guard
            .iter_mut()
            .find(|record| record.checkpoint_number == checkpoint)
        {
            record.is_dispatched = true;
        }
        Ok(())
    }

    async fn get_from_checkpoint(&self, checkpoint: Option<CheckpointToken>) -> Commits<E> {
        self.ensure_online()?;
        let after = checkpoint.map_or(0, |token| token.value());
        let guard = self.records.read().await;
        self.to_commits(guard.iter().filter(|r| r.checkpoint_number > after))
    }

    async fn get_from_to(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Commits<E> {
        self.stamped_within(start, Some(end)).await
    }

    async fn get_since(&self, start: DateTime<Utc>) -> Commits<E> {
        self.stamped_within(start, None).await
    }
}
