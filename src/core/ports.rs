// Ports define what the core needs from the outside world, without implementing it.
//
// Purpose
// - Describe the commit log store, the payload serializer and the stream id hasher as traits.
//
// Responsibilities
// - Keep streams and dispatching independent of any database by coding against traits.
// - Own the storage error taxonomy shared by every adapter.
//
// Boundaries
// - No concrete input or output here. Adapters implement these traits in the adapters layer.
//
// Testing guidance
// - Use the in memory adapters for tests and local development.

use crate::core::commit::{CheckpointToken, Commit, CommitAttempt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("concurrency conflict on stream {stream_id} at commit sequence {commit_sequence}")]
    ConcurrencyConflict {
        stream_id: String,
        commit_sequence: i64,
    },

    #[error("duplicate commit {commit_id} with sequence {commit_sequence} on stream {stream_id}")]
    DuplicateCommit {
        stream_id: String,
        commit_id: Uuid,
        commit_sequence: i64,
    },

    #[error("commit id {commit_id} was already used on stream {stream_id}")]
    DuplicateCommitAttempt { stream_id: String, commit_id: Uuid },

    #[error("stream {stream_id} has no commits from revision {min_revision}")]
    StreamNotFound {
        stream_id: String,
        min_revision: i64,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid stream id hash: {0}")]
    InvalidStreamIdHash(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Append-only commit log, shared by every writer.
///
/// The uniqueness of `(stream id, commit sequence)` is the only serialization point
/// between concurrent writers.
#[async_trait]
pub trait PersistStreams<E: Send + Sync + 'static>: Send + Sync {
    /// Commits of `stream_id` whose revision range intersects `[min_revision, max_revision]`,
    /// ascending by commit sequence. Unknown streams yield an empty list.
    async fn get_from(
        &self,
        stream_id: &str,
        min_revision: i64,
        max_revision: i64,
    ) -> Result<Vec<Commit<E>>, StoreError>;

    /// Persists the attempt atomically and assigns its checkpoint token.
    ///
    /// Fails with `DuplicateCommit` when the same commit id and sequence were already persisted,
    /// and with `ConcurrencyConflict` when another commit owns that sequence.
    async fn commit(&self, attempt: CommitAttempt<E>) -> Result<Commit<E>, StoreError>;

    /// Commits not yet marked as dispatched, ascending by checkpoint token.
    async fn get_undispatched_commits(&self) -> Result<Vec<Commit<E>>, StoreError>;

    /// Idempotent.
    async fn mark_commit_as_dispatched(&self, commit: &Commit<E>) -> Result<(), StoreError>;

    /// Every commit after `checkpoint` (all commits for `None`), ascending by checkpoint token.
    async fn get_from_checkpoint(
        &self,
        checkpoint: Option<CheckpointToken>,
    ) -> Result<Vec<Commit<E>>, StoreError>;

    /// Commits stamped within `[start, end]`, ordered by stamp, stream and sequence.
    /// `start` is rounded down to the whole second and never precedes the Unix epoch.
    async fn get_from_to(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Commit<E>>, StoreError>;

    /// Commits stamped at or after `start`, ordered by stamp, stream and sequence.
    async fn get_since(&self, start: DateTime<Utc>) -> Result<Vec<Commit<E>>, StoreError>;
}

/// Converts headers and event payloads to and from an opaque byte encoding.
pub trait Serializer: Send + Sync {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError>;
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError>;
}

/// Maps an arbitrary-length stream id onto a fixed-width storage key.
pub trait StreamIdHasher: Send + Sync {
    fn hash(&self, stream_id: &str) -> Result<String, StoreError>;
}
