// Persisted row of the commit log.
//
// Purpose
// - Represent how a commit is stored: hashed stream key, revision bookkeeping, serialized
//   headers and payload, dispatch flag.
//
// Responsibilities
// - Build a row from a commit attempt through the serializer.
// - Map a row back to a Commit.
// - (stream_id, commit_sequence) is the uniqueness key; checkpoint_number is the global order.

use crate::core::commit::{
    CheckpointToken, Commit, CommitAttempt, EventMessage, Headers, revision_range_intersects,
};
use crate::core::ports::{Serializer, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub checkpoint_number: i64,
    /// Hashed, fixed width.
    pub stream_id: String,
    pub stream_id_original: String,
    pub stream_revision: i64,
    pub items: i64,
    pub commit_id: Uuid,
    pub commit_sequence: i64,
    pub commit_stamp: DateTime<Utc>,
    pub headers: Vec<u8>,
    pub payload: Vec<u8>,
    pub is_dispatched: bool,
}

impl CommitRecord {
    pub fn from_attempt<E, S>(
        attempt: &CommitAttempt<E>,
        stream_id_hash: String,
        checkpoint_number: i64,
        serializer: &S,
    ) -> Result<Self, StoreError>
    where
        E: Serialize,
        S: Serializer,
    {
        Ok(Self {
            checkpoint_number,
            stream_id: stream_id_hash,
            stream_id_original: attempt.stream_id.clone(),
            stream_revision: attempt.stream_revision,
            items: attempt.events.len() as i64,
            commit_id: attempt.commit_id,
            commit_sequence: attempt.commit_sequence,
            commit_stamp: attempt.commit_stamp,
            headers: serializer.serialize(&attempt.headers)?,
            payload: serializer.serialize(&attempt.events)?,
            is_dispatched: false,
        })
    }

    pub fn to_commit<E, S>(&self, serializer: &S) -> Result<Commit<E>, StoreError>
    where
        E: DeserializeOwned,
        S: Serializer,
    {
        let headers: Headers = serializer.deserialize(&self.headers)?;
        let events: Vec<EventMessage<E>> = serializer.deserialize(&self.payload)?;
        Ok(Commit {
            stream_id: self.stream_id_original.clone(),
            stream_revision: self.stream_revision,
            commit_id: self.commit_id,
            commit_sequence: self.commit_sequence,
            commit_stamp: self.commit_stamp,
            checkpoint_token: CheckpointToken(self.checkpoint_number),
            headers,
            events,
        })
    }

    pub fn intersects(&self, min_revision: i64, max_revision: i64) -> bool {
        revision_range_intersects(
            self.stream_revision - self.items + 1,
            self.stream_revision,
            min_revision,
            max_revision,
        )
    }
}
