use crate::core::ports::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(
        "denormalizer {denormalizer} failed on {event_type} of commit {commit_id} (stream {stream_id}, sequence {commit_sequence})"
    )]
    Denormalization {
        denormalizer: String,
        event_type: String,
        stream_id: String,
        commit_id: Uuid,
        commit_sequence: i64,
        #[source]
        source: anyhow::Error,
    },

    #[error("projection unit of work failed")]
    UnitOfWork(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum UnitOfWorkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("record {stream_id} was not found")]
    RecordNotFound { stream_id: String },

    #[error(
        "record {stream_id} was changed by another user: expected version {expected}, found {actual}"
    )]
    RecordChangedByAnotherUser {
        stream_id: String,
        expected: i64,
        actual: i64,
    },

    #[error("record {stream_id} already exists")]
    DuplicateRecord { stream_id: String },
}
