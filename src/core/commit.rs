// Commits and the event messages they carry.
//
// Purpose
// - Describe one atomic write to one stream (Commit) and the request that produces it (CommitAttempt).
//
// Responsibilities
// - Keep revision arithmetic in one place: a commit covers revisions
//   [stream_revision - events + 1, stream_revision].
// - Validate attempts before they reach storage.

use crate::core::ports::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Header mapping carried by commits and event messages. Insertion order is irrelevant.
pub type Headers = HashMap<String, serde_json::Value>;

/// One domain event plus its headers.
///
/// `body` is optional because a deserialized message may not carry a payload;
/// streams ignore such messages when they are staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage<E> {
    #[serde(default)]
    pub headers: Headers,
    pub body: Option<E>,
}

impl<E> EventMessage<E> {
    pub fn new(body: E) -> Self {
        Self {
            headers: Headers::new(),
            body: Some(body),
        }
    }

    pub fn with_header(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
    }
}

/// Global, monotonically increasing position of a commit across all streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckpointToken(pub i64);

impl CheckpointToken {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CheckpointToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable, persisted batch of events appended to one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit<E> {
    pub stream_id: String,
    /// Revision of the stream after this commit.
    pub stream_revision: i64,
    pub commit_id: Uuid,
    /// 1-based ordinal of this commit within its stream.
    pub commit_sequence: i64,
    pub commit_stamp: DateTime<Utc>,
    pub checkpoint_token: CheckpointToken,
    pub headers: Headers,
    pub events: Vec<EventMessage<E>>,
}

impl<E> Commit<E> {
    /// Revision of the first event in this commit.
    pub fn first_revision(&self) -> i64 {
        self.stream_revision - self.events.len() as i64 + 1
    }

    /// Whether any revision of this commit falls inside the inclusive range.
    pub fn intersects(&self, min_revision: i64, max_revision: i64) -> bool {
        revision_range_intersects(
            self.first_revision(),
            self.stream_revision,
            min_revision,
            max_revision,
        )
    }
}

/// Inclusive range intersection used by both storage reads and stream hydration.
pub fn revision_range_intersects(
    first: i64,
    last: i64,
    min_revision: i64,
    max_revision: i64,
) -> bool {
    last >= min_revision && first <= max_revision
}

/// A request to persist staged events as the next commit of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitAttempt<E> {
    pub stream_id: String,
    /// Revision the stream will have once the attempt is persisted.
    pub stream_revision: i64,
    pub commit_id: Uuid,
    pub commit_sequence: i64,
    pub commit_stamp: DateTime<Utc>,
    pub headers: Headers,
    pub events: Vec<EventMessage<E>>,
}

impl<E> CommitAttempt<E> {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.stream_id.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "commit attempt has a blank stream id".into(),
            ));
        }
        if self.events.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "commit attempt {} for stream {} carries no events",
                self.commit_id, self.stream_id
            )));
        }
        if self.commit_sequence < 1 {
            return Err(StoreError::InvalidArgument(format!(
                "commit sequence must start at 1, got {}",
                self.commit_sequence
            )));
        }
        if self.stream_revision < self.events.len() as i64 {
            return Err(StoreError::InvalidArgument(format!(
                "stream revision {} is lower than the number of events {}",
                self.stream_revision,
                self.events.len()
            )));
        }
        Ok(())
    }

    /// Turns the attempt into the commit that storage acknowledged.
    pub fn into_commit(self, checkpoint_token: CheckpointToken) -> Commit<E> {
        Commit {
            stream_id: self.stream_id,
            stream_revision: self.stream_revision,
            commit_id: self.commit_id,
            commit_sequence: self.commit_sequence,
            commit_stamp: self.commit_stamp,
            checkpoint_token,
            headers: self.headers,
            events: self.events,
        }
    }
}

#[cfg(test)]
mod commit_tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn attempt() -> CommitAttempt<String> {
        CommitAttempt {
            stream_id: "order-1".to_string(),
            stream_revision: 5,
            commit_id: Uuid::now_v7(),
            commit_sequence: 2,
            commit_stamp: Utc::now(),
            headers: Headers::new(),
            events: vec![
                EventMessage::new("fourth".to_string()),
                EventMessage::new("fifth".to_string()),
            ],
        }
    }

    #[rstest]
    fn it_should_compute_the_first_revision_of_a_commit(attempt: CommitAttempt<String>) {
        let commit = attempt.into_commit(CheckpointToken(9));
        assert_eq!(commit.first_revision(), 4);
        assert_eq!(commit.checkpoint_token.value(), 9);
    }

    #[rstest]
    #[case(0, i64::MAX, true)]
    #[case(4, 4, true)]
    #[case(5, 10, true)]
    #[case(6, 10, false)]
    #[case(1, 3, false)]
    fn it_should_intersect_inclusive_ranges(
        attempt: CommitAttempt<String>,
        #[case] min: i64,
        #[case] max: i64,
        #[case] expected: bool,
    ) {
        let commit = attempt.into_commit(CheckpointToken(1));
        assert_eq!(commit.intersects(min, max), expected);
    }

    #[rstest]
    fn it_should_accept_a_well_formed_attempt(attempt: CommitAttempt<String>) {
        assert!(attempt.validate().is_ok());
    }

    #[rstest]
    fn it_should_reject_an_attempt_without_events(mut attempt: CommitAttempt<String>) {
        attempt.events.clear();
        let result = attempt.validate();
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[rstest]
    fn it_should_reject_a_zero_commit_sequence(mut attempt: CommitAttempt<String>) {
        attempt.commit_sequence = 0;
        let result = attempt.validate();
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[rstest]
    fn it_should_reject_a_revision_lower_than_the_event_count(mut attempt: CommitAttempt<String>) {
        attempt.stream_revision = 1;
        let result = attempt.validate();
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[rstest]
    fn it_should_reject_a_blank_stream_id(mut attempt: CommitAttempt<String>) {
        attempt.stream_id = "  ".to_string();
        let result = attempt.validate();
        assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
    }

    #[rstest]
    fn it_should_mark_messages_without_body_as_empty() {
        let message: EventMessage<String> = EventMessage {
            headers: Headers::new(),
            body: None,
        };
        assert!(message.is_empty());
        let message = EventMessage::new("x".to_string());
        assert!(!message.with_header("user", "u-1").is_empty());
    }
}
