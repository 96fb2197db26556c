// Contracts for domain events and the aggregates that raise them.
//
// Purpose
// - DomainEvent: a serializable payload that names its own type, so denormalizers can be picked
//   from an explicit registry instead of runtime type inspection.
// - EventSource: the inbound contract of an event-sourced aggregate.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Committed version of an aggregate that has never been persisted.
pub const NEW_AGGREGATE_VERSION: i64 = 0;

pub trait DomainEvent: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier of the concrete event type.
    fn event_type(&self) -> &'static str;
}

pub trait EventSource<E>: Send + Sync {
    fn stream_id(&self) -> String;

    /// Version of the aggregate when it was loaded or last committed.
    fn committed_version(&self) -> i64;

    /// Changes applied since loading or the last commit, in order.
    fn changes(&self) -> &[E];

    /// Records the revision the store acknowledged and drops the changes it covers.
    ///
    /// The store may persist a prefix of the changes; the rest stay pending.
    fn mark_as_committed(&mut self, committed_version: i64);

    /// Replays committed history. Pending changes are discarded.
    fn load(&mut self, committed_version: i64, events: Vec<E>);

    /// Version including pending changes.
    fn version(&self) -> i64 {
        self.committed_version() + self.changes().len() as i64
    }

    fn is_new(&self) -> bool {
        self.committed_version() == NEW_AGGREGATE_VERSION
    }
}

#[cfg(test)]
mod event_source_tests {
    use super::*;
    use rstest::rstest;

    #[derive(Default)]
    struct Counter {
        committed: i64,
        pending: Vec<u32>,
        total: u32,
    }

    impl EventSource<u32> for Counter {
        fn stream_id(&self) -> String {
            "counter".to_string()
        }
        fn committed_version(&self) -> i64 {
            self.committed
        }
        fn changes(&self) -> &[u32] {
            &self.pending
        }
        fn mark_as_committed(&mut self, committed_version: i64) {
            let persisted = (committed_version - self.committed).max(0) as usize;
            self.pending.drain(..persisted.min(self.pending.len()));
            self.committed = committed_version;
        }
        fn load(&mut self, committed_version: i64, events: Vec<u32>) {
            self.pending.clear();
            self.total = events.iter().sum();
            self.committed = committed_version;
        }
    }

    #[rstest]
    fn it_should_count_pending_changes_in_the_version() {
        let mut counter = Counter::default();
        assert!(counter.is_new());
        counter.pending.extend([1, 2]);
        assert_eq!(counter.version(), 2);
        counter.mark_as_committed(2);
        assert_eq!(counter.version(), 2);
        assert!(!counter.is_new());
    }

    #[rstest]
    fn it_should_keep_changes_past_a_partial_commit() {
        let mut counter = Counter::default();
        counter.pending.extend([1, 2, 3]);
        counter.mark_as_committed(2);
        assert_eq!(counter.changes(), &[3]);
        assert_eq!(counter.version(), 3);
    }

    #[rstest]
    fn it_should_discard_pending_changes_on_load() {
        let mut counter = Counter::default();
        counter.pending.push(7);
        counter.load(3, vec![1, 2, 3]);
        assert_eq!(counter.total, 6);
        assert_eq!(counter.version(), 3);
    }
}
