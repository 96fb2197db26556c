// Uncommitted event queue: events raised inside one unit of work, waiting to be committed.
//
// Purpose
// - Split the pending changes of several aggregates into per-stream commit batches.
//
// Responsibilities
// - Keep arrival order.
// - Hand out the longest same-stream prefix, capped at MAX_EVENTS_PER_COMMIT, so every commit
//   touches exactly one stream.
//
// Boundaries
// - Owned by one unit of work. No persistence, no locking.

use std::collections::{HashSet, VecDeque};

/// Upper bound on the number of events persisted in a single commit.
pub const MAX_EVENTS_PER_COMMIT: usize = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct UncommittedEvent<E> {
    pub stream_id: String,
    pub event: E,
}

#[derive(Debug)]
pub struct UncommittedEventQueue<E> {
    entries: VecDeque<UncommittedEvent<E>>,
}

impl<E> Default for UncommittedEventQueue<E> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<E> UncommittedEventQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, stream_id: impl Into<String>, event: E) {
        self.entries.push_back(UncommittedEvent {
            stream_id: stream_id.into(),
            event,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when draining the queue takes more than one commit.
    pub fn has_multiple_commits(&self) -> bool {
        if self.entries.len() > MAX_EVENTS_PER_COMMIT {
            return true;
        }
        let streams: HashSet<&str> = self
            .entries
            .iter()
            .map(|entry| entry.stream_id.as_str())
            .collect();
        streams.len() > 1
    }

    /// Removes the longest prefix of events owned by the same stream, at most
    /// MAX_EVENTS_PER_COMMIT long. Empty when the queue is empty.
    pub fn dequeue_commit(&mut self) -> Vec<UncommittedEvent<E>> {
        let Some(head) = self.entries.front() else {
            return Vec::new();
        };

        let batch_len = self
            .entries
            .iter()
            .take(MAX_EVENTS_PER_COMMIT)
            .take_while(|entry| entry.stream_id == head.stream_id)
            .count();

        self.entries.drain(..batch_len).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops only the events owned by `stream_id`.
    pub fn clear_for(&mut self, stream_id: &str) {
        self.entries.retain(|entry| entry.stream_id != stream_id);
    }
}

#[cfg(test)]
mod uncommitted_event_queue_tests {
    use super::*;
    use rstest::{fixture, rstest};

    type Queue = UncommittedEventQueue<&'static str>;

    #[fixture]
    fn before_each() -> Queue {
        let mut queue = UncommittedEventQueue::new();
        queue.enqueue("a", "a1");
        queue.enqueue("a", "a2");
        queue.enqueue("a", "a3");
        queue.enqueue("b", "b1");
        queue.enqueue("b", "b2");
        queue
    }

    fn bodies(batch: &[UncommittedEvent<&'static str>]) -> Vec<&'static str> {
        batch.iter().map(|entry| entry.event).collect()
    }

    #[rstest]
    fn it_should_dequeue_same_stream_prefixes_in_order(mut before_each: Queue) {
        assert!(before_each.has_multiple_commits());

        let first = before_each.dequeue_commit();
        assert_eq!(bodies(&first), vec!["a1", "a2", "a3"]);
        assert!(!before_each.has_multiple_commits());
        let second = before_each.dequeue_commit();
        assert_eq!(bodies(&second), vec!["b1", "b2"]);
        assert!(before_each.dequeue_commit().is_empty());
        assert!(before_each.is_empty());
    }

    #[rstest]
    fn it_should_not_merge_interleaved_runs_of_the_same_stream() {
        let mut queue = UncommittedEventQueue::new();
        queue.enqueue("a", 1);
        queue.enqueue("b", 2);
        queue.enqueue("a", 3);

        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let batch = queue.dequeue_commit();
            (!batch.is_empty()).then_some(batch.len())
        })
        .collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }

    #[rstest]
    #[case(MAX_EVENTS_PER_COMMIT, vec![MAX_EVENTS_PER_COMMIT])]
    #[case(MAX_EVENTS_PER_COMMIT + 1, vec![MAX_EVENTS_PER_COMMIT, 1])]
    #[case(600, vec![MAX_EVENTS_PER_COMMIT, MAX_EVENTS_PER_COMMIT, 90])]
    fn it_should_split_large_runs_into_capped_batches(
        #[case] total: usize,
        #[case] expected: Vec<usize>,
    ) {
        let mut queue = UncommittedEventQueue::new();
        for n in 0..total {
            queue.enqueue("a", n);
        }
        assert_eq!(queue.has_multiple_commits(), expected.len() > 1);

        let mut next = 0;
        for size in expected {
            let batch = queue.dequeue_commit();
            assert_eq!(batch.len(), size);
            assert!(batch.iter().all(|entry| entry.stream_id == "a"));
            assert_eq!(batch[0].event, next);
            next += size;
        }
        assert!(queue.is_empty());
    }

    #[rstest]
    fn it_should_clear_only_the_evicted_stream(mut before_each: Queue) {
        before_each.clear_for("a");
        assert_eq!(before_each.len(), 2);
        assert_eq!(bodies(&before_each.dequeue_commit()), vec!["b1", "b2"]);
    }

    #[rstest]
    fn it_should_clear_everything(mut before_each: Queue) {
        before_each.clear();
        assert!(before_each.is_empty());
        assert!(!before_each.has_multiple_commits());
    }
}
