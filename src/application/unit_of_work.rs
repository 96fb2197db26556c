// Event sourced unit of work.
//
// Purpose
// - Track the aggregates touched by one logical transaction and persist their changes together.
//
// Responsibilities
// - Hydrate aggregates from their streams and detect stale expected versions.
// - Drain pending changes through the uncommitted event queue, one commit per same-stream batch.
// - Dispatch the commits of one submit_changes call as one batch, after all of them persist.
// - Log when a submission spans several commits, since only each commit is atomic.
// - Translate concurrency conflicts into record level errors.
//
// Boundaries
// - Owned by a single caller; pass it explicitly instead of keeping it in ambient state.
// - A failed dispatch leaves the commits undispatched for the scheduler's catch up run.
// - A failed commit leaves earlier commits of the same call persisted. Aggregates keep only the
//   changes that were not persisted, so submitting again appends the remainder.

use crate::application::dispatcher::commit_dispatcher::CommitDispatcher;
use crate::application::dispatcher::scheduler::DispatchScheduler;
use crate::application::errors::UnitOfWorkError;
use crate::application::event_store::OptimisticEventStore;
use crate::core::commit::{Commit, EventMessage};
use crate::core::event::EventSource;
use crate::core::ports::StoreError;
use crate::core::uncommitted_event_queue::UncommittedEventQueue;
use std::sync::Arc;
use uuid::Uuid;

pub struct EventStoreUnitOfWork<E, A, D>
where
    E: Clone + Send + Sync + 'static,
    A: EventSource<E> + Default,
    D: CommitDispatcher<E>,
{
    store: OptimisticEventStore<E>,
    scheduler: Arc<DispatchScheduler<E, D>>,
    tracked: Vec<A>,
    queue: UncommittedEventQueue<E>,
}

impl<E, A, D> EventStoreUnitOfWork<E, A, D>
where
    E: Clone + Send + Sync + 'static,
    A: EventSource<E> + Default,
    D: CommitDispatcher<E>,
{
    pub fn new(store: OptimisticEventStore<E>, scheduler: Arc<DispatchScheduler<E, D>>) -> Self {
        Self {
            store,
            scheduler,
            tracked: Vec::new(),
            queue: UncommittedEventQueue::new(),
        }
    }

    /// Starts tracking `aggregate`. Ignored when an aggregate with the same stream id is tracked.
    pub fn add(&mut self, aggregate: A) {
        if self.position(&aggregate.stream_id()).is_none() {
            self.tracked.push(aggregate);
        }
    }

    /// The tracked aggregate, or the aggregate hydrated from its stream.
    ///
    /// Fails with `RecordNotFound` when the stream has no commits, and with
    /// `RecordChangedByAnotherUser` when `expected_version` differs from the committed version.
    pub async fn get(
        &mut self,
        stream_id: &str,
        expected_version: Option<i64>,
    ) -> Result<&mut A, UnitOfWorkError> {
        let index = match self.position(stream_id) {
            Some(index) => index,
            None => {
                let aggregate = self.hydrate(stream_id).await?;
                self.tracked.push(aggregate);
                self.tracked.len() - 1
            }
        };

        let aggregate = &mut self.tracked[index];
        if let Some(expected) = expected_version {
            if aggregate.committed_version() != expected {
                return Err(UnitOfWorkError::RecordChangedByAnotherUser {
                    stream_id: stream_id.to_string(),
                    expected,
                    actual: aggregate.committed_version(),
                });
            }
        }
        Ok(aggregate)
    }

    pub async fn exists(&self, stream_id: &str) -> Result<bool, UnitOfWorkError> {
        if self.position(stream_id).is_some() {
            return Ok(true);
        }
        let stream = self.store.open_stream(stream_id, 0, i64::MAX).await?;
        Ok(stream.stream_revision() > 0)
    }

    pub fn is_tracked(&self, stream_id: &str) -> bool {
        self.position(stream_id).is_some()
    }

    /// Stops tracking `stream_id` and drops its queued events.
    pub fn evict(&mut self, stream_id: &str) {
        self.tracked.retain(|aggregate| aggregate.stream_id() != stream_id);
        self.queue.clear_for(stream_id);
    }

    pub fn evict_all(&mut self) {
        self.tracked.clear();
        self.queue.clear();
    }

    /// Persists the pending changes of every tracked aggregate, then dispatches the commits.
    ///
    /// When a commit fails, the commits before it stay persisted and undispatched. The affected
    /// aggregates keep their unpersisted changes, so calling this again persists the remainder.
    pub async fn submit_changes(&mut self) -> Result<Vec<Commit<E>>, UnitOfWorkError> {
        for aggregate in &self.tracked {
            let stream_id = aggregate.stream_id();
            for event in aggregate.changes() {
                self.queue.enqueue(stream_id.clone(), event.clone());
            }
        }
        if self.queue.has_multiple_commits() {
            tracing::info!(
                events = self.queue.len(),
                "Unit of work spans several commits and is not atomic as a whole"
            );
        }

        let mut commits = Vec::new();
        if let Err(error) = self.commit_queued(&mut commits).await {
            self.queue.clear();
            return Err(error);
        }

        if !commits.is_empty() {
            tracing::info!(commits = commits.len(), "Submitted unit of work");
            self.scheduler.dispatch(&commits).await?;
        }
        Ok(commits)
    }

    async fn commit_queued(
        &mut self,
        commits: &mut Vec<Commit<E>>,
    ) -> Result<(), UnitOfWorkError> {
        loop {
            let batch = self.queue.dequeue_commit();
            let Some(first) = batch.first() else {
                return Ok(());
            };
            let stream_id = first.stream_id.clone();
            let index = self
                .position(&stream_id)
                .ok_or_else(|| UnitOfWorkError::RecordNotFound {
                    stream_id: stream_id.clone(),
                })?;

            let aggregate = &self.tracked[index];
            let committed_version = aggregate.committed_version();
            let mut stream = self.store.open_or_create_stream(aggregate).await?;
            let actual = stream.stream_revision();
            if actual != committed_version {
                return Err(conflict(&stream_id, committed_version, actual));
            }

            for pending in batch {
                stream.add(EventMessage::new(pending.event));
            }

            match stream.commit_changes(Uuid::now_v7()).await {
                Ok(commit) => {
                    self.tracked[index].mark_as_committed(stream.stream_revision());
                    commits.extend(commit);
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    let actual = stream.stream_revision();
                    return Err(conflict(&stream_id, committed_version, actual));
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    async fn hydrate(&self, stream_id: &str) -> Result<A, UnitOfWorkError> {
        let stream = self.store.open_stream(stream_id, 0, i64::MAX).await?;
        if stream.stream_revision() == 0 {
            return Err(UnitOfWorkError::RecordNotFound {
                stream_id: stream_id.to_string(),
            });
        }

        let events = stream
            .committed_events()
            .iter()
            .filter_map(|message| message.body.clone())
            .collect();
        let mut aggregate = A::default();
        aggregate.load(stream.stream_revision(), events);
        Ok(aggregate)
    }

    fn position(&self, stream_id: &str) -> Option<usize> {
        self.tracked
            .iter()
            .position(|aggregate| aggregate.stream_id() == stream_id)
    }
}

fn conflict(stream_id: &str, expected: i64, actual: i64) -> UnitOfWorkError {
    tracing::warn!(stream_id, expected, actual, "Aggregate was changed by another writer");
    if expected == 0 {
        UnitOfWorkError::DuplicateRecord {
            stream_id: stream_id.to_string(),
        }
    } else {
        UnitOfWorkError::RecordChangedByAnotherUser {
            stream_id: stream_id.to_string(),
            expected,
            actual,
        }
    }
}
