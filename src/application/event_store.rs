// Event store facade.
//
// Purpose
// - Hand out optimistic event streams backed by one shared commit log.
//
// Responsibilities
// - Create empty streams, hydrate existing ones, and pick between the two for an aggregate.
// - Expose the commit log for checkpoint and stamp based reads.

use crate::core::event::EventSource;
use crate::core::event_stream::OptimisticEventStream;
use crate::core::ports::{PersistStreams, StoreError};
use std::sync::Arc;

type Opened<E> = Result<OptimisticEventStream<E>, StoreError>;

pub struct OptimisticEventStore<E: Send + Sync + 'static> {
    persistence: Arc<dyn PersistStreams<E>>,
}

impl<E: Send + Sync + 'static> Clone for OptimisticEventStore<E> {
    fn clone(&self) -> Self {
        Self {
            persistence: self.persistence.clone(),
        }
    }
}

impl<E> OptimisticEventStore<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new(persistence: Arc<dyn PersistStreams<E>>) -> Self {
        Self { persistence }
    }

    pub fn create_stream(&self, stream_id: impl Into<String>) -> OptimisticEventStream<E> {
        OptimisticEventStream::new(stream_id, self.persistence.clone())
    }

    /// Opens `stream_id` hydrated with `[min_revision, max_revision]`. A `max_revision` of zero
    /// or less reads up to the head of the stream.
    pub async fn open_stream(
        &self,
        stream_id: impl Into<String>,
        min_revision: i64,
        max_revision: i64,
    ) -> Opened<E> {
        let max_revision = if max_revision <= 0 {
            i64::MAX
        } else {
            max_revision
        };
        let persistence = self.persistence.clone();
        OptimisticEventStream::open(stream_id, persistence, min_revision, max_revision).await
    }

    /// Empty stream for an aggregate that was never committed, otherwise the stream from the
    /// aggregate's committed version to the head.
    pub async fn open_or_create_stream<A>(&self, aggregate: &A) -> Opened<E>
    where
        A: EventSource<E> + ?Sized,
    {
        if aggregate.is_new() {
            return Ok(self.create_stream(aggregate.stream_id()));
        }
        let (stream_id, from) = (aggregate.stream_id(), aggregate.committed_version());
        self.open_stream(stream_id, from, i64::MAX).await
    }

    /// The underlying commit log.
    pub fn advanced(&self) -> &Arc<dyn PersistStreams<E>> {
        &self.persistence
    }
}
