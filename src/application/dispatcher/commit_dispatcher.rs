// Commit dispatcher: fans the events of a commit out to every interested denormalizer.
//
// Purpose
// - Keep query models in step with the commit log.
//
// Responsibilities
// - Expand a commit into denormalization commands: events in commit order, and per event the
//   denormalizers of the exact type first, then of each ancestor type.
// - Run commands in chunks of the configured size, one projection transaction per chunk.
// - On failure roll the chunk back, log the failing denormalizer and event, and return the error.
//
// Boundaries
// - Never retries and never swallows a denormalizer error.
// - Marking commits as dispatched belongs to the scheduler.

use crate::application::dispatcher::denormalizer::{Denormalize, DispatchContext};
use crate::application::dispatcher::registry::DenormalizerRegistry;
use crate::application::dispatcher::repository::{
    ProjectionsUnitOfWork, ProjectionsUnitOfWorkFactory,
};
use crate::application::errors::DispatchError;
use crate::config::{DEFAULT_DISPATCH_BATCH_SIZE, EventStoreConfig};
use crate::core::commit::Commit;
use crate::core::event::DomainEvent;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait CommitDispatcher<E: Send + Sync + 'static>: Send + Sync {
    /// Resources shared by the commits dispatched between `begin_batch` and `end_batch`.
    type Batch: Send;

    async fn begin_batch(&self) -> Result<Self::Batch, DispatchError>;

    /// Releases the batch. Any transaction still open is rolled back.
    async fn end_batch(&self, batch: Self::Batch) -> Result<(), DispatchError>;

    /// Live delivery of a freshly persisted commit.
    async fn dispatch(
        &self,
        batch: &mut Self::Batch,
        commit: &Commit<E>,
    ) -> Result<(), DispatchError>;

    /// Replay of a historical commit while rebuilding projections.
    async fn redispatch(
        &self,
        batch: &mut Self::Batch,
        commit: &Commit<E>,
    ) -> Result<(), DispatchError>;
}

pub struct DispatchBatch<U> {
    unit_of_work: U,
    commands: usize,
}

impl<U> DispatchBatch<U> {
    pub fn unit_of_work(&self) -> &U {
        &self.unit_of_work
    }

    /// Commands executed so far in this batch.
    pub fn commands(&self) -> usize {
        self.commands
    }
}

struct DenormalizationCommand<'a, E, U> {
    declared_type: String,
    denormalizer: Arc<dyn Denormalize<E, U>>,
    event: &'a E,
}

type Registry<E, F> = DenormalizerRegistry<E, <F as ProjectionsUnitOfWorkFactory>::UnitOfWork>;

pub struct EventStoreCommitDispatcher<E, F: ProjectionsUnitOfWorkFactory> {
    registry: Arc<Registry<E, F>>,
    factory: Arc<F>,
    batch_size: usize,
}

impl<E, F> EventStoreCommitDispatcher<E, F>
where
    E: DomainEvent,
    F: ProjectionsUnitOfWorkFactory,
{
    pub fn new(registry: Arc<Registry<E, F>>, factory: Arc<F>) -> Self {
        Self::with_batch_size(registry, factory, DEFAULT_DISPATCH_BATCH_SIZE)
    }

    pub fn with_config(
        registry: Arc<Registry<E, F>>,
        factory: Arc<F>,
        config: &EventStoreConfig,
    ) -> Self {
        Self::with_batch_size(registry, factory, config.dispatch_batch_size)
    }

    pub fn with_batch_size(
        registry: Arc<Registry<E, F>>,
        factory: Arc<F>,
        batch_size: usize,
    ) -> Self {
        Self {
            registry,
            factory,
            batch_size: batch_size.max(1),
        }
    }

    fn commands_for<'a>(
        &self,
        commit: &'a Commit<E>,
    ) -> Vec<DenormalizationCommand<'a, E, F::UnitOfWork>> {
        commit
            .events
            .iter()
            .filter_map(|message| message.body.as_ref())
            .flat_map(|event| {
                self.registry
                    .denormalizers_for(event.event_type())
                    .into_iter()
                    .map(move |(declared_type, denormalizer)| DenormalizationCommand {
                        declared_type,
                        denormalizer,
                        event,
                    })
            })
            .collect()
    }

    async fn dispatch_with(
        &self,
        batch: &mut DispatchBatch<F::UnitOfWork>,
        commit: &Commit<E>,
        context: DispatchContext,
    ) -> Result<(), DispatchError> {
        let commands = self.commands_for(commit);
        tracing::debug!(
            stream_id = %commit.stream_id,
            commit_sequence = commit.commit_sequence,
            checkpoint = %commit.checkpoint_token,
            commands = commands.len(),
            is_redispatch = context.is_redispatch,
            "Dispatching commit"
        );

        for chunk in commands.chunks(self.batch_size) {
            let unit_of_work = &mut batch.unit_of_work;
            self.run_chunk(unit_of_work, commit, &context, chunk).await?;
            batch.commands += chunk.len();
        }
        Ok(())
    }

    async fn run_chunk(
        &self,
        unit_of_work: &mut F::UnitOfWork,
        commit: &Commit<E>,
        context: &DispatchContext,
        chunk: &[DenormalizationCommand<'_, E, F::UnitOfWork>],
    ) -> Result<(), DispatchError> {
        unit_of_work
            .enlist_transaction()
            .await
            .map_err(DispatchError::UnitOfWork)?;

        for command in chunk {
            let handled = command
                .denormalizer
                .handle(command.event, context, unit_of_work)
                .await;
            if let Err(source) = handled {
                tracing::error!(
                    denormalizer = command.denormalizer.name(),
                    event_type = command.event.event_type(),
                    declared_type = %command.declared_type,
                    stream_id = %commit.stream_id,
                    commit_id = %commit.commit_id,
                    commit_sequence = commit.commit_sequence,
                    error = %source,
                    "Denormalization failed"
                );
                rollback_quietly(unit_of_work).await;
                return Err(DispatchError::Denormalization {
                    denormalizer: command.denormalizer.name().to_string(),
                    event_type: command.event.event_type().to_string(),
                    stream_id: commit.stream_id.clone(),
                    commit_id: commit.commit_id,
                    commit_sequence: commit.commit_sequence,
                    source,
                });
            }
        }

        if let Err(source) = unit_of_work.commit_transaction().await {
            rollback_quietly(unit_of_work).await;
            return Err(DispatchError::UnitOfWork(source));
        }
        Ok(())
    }
}

async fn rollback_quietly<U: ProjectionsUnitOfWork>(unit_of_work: &mut U) {
    if let Err(error) = unit_of_work.rollback_transaction().await {
        tracing::warn!(error = %error, "Rollback of projection transaction failed");
    }
}

#[async_trait]
impl<E, F> CommitDispatcher<E> for EventStoreCommitDispatcher<E, F>
where
    E: DomainEvent,
    F: ProjectionsUnitOfWorkFactory + 'static,
{
    type Batch = DispatchBatch<F::UnitOfWork>;

    async fn begin_batch(&self) -> Result<Self::Batch, DispatchError> {
        let unit_of_work = self
            .factory
            .create()
            .await
            .map_err(DispatchError::UnitOfWork)?;
        Ok(DispatchBatch {
            unit_of_work,
            commands: 0,
        })
    }

    async fn end_batch(&self, mut batch: Self::Batch) -> Result<(), DispatchError> {
        if batch.unit_of_work.has_transaction() {
            tracing::warn!("Dispatch batch ended inside a projection transaction, rolling back");
            rollback_quietly(&mut batch.unit_of_work).await;
        }
        tracing::debug!(commands = batch.commands, "Dispatch batch ended");
        Ok(())
    }

    async fn dispatch(
        &self,
        batch: &mut Self::Batch,
        commit: &Commit<E>,
    ) -> Result<(), DispatchError> {
        let context = DispatchContext::live(commit.commit_stamp);
        self.dispatch_with(batch, commit, context).await
    }

    async fn redispatch(
        &self,
        batch: &mut Self::Batch,
        commit: &Commit<E>,
    ) -> Result<(), DispatchError> {
        let context = DispatchContext::redispatch(commit.commit_stamp);
        self.dispatch_with(batch, commit, context).await
    }
}
