// Dispatch scheduler: drives the commit dispatcher and keeps dispatch flags in the commit log.
//
// Purpose
// - Deliver freshly persisted commits, catch up after a crash, and rebuild projections.
//
// Responsibilities
// - Dispatch a group of commits inside one dispatcher batch, in the order given.
// - Mark each commit dispatched right after its delivery succeeds.
// - Release the batch on every path, success or failure.
//
// Boundaries
// - Delivery is at least once. A crash between delivery and marking replays the commit later.

use crate::application::dispatcher::commit_dispatcher::CommitDispatcher;
use crate::application::errors::DispatchError;
use crate::core::commit::Commit;
use crate::core::ports::PersistStreams;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Live,
    Replay,
}

pub struct DispatchScheduler<E: Send + Sync + 'static, D> {
    persistence: Arc<dyn PersistStreams<E>>,
    dispatcher: Arc<D>,
}

impl<E, D> DispatchScheduler<E, D>
where
    E: Send + Sync + 'static,
    D: CommitDispatcher<E>,
{
    pub fn new(persistence: Arc<dyn PersistStreams<E>>, dispatcher: Arc<D>) -> Self {
        Self { persistence, dispatcher }
    }

    /// Live delivery of commits that were just persisted.
    pub async fn dispatch(&self, commits: &[Commit<E>]) -> Result<(), DispatchError> {
        self.run(commits, Delivery::Live, true).await
    }

    /// Redelivers every commit not yet marked as dispatched. Returns how many were delivered.
    pub async fn dispatch_undispatched(&self) -> Result<usize, DispatchError> {
        let commits = self.persistence.get_undispatched_commits().await?;
        if !commits.is_empty() {
            tracing::info!(commits = commits.len(), "Catching up on undispatched commits");
        }
        self.run(&commits, Delivery::Replay, true).await?;
        Ok(commits.len())
    }

    /// Replays the whole log to rebuild projections. Dispatch flags are left untouched.
    pub async fn redispatch_all(&self) -> Result<usize, DispatchError> {
        let commits = self.persistence.get_from_checkpoint(None).await?;
        tracing::info!(commits = commits.len(), "Redispatching the commit log");
        self.run(&commits, Delivery::Replay, false).await?;
        Ok(commits.len())
    }

    async fn run(
        &self,
        commits: &[Commit<E>],
        delivery: Delivery,
        mark: bool,
    ) -> Result<(), DispatchError> {
        if commits.is_empty() {
            return Ok(());
        }

        let mut batch = self.dispatcher.begin_batch().await?;
        let outcome = self.deliver_all(&mut batch, commits, delivery, mark).await;
        let released = self.dispatcher.end_batch(batch).await;
        outcome?;
        released?;

        tracing::info!(commits = commits.len(), ?delivery, "Dispatched commit batch");
        Ok(())
    }

    async fn deliver_all(
        &self,
        batch: &mut D::Batch,
        commits: &[Commit<E>],
        delivery: Delivery,
        mark: bool,
    ) -> Result<(), DispatchError> {
        for commit in commits {
            match delivery {
                Delivery::Live => self.dispatcher.dispatch(batch, commit).await?,
                Delivery::Replay => self.dispatcher.redispatch(batch, commit).await?,
            }
            if mark {
                self.persistence.mark_commit_as_dispatched(commit).await?;
            }
        }
        Ok(())
    }
}
