// Ports for the query model storage written by denormalizers.
//
// Purpose
// - Let the dispatcher group denormalizer writes in transactions without knowing the storage.
//
// Boundaries
// - Adapters decide what a transaction is. Rolling back when no transaction is open must succeed.

use async_trait::async_trait;

#[async_trait]
pub trait ProjectionsUnitOfWork: Send + Sync {
    async fn enlist_transaction(&mut self) -> anyhow::Result<()>;
    async fn commit_transaction(&mut self) -> anyhow::Result<()>;
    /// Discards the open transaction. A no-op when none is open.
    async fn rollback_transaction(&mut self) -> anyhow::Result<()>;
    fn has_transaction(&self) -> bool;
}

#[async_trait]
pub trait ProjectionsUnitOfWorkFactory: Send + Sync {
    type UnitOfWork: ProjectionsUnitOfWork;

    /// Opens a fresh session against the query model storage.
    async fn create(&self) -> anyhow::Result<Self::UnitOfWork>;
}
