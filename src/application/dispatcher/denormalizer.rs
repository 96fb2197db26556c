// Inbound contract of a denormalizer: a projector fed with committed events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Metadata handed to every denormalizer with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext {
    /// Stamp of the commit that carried the event.
    pub timestamp_utc: DateTime<Utc>,
    /// Set while rebuilding projections from history.
    pub is_redispatch: bool,
}

impl DispatchContext {
    pub fn live(timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            timestamp_utc,
            is_redispatch: false,
        }
    }

    pub fn redispatch(timestamp_utc: DateTime<Utc>) -> Self {
        Self {
            timestamp_utc,
            is_redispatch: true,
        }
    }
}

/// Updates query models for the events it is registered for.
///
/// Handlers must be idempotent: dispatch is at least once, and a redispatch replays events the
/// projection may already contain.
#[async_trait]
pub trait Denormalize<E, U>: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(
        &self,
        event: &E,
        context: &DispatchContext,
        unit_of_work: &mut U,
    ) -> anyhow::Result<()>;
}
