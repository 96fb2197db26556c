// Denormalizer stubs that record or reject what they are handed.

use crate::application::dispatcher::denormalizer::{Denormalize, DispatchContext};
use crate::core::event::DomainEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub denormalizer: String,
    pub event_type: String,
    pub is_redispatch: bool,
    pub timestamp_utc: DateTime<Utc>,
}

/// Shared log of invocations. `named` hands out denormalizers writing to the same log, so the
/// relative order of several denormalizers can be asserted.
#[derive(Clone, Default)]
pub struct RecordingDenormalizer {
    log: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingDenormalizer {
    pub fn named(&self, name: &str) -> NamedRecorder {
        NamedRecorder {
            name: name.to_string(),
            log: self.log.clone(),
        }
    }

    pub async fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().await.clone()
    }
}

pub struct NamedRecorder {
    name: String,
    log: Arc<Mutex<Vec<Invocation>>>,
}

#[async_trait]
impl<E, U> Denormalize<E, U> for NamedRecorder
where
    E: DomainEvent,
    U: Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &E, context: &DispatchContext, _: &mut U) -> anyhow::Result<()> {
        self.log.lock().await.push(Invocation {
            denormalizer: self.name.clone(),
            event_type: event.event_type().to_string(),
            is_redispatch: context.is_redispatch,
            timestamp_utc: context.timestamp_utc,
        });
        Ok(())
    }
}

pub struct FailingDenormalizer {
    name: String,
}

impl FailingDenormalizer {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl<E, U> Denormalize<E, U> for FailingDenormalizer
where
    E: DomainEvent,
    U: Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &E, _: &DispatchContext, _: &mut U) -> anyhow::Result<()> {
        anyhow::bail!("{} refused {}", self.name, event.event_type())
    }
}
