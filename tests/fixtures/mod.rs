// Shared builders for the integration suites.
//
// Responsibilities when you add code
// - Only public crate API. Unit test fixtures live under src/test_support and are not visible here.
#![allow(dead_code)]

use async_trait::async_trait;
use optimistic_events::adapters::in_memory::in_memory_commit_log::InMemoryCommitLog;
use optimistic_events::adapters::in_memory::in_memory_projections::InMemoryProjections;
use optimistic_events::application::dispatcher::commit_dispatcher::EventStoreCommitDispatcher;
use optimistic_events::application::dispatcher::denormalizer::{Denormalize, DispatchContext};
use optimistic_events::application::dispatcher::scheduler::DispatchScheduler;
use optimistic_events::application::event_store::OptimisticEventStore;
use optimistic_events::core::event::DomainEvent;
use optimistic_events::core::ports::PersistStreams;
use optimistic_events::shell::order_summary::{
    OrderSummary, OrderSummaryRegistry, OrderSummarySession,
};
use optimistic_events::shell::orders::OrderEvent;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type OrderProjections = InMemoryProjections<OrderSummary>;
pub type OrderDispatcher = EventStoreCommitDispatcher<OrderEvent, OrderProjections>;
pub type OrderDenormalizer = Arc<dyn Denormalize<OrderEvent, OrderSummarySession>>;

pub fn order_placed(order_id: &str, version: i64) -> OrderEvent {
    OrderEvent::OrderPlaced {
        order_id: order_id.to_string(),
        customer: format!("customer-of-{order_id}"),
        version,
    }
}

pub fn item_added(order_id: &str, product: &str, version: i64) -> OrderEvent {
    OrderEvent::ItemAdded {
        order_id: order_id.to_string(),
        product: product.to_string(),
        quantity: 1,
        version,
    }
}

pub fn priority_item_added(order_id: &str, product: &str, version: i64) -> OrderEvent {
    OrderEvent::PriorityItemAdded {
        order_id: order_id.to_string(),
        product: product.to_string(),
        quantity: 1,
        version,
    }
}

/// Everything a flow test needs, wired over one in-memory commit log.
pub struct Harness {
    pub commit_log: Arc<InMemoryCommitLog<OrderEvent>>,
    pub projections: Arc<OrderProjections>,
    pub store: OptimisticEventStore<OrderEvent>,
    pub scheduler: Arc<DispatchScheduler<OrderEvent, OrderDispatcher>>,
}

impl Harness {
    pub fn new(registry: OrderSummaryRegistry) -> Self {
        let commit_log = Arc::new(InMemoryCommitLog::<OrderEvent>::new());
        let persistence: Arc<dyn PersistStreams<OrderEvent>> = commit_log.clone();
        let projections = Arc::new(InMemoryProjections::new());
        let dispatcher = EventStoreCommitDispatcher::new(Arc::new(registry), projections.clone());
        let dispatcher = Arc::new(dispatcher);
        Self {
            commit_log,
            projections,
            store: OptimisticEventStore::new(persistence.clone()),
            scheduler: Arc::new(DispatchScheduler::new(persistence, dispatcher)),
        }
    }

    pub async fn undispatched(&self) -> usize {
        let commits = self.commit_log.get_undispatched_commits().await;
        commits.unwrap().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub denormalizer: String,
    pub event_type: String,
    pub is_redispatch: bool,
}

#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Invocation>>>,
}

impl Recorder {
    pub fn named(&self, name: &str) -> OrderDenormalizer {
        Arc::new(NamedRecorder {
            name: name.to_string(),
            log: self.log.clone(),
        })
    }

    pub async fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().await.clone()
    }

    pub async fn names(&self) -> Vec<String> {
        let log = self.log.lock().await;
        log.iter().map(|call| call.denormalizer.clone()).collect()
    }
}

struct NamedRecorder {
    name: String,
    log: Arc<Mutex<Vec<Invocation>>>,
}

#[async_trait]
impl Denormalize<OrderEvent, OrderSummarySession> for NamedRecorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        event: &OrderEvent,
        context: &DispatchContext,
        _: &mut OrderSummarySession,
    ) -> anyhow::Result<()> {
        self.log.lock().await.push(Invocation {
            denormalizer: self.name.clone(),
            event_type: event.event_type().to_string(),
            is_redispatch: context.is_redispatch,
        });
        Ok(())
    }
}

/// Fails until `recover` is called.
#[derive(Clone, Default)]
pub struct Flaky {
    recovered: Arc<Mutex<bool>>,
}

impl Flaky {
    pub fn denormalizer(&self) -> OrderDenormalizer {
        Arc::new(self.clone())
    }

    pub async fn recover(&self) {
        *self.recovered.lock().await = true;
    }
}

#[async_trait]
impl Denormalize<OrderEvent, OrderSummarySession> for Flaky {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn handle(
        &self,
        event: &OrderEvent,
        _: &DispatchContext,
        _: &mut OrderSummarySession,
    ) -> anyhow::Result<()> {
        if !*self.recovered.lock().await {
            anyhow::bail!("flaky is down while handling {}", event.event_type());
        }
        Ok(())
    }
}
