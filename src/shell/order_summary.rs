// Order summary query model and the denormalizers that maintain it.
//
// Purpose
// - One row per order with its customer, item counts and status.
//
// Responsibilities
// - OrderSummaryDenormalizer owns `version` and is registered for placed, item and cancelled
//   events; priority items reach it through the ItemAdded ancestor.
// - PriorityItemsDenormalizer runs before it for PriorityItemAdded, so it can guard on the
//   version the summary has not yet advanced.
// - OrderActivityDenormalizer listens to every OrderChanged event and records the latest one.

use crate::adapters::in_memory::in_memory_projections::InMemoryProjectionSession;
use crate::application::denormalization::versioned::{
    MissingProjectionBehavior, next_version, should_apply,
};
use crate::application::dispatcher::denormalizer::{Denormalize, DispatchContext};
use crate::application::dispatcher::registry::DenormalizerRegistry;
use crate::core::event::DomainEvent;
use crate::shell::orders::{
    ITEM_ADDED, ORDER_CANCELLED, ORDER_CHANGED, ORDER_PLACED, OrderEvent, PRIORITY_ITEM_ADDED,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type OrderSummarySession = InMemoryProjectionSession<OrderSummary>;
pub type OrderSummaryRegistry = DenormalizerRegistry<OrderEvent, OrderSummarySession>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub customer: String,
    pub status: OrderStatus,
    pub item_count: u32,
    pub quantity: u32,
    pub priority_items: u32,
    pub version: i64,
    pub last_event_type: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderSummary {
    fn placed(order_id: &str, customer: &str) -> Self {
        Self {
            order_id: order_id.to_string(),
            customer: customer.to_string(),
            status: OrderStatus::Placed,
            item_count: 0,
            quantity: 0,
            priority_items: 0,
            version: 0,
            last_event_type: None,
            updated_at: None,
        }
    }
}

pub struct OrderSummaryDenormalizer;

impl OrderSummaryDenormalizer {
    fn missing_behavior(event: &OrderEvent) -> MissingProjectionBehavior {
        match event {
            OrderEvent::OrderPlaced { .. } => MissingProjectionBehavior::Create,
            _ => MissingProjectionBehavior::Ignore,
        }
    }
}

#[async_trait]
impl Denormalize<OrderEvent, OrderSummarySession> for OrderSummaryDenormalizer {
    fn name(&self) -> &str {
        "order-summary"
    }

    async fn handle(
        &self,
        event: &OrderEvent,
        context: &DispatchContext,
        session: &mut OrderSummarySession,
    ) -> anyhow::Result<()> {
        let stored = session.get(event.order_id()).await?;
        if stored.is_none() && !Self::missing_behavior(event).creates() {
            tracing::debug!(
                order_id = event.order_id(),
                event_type = event.event_type(),
                "No summary to update"
            );
            return Ok(());
        }
        let stored_version = stored.as_ref().map(|summary| summary.version);
        if !should_apply(stored_version, event.version(), context) {
            return Ok(());
        }

        let mut summary = match (stored, event) {
            (Some(summary), _) => summary,
            (None, OrderEvent::OrderPlaced { order_id, customer, .. }) => {
                OrderSummary::placed(order_id, customer)
            }
            (None, _) => return Ok(()),
        };
        match event {
            OrderEvent::OrderPlaced { customer, .. } => {
                summary.customer = customer.clone();
                summary.status = OrderStatus::Placed;
            }
            OrderEvent::ItemAdded { quantity, .. }
            | OrderEvent::PriorityItemAdded { quantity, .. } => {
                summary.item_count += 1;
                summary.quantity += quantity;
            }
            OrderEvent::OrderCancelled { .. } => summary.status = OrderStatus::Cancelled,
        }
        summary.version = next_version(stored_version, event.version());
        session.upsert(event.order_id(), summary).await
    }
}

pub struct PriorityItemsDenormalizer;

#[async_trait]
impl Denormalize<OrderEvent, OrderSummarySession> for PriorityItemsDenormalizer {
    fn name(&self) -> &str {
        "priority-items"
    }

    async fn handle(
        &self,
        event: &OrderEvent,
        context: &DispatchContext,
        session: &mut OrderSummarySession,
    ) -> anyhow::Result<()> {
        if !matches!(event, OrderEvent::PriorityItemAdded { .. }) {
            return Ok(());
        }
        let Some(mut summary) = session.get(event.order_id()).await? else {
            return Ok(());
        };
        if !should_apply(Some(summary.version), event.version(), context) {
            return Ok(());
        }
        summary.priority_items += 1;
        session.upsert(event.order_id(), summary).await
    }
}

pub struct OrderActivityDenormalizer;

#[async_trait]
impl Denormalize<OrderEvent, OrderSummarySession> for OrderActivityDenormalizer {
    fn name(&self) -> &str {
        "order-activity"
    }

    async fn handle(
        &self,
        event: &OrderEvent,
        context: &DispatchContext,
        session: &mut OrderSummarySession,
    ) -> anyhow::Result<()> {
        let Some(mut summary) = session.get(event.order_id()).await? else {
            return Ok(());
        };
        if event.version() < summary.version {
            return Ok(());
        }
        summary.last_event_type = Some(event.event_type().to_string());
        summary.updated_at = Some(context.timestamp_utc);
        session.upsert(event.order_id(), summary).await
    }
}

pub fn register_order_summary_denormalizers(registry: &mut OrderSummaryRegistry) {
    let summary: Arc<dyn Denormalize<OrderEvent, OrderSummarySession>> =
        Arc::new(OrderSummaryDenormalizer);
    registry
        .register(ORDER_PLACED, summary.clone())
        .register(ITEM_ADDED, summary.clone())
        .register(ORDER_CANCELLED, summary)
        .register(PRIORITY_ITEM_ADDED, Arc::new(PriorityItemsDenormalizer))
        .register(ORDER_CHANGED, Arc::new(OrderActivityDenormalizer));
}

#[cfg(test)]
mod order_summary_tests {
    use super::*;
    use crate::adapters::in_memory::in_memory_projections::InMemoryProjections;
    use crate::application::dispatcher::repository::{
        ProjectionsUnitOfWork, ProjectionsUnitOfWorkFactory,
    };
    use crate::shell::orders::order_event_hierarchy;
    use crate::test_support::fixtures::events::{
        item_added, order_cancelled, order_placed, priority_item_added,
    };
    use rstest::rstest;

    async fn project(
        events: Vec<OrderEvent>,
        context: DispatchContext,
    ) -> InMemoryProjections<OrderSummary> {
        let projections = InMemoryProjections::new();
        let mut registry = OrderSummaryRegistry::new(order_event_hierarchy());
        register_order_summary_denormalizers(&mut registry);
        let mut session = projections.create().await.unwrap();
        for event in &events {
            session.enlist_transaction().await.unwrap();
            for (_, denormalizer) in registry.denormalizers_for(event.event_type()) {
                denormalizer
                    .handle(event, &context, &mut session)
                    .await
                    .unwrap();
            }
            session.commit_transaction().await.unwrap();
        }
        projections
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_build_the_summary_from_the_event_history() {
        let context = DispatchContext::live(Utc::now());
        let projections = project(
            vec![
                order_placed("order-1", 1),
                item_added("order-1", "beans", 2),
                priority_item_added("order-1", "grinder", 3),
                order_cancelled("order-1", 4),
            ],
            context,
        )
        .await;

        let summary = projections.get("order-1").await.unwrap().unwrap();
        assert_eq!(summary.customer, "customer-of-order-1");
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.priority_items, 1);
        assert_eq!(summary.status, OrderStatus::Cancelled);
        assert_eq!(summary.version, 4);
        assert_eq!(summary.last_event_type.as_deref(), Some("OrderCancelled"));
        assert_eq!(summary.updated_at, Some(context.timestamp_utc));
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_skip_redelivered_events_on_live_dispatch() {
        let projections = project(
            vec![
                order_placed("order-1", 1),
                priority_item_added("order-1", "grinder", 2),
                priority_item_added("order-1", "grinder", 2),
            ],
            DispatchContext::live(Utc::now()),
        )
        .await;

        let summary = projections.get("order-1").await.unwrap().unwrap();
        assert_eq!(summary.item_count, 1);
        assert_eq!(summary.priority_items, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn it_should_ignore_item_events_without_a_summary() {
        let events = vec![item_added("order-9", "beans", 2)];
        let projections = project(events, DispatchContext::live(Utc::now())).await;
        assert!(projections.get("order-9").await.unwrap().is_none());
    }
}
