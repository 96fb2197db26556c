use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

use optimistic_events::adapters::in_memory::in_memory_commit_log::InMemoryCommitLog;
use optimistic_events::adapters::in_memory::in_memory_projections::InMemoryProjections;
use optimistic_events::adapters::serialization::json_serializer::JsonSerializer;
use optimistic_events::application::dispatcher::commit_dispatcher::EventStoreCommitDispatcher;
use optimistic_events::application::dispatcher::registry::DenormalizerRegistry;
use optimistic_events::application::dispatcher::scheduler::DispatchScheduler;
use optimistic_events::application::event_store::OptimisticEventStore;
use optimistic_events::application::unit_of_work::EventStoreUnitOfWork;
use optimistic_events::config::EventStoreConfig;
use optimistic_events::core::ports::PersistStreams;
use optimistic_events::core::stream_id_hasher::{Sha1StreamIdHasher, ValidatingStreamIdHasher};
use optimistic_events::shell::order_summary::{OrderSummary, register_order_summary_denormalizers};
use optimistic_events::shell::orders::{Order, OrderEvent, order_event_hierarchy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = EventStoreConfig::from_env()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    fmt().with_env_filter(filter).init();

    // In-memory deps for now
    let max_length = config.max_stream_id_hash_length;
    let hasher = ValidatingStreamIdHasher::with_max_length(Sha1StreamIdHasher, max_length);
    let commit_log = InMemoryCommitLog::<OrderEvent>::with_parts(JsonSerializer, hasher);
    let commit_log: Arc<dyn PersistStreams<OrderEvent>> = Arc::new(commit_log);
    let projections = Arc::new(InMemoryProjections::<OrderSummary>::new());

    let mut registry = DenormalizerRegistry::new(order_event_hierarchy());
    register_order_summary_denormalizers(&mut registry);
    let dispatcher = Arc::new(EventStoreCommitDispatcher::with_config(
        Arc::new(registry),
        projections.clone(),
        &config,
    ));
    let scheduler = Arc::new(DispatchScheduler::new(commit_log.clone(), dispatcher));
    let store = OptimisticEventStore::new(commit_log);

    let caught_up = scheduler.dispatch_undispatched().await?;
    tracing::info!(commits = caught_up, "Caught up on undispatched commits");

    let order_id = format!("order-{}", Uuid::now_v7());
    let mut unit_of_work = EventStoreUnitOfWork::new(store.clone(), scheduler.clone());
    let mut order = Order::place(order_id.clone(), "walk-in");
    order.add_item("filter papers", 2)?;
    order.add_priority_item("espresso beans", 1)?;
    unit_of_work.add(order);
    let commits = unit_of_work.submit_changes().await?;
    tracing::info!(order_id = %order_id, commits = commits.len(), "Order submitted");

    let mut unit_of_work = EventStoreUnitOfWork::<OrderEvent, Order, _>::new(store, scheduler);
    let order = unit_of_work.get(&order_id, Some(3)).await?;
    order.cancel("changed their mind");
    unit_of_work.submit_changes().await?;

    match projections.get(&order_id).await? {
        Some(summary) => tracing::info!(
            order_id = %summary.order_id,
            status = ?summary.status,
            items = summary.item_count,
            priority_items = summary.priority_items,
            version = summary.version,
            "Order summary"
        ),
        None => tracing::warn!(order_id = %order_id, "Order summary was not projected"),
    }
    Ok(())
}
