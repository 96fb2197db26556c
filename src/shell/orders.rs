// Sample order aggregate and its events, used by the binary and the test suites.
//
// Event types form a small hierarchy: PriorityItemAdded specializes ItemAdded, and every order
// event specializes the abstract OrderChanged.

use crate::application::dispatcher::registry::EventTypeHierarchy;
use crate::core::event::{DomainEvent, EventSource};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ORDER_CHANGED: &str = "OrderChanged";
pub const ORDER_PLACED: &str = "OrderPlaced";
pub const ITEM_ADDED: &str = "ItemAdded";
pub const PRIORITY_ITEM_ADDED: &str = "PriorityItemAdded";
pub const ORDER_CANCELLED: &str = "OrderCancelled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    OrderPlaced {
        order_id: String,
        customer: String,
        version: i64,
    },
    ItemAdded {
        order_id: String,
        product: String,
        quantity: u32,
        version: i64,
    },
    PriorityItemAdded {
        order_id: String,
        product: String,
        quantity: u32,
        version: i64,
    },
    OrderCancelled {
        order_id: String,
        reason: String,
        version: i64,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::OrderPlaced { order_id, .. }
            | Self::ItemAdded { order_id, .. }
            | Self::PriorityItemAdded { order_id, .. }
            | Self::OrderCancelled { order_id, .. } => order_id,
        }
    }

    /// Aggregate version this event produced.
    pub fn version(&self) -> i64 {
        match self {
            Self::OrderPlaced { version, .. }
            | Self::ItemAdded { version, .. }
            | Self::PriorityItemAdded { version, .. }
            | Self::OrderCancelled { version, .. } => *version,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::OrderPlaced { .. } => ORDER_PLACED,
            Self::ItemAdded { .. } => ITEM_ADDED,
            Self::PriorityItemAdded { .. } => PRIORITY_ITEM_ADDED,
            Self::OrderCancelled { .. } => ORDER_CANCELLED,
        }
    }
}

pub fn order_event_hierarchy() -> EventTypeHierarchy {
    EventTypeHierarchy::new()
        .with_parent(ORDER_PLACED, ORDER_CHANGED)
        .with_parent(ITEM_ADDED, ORDER_CHANGED)
        .with_parent(PRIORITY_ITEM_ADDED, ITEM_ADDED)
        .with_parent(ORDER_CANCELLED, ORDER_CHANGED)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {0} is cancelled")]
    Cancelled(String),
    #[error("quantity must be positive")]
    EmptyQuantity,
}

#[derive(Debug, Clone, Default)]
pub struct Order {
    order_id: String,
    customer: String,
    items: Vec<(String, u32)>,
    cancelled: bool,
    committed_version: i64,
    changes: Vec<OrderEvent>,
}

impl Order {
    pub fn place(order_id: impl Into<String>, customer: impl Into<String>) -> Self {
        let mut order = Self::default();
        let event = OrderEvent::OrderPlaced {
            order_id: order_id.into(),
            customer: customer.into(),
            version: 1,
        };
        order.raise(event);
        order
    }

    pub fn add_item(
        &mut self,
        product: impl Into<String>,
        quantity: u32,
    ) -> Result<(), OrderError> {
        self.ensure_open(quantity)?;
        let event = OrderEvent::ItemAdded {
            order_id: self.order_id.clone(),
            product: product.into(),
            quantity,
            version: self.version() + 1,
        };
        self.raise(event);
        Ok(())
    }

    pub fn add_priority_item(
        &mut self,
        product: impl Into<String>,
        quantity: u32,
    ) -> Result<(), OrderError> {
        self.ensure_open(quantity)?;
        let event = OrderEvent::PriorityItemAdded {
            order_id: self.order_id.clone(),
            product: product.into(),
            quantity,
            version: self.version() + 1,
        };
        self.raise(event);
        Ok(())
    }

    /// Cancelling twice is a no-op.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.cancelled {
            return;
        }
        let event = OrderEvent::OrderCancelled {
            order_id: self.order_id.clone(),
            reason: reason.into(),
            version: self.version() + 1,
        };
        self.raise(event);
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn items(&self) -> &[(String, u32)] {
        &self.items
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn ensure_open(&self, quantity: u32) -> Result<(), OrderError> {
        if self.cancelled {
            return Err(OrderError::Cancelled(self.order_id.clone()));
        }
        if quantity == 0 {
            return Err(OrderError::EmptyQuantity);
        }
        Ok(())
    }

    fn raise(&mut self, event: OrderEvent) {
        self.apply(&event);
        self.changes.push(event);
    }

    fn apply(&mut self, event: &OrderEvent) {
        match event {
            OrderEvent::OrderPlaced { order_id, customer, .. } => {
                self.order_id = order_id.clone();
                self.customer = customer.clone();
            }
            OrderEvent::ItemAdded { product, quantity, .. }
            | OrderEvent::PriorityItemAdded { product, quantity, .. } => {
                self.items.push((product.clone(), *quantity));
            }
            OrderEvent::OrderCancelled { .. } => self.cancelled = true,
        }
    }
}

impl EventSource<OrderEvent> for Order {
    fn stream_id(&self) -> String {
        self.order_id.clone()
    }

    fn committed_version(&self) -> i64 {
        self.committed_version
    }

    fn changes(&self) -> &[OrderEvent] {
        &self.changes
    }

    fn mark_as_committed(&mut self, committed_version: i64) {
        let persisted = committed_version - self.committed_version;
        let persisted = persisted.clamp(0, self.changes.len() as i64) as usize;
        self.changes.drain(..persisted);
        self.committed_version = committed_version;
    }

    fn load(&mut self, committed_version: i64, events: Vec<OrderEvent>) {
        *self = Self::default();
        for event in &events {
            self.apply(event);
        }
        self.committed_version = committed_version;
    }
}
