// Order event builders with predictable payloads.

pub use crate::shell::orders::OrderEvent;

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

pub fn order_cancelled(order_id: &str, version: i64) -> OrderEvent {
    OrderEvent::OrderCancelled {
        order_id: order_id.to_string(),
        reason: "changed my mind".to_string(),
        version,
    }
}
