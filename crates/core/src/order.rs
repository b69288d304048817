//! Orders.
//!
//! An order is the terminal record of a finalized checkout. After creation
//! only its fulfilment status changes, and only by an administrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{CartItem, lines_total};
use crate::checkout::{Checkout, ShippingAddress};
use crate::types::{CheckoutId, Money, OrderId, OrderStatus, UserId};

/// A completed purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id", alias = "id")]
    pub id: OrderId,
    pub user: UserId,
    pub checkout_id: CheckoutId,
    pub order_items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_status: String,
    pub payment_details: Option<serde_json::Value>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Copy a finalized checkout into a new order.
    #[must_use]
    pub fn from_checkout(checkout: &Checkout, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            user: checkout.user,
            checkout_id: checkout.id,
            order_items: checkout.checkout_items.clone(),
            shipping_address: checkout.shipping_address.clone(),
            payment_method: checkout.payment_method.clone(),
            total_price: checkout.total_price,
            is_paid: checkout.is_paid,
            paid_at: checkout.paid_at,
            payment_status: checkout.payment_status.clone(),
            payment_details: checkout.payment_details.clone(),
            is_delivered: false,
            delivered_at: None,
            status: OrderStatus::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sum of `price × quantity` over the order lines, `None` past
    /// [`Money::MAX`].
    #[must_use]
    pub fn items_total(&self) -> Option<Money> {
        lines_total(&self.order_items)
    }

    /// Apply an administrative status change. Moving to `Delivered` stamps
    /// the delivery time; moving away from it clears the delivery flag.
    pub fn set_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        if status.is_delivered() {
            if !self.is_delivered {
                self.delivered_at = Some(now);
            }
            self.is_delivered = true;
        } else {
            self.is_delivered = false;
            self.delivered_at = None;
        }
        self.status = status;
        self.updated_at = now;
    }
}

/// Body of `PUT /api/admin/orders/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Dashboard totals over a set of orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderSummary {
    pub total_orders: usize,
    pub total_sales: Money,
}

impl OrderSummary {
    #[must_use]
    pub fn of(orders: &[Order]) -> Self {
        Self {
            total_orders: orders.len(),
            total_sales: orders.iter().map(|order| order.total_price).sum(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::types::ProductId;

    fn order(cents: u32) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(),
            user: UserId::new(),
            checkout_id: CheckoutId::new(),
            order_items: vec![CartItem {
                product_id: ProductId::new(),
                name: "Dune".to_string(),
                image: None,
                price: Money::from_cents(cents),
                quantity: 1,
            }],
            shipping_address: ShippingAddress {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                address: "1 Main St".to_string(),
                city: "Springfield".to_string(),
                postal_code: "12345".to_string(),
                state: None,
                phone: None,
                country: "United States".to_string(),
            },
            payment_method: "paypal".to_string(),
            total_price: Money::from_cents(cents),
            is_paid: true,
            paid_at: Some(now),
            payment_status: "paid".to_string(),
            payment_details: None,
            is_delivered: false,
            delivered_at: None,
            status: OrderStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_delivered_sets_delivery_time_once() {
        let mut order = order(1000);
        let first = Utc::now();
        order.set_status(OrderStatus::Delivered, first);
        assert!(order.is_delivered);
        assert_eq!(order.delivered_at, Some(first));

        order.set_status(OrderStatus::Delivered, first + Duration::hours(1));
        assert_eq!(order.delivered_at, Some(first));

        order.set_status(OrderStatus::Shipped, first + Duration::hours(2));
        assert!(!order.is_delivered);
        assert_eq!(order.delivered_at, None);
        assert_eq!(order.status, OrderStatus::Shipped);
    }

    #[test]
    fn test_summary_totals() {
        let orders = vec![order(1000), order(2550)];
        let summary = OrderSummary::of(&orders);
        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.total_sales, Money::from_cents(3550));
        assert_eq!(OrderSummary::of(&[]), OrderSummary::default());
    }

    #[test]
    fn test_status_update_body() {
        let body: OrderStatusUpdate = serde_json::from_str(r#"{"status":"Delivered"}"#).unwrap();
        assert_eq!(body.status, OrderStatus::Delivered);
        assert!(serde_json::from_str::<OrderStatusUpdate>(r#"{"status":"Lost"}"#).is_err());
    }
}
