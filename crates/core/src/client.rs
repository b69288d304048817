//! Client-side state container.
//!
//! The storefront's single-page app keeps cart, checkout and admin order
//! state in one store. Here that store is explicit: each slice is a plain
//! struct, every change is an [`Action`], and each slice's `reduce` is a pure
//! function of the previous state and the action. [`Store`] owns the slices
//! and routes every dispatched action through all of them.

use crate::cart::Cart;
use crate::checkout::Checkout;
use crate::order::{Order, OrderSummary};
use crate::types::{Money, OrderId};

/// The slice an in-flight request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Cart,
    Checkout,
    AdminOrders,
}

/// Every state change the client can make.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// A request for `Slice` was sent.
    Pending(Slice),
    /// A request for `Slice` failed with a user-facing message.
    Failed(Slice, String),
    CartLoaded(Cart),
    CartCleared,
    CheckoutCreated(Checkout),
    CheckoutPaid(Checkout),
    CheckoutFinalized { checkout: Checkout, order: Order },
    OrdersFetched(Vec<Order>),
    OrderUpdated(Order),
    OrderDeleted(OrderId),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub cart: Option<Cart>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CartState {
    #[must_use]
    pub fn reduce(self, action: &Action) -> Self {
        match action {
            Action::Pending(Slice::Cart) => Self {
                loading: true,
                error: None,
                ..self
            },
            Action::Failed(Slice::Cart, message) => Self {
                loading: false,
                error: Some(message.clone()),
                ..self
            },
            Action::CartLoaded(cart) => Self {
                cart: Some(cart.clone()),
                loading: false,
                error: None,
            },
            Action::CartCleared => Self::default(),
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutState {
    pub checkout: Option<Checkout>,
    pub order: Option<Order>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CheckoutState {
    #[must_use]
    pub fn reduce(self, action: &Action) -> Self {
        match action {
            Action::Pending(Slice::Checkout) => Self {
                loading: true,
                error: None,
                ..self
            },
            Action::Failed(Slice::Checkout, message) => Self {
                loading: false,
                error: Some(message.clone()),
                ..self
            },
            Action::CheckoutCreated(checkout) | Action::CheckoutPaid(checkout) => Self {
                checkout: Some(checkout.clone()),
                order: None,
                loading: false,
                error: None,
            },
            Action::CheckoutFinalized { checkout, order } => Self {
                checkout: Some(checkout.clone()),
                order: Some(order.clone()),
                loading: false,
                error: None,
            },
            _ => self,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminOrdersState {
    pub orders: Vec<Order>,
    pub total_orders: usize,
    pub total_sales: Money,
    pub loading: bool,
    pub error: Option<String>,
}

impl AdminOrdersState {
    #[must_use]
    pub fn reduce(self, action: &Action) -> Self {
        match action {
            Action::Pending(Slice::AdminOrders) => Self {
                loading: true,
                error: None,
                ..self
            },
            Action::Failed(Slice::AdminOrders, message) => Self {
                loading: false,
                error: Some(message.clone()),
                ..self
            },
            Action::OrdersFetched(orders) => Self {
                loading: false,
                error: None,
                ..Self::default()
            }
            .with_orders(orders.clone()),
            Action::OrderUpdated(updated) => {
                let mut orders = self.orders.clone();
                if let Some(slot) = orders.iter_mut().find(|order| order.id == updated.id) {
                    *slot = updated.clone();
                }
                self.with_orders(orders)
            }
            Action::OrderDeleted(id) => {
                let orders = self
                    .orders
                    .iter()
                    .filter(|order| order.id != *id)
                    .cloned()
                    .collect();
                self.with_orders(orders)
            }
            _ => self,
        }
    }

    fn with_orders(self, orders: Vec<Order>) -> Self {
        let summary = OrderSummary::of(&orders);
        Self {
            orders,
            total_orders: summary.total_orders,
            total_sales: summary.total_sales,
            ..self
        }
    }
}

/// All client slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootState {
    pub cart: CartState,
    pub checkout: CheckoutState,
    pub admin_orders: AdminOrdersState,
}

impl RootState {
    #[must_use]
    pub fn reduce(self, action: &Action) -> Self {
        Self {
            cart: self.cart.reduce(action),
            checkout: self.checkout.reduce(action),
            admin_orders: self.admin_orders.reduce(action),
        }
    }
}

/// What the order confirmation view should do on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// A finalized checkout is present: show it and empty the cart.
    ClearCart,
    /// Nothing to confirm: go to the order history view.
    RedirectToOrderHistory,
}

/// Decide the confirmation view's behaviour from the checkout slice.
#[must_use]
pub fn confirmation_outcome(state: &CheckoutState) -> ConfirmationOutcome {
    match &state.checkout {
        Some(checkout) if checkout.is_finalized => ConfirmationOutcome::ClearCart,
        _ => ConfirmationOutcome::RedirectToOrderHistory,
    }
}

/// Owns the root state and applies actions in dispatch order.
#[derive(Debug, Default)]
pub struct Store {
    state: RootState,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> &RootState {
        &self.state
    }

    pub fn dispatch(&mut self, action: &Action) {
        let state = std::mem::take(&mut self.state);
        self.state = state.reduce(action);
    }

    /// Run the confirmation view's entry logic, clearing the cart when a
    /// finalized checkout is present.
    pub fn confirm_order(&mut self) -> ConfirmationOutcome {
        let outcome = confirmation_outcome(&self.state.checkout);
        if outcome == ConfirmationOutcome::ClearCart {
            self.dispatch(&Action::CartCleared);
        }
        outcome
    }
}
