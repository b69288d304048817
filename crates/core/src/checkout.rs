//! Checkout state progression.
//!
//! A checkout is a snapshot of a cart plus shipping and payment details. It
//! moves through three states and never backwards:
//!
//! ```text
//! Created (unpaid) ──mark_paid──▶ Paid ──finalize──▶ Finalized (+ Order)
//! ```
//!
//! Payment is only recorded against a [`VerifiedPayment`], i.e. after the
//! payment provider itself has confirmed the capture. The status string the
//! client sends is checked for shape but never trusted on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::{CartItem, lines_total};
use crate::order::Order;
use crate::types::{CheckoutId, Money, ProductId, UserId};

/// The only payment status a client may report.
pub const PAYMENT_STATUS_PAID: &str = "paid";

/// Payment status of a checkout that has not been paid yet.
pub const PAYMENT_STATUS_PENDING: &str = "pending";

/// Errors from checkout transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("no items in checkout")]
    EmptyCart,
    #[error("quantity must be at least 1 for product {0}")]
    InvalidQuantity(ProductId),
    #[error("shipping address {0} is required")]
    MissingAddressField(&'static str),
    #[error("payment method is required")]
    MissingPaymentMethod,
    #[error("product {0} is not available")]
    UnknownProduct(ProductId),
    #[error("price of product {product_id} is {current}, not {submitted}")]
    PriceChanged {
        product_id: ProductId,
        current: Money,
        submitted: Money,
    },
    #[error("checkout total is too large")]
    TotalTooLarge,
    #[error("total price {submitted} does not match items total {expected}")]
    TotalMismatch { expected: Money, submitted: Money },
    #[error("unsupported payment status: {0:?}")]
    UnsupportedPaymentStatus(String),
    #[error("payment details must include the provider order id")]
    MissingPaymentReference,
    #[error("payment was not completed (provider status {0})")]
    PaymentNotCompleted(String),
    #[error("captured amount {captured} does not match checkout total {expected}")]
    AmountMismatch { expected: Money, captured: Money },
    #[error("checkout is already paid")]
    AlreadyPaid,
    #[error("checkout is not paid")]
    NotPaid,
    #[error("checkout is already finalized")]
    AlreadyFinalized,
}

/// Shipping destination. Every field except `state` and `phone` must be
/// present and non-blank; nothing else is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: String,
}

impl ShippingAddress {
    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingAddressField`] naming the first blank field.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let required = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(CheckoutError::MissingAddressField(*field)),
            None => Ok(()),
        }
    }
}

/// Request body for creating a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCheckout {
    #[serde(default)]
    pub checkout_items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub payment_method: String,
    /// Client-computed total. Optional, but must agree with the items if sent.
    pub total_price: Option<Money>,
}

impl NewCheckout {
    /// Validate the request and open a checkout in the `Created` state.
    ///
    /// `current_price` returns the catalog selling price of a product, or
    /// `None` if it no longer exists. Every line must carry that price.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::EmptyCart`] for an empty item list, or the
    /// first quantity, address, payment method, price or total problem found.
    pub fn into_checkout<F>(
        mut self,
        user: UserId,
        current_price: F,
        now: DateTime<Utc>,
    ) -> Result<Checkout, CheckoutError>
    where
        F: Fn(ProductId) -> Option<Money>,
    {
        if self.checkout_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(item) = self.checkout_items.iter().find(|item| item.quantity == 0) {
            return Err(CheckoutError::InvalidQuantity(item.product_id));
        }
        self.shipping_address.validate()?;
        let payment_method = self.payment_method.trim().to_owned();
        if payment_method.is_empty() {
            return Err(CheckoutError::MissingPaymentMethod);
        }

        for item in &mut self.checkout_items {
            let current = current_price(item.product_id)
                .ok_or(CheckoutError::UnknownProduct(item.product_id))?;
            if !same_cents(current, item.price) {
                return Err(CheckoutError::PriceChanged {
                    product_id: item.product_id,
                    current,
                    submitted: item.price,
                });
            }
            item.price = current;
        }

        let expected = lines_total(&self.checkout_items).ok_or(CheckoutError::TotalTooLarge)?;
        if let Some(submitted) = self.total_price
            && !same_cents(submitted, expected)
        {
            return Err(CheckoutError::TotalMismatch { expected, submitted });
        }

        Ok(Checkout {
            id: CheckoutId::new(),
            user,
            checkout_items: self.checkout_items,
            shipping_address: self.shipping_address,
            payment_method,
            total_price: expected,
            is_paid: false,
            paid_at: None,
            payment_status: PAYMENT_STATUS_PENDING.to_owned(),
            payment_details: None,
            is_finalized: false,
            finalized_at: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Request body for marking a checkout paid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub payment_status: String,
    /// Provider capture payload, stored verbatim.
    #[serde(default)]
    pub payment_details: serde_json::Value,
    pub payment_method: Option<String>,
}

impl PaymentUpdate {
    /// Check the reported status and return the provider order id to verify.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::UnsupportedPaymentStatus`] unless the status
    /// is `"paid"`, and [`CheckoutError::MissingPaymentReference`] when the
    /// details carry no provider order id.
    pub fn provider_reference(&self) -> Result<&str, CheckoutError> {
        if !self.payment_status.trim().eq_ignore_ascii_case(PAYMENT_STATUS_PAID) {
            return Err(CheckoutError::UnsupportedPaymentStatus(
                self.payment_status.clone(),
            ));
        }
        self.payment_details
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(CheckoutError::MissingPaymentReference)
    }
}

/// What the payment provider reports for a captured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub provider_order_id: String,
    /// Provider status, e.g. `COMPLETED`.
    pub status: String,
    pub amount: Money,
}

impl VerifiedPayment {
    /// Whether the provider considers the payment captured.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case("COMPLETED")
    }
}

/// Lifecycle state derived from the checkout flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutState {
    Created,
    Paid,
    Finalized,
}

/// A persisted checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    #[serde(rename = "_id", alias = "id")]
    pub id: CheckoutId,
    pub user: UserId,
    pub checkout_items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub total_price: Money,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_status: String,
    pub payment_details: Option<serde_json::Value>,
    pub is_finalized: bool,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checkout {
    #[must_use]
    pub const fn state(&self) -> CheckoutState {
        if self.is_finalized {
            CheckoutState::Finalized
        } else if self.is_paid {
            CheckoutState::Paid
        } else {
            CheckoutState::Created
        }
    }

    /// Record a provider-verified payment: `Created → Paid`.
    ///
    /// # Errors
    ///
    /// Fails if the checkout is not in `Created`, if the provider did not
    /// complete the payment, or if the captured amount differs from the
    /// checkout total.
    pub fn mark_paid(
        &mut self,
        update: PaymentUpdate,
        verified: &VerifiedPayment,
        now: DateTime<Utc>,
    ) -> Result<(), CheckoutError> {
        match self.state() {
            CheckoutState::Created => {}
            CheckoutState::Paid => return Err(CheckoutError::AlreadyPaid),
            CheckoutState::Finalized => return Err(CheckoutError::AlreadyFinalized),
        }
        if !verified.is_completed() {
            return Err(CheckoutError::PaymentNotCompleted(verified.status.clone()));
        }
        if !same_cents(verified.amount, self.total_price) {
            return Err(CheckoutError::AmountMismatch {
                expected: self.total_price,
                captured: verified.amount,
            });
        }

        self.is_paid = true;
        self.paid_at = Some(now);
        PAYMENT_STATUS_PAID.clone_into(&mut self.payment_status);
        self.payment_details = Some(update.payment_details);
        if let Some(method) = update.payment_method.filter(|m| !m.trim().is_empty()) {
            self.payment_method = method;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Convert a paid checkout into an order: `Paid → Finalized`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotPaid`] for an unpaid checkout and
    /// [`CheckoutError::AlreadyFinalized`] if an order already exists.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Result<Order, CheckoutError> {
        match self.state() {
            CheckoutState::Created => return Err(CheckoutError::NotPaid),
            CheckoutState::Finalized => return Err(CheckoutError::AlreadyFinalized),
            CheckoutState::Paid => {}
        }
        self.is_finalized = true;
        self.finalized_at = Some(now);
        self.updated_at = now;
        Ok(Order::from_checkout(self, now))
    }
}

fn same_cents(a: Money, b: Money) -> bool {
    a.amount().round_dp(2) == b.amount().round_dp(2)
}
