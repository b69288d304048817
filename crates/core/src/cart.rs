//! Shopping carts.
//!
//! A cart belongs either to a signed-in user or to an anonymous guest
//! (identified by a client-generated `guestId`). Line prices are captured
//! when the product is added, so later catalog price changes do not alter a
//! cart the shopper is already looking at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::product::Product;
use crate::types::{CartId, Money, ProductId, UserId};

/// Errors from cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// Quantities must be at least one when adding.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    /// The product is not in the cart.
    #[error("product not found in cart")]
    ItemNotFound(ProductId),
    /// The product has no units left.
    #[error("{0} is out of stock")]
    OutOfStock(String),
    /// The cart total would exceed [`Money::MAX`].
    #[error("cart total is too large")]
    TotalTooLarge,
}

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Unit price at the time the line was added.
    pub price: Money,
    pub quantity: u32,
}

impl CartItem {
    /// Build a line from a product at its current selling price.
    #[must_use]
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            image: product.primary_image().map(str::to_owned),
            price: product.selling_price(),
            quantity,
        }
    }

    /// `price × quantity`, `None` past [`Money::MAX`].
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// Sum of the line totals, `None` past [`Money::MAX`].
#[must_use]
pub fn lines_total(items: &[CartItem]) -> Option<Money> {
    items
        .iter()
        .try_fold(Money::ZERO, |total, item| total.checked_add(item.line_total()?))
}

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(UserId),
    Guest(String),
}

/// A shopping cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id", alias = "id")]
    pub id: CartId,
    pub user: Option<UserId>,
    pub guest_id: Option<String>,
    pub products: Vec<CartItem>,
    pub total_price: Money,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// An empty cart for `owner`.
    #[must_use]
    pub fn new(owner: &CartOwner, now: DateTime<Utc>) -> Self {
        let (user, guest_id) = match owner {
            CartOwner::User(user) => (Some(*user), None),
            CartOwner::Guest(guest) => (None, Some(guest.clone())),
        };
        Self {
            id: CartId::new(),
            user,
            guest_id,
            products: Vec::new(),
            total_price: Money::ZERO,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.products.iter().map(|item| item.quantity).sum()
    }

    /// Add `quantity` units of `product`, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] for a zero quantity,
    /// [`CartError::OutOfStock`] when the product has no stock and
    /// [`CartError::TotalTooLarge`] when the new total is not storable.
    pub fn add(&mut self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.in_stock() {
            return Err(CartError::OutOfStock(product.name.clone()));
        }

        let mut products = self.products.clone();
        match products.iter_mut().find(|item| item.product_id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => products.push(CartItem::from_product(product, quantity)),
        }
        self.replace_lines(products)
    }

    /// Set the quantity of an existing line. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if the product is not in the cart
    /// and [`CartError::TotalTooLarge`] when the new total is not storable.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        let mut products = self.products.clone();
        products
            .iter_mut()
            .find(|item| item.product_id == product_id)
            .ok_or(CartError::ItemNotFound(product_id))?
            .quantity = quantity;
        self.replace_lines(products)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotFound`] if the product is not in the cart.
    pub fn remove(&mut self, product_id: ProductId) -> Result<(), CartError> {
        let before = self.products.len();
        self.products.retain(|item| item.product_id != product_id);
        if self.products.len() == before {
            return Err(CartError::ItemNotFound(product_id));
        }
        // A subset of storable lines is storable.
        self.total_price = lines_total(&self.products).unwrap_or(Money::MAX);
        Ok(())
    }

    /// Fold a guest cart's lines into this cart. Lines for the same product
    /// add their quantities; the guest's captured price is kept only for
    /// products not already in this cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::TotalTooLarge`] when the merged total is not
    /// storable. The cart is left unchanged.
    pub fn merge(&mut self, guest: Self) -> Result<(), CartError> {
        let mut products = self.products.clone();
        for incoming in guest.products {
            match products
                .iter_mut()
                .find(|item| item.product_id == incoming.product_id)
            {
                Some(item) => item.quantity = item.quantity.saturating_add(incoming.quantity),
                None => products.push(incoming),
            }
        }
        self.replace_lines(products)
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.products.clear();
        self.total_price = Money::ZERO;
    }

    fn replace_lines(&mut self, products: Vec<CartItem>) -> Result<(), CartError> {
        self.total_price = lines_total(&products).ok_or(CartError::TotalTooLarge)?;
        self.products = products;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::product::ProductDraft;

    fn book(name: &str, price: &str, stock: i32) -> Product {
        let draft: ProductDraft = serde_json::from_value(serde_json::json!({
            "name": name,
            "price": price.parse::<f64>().unwrap(),
            "countInStock": stock,
            "sku": format!("SKU-{name}"),
            "category": "Fiction",
            "images": ["https://img.example/cover.jpg"],
        }))
        .unwrap();
        draft.into_product(UserId::new(), Utc::now()).unwrap()
    }

    #[test]
    fn test_add_merges_lines_and_totals() {
        let ten = book("Ten", "10", 3);
        let five = book("Five", "5", 3);
        let mut cart = Cart::new(&CartOwner::Guest("guest_1".to_string()), Utc::now());

        cart.add(&ten, 1).unwrap();
        cart.add(&five, 1).unwrap();
        cart.add(&five, 1).unwrap();

        assert_eq!(cart.products.len(), 2);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.total_price, Money::from_cents(2000));
        assert_eq!(
            cart.products[0].image.as_deref(),
            Some("https://img.example/cover.jpg")
        );
    }

    #[test]
    fn test_add_rejects_zero_and_out_of_stock() {
        let mut cart = Cart::new(&CartOwner::User(UserId::new()), Utc::now());
        assert_eq!(
            cart.add(&book("Ten", "10", 3), 0),
            Err(CartError::InvalidQuantity)
        );
        assert!(matches!(
            cart.add(&book("Gone", "10", 0), 1),
            Err(CartError::OutOfStock(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let ten = book("Ten", "10", 3);
        let mut cart = Cart::new(&CartOwner::User(UserId::new()), Utc::now());
        cart.add(&ten, 2).unwrap();

        cart.set_quantity(ten.id, 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price, Money::ZERO);
        assert_eq!(
            cart.set_quantity(ten.id, 1),
            Err(CartError::ItemNotFound(ten.id))
        );
    }

    #[test]
    fn test_merge_guest_cart() {
        let ten = book("Ten", "10", 3);
        let five = book("Five", "5", 3);
        let mut user_cart = Cart::new(&CartOwner::User(UserId::new()), Utc::now());
        user_cart.add(&ten, 1).unwrap();

        let mut guest_cart = Cart::new(&CartOwner::Guest("guest_1".to_string()), Utc::now());
        guest_cart.add(&ten, 1).unwrap();
        guest_cart.add(&five, 2).unwrap();

        user_cart.merge(guest_cart).unwrap();
        assert_eq!(user_cart.item_count(), 4);
        assert_eq!(user_cart.total_price, Money::from_cents(3000));
    }

    #[test]
    fn test_oversized_total_is_rejected_without_change() {
        let pricey = book("Folio", "9999999999", 5);
        let mut cart = Cart::new(&CartOwner::User(UserId::new()), Utc::now());
        cart.add(&pricey, 1).unwrap();

        assert_eq!(cart.add(&pricey, 1), Err(CartError::TotalTooLarge));
        assert_eq!(
            cart.set_quantity(pricey.id, u32::MAX),
            Err(CartError::TotalTooLarge)
        );
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_price, Money::new("9999999999".parse().unwrap()).unwrap());

        let mut other = Cart::new(&CartOwner::Guest("guest_2".to_string()), Utc::now());
        other.add(&pricey, 1).unwrap();
        assert_eq!(cart.merge(other), Err(CartError::TotalTooLarge));
        assert_eq!(cart.item_count(), 1);
    }

    #[test]
    fn test_discount_price_is_captured() {
        let draft: ProductDraft = serde_json::from_value(serde_json::json!({
            "name": "Sale",
            "price": 20.0,
            "discountPrice": 15.0,
            "countInStock": 1,
            "sku": "SKU-SALE",
            "category": "Fiction",
        }))
        .unwrap();
        let sale = draft.into_product(UserId::new(), Utc::now()).unwrap();

        let mut cart = Cart::new(&CartOwner::User(UserId::new()), Utc::now());
        cart.add(&sale, 1).unwrap();
        assert_eq!(cart.total_price, Money::from_cents(1500));
    }

    #[test]
    fn test_wire_format() {
        let cart = Cart::new(&CartOwner::Guest("guest_9".to_string()), Utc::now());
        let json = serde_json::to_value(&cart).unwrap();
        assert!(json.get("_id").is_some());
        assert_eq!(json["guestId"], "guest_9");
        assert_eq!(json["totalPrice"], 0.0);
    }
}
