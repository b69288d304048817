//! Integration tests for the Folio storefront API.
//!
//! These tests talk HTTP to a running server and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Prepare a database and start the API
//! cargo run -p folio-cli -- migrate
//! cargo run -p folio-cli -- seed products data/products.json --owner admin@example.com
//! cargo run -p folio-storefront
//!
//! # Run integration tests
//! cargo test -p folio-integration-tests -- --ignored
//! ```
//!
//! Set `FOLIO_TEST_BASE_URL` to target a server other than
//! `http://localhost:9000`. The catalog must hold at least one in-stock
//! product.

#![allow(clippy::missing_panics_doc)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// HTTP client bound to the server under test.
///
/// Each context presents its own `X-Forwarded-For` address so the per-IP
/// limit on login and registration is not shared between tests.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let base_url = std::env::var("FOLIO_TEST_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:9000".to_string());
        let octets = Uuid::new_v4().into_bytes();
        let client_ip = format!("10.{}.{}.{}", octets[0], octets[1], octets[2]);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_str(&client_ip).expect("ip is a valid header value"),
        );

        Self {
            client: Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }

    /// Register a fresh customer and return `(token, user)`.
    pub async fn register_customer(&self) -> (String, Value) {
        let email = format!("it-{}@example.com", Uuid::new_v4().simple());
        let response = self
            .post("/api/users/register")
            .json(&json!({
                "name": "Integration Test",
                "email": email,
                "password": "correct-horse-battery",
            }))
            .send()
            .await
            .expect("register request failed");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Value = response.json().await.expect("register body");
        let token = body["token"].as_str().expect("token").to_string();
        (token, body["user"].clone())
    }

    /// Any product with stock on hand.
    pub async fn in_stock_product(&self) -> Value {
        let products: Value = self
            .get("/api/products?availability=In%20Stock&limit=1")
            .send()
            .await
            .expect("product list request failed")
            .json()
            .await
            .expect("product list body");
        products
            .as_array()
            .and_then(|list| list.first())
            .cloned()
            .expect("catalog has no in-stock products; seed it first")
    }
}

/// A checkout line for `product` in the camelCase wire shape.
#[must_use]
pub fn line_item(product: &Value, quantity: u32) -> Value {
    json!({
        "productId": product["_id"],
        "name": product["name"],
        "price": product["discountPrice"].as_f64().or_else(|| product["price"].as_f64()),
        "quantity": quantity,
    })
}

/// A complete shipping address.
#[must_use]
pub fn shipping_address() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "address": "1 Main St",
        "city": "Springfield",
        "postalCode": "12345",
        "country": "United States",
    })
}
