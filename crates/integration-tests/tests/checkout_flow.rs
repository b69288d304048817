//! Checkout flow through the in-process router against a real database.
//!
//! The payment provider is replaced by a verifier that approves every order
//! at $20.00, so the full `Created → Paid → Finalized` path can run without
//! provider credentials. Requires `FOLIO_TEST_DATABASE_URL` (or
//! `DATABASE_URL`) pointing at a disposable database. Run with:
//! `cargo test -p folio-integration-tests --test checkout_flow -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use folio_core::checkout::{PaymentUpdate, VerifiedPayment};
use folio_core::product::{Product, ProductDraft};
use folio_core::{CheckoutId, Email, Money, UserId, UserRole};
use folio_storefront::config::{LogFormat, PAYPAL_SANDBOX_API_BASE, PayPalConfig, StorefrontConfig};
use folio_storefront::db::{
    CheckoutRepository, ProductRepository, RepositoryError, UserRepository,
};
use folio_storefront::services::payment::{PaymentError, PaymentVerifier};
use folio_storefront::state::AppState;

/// Verifier that reports every provider order as captured for $20.00.
struct ApprovingVerifier;

#[async_trait]
impl PaymentVerifier for ApprovingVerifier {
    async fn verify(&self, provider_order_id: &str) -> Result<VerifiedPayment, PaymentError> {
        Ok(VerifiedPayment {
            provider_order_id: provider_order_id.to_string(),
            status: "COMPLETED".to_string(),
            amount: Money::from_cents(2000),
        })
    }
}

fn database_url() -> String {
    std::env::var("FOLIO_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set FOLIO_TEST_DATABASE_URL to run database tests")
}

fn config(database_url: &str) -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from(database_url),
        host: "127.0.0.1".parse().unwrap(),
        port: 9000,
        base_url: "http://localhost:9000".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        paypal: PayPalConfig {
            api_base: PAYPAL_SANDBOX_API_BASE.to_string(),
            client_id: "client".to_string(),
            client_secret: SecretString::from("secret"),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
        log_format: LogFormat::Text,
    }
}

/// Router and pool over a migrated database.
struct Harness {
    app: Router,
    pool: PgPool,
    client_ip: String,
}

impl Harness {
    async fn new() -> Self {
        let url = database_url();
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("../storefront/migrations")
            .run(&pool)
            .await
            .unwrap();
        let state = AppState::with_verifier(config(&url), pool.clone(), Arc::new(ApprovingVerifier));
        let octets = Uuid::new_v4().into_bytes();

        Self {
            app: folio_storefront::app(state),
            pool,
            client_ip: format!("10.{}.{}.{}", octets[0], octets[1], octets[2]),
        }
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", &self.client_ip);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    /// Register an account and return `(token, user id, email)`.
    async fn register(&self) -> (String, UserId, String) {
        let email = format!("flow-{}@example.com", Uuid::new_v4().simple());
        let (status, body) = self
            .call(
                Method::POST,
                "/api/users/register",
                None,
                Some(json!({
                    "name": "Flow Test",
                    "email": email,
                    "password": "correct-horse-battery",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["user"]["_id"].as_str().unwrap().parse().unwrap();
        (body["token"].as_str().unwrap().to_string(), UserId::from_uuid(id), email)
    }

    async fn customer(&self) -> (String, UserId) {
        let (token, id, _) = self.register().await;
        (token, id)
    }

    async fn admin(&self) -> String {
        let (token, _, email) = self.register().await;
        UserRepository::new(&self.pool)
            .set_role(&email.parse::<Email>().unwrap(), UserRole::Admin)
            .await
            .unwrap();
        token
    }

    async fn book(&self, owner: UserId, name: &str, price: f64) -> Product {
        let draft: ProductDraft = serde_json::from_value(json!({
            "name": name,
            "price": price,
            "countInStock": 100,
            "sku": format!("FLOW-{}", Uuid::new_v4().simple()),
            "category": "Fiction",
        }))
        .unwrap();
        let product = draft.into_product(owner, Utc::now()).unwrap();
        ProductRepository::new(&self.pool).create(&product).await.unwrap()
    }
}

fn line(product: &Product, quantity: u32) -> Value {
    json!({
        "productId": product.id.to_string(),
        "name": product.name,
        "price": product.selling_price(),
        "quantity": quantity,
    })
}

fn address() -> Value {
    json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "address": "1 Main St",
        "city": "Springfield",
        "postalCode": "12345",
        "country": "United States",
    })
}

fn paid(provider_order_id: &str) -> Value {
    json!({
        "paymentStatus": "paid",
        "paymentDetails": { "id": provider_order_id, "status": "COMPLETED" },
        "paymentMethod": "paypal",
    })
}

/// Open a $20.00 checkout (one $10 book, two $5 books) for `token`.
async fn twenty_dollar_checkout(h: &Harness, token: &str, owner: UserId) -> Value {
    let ten = h.book(owner, "Ten Dollar Book", 10.0).await;
    let five = h.book(owner, "Five Dollar Book", 5.0).await;

    for (product, quantity) in [(&ten, 1), (&five, 2)] {
        let (status, _) = h
            .call(
                Method::POST,
                "/api/cart",
                Some(token),
                Some(json!({ "productId": product.id.to_string(), "quantity": quantity })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, checkout) = h
        .call(
            Method::POST,
            "/api/checkout",
            Some(token),
            Some(json!({
                "checkoutItems": [line(&ten, 1), line(&five, 2)],
                "shippingAddress": address(),
                "paymentMethod": "paypal",
                "totalPrice": 20.0,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{checkout}");
    assert_eq!(checkout["totalPrice"], 20.0);
    checkout
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_twenty_dollar_checkout_to_order() {
    let h = Harness::new().await;
    let (token, user_id) = h.customer().await;
    let checkout = twenty_dollar_checkout(&h, &token, user_id).await;
    let id = checkout["_id"].as_str().unwrap();

    let (status, body) = h
        .call(Method::POST, &format!("/api/checkout/{id}/finalize"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = h
        .call(Method::PUT, &format!("/api/checkout/{id}/pay"), Some(&token), Some(paid("PAY-FLOW-1")))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["isPaid"], true);
    assert_eq!(body["paymentStatus"], "paid");

    let (status, _) = h
        .call(Method::PUT, &format!("/api/checkout/{id}/pay"), Some(&token), Some(paid("PAY-FLOW-1")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, order) = h
        .call(Method::POST, &format!("/api/checkout/{id}/finalize"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["checkoutId"], id);
    assert_eq!(order["isPaid"], true);
    let items_total: f64 = order["orderItems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["price"].as_f64().unwrap() * item["quantity"].as_f64().unwrap())
        .sum();
    assert!((items_total - 20.0).abs() < f64::EPSILON);

    let (status, _) = h.call(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = h
        .call(Method::POST, &format!("/api/checkout/{id}/finalise"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, orders) = h.call(Method::GET, "/api/orders/my-orders", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);

    // The dashboard expects a bare array and derives its own totals
    let admin = h.admin().await;
    let (status, all) = h.call(Method::GET, "/api/admin/orders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(
        all.as_array()
            .unwrap()
            .iter()
            .any(|listed| listed["_id"] == order["_id"])
    );
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_stale_transitions_are_conflicts() {
    let h = Harness::new().await;
    let (token, user_id) = h.customer().await;
    let checkout = twenty_dollar_checkout(&h, &token, user_id).await;
    let id: CheckoutId = checkout["_id"].as_str().unwrap().parse().unwrap();

    let repo = CheckoutRepository::new(&h.pool);
    let unpaid = repo.get(id).await.unwrap().unwrap();
    let verified = ApprovingVerifier.verify("PAY-FLOW-2").await.unwrap();
    let update: PaymentUpdate = serde_json::from_value(paid("PAY-FLOW-2")).unwrap();

    let mut first = unpaid.clone();
    first.mark_paid(update.clone(), &verified, Utc::now()).unwrap();
    let mut second = unpaid;
    second.mark_paid(update, &verified, Utc::now()).unwrap();

    repo.save_payment(&first).await.unwrap();
    assert!(matches!(
        repo.save_payment(&second).await,
        Err(RepositoryError::Conflict(_))
    ));

    let mut racing = first.clone();
    let order = first.finalize(Utc::now()).unwrap();
    let other_order = racing.finalize(Utc::now()).unwrap();

    repo.finalize(&first, &order).await.unwrap();
    assert!(matches!(
        repo.finalize(&racing, &other_order).await,
        Err(RepositoryError::Conflict(_))
    ));

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE checkout_id = $1")
        .bind(id.as_uuid())
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(orders, 1);
    let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE user_id = $1")
        .bind(user_id.as_uuid())
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(carts, 0);
}

#[tokio::test]
#[ignore = "requires a PostgreSQL database"]
async fn test_concurrent_cart_adds_are_all_kept() {
    let h = Harness::new().await;
    let (_, owner) = h.customer().await;
    let book = h.book(owner, "Busy Book", 3.0).await;
    let guest_id = format!("guest_{}", Uuid::new_v4().simple());
    let add = json!({ "productId": book.id.to_string(), "quantity": 1, "guestId": guest_id });

    let (status, _) = h.call(Method::POST, "/api/cart", None, Some(add.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let h = Arc::new(h);
    let mut adds = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let h = Arc::clone(&h);
        let add = add.clone();
        adds.spawn(async move { h.call(Method::POST, "/api/cart", None, Some(add)).await.0 });
    }
    while let Some(status) = adds.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    let (status, cart) = h
        .call(Method::GET, &format!("/api/cart?guestId={guest_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["products"][0]["quantity"], 11);
    assert_eq!(cart["totalPrice"], 33.0);
}
