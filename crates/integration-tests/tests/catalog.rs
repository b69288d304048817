//! Catalog endpoint tests.
//!
//! Require a running storefront with a seeded catalog. Run with:
//! `cargo test -p folio-integration-tests -- --ignored`

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use folio_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::Value;

async fn list(ctx: &TestContext, query: &str) -> Vec<Value> {
    let response = ctx.get(&format!("/api/products{query}")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK, "{query}");
    response.json().await.unwrap()
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_health() {
    let ctx = TestContext::new();
    let response = ctx.get("/health").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = ctx.get("/health/ready").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_list_omits_reviews() {
    let ctx = TestContext::new();
    for product in list(&ctx, "").await {
        assert!(product.get("reviews").is_none());
    }
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_price_sorts() {
    let ctx = TestContext::new();

    let ascending = list(&ctx, "?sort=price-low-to-high").await;
    let prices: Vec<f64> = ascending
        .iter()
        .map(|p| p["price"].as_f64().unwrap())
        .collect();
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));

    let descending = list(&ctx, "?sort=z-a").await;
    let names: Vec<&str> = descending
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert!(names.windows(2).all(|w| w[0].as_bytes() >= w[1].as_bytes()));
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_price_range_is_inclusive() {
    let ctx = TestContext::new();
    for product in list(&ctx, "?minPrice=5&maxPrice=20").await {
        let price = product["price"].as_f64().unwrap();
        assert!((5.0..=20.0).contains(&price), "{price}");
    }
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_all_is_a_no_op() {
    let ctx = TestContext::new();
    let everything = list(&ctx, "").await;
    let all = list(&ctx, "?collection=all&category=ALL").await;
    assert_eq!(everything.len(), all.len());
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_pagination() {
    let ctx = TestContext::new();
    let first = list(&ctx, "?sort=a-z&limit=2&page=1").await;
    let second = list(&ctx, "?sort=a-z&limit=2&page=2").await;
    assert!(first.len() <= 2);
    if let (Some(a), Some(b)) = (first.first(), second.first()) {
        assert_ne!(a["_id"], b["_id"]);
    }
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_new_arrivals_newest_first() {
    let ctx = TestContext::new();
    let body: Value = ctx
        .get("/api/products/new-arrivals")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let data = body["data"].as_array().unwrap();
    assert!(data.len() <= 8);
    let created: Vec<&str> = data
        .iter()
        .map(|p| p["createdAt"].as_str().unwrap())
        .collect();
    assert!(created.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_similar_and_detail() {
    let ctx = TestContext::new();
    let product = ctx.in_stock_product().await;
    let id = product["_id"].as_str().unwrap();

    let similar: Vec<Value> = ctx
        .get(&format!("/api/products/similar/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(similar.len() <= 4);
    for other in &similar {
        assert_ne!(other["_id"], product["_id"]);
        assert_eq!(other["category"], product["category"]);
    }

    let detail = ctx.get(&format!("/api/products/{id}")).send().await.unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running storefront"]
async fn test_bad_ids_and_numbers() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/products/not-an-id").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let unknown = ctx
        .get(&format!("/api/products/{}", uuid::Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["message"], "Product not found");

    let response = ctx.get("/api/products?maxPrice=lots").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
