//! Product repository: catalog reads and administrative writes.
//!
//! Catalog listings are rendered from a [`CatalogRequest`] with
//! [`QueryBuilder`]. The SQL must agree with `ProductFilter::matches` and
//! `ProductSort::compare`: names sort with `COLLATE "C"` (byte order, as
//! Rust's `str::cmp`) and every order ends on `id`.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use folio_core::catalog::{
    Availability, CatalogRequest, Direction, NEW_ARRIVALS_LIMIT, Page, ProductSort,
    SIMILAR_PRODUCTS_LIMIT, SortField, like_pattern,
};
use folio_core::product::{Product, ProductImage, Review};
use folio_core::{Money, ProductId, UserId};

use super::RepositoryError;

/// Columns returned by listings. Reviews are left out to keep payloads small.
const LIST_COLUMNS: &str = "id, name, description, price, discount_price, count_in_stock, sku, \
     category, collection, author, publisher, language, pages, format, isbn, publication_date, \
     rating, num_reviews, images, is_featured, tags, meta_title, meta_description, \
     meta_keywords, created_by, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    name: String,
    description: String,
    price: Money,
    discount_price: Option<Money>,
    count_in_stock: i32,
    sku: String,
    category: String,
    collection: Option<String>,
    author: Option<String>,
    publisher: Option<String>,
    language: Option<String>,
    pages: Option<i32>,
    format: Option<String>,
    isbn: Option<String>,
    publication_date: Option<NaiveDate>,
    rating: f64,
    num_reviews: i32,
    images: Json<Vec<ProductImage>>,
    is_featured: bool,
    tags: Vec<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    meta_keywords: Option<String>,
    /// Absent from [`LIST_COLUMNS`] projections.
    #[sqlx(default)]
    reviews: Option<Json<Vec<Review>>>,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            discount_price: row.discount_price,
            count_in_stock: row.count_in_stock,
            sku: row.sku,
            category: row.category,
            collection: row.collection,
            author: row.author,
            publisher: row.publisher,
            language: row.language,
            pages: row.pages,
            format: row.format,
            isbn: row.isbn,
            publication_date: row.publication_date,
            rating: row.rating,
            num_reviews: row.num_reviews,
            images: row.images.0,
            is_featured: row.is_featured,
            tags: row.tags,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            meta_keywords: row.meta_keywords,
            reviews: row.reviews.map(|reviews| reviews.0),
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// =============================================================================
// Query rendering
// =============================================================================

/// Render a catalog request as a `SELECT` over [`LIST_COLUMNS`].
pub(crate) fn catalog_query(request: &CatalogRequest) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {LIST_COLUMNS} FROM products WHERE TRUE"));
    let filter = &request.filter;

    if let Some(collection) = &filter.collection {
        qb.push(" AND collection = ").push_bind(collection.clone());
    }
    if let Some(category) = &filter.category {
        qb.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min) = filter.price.min {
        qb.push(" AND price >= ").push_bind(min);
    }
    if let Some(max) = filter.price.max {
        qb.push(" AND price <= ").push_bind(max);
    }
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\' OR description ILIKE ")
            .push_bind(pattern)
            .push(r" ESCAPE '\')");
    }
    if let Some(min_rating) = filter.min_rating {
        qb.push(" AND rating >= ").push_bind(min_rating);
    }
    match filter.availability {
        Some(Availability::InStock) => {
            qb.push(" AND count_in_stock > 0");
        }
        Some(Availability::OutOfStock) => {
            qb.push(" AND count_in_stock = 0");
        }
        None => {}
    }
    if let Some(brands) = &filter.brands {
        qb.push(" AND publisher = ANY(").push_bind(brands.clone()).push(")");
    }

    push_order_by(&mut qb, request.sort);

    if let Some(page) = request.page {
        qb.push(" LIMIT ")
            .push_bind(i64::from(page.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(page.offset));
    }
    qb
}

fn push_order_by(qb: &mut QueryBuilder<'_, Postgres>, sort: ProductSort) {
    qb.push(" ORDER BY ");
    for &(field, direction) in sort.keys() {
        let column = match field {
            SortField::Price => "price",
            SortField::Name => r#"name COLLATE "C""#,
            SortField::CreatedAt => "created_at",
            SortField::IsFeatured => "is_featured",
        };
        let direction = match direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        qb.push(format_args!("{column} {direction}, "));
    }
    qb.push("id ASC");
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Run a catalog listing.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, request: &CatalogRequest) -> Result<Vec<Product>, RepositoryError> {
        let rows = catalog_query(request)
            .build_query_as::<ProductRow>()
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Every product, newest first (admin dashboard).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let request = CatalogRequest {
            sort: ProductSort::Newest,
            ..CatalogRequest::default()
        };
        self.list(&request).await
    }

    /// The newest products, at most [`NEW_ARRIVALS_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn new_arrivals(&self) -> Result<Vec<Product>, RepositoryError> {
        let request = CatalogRequest {
            sort: ProductSort::Newest,
            page: Some(Page::first(NEW_ARRIVALS_LIMIT)),
            ..CatalogRequest::default()
        };
        self.list(&request).await
    }

    /// Get a product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {LIST_COLUMNS}, reviews FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Get every product in `ids` that still exists, without reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {LIST_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// The single highest-rated product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn best_seller(&self) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {LIST_COLUMNS}, reviews FROM products ORDER BY rating DESC, id ASC LIMIT 1"
        ))
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Up to [`SIMILAR_PRODUCTS_LIMIT`] other products in the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if `id` does not exist.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn similar(&self, id: ProductId) -> Result<Vec<Product>, RepositoryError> {
        let category =
            sqlx::query_scalar::<_, String>("SELECT category FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            SELECT {LIST_COLUMNS}
            FROM products
            WHERE category = $1 AND id <> $2
            ORDER BY is_featured DESC, created_at DESC, id ASC
            LIMIT $3
            "
        ))
        .bind(category)
        .bind(id)
        .bind(i64::from(SIMILAR_PRODUCTS_LIMIT))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, product: &Product) -> Result<Product, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut *conn, product).await
    }

    /// Insert many products in one transaction (catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate SKU; nothing is inserted.
    pub async fn insert_many(&self, products: &[Product]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for product in products {
            insert(&mut *tx, product).await?;
        }
        tx.commit().await?;
        Ok(products.len())
    }

    /// Overwrite a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new SKU is taken.
    pub async fn update(&self, product: &Product) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products SET
                name = $2, description = $3, price = $4, discount_price = $5,
                count_in_stock = $6, sku = $7, category = $8, collection = $9,
                author = $10, publisher = $11, language = $12, pages = $13,
                format = $14, isbn = $15, publication_date = $16, rating = $17,
                num_reviews = $18, images = $19, is_featured = $20, tags = $21,
                meta_title = $22, meta_description = $23, meta_keywords = $24,
                reviews = COALESCE($25, reviews), updated_at = $26
            WHERE id = $1
            RETURNING {LIST_COLUMNS}, reviews
            "
        ))
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.discount_price)
        .bind(product.count_in_stock)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(&product.collection)
        .bind(&product.author)
        .bind(&product.publisher)
        .bind(&product.language)
        .bind(product.pages)
        .bind(&product.format)
        .bind(&product.isbn)
        .bind(product.publication_date)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(Json(&product.images))
        .bind(product.is_featured)
        .bind(&product.tags)
        .bind(&product.meta_title)
        .bind(&product.meta_description)
        .bind(&product.meta_keywords)
        .bind(product.reviews.as_ref().map(Json))
        .bind(product.updated_at)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::conflict_on_unique(e, "sku already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete every product, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM products")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

async fn insert(
    conn: &mut sqlx::PgConnection,
    product: &Product,
) -> Result<Product, RepositoryError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        r"
        INSERT INTO products (
            id, name, description, price, discount_price, count_in_stock, sku,
            category, collection, author, publisher, language, pages, format,
            isbn, publication_date, rating, num_reviews, images, is_featured,
            tags, meta_title, meta_description, meta_keywords, reviews,
            created_by, created_at, updated_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
            $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
        )
        RETURNING {LIST_COLUMNS}, reviews
        "
    ))
    .bind(product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(product.discount_price)
    .bind(product.count_in_stock)
    .bind(&product.sku)
    .bind(&product.category)
    .bind(&product.collection)
    .bind(&product.author)
    .bind(&product.publisher)
    .bind(&product.language)
    .bind(product.pages)
    .bind(&product.format)
    .bind(&product.isbn)
    .bind(product.publication_date)
    .bind(product.rating)
    .bind(product.num_reviews)
    .bind(Json(&product.images))
    .bind(product.is_featured)
    .bind(&product.tags)
    .bind(&product.meta_title)
    .bind(&product.meta_description)
    .bind(&product.meta_keywords)
    .bind(Json(product.reviews.as_deref().unwrap_or_default()))
    .bind(product.created_by)
    .bind(product.created_at)
    .bind(product.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| RepositoryError::conflict_on_unique(e, "sku already exists"))?;

    Ok(row.into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use folio_core::catalog::ProductQuery;

    use super::*;

    fn sql_for(query: &ProductQuery) -> String {
        catalog_query(&query.build().unwrap()).sql().to_owned()
    }

    #[test]
    fn test_empty_query_is_unfiltered_featured_order() {
        let sql = sql_for(&ProductQuery::default());
        assert!(sql.ends_with(
            "FROM products WHERE TRUE ORDER BY is_featured DESC, created_at DESC, id ASC"
        ));
        assert!(!sql.contains("reviews"));
    }

    #[test]
    fn test_all_values_add_no_predicates() {
        let query = ProductQuery {
            collection: Some("all".to_string()),
            category: Some("ALL".to_string()),
            ..ProductQuery::default()
        };
        assert!(sql_for(&query).contains("WHERE TRUE ORDER BY"));
    }

    #[test]
    fn test_every_filter_is_bound() {
        let query = ProductQuery {
            collection: Some("Classics".to_string()),
            category: Some("Fiction".to_string()),
            min_price: Some("5".to_string()),
            max_price: Some("20".to_string()),
            rating: Some("4 stars".to_string()),
            availability: Some("In Stock".to_string()),
            brand: Some("Penguin, Ace".to_string()),
            search: Some("50%_off".to_string()),
            sort: Some("a-z".to_string()),
            limit: Some("10".to_string()),
            page: Some("3".to_string()),
        };
        let sql = sql_for(&query);
        assert!(sql.contains("AND collection = $1"));
        assert!(sql.contains("AND category = $2"));
        assert!(sql.contains("AND price >= $3"));
        assert!(sql.contains("AND price <= $4"));
        assert!(sql.contains(r"AND (name ILIKE $5 ESCAPE '\' OR description ILIKE $6 ESCAPE '\')"));
        assert!(sql.contains("AND rating >= $7"));
        assert!(sql.contains("AND count_in_stock > 0"));
        assert!(sql.contains("AND publisher = ANY($8)"));
        assert!(sql.contains(r#"ORDER BY name COLLATE "C" ASC, id ASC"#));
        assert!(sql.ends_with("LIMIT $9 OFFSET $10"));
    }

    #[test]
    fn test_out_of_stock_and_price_sort() {
        let query = ProductQuery {
            availability: Some("Out of Stock".to_string()),
            sort: Some("price-high-to-low".to_string()),
            ..ProductQuery::default()
        };
        let sql = sql_for(&query);
        assert!(sql.contains("AND count_in_stock = 0"));
        assert!(sql.ends_with("ORDER BY price DESC, id ASC"));
    }
}
