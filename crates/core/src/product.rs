//! Catalog records.
//!
//! [`Product`] is the stored record. [`ProductDraft`] and [`ProductPatch`] are
//! the administrator's create and update payloads; both validate the stock and
//! price invariants before anything reaches the database.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::types::{Money, ProductId, UserId};

/// Errors raised while validating product payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    /// A required text field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// Stock cannot go below zero.
    #[error("countInStock cannot be negative")]
    NegativeStock,
    /// Ratings are on a 0-5 scale.
    #[error("rating must be between 0 and 5")]
    RatingOutOfRange,
    /// Discounted price above the list price.
    #[error("discountPrice cannot exceed price")]
    DiscountAbovePrice,
}

/// A product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt_text: String,
}

/// Image payload accepted from the admin UI: a bare URL or a full image object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Url(String),
    Image(ProductImage),
}

impl From<ImageInput> for ProductImage {
    fn from(input: ImageInput) -> Self {
        match input {
            ImageInput::Url(url) => Self {
                url,
                alt_text: String::new(),
            },
            ImageInput::Image(image) => image,
        }
    }
}

/// A customer review stored alongside the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub user: UserId,
    pub name: String,
    pub rating: f64,
    pub comment: String,
}

/// Review payload; the author defaults to the acting administrator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewInput {
    pub user: Option<UserId>,
    pub name: String,
    pub rating: f64,
    #[serde(default)]
    pub comment: String,
}

impl ReviewInput {
    fn into_review(self, fallback_user: UserId) -> Review {
        Review {
            user: self.user.unwrap_or(fallback_user),
            name: self.name,
            rating: self.rating,
            comment: self.comment,
        }
    }
}

/// A catalog product.
///
/// `reviews` is `None` in list projections, where it is omitted from the
/// JSON body to keep payloads small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", alias = "id")]
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub count_in_stock: i32,
    pub sku: String,
    pub category: String,
    pub collection: Option<String>,
    pub author: Option<String>,
    /// Publisher, exposed to shoppers as the "brand" filter.
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub format: Option<String>,
    pub isbn: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub rating: f64,
    pub num_reviews: i32,
    pub images: Vec<ProductImage>,
    pub is_featured: bool,
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First image URL, used as the thumbnail on cart lines.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(|image| image.url.as_str())
    }

    /// Price a shopper pays: the discount price when one is set.
    #[must_use]
    pub fn selling_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }

    /// Whether at least one unit is available.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.count_in_stock > 0
    }
}

/// Payload for creating a product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    #[serde(default)]
    pub count_in_stock: i32,
    pub sku: String,
    pub category: String,
    pub collection: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub language: Option<String>,
    pub pages: Option<i32>,
    pub format: Option<String>,
    pub isbn: Option<String>,
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: i32,
    #[serde(default)]
    pub images: Vec<ImageInput>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub reviews: Vec<ReviewInput>,
}

impl ProductDraft {
    /// Validate the draft and turn it into a stored product.
    ///
    /// # Errors
    ///
    /// Returns a [`ProductError`] if a required field is blank or an
    /// invariant (non-negative stock, rating range, discount ≤ price) fails.
    pub fn into_product(
        self,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Product, ProductError> {
        require("name", &self.name)?;
        require("sku", &self.sku)?;
        require("category", &self.category)?;

        let product = Product {
            id: ProductId::new(),
            name: self.name.trim().to_owned(),
            description: self.description,
            price: self.price,
            discount_price: self.discount_price,
            count_in_stock: self.count_in_stock,
            sku: self.sku.trim().to_owned(),
            category: self.category.trim().to_owned(),
            collection: self.collection,
            author: self.author,
            publisher: self.publisher,
            language: self.language,
            pages: self.pages,
            format: self.format,
            isbn: self.isbn,
            publication_date: self.publication_date,
            rating: self.rating,
            num_reviews: self.num_reviews,
            images: self.images.into_iter().map(ProductImage::from).collect(),
            is_featured: self.is_featured,
            tags: self.tags,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            meta_keywords: self.meta_keywords,
            reviews: Some(
                self.reviews
                    .into_iter()
                    .map(|review| review.into_review(created_by))
                    .collect(),
            ),
            created_by: Some(created_by),
            created_at: now,
            updated_at: now,
        };
        validate(&product)?;
        Ok(product)
    }
}

/// Partial update for a product. Absent fields keep their stored value; an
/// explicit `null` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    #[serde(default, deserialize_with = "nullable")]
    pub discount_price: Option<Option<Money>>,
    pub count_in_stock: Option<i32>,
    pub sku: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub collection: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub author: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub publisher: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub language: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub pages: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub format: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub isbn: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub publication_date: Option<Option<NaiveDate>>,
    pub rating: Option<f64>,
    pub num_reviews: Option<i32>,
    pub images: Option<Vec<ImageInput>>,
    pub is_featured: Option<bool>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub meta_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub meta_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub meta_keywords: Option<Option<String>>,
    pub reviews: Option<Vec<ReviewInput>>,
}

/// A present field, `null` included, becomes `Some`. Absence is left to
/// `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! patch_fields {
    ($patch:ident, $product:ident; $($field:ident),* $(,)?) => {
        $(if let Some(value) = $patch.$field { $product.$field = value; })*
    };
}

impl ProductPatch {
    /// Apply the patch to `product`, validating the result.
    ///
    /// The product is left untouched when validation fails.
    ///
    /// # Errors
    ///
    /// Returns a [`ProductError`] if the patched product violates an invariant.
    pub fn apply(
        self,
        product: &Product,
        acting_user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Product, ProductError> {
        let mut updated = product.clone();
        let patch = self;

        patch_fields!(patch, updated;
            name, description, price, count_in_stock, sku, category,
            rating, num_reviews, is_featured, tags, discount_price,
            collection, author, publisher, language, pages, format, isbn,
            publication_date, meta_title, meta_description, meta_keywords,
        );
        if let Some(images) = patch.images {
            updated.images = images.into_iter().map(ProductImage::from).collect();
        }
        if let Some(reviews) = patch.reviews {
            updated.reviews = Some(
                reviews
                    .into_iter()
                    .map(|review| review.into_review(acting_user))
                    .collect(),
            );
        }

        require("name", &updated.name)?;
        require("sku", &updated.sku)?;
        require("category", &updated.category)?;
        validate(&updated)?;

        updated.updated_at = now;
        Ok(updated)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ProductError> {
    if value.trim().is_empty() {
        return Err(ProductError::MissingField(field));
    }
    Ok(())
}

fn validate(product: &Product) -> Result<(), ProductError> {
    if product.count_in_stock < 0 {
        return Err(ProductError::NegativeStock);
    }
    if !(0.0..=5.0).contains(&product.rating) {
        return Err(ProductError::RatingOutOfRange);
    }
    if product
        .discount_price
        .is_some_and(|discount| discount > product.price)
    {
        return Err(ProductError::DiscountAbovePrice);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        serde_json::from_value(serde_json::json!({
            "name": "The Left Hand of Darkness",
            "price": 14.99,
            "sku": "LHD-001",
            "category": "Fiction",
            "countInStock": 3,
            "publisher": "Ace",
            "images": ["https://img.example/lhd.jpg", {"url": "https://img.example/back.jpg", "altText": "Back"}],
            "reviews": [{"name": "Sam", "rating": 5, "comment": "Classic"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_draft_formats_images_and_reviews() {
        let admin = UserId::new();
        let product = draft().into_product(admin, Utc::now()).unwrap();

        assert_eq!(product.images.len(), 2);
        assert_eq!(product.images[0].alt_text, "");
        assert_eq!(product.images[1].alt_text, "Back");
        assert_eq!(product.reviews.as_ref().unwrap()[0].user, admin);
        assert_eq!(product.created_by, Some(admin));
        assert_eq!(product.primary_image(), Some("https://img.example/lhd.jpg"));
    }

    #[test]
    fn test_draft_rejects_negative_stock() {
        let mut draft = draft();
        draft.count_in_stock = -1;
        assert_eq!(
            draft.into_product(UserId::new(), Utc::now()),
            Err(ProductError::NegativeStock)
        );
    }

    #[test]
    fn test_draft_requires_name() {
        let mut draft = draft();
        draft.name = "   ".to_string();
        assert_eq!(
            draft.into_product(UserId::new(), Utc::now()),
            Err(ProductError::MissingField("name"))
        );
    }

    #[test]
    fn test_patch_keeps_absent_fields_and_allows_zero_stock() {
        let admin = UserId::new();
        let product = draft().into_product(admin, Utc::now()).unwrap();
        let patch = ProductPatch {
            count_in_stock: Some(0),
            is_featured: Some(true),
            ..ProductPatch::default()
        };

        let updated = patch.apply(&product, admin, Utc::now()).unwrap();
        assert_eq!(updated.count_in_stock, 0);
        assert!(updated.is_featured);
        assert_eq!(updated.name, product.name);
        assert_eq!(updated.price, product.price);
    }

    #[test]
    fn test_patch_rejects_discount_above_price() {
        let admin = UserId::new();
        let product = draft().into_product(admin, Utc::now()).unwrap();
        let patch = ProductPatch {
            discount_price: Some(Some(Money::from_cents(5000))),
            ..ProductPatch::default()
        };
        assert_eq!(
            patch.apply(&product, admin, Utc::now()),
            Err(ProductError::DiscountAbovePrice)
        );
    }

    #[test]
    fn test_patch_null_clears_optional_fields() {
        let admin = UserId::new();
        let mut product = draft().into_product(admin, Utc::now()).unwrap();
        product.discount_price = Some(Money::from_cents(999));

        let patch: ProductPatch = serde_json::from_value(serde_json::json!({
            "discountPrice": null,
            "publisher": null,
            "author": "Ursula K. Le Guin",
        }))
        .unwrap();
        assert_eq!(patch.discount_price, Some(None));
        assert_eq!(patch.collection, None);

        let updated = patch.apply(&product, admin, Utc::now()).unwrap();
        assert_eq!(updated.discount_price, None);
        assert_eq!(updated.publisher, None);
        assert_eq!(updated.author.as_deref(), Some("Ursula K. Le Guin"));
        assert_eq!(updated.price, product.price);
    }

    #[test]
    fn test_list_projection_omits_reviews() {
        let mut product = draft().into_product(UserId::new(), Utc::now()).unwrap();
        product.reviews = None;
        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("reviews").is_none());
        assert!(json.get("_id").is_some());
        assert!(json.get("countInStock").is_some());
    }
}
