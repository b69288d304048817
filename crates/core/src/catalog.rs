//! Catalog queries: filters, sorting and paging.
//!
//! [`ProductQuery`] is the raw query string of `GET /api/products`.
//! [`ProductQuery::build`] turns it into a [`CatalogRequest`]: a
//! [`ProductFilter`] (AND of independent predicates, with text search as an OR
//! over name and description), a [`ProductSort`], and optional [`Page`].
//!
//! The storefront renders the same request into SQL; [`ProductFilter::matches`]
//! and [`ProductSort::compare`] are the reference semantics the SQL must agree
//! with.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::product::Product;

/// Maximum number of products returned by the new-arrivals listing.
pub const NEW_ARRIVALS_LIMIT: u32 = 8;

/// Maximum number of products returned by the similar-products listing.
pub const SIMILAR_PRODUCTS_LIMIT: u32 = 4;

/// Page size used when a page number is given without a limit.
pub const DEFAULT_PAGE_SIZE: u32 = 24;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Filter value meaning "do not filter" for collection and category.
const ALL: &str = "all";

/// Availability value requiring stock on hand.
const IN_STOCK: &str = "In Stock";

/// Errors raised while building a catalog request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A numeric query parameter could not be parsed.
    #[error("{param} must be a number, got {value:?}")]
    InvalidNumber {
        /// Query parameter name.
        param: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Raw catalog query parameters.
///
/// Every field is optional and blank values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub collection: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub rating: Option<String>,
    pub availability: Option<String>,
    pub brand: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

/// Stock requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// `count_in_stock > 0`
    InStock,
    /// `count_in_stock == 0`
    OutOfStock,
}

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl PriceRange {
    /// Whether neither bound is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether `price` lies within the bounds.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

/// The set of constraints derived from catalog query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub collection: Option<String>,
    pub category: Option<String>,
    pub price: PriceRange,
    /// Case-insensitive substring matched against name or description.
    pub search: Option<String>,
    pub min_rating: Option<f64>,
    pub availability: Option<Availability>,
    /// Accepted publishers; never empty when set.
    pub brands: Option<Vec<String>>,
}

impl ProductFilter {
    /// Whether the filter accepts every product.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Evaluate the filter against a product.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(collection) = &self.collection
            && product.collection.as_deref() != Some(collection.as_str())
        {
            return false;
        }
        if let Some(category) = &self.category
            && product.category != *category
        {
            return false;
        }
        if !self.price.contains(product.price.amount()) {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !product.name.to_lowercase().contains(&needle)
                && !product.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(min_rating) = self.min_rating
            && product.rating < min_rating
        {
            return false;
        }
        match self.availability {
            Some(Availability::InStock) if product.count_in_stock <= 0 => return false,
            Some(Availability::OutOfStock) if product.count_in_stock != 0 => return false,
            _ => {}
        }
        if let Some(brands) = &self.brands {
            let Some(publisher) = &product.publisher else {
                return false;
            };
            if !brands.iter().any(|brand| brand == publisher) {
                return false;
            }
        }
        true
    }
}

/// Product field a sort key applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Price,
    Name,
    CreatedAt,
    IsFeatured,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Catalog sort order, selected by a fixed set of tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProductSort {
    /// `price-low-to-high`
    PriceLowToHigh,
    /// `price-high-to-low`
    PriceHighToLow,
    /// `a-z`
    NameAsc,
    /// `z-a`
    NameDesc,
    /// `newest`
    Newest,
    /// `featured`, and the fallback for unknown tokens.
    #[default]
    Featured,
}

impl ProductSort {
    /// Map a sort token to an order. Unknown or absent tokens fall back to
    /// [`ProductSort::Featured`].
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim) {
            Some("price-low-to-high") => Self::PriceLowToHigh,
            Some("price-high-to-low") => Self::PriceHighToLow,
            Some("a-z") => Self::NameAsc,
            Some("z-a") => Self::NameDesc,
            Some("newest") => Self::Newest,
            _ => Self::Featured,
        }
    }

    /// Sort keys, most significant first. The product ID breaks any remaining tie.
    #[must_use]
    pub const fn keys(self) -> &'static [(SortField, Direction)] {
        match self {
            Self::PriceLowToHigh => &[(SortField::Price, Direction::Asc)],
            Self::PriceHighToLow => &[(SortField::Price, Direction::Desc)],
            Self::NameAsc => &[(SortField::Name, Direction::Asc)],
            Self::NameDesc => &[(SortField::Name, Direction::Desc)],
            Self::Newest => &[(SortField::CreatedAt, Direction::Desc)],
            Self::Featured => &[
                (SortField::IsFeatured, Direction::Desc),
                (SortField::CreatedAt, Direction::Desc),
            ],
        }
    }

    /// Compare two products under this order.
    #[must_use]
    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        self.keys()
            .iter()
            .map(|&(field, direction)| {
                let ordering = match field {
                    SortField::Price => a.price.cmp(&b.price),
                    SortField::Name => a.name.cmp(&b.name),
                    SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                    SortField::IsFeatured => a.is_featured.cmp(&b.is_featured),
                };
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

/// A page window over the sorted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    /// A first page of at most `limit` items.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }
}

/// A fully-built catalog request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRequest {
    pub filter: ProductFilter,
    pub sort: ProductSort,
    /// `None` means the listing is unbounded.
    pub page: Option<Page>,
}

impl CatalogRequest {
    /// Apply the request to an in-memory product set.
    #[must_use]
    pub fn select<'a, I>(&self, products: I) -> Vec<&'a Product>
    where
        I: IntoIterator<Item = &'a Product>,
    {
        let mut selected: Vec<&Product> = products
            .into_iter()
            .filter(|product| self.filter.matches(product))
            .collect();
        selected.sort_by(|a, b| self.sort.compare(a, b));

        match self.page {
            Some(page) => selected
                .into_iter()
                .skip(page.offset as usize)
                .take(page.limit as usize)
                .collect(),
            None => selected,
        }
    }
}

impl ProductQuery {
    /// Build the filter, sort, and page from the raw parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidNumber`] if `minPrice`, `maxPrice`,
    /// `limit`, or `page` is present but not a number.
    pub fn build(&self) -> Result<CatalogRequest, CatalogError> {
        let filter = ProductFilter {
            collection: non_blank(self.collection.as_deref())
                .filter(|value| !value.eq_ignore_ascii_case(ALL))
                .map(str::to_owned),
            category: non_blank(self.category.as_deref())
                .filter(|value| !value.eq_ignore_ascii_case(ALL))
                .map(str::to_owned),
            price: PriceRange {
                min: parse_decimal("minPrice", self.min_price.as_deref())?,
                max: parse_decimal("maxPrice", self.max_price.as_deref())?,
            },
            search: non_blank(self.search.as_deref()).map(str::to_owned),
            min_rating: non_blank(self.rating.as_deref()).and_then(numeric_prefix),
            availability: non_blank(self.availability.as_deref()).map(|value| {
                if value == IN_STOCK {
                    Availability::InStock
                } else {
                    Availability::OutOfStock
                }
            }),
            brands: non_blank(self.brand.as_deref()).and_then(|value| {
                let brands: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|brand| !brand.is_empty())
                    .map(str::to_owned)
                    .collect();
                (!brands.is_empty()).then_some(brands)
            }),
        };

        Ok(CatalogRequest {
            filter,
            sort: ProductSort::from_token(non_blank(self.sort.as_deref())),
            page: self.page_window()?,
        })
    }

    fn page_window(&self) -> Result<Option<Page>, CatalogError> {
        let limit = parse_u32("limit", self.limit.as_deref())?;
        let page = parse_u32("page", self.page.as_deref())?;
        if limit.is_none() && page.is_none() {
            return Ok(None);
        }

        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = page.unwrap_or(1).max(1);
        Ok(Some(Page {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }))
    }
}

/// Escape `%`, `_` and `\` so a search term is matched literally by `LIKE`,
/// and wrap it for substring matching.
#[must_use]
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// The leading number of a rating label: "4 stars" → 4, "3.5+" → 3.5.
fn numeric_prefix(value: &str) -> Option<f64> {
    let token = value.split_whitespace().next()?;
    let end = token
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_digit() || c == '.'))
        .map_or(token.len(), |(index, _)| index);
    token.get(..end)?.parse().ok()
}

fn parse_decimal(param: &'static str, value: Option<&str>) -> Result<Option<Decimal>, CatalogError> {
    non_blank(value)
        .map(|raw| {
            raw.parse::<Decimal>().map_err(|_| CatalogError::InvalidNumber {
                param,
                value: raw.to_owned(),
            })
        })
        .transpose()
}

fn parse_u32(param: &'static str, value: Option<&str>) -> Result<Option<u32>, CatalogError> {
    non_blank(value)
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| CatalogError::InvalidNumber {
                param,
                value: raw.to_owned(),
            })
        })
        .transpose()
}
