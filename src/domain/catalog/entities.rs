use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::CatalogError;

// ============================================================================
// Catalog Entities
// ============================================================================
//
// Field limits match the column widths of the users/products tables, so
// both stores accept and reject exactly the same input.
//
// ============================================================================

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_PERSON_NAME_LEN: usize = 100;
pub const MAX_PRODUCT_NAME_LEN: usize = 255;
pub const MAX_CATEGORY_LEN: usize = 100;

/// Largest unit price a product can carry: NUMERIC(12, 2).
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len > max {
        return Err(format!("{} is {} characters, at most {} allowed", field, len, max));
    }
    Ok(())
}

/// Trim an optional text field; blank becomes `None`.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A registered marketplace account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Registration payload for a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn into_user(self) -> Result<User, CatalogError> {
        let username = self.username.trim().to_string();
        let email = self.email.trim().to_string();

        if username.is_empty() {
            return Err(CatalogError::InvalidUser("username cannot be empty".to_string()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(CatalogError::InvalidUser(format!("invalid email: {:?}", email)));
        }

        let first_name = clean(self.first_name);
        let last_name = clean(self.last_name);

        check_len("username", &username, MAX_USERNAME_LEN)
            .and_then(|_| check_len("email", &email, MAX_EMAIL_LEN))
            .and_then(|_| check_len("first name", first_name.as_deref().unwrap_or(""), MAX_PERSON_NAME_LEN))
            .and_then(|_| check_len("last name", last_name.as_deref().unwrap_or(""), MAX_PERSON_NAME_LEN))
            .map_err(CatalogError::InvalidUser)?;

        Ok(User {
            id: Uuid::new_v4(),
            username,
            email,
            first_name,
            last_name,
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Active,
    Inactive,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "ACTIVE",
            ProductStatus::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ProductStatus::Active),
            "INACTIVE" => Ok(ProductStatus::Inactive),
            other => Err(format!("Unknown product status: {}", other)),
        }
    }
}

/// A listed product with its stock counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Decimal,
    /// Units available for sale; never negative
    pub available_quantity: i32,
    pub status: ProductStatus,
    /// Seller who listed the product
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Listing payload for a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    pub available_quantity: i32,
    /// Username of the seller listing the product
    #[serde(default)]
    pub seller: Option<String>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Decimal, available_quantity: i32) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: None,
            price,
            available_quantity,
            seller: None,
        }
    }

    pub fn with_seller(mut self, username: impl Into<String>) -> Self {
        self.seller = Some(username.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate the listing. The seller is resolved by the caller and
    /// starts out unset here.
    pub fn into_product(self) -> Result<Product, CatalogError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::InvalidProduct("name cannot be empty".to_string()));
        }
        let category = clean(self.category);
        check_len("name", &name, MAX_PRODUCT_NAME_LEN)
            .and_then(|_| check_len("category", category.as_deref().unwrap_or(""), MAX_CATEGORY_LEN))
            .map_err(CatalogError::InvalidProduct)?;

        let price = self.price.round_dp(2);
        if price.is_sign_negative() {
            return Err(CatalogError::InvalidProduct(format!("negative price: {}", self.price)));
        }
        if price > max_price() {
            return Err(CatalogError::InvalidProduct(format!(
                "price {} exceeds the maximum of {}",
                self.price,
                max_price()
            )));
        }
        if self.available_quantity < 0 {
            return Err(CatalogError::InvalidProduct(format!(
                "negative available quantity: {}",
                self.available_quantity
            )));
        }

        Ok(Product {
            id: Uuid::new_v4(),
            name,
            description: self.description,
            category,
            price,
            available_quantity: self.available_quantity,
            status: ProductStatus::Active,
            owner_id: None,
            created_at: Utc::now(),
        })
    }
}

/// Criteria for listing products. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub owner_id: Option<Uuid>,
    /// Category name, compared case-insensitively
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    /// Case-insensitive substring of the name or the description
    pub search: Option<String>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if self.owner_id.is_some() && product.owner_id != self.owner_id {
            return false;
        }
        if let Some(category) = &self.category {
            let same = product
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase() == category.to_lowercase());
            if !same {
                return false;
            }
        }
        if self.status.is_some_and(|status| product.status != status) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&term);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_trimmed() {
        let user = NewUser::new("  alice ", "alice@example.com").into_user().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn test_new_user_requires_email_address() {
        let result = NewUser::new("bob", "not-an-email").into_user();
        assert!(matches!(result, Err(CatalogError::InvalidUser(_))));

        let result = NewUser::new("", "bob@example.com").into_user();
        assert!(matches!(result, Err(CatalogError::InvalidUser(_))));
    }

    #[test]
    fn test_new_product_validation() {
        let product = NewProduct::new("Lamp", Decimal::new(1999, 2), 4).into_product().unwrap();
        assert_eq!(product.status, ProductStatus::Active);
        assert_eq!(product.available_quantity, 4);

        let negative_price = NewProduct::new("Lamp", Decimal::new(-1, 0), 4).into_product();
        assert!(matches!(negative_price, Err(CatalogError::InvalidProduct(_))));

        let negative_stock = NewProduct::new("Lamp", Decimal::new(1, 0), -1).into_product();
        assert!(matches!(negative_stock, Err(CatalogError::InvalidProduct(_))));
    }

    #[test]
    fn test_user_field_limits() {
        let longest = "a".repeat(MAX_USERNAME_LEN);
        assert!(NewUser::new(longest.as_str(), "a@example.com").into_user().is_ok());

        let too_long = "a".repeat(MAX_USERNAME_LEN + 1);
        let result = NewUser::new(too_long, "a@example.com").into_user();
        assert!(matches!(result, Err(CatalogError::InvalidUser(msg)) if msg.contains("username")));

        let email = format!("{}@example.com", "e".repeat(MAX_EMAIL_LEN));
        assert!(NewUser::new("erin", email).into_user().is_err());

        let mut user = NewUser::new("frank", "frank@example.com");
        user.last_name = Some("x".repeat(MAX_PERSON_NAME_LEN + 1));
        assert!(user.into_user().is_err());
    }

    #[test]
    fn test_product_field_limits() {
        let at_limit = NewProduct::new("Lamp", max_price(), 1).into_product().unwrap();
        assert_eq!(at_limit.price, Decimal::new(999_999_999_999, 2));

        let over = NewProduct::new("Lamp", Decimal::new(7, 0) * Decimal::from(10u64.pow(19)), 1).into_product();
        assert!(matches!(over, Err(CatalogError::InvalidProduct(msg)) if msg.contains("maximum")));

        let name = "n".repeat(MAX_PRODUCT_NAME_LEN + 1);
        assert!(NewProduct::new(name, Decimal::ONE, 1).into_product().is_err());

        let category = "c".repeat(MAX_CATEGORY_LEN + 1);
        let result = NewProduct::new("Lamp", Decimal::ONE, 1).with_category(category).into_product();
        assert!(matches!(result, Err(CatalogError::InvalidProduct(msg)) if msg.contains("category")));
    }

    #[test]
    fn test_blank_category_is_dropped() {
        let product = NewProduct::new("Lamp", Decimal::ONE, 1)
            .with_category("  ")
            .into_product()
            .unwrap();
        assert_eq!(product.category, None);
    }

    #[test]
    fn test_product_filter() {
        let owner = Uuid::new_v4();
        let mut lamp = NewProduct::new("Desk Lamp", Decimal::ONE, 1)
            .with_category("Home")
            .with_description("Warm LED light")
            .into_product()
            .unwrap();
        lamp.owner_id = Some(owner);

        assert!(ProductFilter::default().matches(&lamp));
        assert!(ProductFilter { category: Some("home".into()), ..Default::default() }.matches(&lamp));
        assert!(ProductFilter { search: Some("led".into()), ..Default::default() }.matches(&lamp));
        assert!(ProductFilter { search: Some("DESK".into()), ..Default::default() }.matches(&lamp));
        assert!(ProductFilter { owner_id: Some(owner), ..Default::default() }.matches(&lamp));

        assert!(!ProductFilter { owner_id: Some(Uuid::new_v4()), ..Default::default() }.matches(&lamp));
        assert!(!ProductFilter { category: Some("Garden".into()), ..Default::default() }.matches(&lamp));
        assert!(!ProductFilter { status: Some(ProductStatus::Inactive), ..Default::default() }.matches(&lamp));
        assert!(!ProductFilter { search: Some("chair".into()), ..Default::default() }.matches(&lamp));
    }

    #[test]
    fn test_product_status_round_trip() {
        assert_eq!("inactive".parse::<ProductStatus>().unwrap(), ProductStatus::Inactive);
        assert_eq!(ProductStatus::Active.to_string(), "ACTIVE");
    }
}
