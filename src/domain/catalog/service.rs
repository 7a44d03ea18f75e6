use std::sync::Arc;
use uuid::Uuid;

use crate::store::{MarketStore, StoreError};
use super::entities::{NewProduct, NewUser, Product, ProductFilter, ProductStatus, User};
use super::errors::CatalogError;
use super::rating::{ProductRating, RatingRequest, RatingSummary};

// ============================================================================
// Catalog Service - users, products and ratings
// ============================================================================

/// Listing criteria as callers send them; the seller is a username.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProductQuery {
    pub seller: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProductStatus>,
    #[serde(rename = "q")]
    pub search: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn MarketStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    pub async fn register_user(&self, new_user: NewUser) -> Result<User, CatalogError> {
        let user = new_user.into_user()?;
        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => CatalogError::AlreadyExists(format!(
                "username {:?} or email {:?}",
                user.username, user.email
            )),
            other => CatalogError::Storage(other),
        })?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    pub async fn user(&self, username: &str) -> Result<User, CatalogError> {
        self.store
            .find_user(username)
            .await?
            .ok_or_else(|| CatalogError::UserNotFound(username.to_string()))
    }

    pub async fn add_product(&self, new_product: NewProduct) -> Result<Product, CatalogError> {
        let seller = non_blank(new_product.seller.clone());
        let mut product = new_product.into_product()?;
        if let Some(username) = &seller {
            product.owner_id = Some(self.user(username).await?.id);
        }

        self.store.insert_product(&product).await.map_err(|e| match e {
            StoreError::Missing(_) => {
                CatalogError::UserNotFound(seller.clone().unwrap_or_default())
            }
            other => CatalogError::Storage(other),
        })?;

        tracing::info!(
            product_id = %product.id,
            name = %product.name,
            seller = ?seller,
            available = product.available_quantity,
            "Product listed"
        );
        Ok(product)
    }

    /// Products matching every criterion given, oldest listing first.
    pub async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>, CatalogError> {
        let owner_id = match non_blank(query.seller) {
            Some(username) => Some(self.user(&username).await?.id),
            None => None,
        };
        let filter = ProductFilter {
            owner_id,
            category: non_blank(query.category),
            status: query.status,
            search: non_blank(query.search),
        };
        Ok(self.store.list_products(&filter).await?)
    }

    pub async fn products_by_seller(&self, username: &str) -> Result<Vec<Product>, CatalogError> {
        self.list_products(ProductQuery {
            seller: Some(username.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn products_in_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        self.list_products(ProductQuery {
            category: Some(category.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Active products whose name or description contains `term`; a blank
    /// term lists every active product.
    pub async fn search_products(&self, term: Option<String>) -> Result<Vec<Product>, CatalogError> {
        self.list_products(ProductQuery {
            status: Some(ProductStatus::Active),
            search: term,
            ..Default::default()
        })
        .await
    }

    /// Record the user's stars for a product and return the new summary.
    pub async fn rate_product(
        &self,
        product_id: Uuid,
        request: RatingRequest,
    ) -> Result<RatingSummary, CatalogError> {
        let product = self.product(product_id).await?;
        let user = self.user(request.username.trim()).await?;
        let rating = ProductRating::new(product.id, user.id, request.stars)?;

        self.store.upsert_rating(&rating).await.map_err(|e| match e {
            StoreError::Missing(_) => CatalogError::ProductNotFound(product_id),
            other => CatalogError::Storage(other),
        })?;

        let summary = self.store.rating_summary(product_id).await?;
        tracing::info!(
            product_id = %product_id,
            username = %user.username,
            stars = rating.stars,
            average = %summary.average,
            "Product rated"
        );
        Ok(summary)
    }

    pub async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, CatalogError> {
        self.product(product_id).await?;
        Ok(self.store.rating_summary(product_id).await?)
    }

    /// Stars the user gave the product, if any.
    pub async fn user_rating(
        &self,
        product_id: Uuid,
        username: &str,
    ) -> Result<Option<i16>, CatalogError> {
        self.product(product_id).await?;
        let user = self.user(username).await?;
        let rating = self.store.find_rating(product_id, user.id).await?;
        Ok(rating.map(|r| r.stars))
    }

    pub async fn product(&self, id: Uuid) -> Result<Product, CatalogError> {
        self.store
            .find_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }
}
