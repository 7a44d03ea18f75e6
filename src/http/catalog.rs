use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::catalog::{NewProduct, NewUser, ProductQuery, RatingRequest};
use super::error::ApiError;
use super::AppState;

/// POST /api/users
pub async fn register_user(
    state: web::Data<AppState>,
    body: web::Json<NewUser>,
) -> Result<HttpResponse, ApiError> {
    let user = state.catalog.register_user(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(user))
}

/// GET /api/users/{username}
pub async fn get_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = state.catalog.user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /api/products
pub async fn add_product(
    state: web::Data<AppState>,
    body: web::Json<NewProduct>,
) -> Result<HttpResponse, ApiError> {
    let product = state.catalog.add_product(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

/// GET /api/products?seller=U&category=C&status=S&q=T
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, ApiError> {
    let products = state.catalog.list_products(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(products))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/products/search?q=T
pub async fn search_products(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let products = state.catalog.search_products(query.into_inner().q).await?;
    Ok(HttpResponse::Ok().json(products))
}

/// GET /api/products/user/{username}
pub async fn products_by_seller(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let products = state.catalog.products_by_seller(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(products))
}

/// GET /api/products/category/{name}
pub async fn products_in_category(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let products = state.catalog.products_in_category(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(products))
}

/// POST /api/products/{id}/ratings
pub async fn rate_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RatingRequest>,
) -> Result<HttpResponse, ApiError> {
    let summary = state.catalog.rate_product(path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /api/products/{id}/ratings
pub async fn rating_summary(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let summary = state.catalog.rating_summary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// GET /api/products/{id}/ratings/{username}; 0 stars when not rated yet
pub async fn user_rating(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ApiError> {
    let (product_id, username) = path.into_inner();
    let stars = state.catalog.user_rating(product_id, &username).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "stars": stars.unwrap_or(0) })))
}

/// GET /api/products/{id}
pub async fn get_product(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let product = state.catalog.product(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}
