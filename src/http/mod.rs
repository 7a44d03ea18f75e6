// ============================================================================
// HTTP API (actix-web)
// ============================================================================
//
// Thin handlers: extract, call the domain handler, map the result.
// Extraction failures (bad JSON, bad UUID, missing query) answer 400 with
// the same error body as domain failures.
//
// ============================================================================

mod catalog;
mod error;
mod orders;
mod payments;

use actix_web::web;
use std::sync::Arc;

use crate::domain::catalog::CatalogService;
use crate::domain::order::{CancellationPolicy, OrderCommandHandler};
use crate::domain::payment::PaymentCommandHandler;
use crate::metrics::Metrics;
use crate::store::MarketStore;

pub use error::ApiError;

/// Shared per-application state handed to every handler.
pub struct AppState {
    pub orders: OrderCommandHandler,
    pub payments: PaymentCommandHandler,
    pub catalog: CatalogService,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MarketStore>,
        metrics: Arc<Metrics>,
        cancellation: CancellationPolicy,
    ) -> Self {
        Self {
            orders: OrderCommandHandler::new(store.clone(), metrics.clone(), cancellation),
            payments: PaymentCommandHandler::new(store.clone(), metrics),
            catalog: CatalogService::new(store),
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::invalid_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::invalid_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::invalid_request(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(
                web::scope("/orders")
                    .route("/create", web::post().to(orders::create_order))
                    .route("/user/{username}", web::get().to(orders::orders_for_user))
                    .route("/{id}", web::get().to(orders::get_order))
                    .route("/{id}/status", web::put().to(orders::update_status))
                    .route("/{id}/payments", web::post().to(payments::record_payment))
                    .route("/{id}/payments", web::get().to(payments::payments_for_order)),
            )
            .service(
                web::scope("/payments")
                    .route("/{id}", web::get().to(payments::get_payment))
                    .route("/{id}/status", web::put().to(payments::update_status)),
            )
            .route("/users", web::post().to(catalog::register_user))
            .route("/users/{username}", web::get().to(catalog::get_user))
            .service(
                // Fixed segments are registered before `/{id}`
                web::scope("/products")
                    .route("", web::post().to(catalog::add_product))
                    .route("", web::get().to(catalog::list_products))
                    .route("/search", web::get().to(catalog::search_products))
                    .route("/user/{username}", web::get().to(catalog::products_by_seller))
                    .route("/category/{name}", web::get().to(catalog::products_in_category))
                    .route("/{id}", web::get().to(catalog::get_product))
                    .route("/{id}/ratings", web::post().to(catalog::rate_product))
                    .route("/{id}/ratings", web::get().to(catalog::rating_summary))
                    .route("/{id}/ratings/{username}", web::get().to(catalog::user_rating)),
            ),
    );
}

// ============================================================================
// Endpoint Tests
// ============================================================================
