use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::order::{OrderCommand, OrderLineRequest, OrderOutcome, OrderStatus};
use super::error::ApiError;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

fn outcome_response(outcome: OrderOutcome) -> HttpResponse {
    match outcome {
        OrderOutcome::Placed(order) | OrderOutcome::Updated(order) => HttpResponse::Ok().json(order),
        OrderOutcome::Removed(_) => HttpResponse::NoContent().finish(),
    }
}

/// POST /api/orders/create?username=U
pub async fn create_order(
    state: web::Data<AppState>,
    query: web::Query<UsernameQuery>,
    items: web::Json<Vec<OrderLineRequest>>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state
        .orders
        .handle(OrderCommand::PlaceOrder {
            username: query.into_inner().username,
            items: items.into_inner(),
        })
        .await?;
    Ok(outcome_response(outcome))
}

/// GET /api/orders/{id}
pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let order = state.orders.get_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(order))
}

/// PUT /api/orders/{id}/status?status=S
pub async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, ApiError> {
    let status: OrderStatus = query.status.parse().map_err(ApiError::invalid_request)?;
    let outcome = state
        .orders
        .handle(OrderCommand::ChangeStatus {
            order_id: path.into_inner(),
            status,
        })
        .await?;
    Ok(outcome_response(outcome))
}

/// GET /api/orders/user/{username}
pub async fn orders_for_user(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let orders = state.orders.orders_for_user(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders))
}
