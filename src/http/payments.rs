use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::domain::payment::{PaymentCommand, PaymentRequest, PaymentStatus};
use super::error::ApiError;
use super::orders::StatusQuery;
use super::AppState;

/// POST /api/orders/{id}/payments
pub async fn record_payment(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<PaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let payment = state
        .payments
        .handle(PaymentCommand::Record {
            order_id: path.into_inner(),
            request: request.into_inner(),
        })
        .await?;
    Ok(HttpResponse::Created().json(payment))
}

/// GET /api/orders/{id}/payments
pub async fn payments_for_order(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let payments = state.payments.payments_for_order(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payments))
}

/// GET /api/payments/{id}
pub async fn get_payment(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let payment = state.payments.get_payment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(payment))
}

/// PUT /api/payments/{id}/status?status=S
pub async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, ApiError> {
    let status: PaymentStatus = query.status.parse().map_err(ApiError::invalid_request)?;
    let payment = state
        .payments
        .handle(PaymentCommand::ChangeStatus {
            payment_id: path.into_inner(),
            status,
        })
        .await?;
    Ok(HttpResponse::Ok().json(payment))
}
