use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::domain::catalog::CatalogError;
use crate::domain::errors::ErrorKind;
use crate::domain::order::OrderError;
use crate::domain::payment::PaymentError;

// ============================================================================
// HTTP Error Mapping
// ============================================================================
//
// Body: {"error": "<kind>", "message": "<reason>"}
// Internal failures are logged here and answered with a generic message.
//
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidRequest,
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self.kind {
            ErrorKind::Internal => {
                tracing::error!(error = %self.message, "Request failed");
                "internal server error"
            }
            _ => self.message.as_str(),
        };

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind.as_str(),
            "message": message,
        }))
    }
}

macro_rules! impl_from_domain_error {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for ApiError {
                fn from(error: $error) -> Self {
                    Self {
                        kind: error.kind(),
                        message: error.to_string(),
                    }
                }
            }
        )+
    };
}

impl_from_domain_error!(OrderError, PaymentError, CatalogError);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::from(OrderError::OrderNotFound(Uuid::nil())), StatusCode::NOT_FOUND),
            (ApiError::from(OrderError::EmptyOrder), StatusCode::BAD_REQUEST),
            (
                ApiError::from(CatalogError::AlreadyExists("alice".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(PaymentError::Storage(StoreError::Corrupt("status".to_string()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{}", error);
        }
    }

    #[actix_web::test]
    async fn test_internal_details_are_hidden() {
        let error = ApiError::from(OrderError::Storage(StoreError::Corrupt("orders.status".to_string())));
        let response = error.error_response();
        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["error"], "internal");
        assert_eq!(json["message"], "internal server error");
    }
}
