use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::error::{Error, Result as EngineResult};

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Set on conversion conflicts so callers can find the existing customer.
    pub customer_id: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            customer_id: None,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(message) => ApiError::bad_request(message),
            Error::NotFound => ApiError::not_found("Not found"),
            Error::AlreadyConverted { customer_id } => ApiError {
                customer_id: Some(customer_id),
                ..ApiError::bad_request("Lead already converted")
            },
            other => {
                error!("Request failed: {other}");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.customer_id {
            Some(customer_id) => json!({ "error": self.message, "customerId": customer_id }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Extension trait for converting engine results, naming the missing resource on 404.
pub trait EngineResultExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> EngineResultExt<T> for EngineResult<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            Error::NotFound => ApiError::not_found(message),
            other => ApiError::from(other),
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ApiError::from(Error::validation("bad")).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(Error::NotFound).status, StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(Error::Config("secret detail".into())).message,
            "Internal server error"
        );

        let conflict = ApiError::from(Error::AlreadyConverted {
            customer_id: "cust-1".to_string(),
        });
        assert_eq!(conflict.status, StatusCode::BAD_REQUEST);
        assert_eq!(conflict.customer_id.as_deref(), Some("cust-1"));
    }

    #[test]
    fn test_not_found_message() {
        let result: EngineResult<()> = Err(Error::NotFound);
        let err = result.or_not_found("Lead not found").unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Lead not found");
    }
}
