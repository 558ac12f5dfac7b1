//! REST API module.
//!
//! Contains all API routes and handlers. Every handler answers with the
//! `{success, data}` envelope or, through [`AppError`], the error envelope.

mod ai;
mod analytics;
mod client_config;
mod comments;
mod extract;
mod incidents;
mod live;
mod places;
mod reports;

pub use ai::*;
pub use analytics::*;
pub use client_config::*;
pub use comments::*;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use incidents::*;
pub use live::*;
pub use places::*;
pub use reports::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Reject blank required text parameters.
fn required<'a>(value: &'a str, name: &str) -> Result<&'a str, AppError> {
    match value.trim() {
        "" => Err(AppError::Validation(format!("{} is required", name))),
        v => Ok(v),
    }
}

/// Look-back window in days: `default` when absent, otherwise within `1..=max`.
fn days_window(days: Option<i64>, default: i64, max: i64) -> Result<i64, AppError> {
    match days {
        None => Ok(default),
        Some(d) if (1..=max).contains(&d) => Ok(d),
        Some(d) => Err(AppError::Validation(format!(
            "days must be between 1 and {}, got {}",
            max, d
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims() {
        assert_eq!(required("  Main St ", "input").unwrap(), "Main St");
        let err = required("   ", "input").unwrap_err();
        assert_eq!(err.message(), "input is required");
    }

    #[test]
    fn test_days_window() {
        assert_eq!(days_window(None, 7, 90).unwrap(), 7);
        assert_eq!(days_window(Some(90), 7, 90).unwrap(), 90);
        assert!(days_window(Some(0), 7, 90).is_err());
        assert!(days_window(Some(91), 7, 90).is_err());
    }
}
