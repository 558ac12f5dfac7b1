//! Request extractors whose rejections answer with the error envelope.

use axum::extract::{FromRequest, FromRequestParts};

use crate::errors::AppError;

/// JSON body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use serde_json::Value;

    use crate::models::{CreateCommentRequest, IncidentQuery};

    fn json_request(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let err = ApiJson::<Value>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_wrong_json_shape_is_validation_error() {
        let err = ApiJson::<CreateCommentRequest>::from_request(json_request(r#"{"text": 5}"#), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .body(Body::from(r#"{"text": "hi"}"#))
            .unwrap();
        let err = ApiJson::<CreateCommentRequest>::from_request(request, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_body_over_default_limit_is_payload_too_large() {
        // axum's default body limit is 2 MB.
        let body = format!("\"{}\"", "a".repeat(3 * 1024 * 1024));
        let err = ApiJson::<Value>::from_request(json_request(body), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_unknown_query_variant_is_bad_request() {
        let (mut parts, _) = Request::builder()
            .uri("/api/incidents?category=meteor")
            .body(())
            .unwrap()
            .into_parts();
        let err = ApiQuery::<IncidentQuery>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        match err {
            AppError::BadRequest(message) => assert!(message.contains("meteor")),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
