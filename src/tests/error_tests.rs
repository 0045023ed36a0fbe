#[cfg(test)]
mod tests {
    use std::io;

    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;

    use crate::error::{validation, AppError};
    use crate::store::StoreError;

    fn status_of(err: StoreError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::NotFound("alice.jpg".to_string());
        assert_eq!(format!("{}", error), "Not found: alice.jpg");

        let error = AppError::PartialFailure { remaining: vec!["a.jpg".into(), "b.jpg".into()] };
        assert_eq!(format!("{}", error), "Partial failure: 2 image(s) remain");
    }

    #[test]
    fn test_store_error_status_mapping() {
        assert_eq!(status_of(StoreError::NotFound("a.jpg".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(StoreError::EmptyStore), StatusCode::NOT_FOUND);
        assert_eq!(status_of(StoreError::NameConflict("a.jpg".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_of(StoreError::PartialFailure { remaining: vec!["a.jpg".into()] }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(StoreError::RecognitionFailed("boom".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(StoreError::RecognitionTimeout(60)), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(StoreError::StoreUnavailable("data/faces".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(StoreError::InvalidName("../x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(StoreError::DecodeFailure("bad png".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_partial_failure_body_lists_remaining() {
        let err = AppError::from(StoreError::PartialFailure { remaining: vec!["stuck.jpg".into()] });
        let response = err.into_response();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["error"]["code"], "PARTIAL_FAILURE");
        assert_eq!(json["error"]["details"]["remaining"][0], "stuck.jpg");
        assert_eq!(json["status"], 500);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let err = AppError::from(anyhow::anyhow!("secret backend path"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes);
        assert!(!text.contains("secret backend path"));
        assert!(text.contains("error_id"));
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validation::validate_name("  alice.jpg ", "img_path").unwrap(), "alice.jpg");
        assert!(matches!(
            validation::validate_name("   ", "img_path"),
            Err(AppError::ValidationError { ref field, .. }) if field == "img_path"
        ));
        assert!(validation::validate_name("a\0b.jpg", "img_path").is_err());
        assert!(validation::validate_name(&"x".repeat(256), "img_path").is_err());
    }
}
