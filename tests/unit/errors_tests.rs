/*!
 * Tests for error types and conversions
 */

use folio::errors::{AppError, ErrorCategory, ExtractError, JobError, ProviderError, RenderError, TranslationError};

#[test]
fn test_providerError_requestFailed_shouldDisplayCorrectly() {
    let error = ProviderError::RequestFailed("Connection timeout".to_string());
    let display = format!("{}", error);
    assert!(display.contains("API request failed"));
    assert!(display.contains("Connection timeout"));
}

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 502,
        message: "Bad gateway".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("502"));
    assert!(display.contains("Bad gateway"));
}

#[test]
fn test_providerError_fromStatus_shouldClassifyRetryability() {
    assert!(!ProviderError::from_status(401, "invalid key").is_transient());
    assert!(!ProviderError::from_status(403, "forbidden").is_transient());
    assert!(!ProviderError::from_status(404, "no such model").is_transient());
    assert!(ProviderError::from_status(408, "timeout").is_transient());
    assert!(ProviderError::from_status(429, "slow down").is_transient());
    assert!(ProviderError::from_status(503, "overloaded").is_transient());
}

#[test]
fn test_translationError_fromProviderError_shouldWrapCorrectly() {
    let error: TranslationError = ProviderError::ConnectionError("refused".to_string()).into();
    assert!(matches!(error, TranslationError::Provider(_)));
    assert_eq!(error.category(), ErrorCategory::TranslationTransient);

    let error: TranslationError = ProviderError::AuthenticationError("bad key".to_string()).into();
    assert_eq!(error.category(), ErrorCategory::TranslationExhausted);
}

#[test]
fn test_translationError_thresholdExceeded_shouldDisplayCounts() {
    let error = TranslationError::ThresholdExceeded { failed: 3, total: 10, ceiling: 0.2 };
    let display = error.to_string();
    assert!(display.contains("3 of 10"));
    assert!(display.contains("20%"));
}

#[test]
fn test_error_categories_shouldMapEveryStage() {
    assert_eq!(ExtractError::CorruptInput("eof".into()).category(), ErrorCategory::CorruptInput);
    assert_eq!(RenderError::Font("no glyph".into()).category(), ErrorCategory::RenderError);
    assert_eq!(RenderError::Layout("missing".into()).category(), ErrorCategory::RenderError);
    assert_eq!(JobError::Cancelled.category(), ErrorCategory::Cancelled);
    assert_eq!(JobError::from(TranslationError::Cancelled).category(), ErrorCategory::Cancelled);
}

#[test]
fn test_errorCategory_display_shouldUseVariantName() {
    assert_eq!(ErrorCategory::RenderOverflow.to_string(), "RenderOverflow");
    assert_eq!(ErrorCategory::JobFailureThresholdExceeded.to_string(), "JobFailureThresholdExceeded");
    assert_eq!(serde_json::to_string(&ErrorCategory::Unsupported).unwrap(), "\"Unsupported\"");
}

#[test]
fn test_appError_fromIoError_shouldBeFileError() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
    let error: AppError = io.into();
    assert!(matches!(error, AppError::File(_)));
    assert!(error.to_string().contains("missing.pdf"));
}

#[test]
fn test_appError_fromAnyhow_shouldBeUnknown() {
    let error: AppError = anyhow::anyhow!("something odd").into();
    assert!(matches!(error, AppError::Unknown(_)));
}
