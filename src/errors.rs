use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Status returned when the caller withdrew the request (nginx convention).
const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Invalid request data: unknown coverage or residence code, out-of-range tier,
    /// malformed identifiers.
    InvalidInput(String),
    /// An external provider (FIPE, accident history) failed or timed out.
    UpstreamUnavailable(String),
    /// The simulation was withdrawn before it produced a response.
    Cancelled,
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// HTTP status the error maps to.
    pub fn status(&self) -> StatusCode {
        match self.root() {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::REQUEST_TIMEOUT),
            AppError::InternalError(_) | AppError::WithContext { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            AppError::Cancelled => write!(f, "Simulation cancelled"),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Maps each error variant to an HTTP status code and JSON body.
    /// Upstream and internal details are logged, never echoed to the caller.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidInput(msg) => (self.status(), msg.clone()),
            AppError::UpstreamUnavailable(msg) => {
                tracing::error!("Upstream unavailable: {}", msg);
                (self.status(), "External service error".to_string())
            }
            AppError::Cancelled => {
                tracing::warn!("Simulation cancelled before completion");
                (self.status(), "Simulation cancelled".to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (self.status(), "Internal server error".to_string())
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return (*source.clone()).into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamUnavailable(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::UpstreamUnavailable("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(AppError::Cancelled.status().as_u16(), 499);
        assert_eq!(
            AppError::InternalError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_context_keeps_root_status() {
        let result: Result<(), AppError> =
            Err(AppError::UpstreamUnavailable("timeout".into()));
        let err = result.context("FIPE lookup").unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert!(matches!(err.root(), AppError::UpstreamUnavailable(_)));
        assert_eq!(err.to_string(), "FIPE lookup: Upstream unavailable: timeout");
    }

    #[test]
    fn test_lazy_context_only_on_error() {
        let ok: Result<u8, AppError> = Ok(1);
        let value = ok
            .with_context(|| unreachable!("context built for a success"))
            .unwrap();
        assert_eq!(value, 1);

        let failed: Result<u8, AppError> = Err(AppError::Cancelled);
        let err = failed
            .with_context(|| format!("Accident history lookup since {}", 2023))
            .unwrap_err();
        assert_eq!(err.status().as_u16(), 499);
        assert!(err.to_string().starts_with("Accident history lookup since 2023"));
    }

    #[tokio::test]
    async fn test_transport_error_is_upstream_unavailable() {
        // Nothing listens on port 1
        let err: AppError = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_invalid_input_response_is_bad_request() {
        let response = AppError::InvalidInput("Cobertura inválida: Vidros".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
