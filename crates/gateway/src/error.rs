use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use classifier::ClassifierError;
use serde_json::json;

/// Failure of an API call, rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Body is not JSON or does not match the request schema.
    MalformedBody(String),
    Classifier(ClassifierError),
    /// Classification did not finish within the request deadline.
    Timeout,
    /// The blocking inference task panicked or was cancelled.
    Worker(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Classifier(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Classifier(_) | ApiError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Client errors carry the validation message. Server-side failures get
    /// a fixed message; details only go to the logs.
    pub fn message(&self) -> String {
        match self {
            ApiError::MalformedBody(reason) => format!("Invalid request body: {}", reason),
            ApiError::Classifier(e) if e.is_client_error() => e.to_string(),
            ApiError::Classifier(ClassifierError::Load(_)) => "model unavailable".to_string(),
            ApiError::Classifier(_) | ApiError::Worker(_) => {
                "internal inference error".to_string()
            }
            ApiError::Timeout => "inference timed out".to_string(),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(e: ClassifierError) -> Self {
        ApiError::Classifier(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classifier::{InferenceError, InputError, LoadError, ModelVariant};

    #[test]
    fn test_client_errors_map_to_400_with_message() {
        let err = ApiError::from(ClassifierError::Input(InputError::MissingInput));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Missing 'pixels' or 'sequence' in request");
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err = ApiError::from(ClassifierError::Load(LoadError::NotLoaded(
            ModelVariant::Grid,
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "model unavailable");

        let err = ApiError::from(ClassifierError::Inference(InferenceError::Backend(
            "cuda driver exploded".to_string(),
        )));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "internal inference error");
    }

    #[test]
    fn test_timeout_maps_to_504() {
        assert_eq!(ApiError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(ApiError::Timeout.message(), "inference timed out");
    }
}
