use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lifeform_core::MetabolismError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub question_id: i64,
    /// Already trimmed, never empty.
    pub text: String,
}

impl ReplyRequest {
    /// Validate a raw request body.
    ///
    /// Field checks are done by hand rather than through a typed extractor so
    /// that each failure gets its own client-facing message.
    pub fn parse(body: &[u8]) -> Result<Self, MetabolismError> {
        let data: Value = serde_json::from_slice(body)
            .map_err(|e| MetabolismError::Validation(format!("invalid JSON body: {}", e)))?;

        let question_id = data
            .get("question_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                MetabolismError::Validation("question_id must be provided".to_string())
            })?;

        let text = data
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(MetabolismError::Validation(
                "text must be provided".to_string(),
            ));
        }

        Ok(Self {
            question_id,
            text: text.to_string(),
        })
    }
}

/// JSON error payload: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Engine error carried out of a handler.
#[derive(Debug)]
pub struct ApiError(pub MetabolismError);

impl From<MetabolismError> for ApiError {
    fn from(e: MetabolismError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            MetabolismError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Rejected request: {}", self.0);
        }
        let body = ErrorBody {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
