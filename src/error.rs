use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::server::LeadResponse;

/// Everything that can stop a lead before the delivery stage.
///
/// The `Display` text of each variant is exactly what the landing page
/// receives in the `error` field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LeadError {
    #[error("Слишком частые запросы. Повторите через {cooldown_secs} секунд.")]
    Throttled { cooldown_secs: u64 },

    #[error("Phone is required")]
    MissingPhone,

    #[error("Invalid phone number")]
    InvalidPhone,

    #[error("Missing Telegram config")]
    MissingConfig,

    #[error("Invalid Telegram token")]
    InvalidToken,

    #[error("{0}")]
    Unexpected(String),
}

impl LeadError {
    pub fn status(&self) -> StatusCode {
        match self {
            LeadError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            LeadError::MissingPhone | LeadError::InvalidPhone => StatusCode::BAD_REQUEST,
            LeadError::InvalidToken => StatusCode::UNAUTHORIZED,
            LeadError::MissingConfig | LeadError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message sent to the client; an empty unexpected error becomes "Unknown error".
    pub fn client_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            message
        }
    }
}

impl From<serde_json::Error> for LeadError {
    fn from(err: serde_json::Error) -> Self {
        LeadError::Unexpected(err.to_string())
    }
}

impl From<anyhow::Error> for LeadError {
    fn from(err: anyhow::Error) -> Self {
        LeadError::Unexpected(format!("{:#}", err))
    }
}

impl IntoResponse for LeadError {
    fn into_response(self) -> Response {
        (self.status(), Json(LeadResponse::failure(self.client_message()))).into_response()
    }
}
