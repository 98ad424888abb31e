use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;
use uuid::Uuid;

use crate::models::common::ApiResponse;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tenant {0} not found")]
    TenantNotFound(Uuid),

    #[error("notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("plan limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(errors.to_string())
    }
}

impl EngineError {
    /// Message safe to show an operator. Storage detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            EngineError::TenantNotFound(_) => "Tenant not found".to_string(),
            EngineError::NotificationNotFound(_) => "Notification not found".to_string(),
            EngineError::Validation(message) => message.clone(),
            EngineError::LimitExceeded(message) => message.clone(),
            EngineError::Storage(_) => "Something went wrong, please try again".to_string(),
        }
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::TenantNotFound(_) | EngineError::NotificationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::LimitExceeded(_) => StatusCode::CONFLICT,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let EngineError::Storage(e) = self {
            log::error!("Storage failure: {:#}", e);
        }
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(self.public_message()))
    }
}
