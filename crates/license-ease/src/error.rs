use crate::access::AccessError;
use crate::config::ConfigError;
use crate::licensing::applications::{ApplicationServiceError, FileRejection, StoreError};
use crate::licensing::catalog::CatalogError;
use crate::licensing::directory::DirectoryError;
use crate::licensing::documents::ClassifierError;
use crate::licensing::payments::{PaymentError, ProviderError, RateError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Startup and process-level failures.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Catalog(CatalogError),
    Workflow(ApiError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Catalog(err) => write!(f, "fee schedule error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Workflow(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<ApiError> for AppError {
    fn from(value: ApiError) -> Self {
        Self::Workflow(value)
    }
}

/// Request-level failure rendered as `{"error": <message>, "kind": <kind>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthenticated(String),
    Forbidden(String),
    Validation(String),
    NotFound(String),
    /// Processor refused the request.
    PaymentProvider(String),
    /// Processor could not be reached.
    PaymentProviderUnavailable(String),
    InvalidSignature(String),
    /// Identity provider failure; its message is passed through.
    IdentityProvider(String),
    /// Unexpected failure; logged and replaced by a generic message.
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::PaymentProvider(_) | ApiError::PaymentProviderUnavailable(_) => {
                "payment_provider_error"
            }
            ApiError::InvalidSignature(_) => "invalid_signature",
            ApiError::IdentityProvider(_) | ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Validation(_)
            | ApiError::PaymentProvider(_)
            | ApiError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PaymentProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::IdentityProvider(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(message)
            | ApiError::Forbidden(message)
            | ApiError::Validation(message)
            | ApiError::NotFound(message)
            | ApiError::PaymentProvider(message)
            | ApiError::PaymentProviderUnavailable(message)
            | ApiError::InvalidSignature(message)
            | ApiError::IdentityProvider(message)
            | ApiError::Internal(message) => message,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error while handling request");
                "internal server error"
            }
            other => other.message(),
        };

        let body = Json(json!({ "error": message, "kind": self.kind() }));
        (self.status(), body).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::Unauthenticated(message) => Self::Unauthenticated(message),
            forbidden @ AccessError::Forbidden { .. } => Self::Forbidden(forbidden.to_string()),
        }
    }
}

impl From<FileRejection> for ApiError {
    fn from(value: FileRejection) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            err @ StoreError::NotFound => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ApplicationServiceError> for ApiError {
    fn from(value: ApplicationServiceError) -> Self {
        match value {
            ApplicationServiceError::Validation(message) => Self::Validation(message),
            ApplicationServiceError::File(rejection) => rejection.into(),
            err @ ApplicationServiceError::NotFound(_) => Self::NotFound(err.to_string()),
            err @ ApplicationServiceError::InvalidTransition { .. } => {
                Self::Validation(err.to_string())
            }
            ApplicationServiceError::Access(err) => err.into(),
            ApplicationServiceError::Store(err) => err.into(),
            err @ (ApplicationServiceError::Contention(_) | ApplicationServiceError::Storage(_)) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Rejected(message) => Self::PaymentProvider(message),
            err @ ProviderError::Unavailable(_) => {
                Self::PaymentProviderUnavailable(err.to_string())
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(value: PaymentError) -> Self {
        match value {
            PaymentError::Validation(message) | PaymentError::InvalidPayload(message) => {
                Self::Validation(message)
            }
            err @ PaymentError::NotFound(_) => Self::NotFound(err.to_string()),
            err @ PaymentError::AlreadyPaid(_) => Self::Validation(err.to_string()),
            PaymentError::Provider(err) => err.into(),
            PaymentError::Rate(err @ RateError::UnsupportedCurrency { .. }) => {
                Self::PaymentProvider(err.to_string())
            }
            PaymentError::Rate(err @ RateError::InvalidAmount(_)) => {
                Self::Validation(err.to_string())
            }
            err @ PaymentError::InvalidSignature(_) => Self::InvalidSignature(err.to_string()),
            PaymentError::Application(err) => err.into(),
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::Validation(message) => Self::Validation(message),
            DirectoryError::NotFound(message) => Self::NotFound(message),
            DirectoryError::Store(err) => err.into(),
            err @ DirectoryError::Contention => Self::Internal(err.to_string()),
        }
    }
}

impl From<ClassifierError> for ApiError {
    fn from(value: ClassifierError) -> Self {
        Self::Internal(value.to_string())
    }
}
