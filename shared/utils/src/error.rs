use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum IntakeError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Unreadable document: {path} - {message}")]
    Unreadable { path: String, message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IntakeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn unreadable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unreadable { .. } => "UNREADABLE_DOCUMENT",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::MalformedResponse { .. } => "MALFORMED_RESPONSE",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Process exit status for a run that aborts with this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 2,
            Self::NotFound { .. } => 3,
            Self::Unreadable { .. } => 4,
            Self::ExternalService { .. } => 5,
            Self::MalformedResponse { .. } | Self::Validation { .. } => 6,
            Self::Storage { .. } => 7,
            Self::Internal { .. } => 1,
        }
    }

    /// Whether a batch run may skip the current file and continue.
    pub fn is_per_document(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Unreadable { .. }
                | Self::ExternalService { .. }
                | Self::MalformedResponse { .. }
                | Self::Validation { .. }
        )
    }
}

pub type IntakeResult<T> = Result<T, IntakeError>;

// Conversion from common error types
impl From<std::io::Error> for IntakeError {
    fn from(error: std::io::Error) -> Self {
        Self::storage(error.to_string())
    }
}

impl From<csv::Error> for IntakeError {
    fn from(error: csv::Error) -> Self {
        Self::storage(error.to_string())
    }
}

impl From<reqwest::Error> for IntakeError {
    fn from(error: reqwest::Error) -> Self {
        Self::external_service("LLM API", error.to_string())
    }
}

impl From<serde_json::Error> for IntakeError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed_response(error.to_string())
    }
}

impl From<handlebars::RenderError> for IntakeError {
    fn from(error: handlebars::RenderError) -> Self {
        Self::internal(format!("prompt rendering failed: {}", error))
    }
}

impl From<config::ConfigError> for IntakeError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}
