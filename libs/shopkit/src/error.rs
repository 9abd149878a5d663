use thiserror::Error;

/// Errors raised while assembling or using a context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Service '{service}' unavailable: {reason}")]
    ServiceUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("Configuration scope '{scope}' is not defined")]
    ConfigurationMissing { scope: String },

    #[error("Failed to resolve {what}: {reason}")]
    ResolutionFailed { what: &'static str, reason: String },

    #[error("Invalid configuration at '{path}': {reason}")]
    InvalidConfig { path: String, reason: String },
}

impl ContextError {
    pub fn service_unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            service,
            reason: reason.into(),
        }
    }

    pub fn configuration_missing(scope: impl Into<String>) -> Self {
        Self::ConfigurationMissing {
            scope: scope.into(),
        }
    }

    pub fn resolution_failed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            what,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type ContextResult<T> = Result<T, ContextError>;
