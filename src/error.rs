//! Error types for the App controllers

use thiserror::Error;

/// Result type alias using the controller's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Controller error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Reconcile key that does not split into namespace/name
    #[error("invalid resource key: {0}")]
    InvalidKey(String),

    /// A child resource with the desired name exists but is owned by someone else
    #[error("Resource {name:?} already exists and is not managed by {owner_kind}")]
    ResourceExists { name: String, owner_kind: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A watched cache was closed before reporting its initial listing
    #[error("Cache for {0} stopped before it finished syncing")]
    CacheSync(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether a create was rejected because the object already exists
    pub fn is_already_exists(&self) -> bool {
        self.api_code() == Some(409) && self.api_reason() == Some("AlreadyExists")
    }

    /// Whether an update lost an optimistic-concurrency race
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409) && self.api_reason() == Some("Conflict")
    }

    fn api_code(&self) -> Option<u16> {
        match self {
            Error::Kube(kube::Error::Api(resp)) => Some(resp.code),
            _ => None,
        }
    }

    fn api_reason(&self) -> Option<&str> {
        match self {
            Error::Kube(kube::Error::Api(resp)) => Some(resp.reason.as_str()),
            _ => None,
        }
    }

    /// Short label used for the error metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::Kube(_) if self.is_conflict() => "conflict",
            Error::Kube(_) if self.is_already_exists() => "already_exists",
            Error::Kube(_) => "kube",
            Error::InvalidKey(_) => "invalid_key",
            Error::ResourceExists { .. } => "resource_exists",
            Error::Config(_) => "config",
            Error::CacheSync(_) => "cache_sync",
            Error::Serialization(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16, reason: &str) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: reason.to_string(),
            code,
        }))
    }

    #[test]
    fn classifies_api_errors() {
        assert!(api_error(409, "AlreadyExists").is_already_exists());
        assert!(!api_error(409, "AlreadyExists").is_conflict());
        assert!(api_error(409, "Conflict").is_conflict());
        assert!(!api_error(409, "Conflict").is_already_exists());
        assert!(!Error::config("x").is_already_exists());
    }

    #[test]
    fn metric_labels_distinguish_api_failures() {
        assert_eq!(api_error(409, "AlreadyExists").metric_label(), "already_exists");
        assert_eq!(api_error(409, "Conflict").metric_label(), "conflict");
        assert_eq!(api_error(500, "InternalError").metric_label(), "kube");
    }

    #[test]
    fn resource_exists_message_names_the_child() {
        let err = Error::ResourceExists {
            name: "svc1".to_string(),
            owner_kind: "App".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Resource \"svc1\" already exists and is not managed by App"
        );
        assert_eq!(err.metric_label(), "resource_exists");
    }
}
