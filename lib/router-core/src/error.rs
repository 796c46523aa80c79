use router_api::PolicyError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid dark launch policy for {key}: {source}")]
    ParseError {
        key: String,
        #[source]
        source: PolicyError,
    },

    #[error("No change handler registered for source: {0}")]
    NoHandlerRegistered(String),

    #[error("Route source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("Invalid router configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Governance client error: {0}")]
    Governance(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RouterError {
    /// Whether the error only says the key is absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouterError::KeyNotFound(_))
    }
}
