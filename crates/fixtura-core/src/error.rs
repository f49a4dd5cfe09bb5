use thiserror::Error;

/// Core error type shared across fixtura crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema describes something the engine cannot build.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A `$` token in a dynamic expression does not name a valid path.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    /// The schema document is structurally wrong.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }
}

/// Convenience alias for results returned by fixtura crates.
pub type Result<T> = std::result::Result<T, Error>;
