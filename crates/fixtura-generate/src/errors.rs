use thiserror::Error;

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model error: {0}")]
    Model(fixtura_core::Error),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("invalid reference: {0}")]
    InvalidReference(String),
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("undefined value: {0}")]
    UndefinedValue(String),
    #[error("circular dependency between {}", .cells.join(", "))]
    Cycle { cells: Vec<String> },
    #[error("no instances of '{entity}' are available to pick from")]
    EmptyPool { entity: String },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// True for errors caused by the schema or options rather than by a
    /// particular run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Model(fixtura_core::Error::Configuration(_))
        )
    }
}

impl From<fixtura_core::Error> for GenerationError {
    fn from(err: fixtura_core::Error) -> Self {
        match err {
            fixtura_core::Error::Configuration(message) => Self::Configuration(message),
            fixtura_core::Error::InvalidReference(message) => Self::InvalidReference(message),
            other => Self::Model(other),
        }
    }
}
