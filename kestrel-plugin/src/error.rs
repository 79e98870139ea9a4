use thiserror::Error;

/// Failure inside one source's evaluation. Never escapes the source boundary:
/// the registry turns it into an empty batch plus a log line.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {source_name} failed: {message}")]
    Failed { source_name: String, message: String },

    #[error("source {0} is unavailable")]
    Unavailable(String),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl SourceError {
    pub fn failed(source_name: impl Into<String>, message: impl ToString) -> Self {
        SourceError::Failed {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// A plugin response that does not follow the documented contract.
#[derive(Debug, Error, PartialEq)]
pub enum ContractError {
    #[error("missing required column `{0}`")]
    MissingColumn(&'static str),

    #[error("column `{column}` has an unexpected value: {detail}")]
    InvalidValue { column: &'static str, detail: String },

    #[error("unknown path `{0}`")]
    UnknownPath(String),

    #[error("missing parameter `{0}`")]
    MissingParam(&'static str),

    #[error("{0} plugins do not answer this request")]
    Unsupported(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}
