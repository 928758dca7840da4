/// ragstore error types
#[derive(Debug, thiserror::Error)]
pub enum RagStoreError {
    /// Document id already present in the collection (or repeated in a batch)
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Collection or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector length differs from the collection dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Collection name already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Embedding adapter failed, timed out or returned malformed vectors
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    /// Malformed where / where_document selector
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot could not be written or loaded
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RagStoreError {
    /// Create duplicate id error
    pub fn duplicate_id<S: Into<String>>(id: S) -> Self {
        Self::DuplicateId(id.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create already exists error
    pub fn already_exists<S: Into<String>>(msg: S) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create embedding failure
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        Self::EmbeddingFailure(msg.into())
    }

    /// Create invalid selector error
    pub fn invalid_selector<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSelector(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create persistence error
    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
}

impl RagStoreError {
    /// Stable error code, independent of the message text
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateId(_) => "DuplicateId",
            Self::NotFound(_) => "NotFound",
            Self::DimensionMismatch { .. } => "DimensionMismatch",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::EmbeddingFailure(_) => "EmbeddingFailure",
            Self::InvalidSelector(_) => "InvalidSelector",
            Self::InvalidInput(_) => "InvalidInput",
            Self::Config(_) => "Config",
            Self::Persistence(_) => "Persistence",
            Self::Io(_) => "Io",
            Self::Json(_) => "Json",
            Self::Other(_) => "Other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = RagStoreError::dimension_mismatch(3, 4);
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 4");
        assert_eq!(err.code(), "DimensionMismatch");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: RagStoreError = io.into();
        assert_eq!(err.code(), "Io");
    }
}
