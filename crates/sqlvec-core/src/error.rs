use thiserror::Error;

#[derive(Error, Debug)]
pub enum VecError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Dimension mismatch: expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Type mismatch: expected {expected} vector, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Zero-norm vector: {0} is undefined for a vector of length zero")]
    ZeroNorm(&'static str),

    #[error("UNIQUE constraint failed: rowid {0} already exists")]
    UniqueConstraint(i64),

    #[error("Not found: no row with rowid {0}")]
    NotFound(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VecError>;

impl VecError {
    /// Shorthand for a [`VecError::TypeMismatch`] between two displayable types.
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        VecError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_failure() {
        let err = VecError::DimensionMismatch {
            expected: 3,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected 3 dimensions, got 4"
        );

        let err = VecError::type_mismatch("float32", "int8");
        assert_eq!(
            err.to_string(),
            "Type mismatch: expected float32 vector, got int8"
        );

        assert!(VecError::UniqueConstraint(7).to_string().contains("UNIQUE"));
    }

    #[test]
    fn test_json_errors_convert() {
        let parse: std::result::Result<Vec<f64>, _> = serde_json::from_str("[1,");
        let err: VecError = parse.unwrap_err().into();
        assert!(matches!(err, VecError::Json(_)));
    }
}
