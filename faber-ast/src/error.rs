//! Errors raised while loading a resolved unit

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AstError>;

#[derive(Error, Debug)]
pub enum AstError {
    #[error("Malformed unit JSON at line {line}, column {column}: {message}")]
    Json {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    #[error("Unit has no name")]
    MissingName,
}

impl AstError {
    pub fn io(path: impl Into<String>, error: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for AstError {
    fn from(error: serde_json::Error) -> Self {
        AstError::Json {
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_keeps_position() {
        let error: AstError = serde_json::from_str::<serde_json::Value>("{\n  oops")
            .unwrap_err()
            .into();
        match error {
            AstError::Json { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
