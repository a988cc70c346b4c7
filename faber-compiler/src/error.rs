//! Code generation errors

use crate::backend::Target;
use crate::config::ConfigError;
use crate::registry::RegistryError;
use faber_ast::{AstError, Span};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodegenError>;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{span}: {construct} is not supported by the {backend} backend")]
    Unsupported {
        span: Span,
        backend: Target,
        construct: String,
    },

    #[error("Method registry is inconsistent: {0}")]
    Registry(#[from] RegistryError),

    #[error("{span}: `{name}` has no body, which the {backend} backend requires")]
    AbstractWithoutBody {
        span: Span,
        backend: Target,
        name: String,
    },

    #[error("Invalid target: {target}")]
    InvalidTarget { target: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unit error: {0}")]
    Ast(#[from] AstError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

impl CodegenError {
    pub fn unsupported(span: Span, backend: Target, construct: impl Into<String>) -> Self {
        Self::Unsupported {
            span,
            backend,
            construct: construct.into(),
        }
    }

    pub fn without_body(span: Span, backend: Target, name: impl Into<String>) -> Self {
        Self::AbstractWithoutBody {
            span,
            backend,
            name: name.into(),
        }
    }

    /// Source position for errors raised by a node
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Unsupported { span, .. } | Self::AbstractWithoutBody { span, .. } => Some(*span),
            _ => None,
        }
    }

    /// Errors that end generation for a unit on one backend only
    pub fn is_translation_failure(&self) -> bool {
        matches!(self, Self::Unsupported { .. } | Self::AbstractWithoutBody { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_position_and_backend() {
        let error = CodegenError::unsupported(Span::new(4, 9), Target::Zig, "closure");
        assert_eq!(
            error.to_string(),
            "4:9: closure is not supported by the zig backend"
        );
        assert_eq!(error.span(), Some(Span::new(4, 9)));
        assert!(error.is_translation_failure());
    }

    #[test]
    fn test_invalid_target_has_no_span() {
        let error = CodegenError::InvalidTarget {
            target: "cobol".to_string(),
        };
        assert_eq!(error.span(), None);
        assert!(!error.is_translation_failure());
    }
}
