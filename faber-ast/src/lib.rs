//! Faber syntax tree
//!
//! The resolved tree consumed by the Faber code generators. Units are
//! exchanged with the upstream parser and resolver as JSON.

pub mod ast;
pub mod builder;
pub mod error;
pub mod span;

pub use ast::*;
pub use builder::AstBuilder;
pub use error::{AstError, Result};
pub use span::{FileId, Span};

use std::path::Path;

impl Unit {
    pub fn new(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Unit {
            name: name.into(),
            body,
        }
    }

    /// Load a resolved unit from its JSON form
    pub fn from_json(source: &str) -> Result<Self> {
        let unit: Unit = serde_json::from_str(source)?;
        if unit.name.is_empty() {
            return Err(AstError::MissingName);
        }
        Ok(unit)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| AstError::io(path.display().to_string(), e))?;
        Self::from_json(&source)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_json_roundtrip() {
        let b = AstBuilder::new();
        let unit = Unit::new(
            "main",
            vec![b.fixum("x", None, b.convert(b.text("42"), ConversionKind::Integer))],
        );

        let json = unit.to_json().unwrap();
        assert!(json.contains("\"tag\": \"Var\""));
        assert_eq!(Unit::from_json(&json).unwrap(), unit);
    }

    #[test]
    fn test_unit_from_handwritten_json() {
        let source = r#"{
            "name": "salve",
            "body": [
                {"tag": "Print", "args": [
                    {"tag": "Literal", "value": {"kind": "Text", "value": "salve"},
                     "span": {"line": 1, "column": 8}}
                ], "span": {"line": 1, "column": 1}}
            ]
        }"#;

        let unit = Unit::from_json(source).unwrap();
        match &unit.body[0] {
            Stmt::Print { level, args, .. } => {
                assert_eq!(*level, PrintLevel::Log);
                assert_eq!(args.len(), 1);
            }
            other => panic!("unexpected statement: {other:?}"),
        }
        assert_eq!(unit.body[0].span(), Span::new(1, 1));
    }

    #[test]
    fn test_unit_requires_name() {
        assert!(matches!(
            Unit::from_json(r#"{"name": "", "body": []}"#),
            Err(AstError::MissingName)
        ));
    }
}
