//! Backend interface and target selection

use crate::targets::{cpp, faber, python, rust, typescript, zig};
use crate::{CodegenError, Result};
use faber_ast::{Span, Unit};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Faber,
    TypeScript,
    Python,
    Rust,
    Zig,
    Cpp,
}

impl Target {
    pub const ALL: [Target; 6] = [
        Target::Faber,
        Target::TypeScript,
        Target::Python,
        Target::Rust,
        Target::Zig,
        Target::Cpp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Faber => "faber",
            Target::TypeScript => "typescript",
            Target::Python => "python",
            Target::Rust => "rust",
            Target::Zig => "zig",
            Target::Cpp => "cpp",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Target::Faber => "fab",
            Target::TypeScript => "ts",
            Target::Python => "py",
            Target::Rust => "rs",
            Target::Zig => "zig",
            Target::Cpp => "cpp",
        }
    }

    pub fn default_indent(self) -> usize {
        match self {
            Target::TypeScript => 2,
            _ => 4,
        }
    }

    /// Accepts the canonical name and the usual short forms
    pub fn from_name(name: &str) -> Option<Target> {
        match name.to_ascii_lowercase().as_str() {
            "faber" | "fab" => Some(Target::Faber),
            "typescript" | "ts" => Some(Target::TypeScript),
            "python" | "py" => Some(Target::Python),
            "rust" | "rs" => Some(Target::Rust),
            "zig" => Some(Target::Zig),
            "cpp" | "c++" | "cxx" => Some(Target::Cpp),
            _ => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self> {
        Target::from_name(s).ok_or_else(|| CodegenError::InvalidTarget {
            target: s.to_string(),
        })
    }
}

/// How a target manages memory, which decides resource-scope lowering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryModel {
    /// Source form; nothing is lowered
    Source,
    GarbageCollected,
    Ownership,
    Manual,
    ExplicitAllocator,
}

/// Compilation target specification
#[derive(Debug, Clone)]
pub struct CompilationTarget {
    pub target: Target,
    pub name: String,
    pub file_extension: String,
    pub memory: MemoryModel,
    pub supports_async: bool,
    pub supports_generators: bool,
    pub supports_closures: bool,
}

/// Code generation options
#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Spaces per indentation level; the target default when `None`
    pub indent: Option<usize>,
    pub emit_preamble: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            indent: None,
            emit_preamble: true,
        }
    }
}

impl CodegenOptions {
    pub fn indent_for(&self, target: Target) -> usize {
        self.indent.unwrap_or_else(|| target.default_indent())
    }
}

/// Code generation diagnostic
#[derive(Debug, Clone)]
pub struct CodegenDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub location: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

/// A code generation backend
pub trait CodegenBackend: Send + Sync {
    fn target(&self) -> Target;

    /// Get the target information for this backend
    fn target_info(&self) -> CompilationTarget;

    /// Check if this backend supports the given feature
    fn supports_feature(&self, feature: &str) -> bool;

    /// Generate the full text for one unit, preamble included
    fn generate_unit(&self, unit: &Unit, options: &CodegenOptions) -> Result<String>;

    /// Inspect generated text for problems the translation could not rule out
    fn validate_output(&self, _code: &str) -> Vec<CodegenDiagnostic> {
        Vec::new()
    }
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend for the specified target name
    pub fn create_backend(target: &str) -> Result<Box<dyn CodegenBackend>> {
        Self::for_target(target.parse()?)
    }

    /// Registries are validated here, before any unit is translated
    pub fn for_target(target: Target) -> Result<Box<dyn CodegenBackend>> {
        match target {
            Target::Faber => Ok(Box::new(faber::FaberBackend::new())),
            Target::TypeScript => Ok(Box::new(typescript::TypeScriptBackend::new()?)),
            Target::Python => Ok(Box::new(python::PythonBackend::new()?)),
            Target::Rust => Ok(Box::new(rust::RustBackend::new()?)),
            Target::Zig => Ok(Box::new(zig::ZigBackend::new()?)),
            Target::Cpp => Ok(Box::new(cpp::CppBackend::new()?)),
        }
    }

    /// List all available backends
    pub fn available_backends() -> Vec<&'static str> {
        Target::ALL.iter().map(|target| target.name()).collect()
    }
}

/// Utility functions shared by the backends
pub mod utils {
    use super::Target;

    const TYPESCRIPT_RESERVED: &[&str] = &[
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
        "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this",
        "throw", "true", "try", "typeof", "var", "void", "while", "with", "let", "static",
        "yield", "await", "implements", "interface", "package", "private", "protected", "public",
    ];

    const PYTHON_RESERVED: &[&str] = &[
        "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
        "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
        "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
        "try", "while", "with", "yield", "match", "case", "type",
    ];

    const RUST_RESERVED: &[&str] = &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
        "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
        "mut", "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe",
        "use", "where", "while", "abstract", "become", "box", "do", "final", "macro", "override",
        "priv", "typeof", "unsized", "virtual", "yield", "try", "gen",
    ];

    /// Names that `r#` cannot escape
    const RUST_UNRAWABLE: &[&str] = &["self", "Self", "super", "crate"];

    const ZIG_RESERVED: &[&str] = &[
        "addrspace", "align", "allowzero", "and", "anyframe", "anytype", "asm", "async", "await",
        "break", "callconv", "catch", "comptime", "const", "continue", "defer", "else", "enum",
        "errdefer", "error", "export", "extern", "fn", "for", "if", "inline", "linksection",
        "noalias", "noinline", "nosuspend", "opaque", "or", "orelse", "packed", "pub", "resume",
        "return", "struct", "suspend", "switch", "test", "threadlocal", "try", "union",
        "unreachable", "usingnamespace", "var", "volatile", "while", "type", "undefined", "null",
        "true", "false",
    ];

    const CPP_RESERVED: &[&str] = &[
        "alignas", "alignof", "and", "asm", "auto", "bool", "break", "case", "catch", "char",
        "class", "const", "constexpr", "continue", "decltype", "default", "delete", "do",
        "double", "else", "enum", "explicit", "export", "extern", "false", "float", "for",
        "friend", "goto", "if", "inline", "int", "long", "mutable", "namespace", "new",
        "noexcept", "not", "nullptr", "operator", "or", "private", "protected", "public",
        "register", "return", "short", "signed", "sizeof", "static", "struct", "switch",
        "template", "this", "throw", "true", "try", "typedef", "typename", "union", "unsigned",
        "using", "virtual", "void", "volatile", "while", "xor", "co_await", "co_yield",
        "co_return", "concept", "requires",
    ];

    pub fn is_reserved(name: &str, target: Target) -> bool {
        let reserved = match target {
            Target::Faber => return false,
            Target::TypeScript => TYPESCRIPT_RESERVED,
            Target::Python => PYTHON_RESERVED,
            Target::Rust => RUST_RESERVED,
            Target::Zig => ZIG_RESERVED,
            Target::Cpp => CPP_RESERVED,
        };
        reserved.contains(&name)
    }

    /// Sanitize a source identifier for the target language
    pub fn sanitize_identifier(name: &str, target: Target) -> String {
        if !is_reserved(name, target) && !(target == Target::Rust && RUST_UNRAWABLE.contains(&name))
        {
            return name.to_string();
        }
        match target {
            Target::Rust if RUST_UNRAWABLE.contains(&name) => format!("{name}_"),
            Target::Rust => format!("r#{name}"),
            Target::Zig => format!("@\"{name}\""),
            _ => format!("{name}_"),
        }
    }

    /// Quote text as a double-quoted literal with C-style escapes
    pub fn quote(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for c in text.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }

    /// Float text that always reads back as a float
    pub fn float_literal(value: f64) -> String {
        let text = value.to_string();
        if text.contains(['.', 'e', 'E']) || !value.is_finite() {
            text
        } else {
            format!("{text}.0")
        }
    }

    /// `snake_case` for a test function or module
    pub fn snake_identifier(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut previous_lower = false;
        for c in name.chars() {
            if c.is_alphanumeric() {
                if c.is_uppercase() && previous_lower {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
                previous_lower = c.is_lowercase() || c.is_numeric();
            } else {
                if !out.ends_with('_') {
                    out.push('_');
                }
                previous_lower = false;
            }
        }
        let trimmed = out.trim_matches('_');
        if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            format!("case_{trimmed}")
        } else {
            trimmed.to_string()
        }
    }

    /// Count compile-time failure markers left by unsupported registry entries
    pub fn count_markers(code: &str, marker: &str) -> usize {
        code.matches(marker).count()
    }
}
