//! Faber code generation
//!
//! Translates a resolved Faber unit into source text for one of six
//! targets: Faber itself, TypeScript, Python, Rust, Zig and C++. Each
//! backend walks the tree once, consulting its method registry for calls to
//! built-in collection methods and recording in a per-unit context which
//! preamble pieces the body needs.

pub mod analysis;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod format_string;
pub mod morphology;
pub mod pipeline;
pub mod registry;
pub mod targets;

pub use backend::{
    BackendFactory, CodegenBackend, CodegenDiagnostic, CodegenOptions, CompilationTarget,
    DiagnosticSeverity, MemoryModel, Target,
};
pub use config::{CompilerConfig, ConfigError, TargetConfig};
pub use error::{CodegenError, Result};
pub use pipeline::{Pipeline, PipelineReport, TargetOutcome};

use faber_ast::Unit;

/// Generate one unit for one target with default options
pub fn generate(unit: &Unit, target: Target) -> Result<String> {
    generate_with(unit, target, &CodegenOptions::default())
}

pub fn generate_with(unit: &Unit, target: Target, options: &CodegenOptions) -> Result<String> {
    BackendFactory::for_target(target)?.generate_unit(unit, options)
}

/// Compiler builder for fluent configuration
#[derive(Debug, Default)]
pub struct CompilerBuilder {
    config: CompilerConfig,
}

impl CompilerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(mut self, targets: &[Target]) -> Self {
        self.config.targets = targets.to_vec();
        self
    }

    pub fn indent(mut self, width: usize) -> Self {
        self.config.indent = Some(width);
        self
    }

    pub fn emit_preamble(mut self, enabled: bool) -> Self {
        self.config.emit_preamble = enabled;
        self
    }

    pub fn target_config(mut self, target: Target, config: TargetConfig) -> Self {
        self.config.set_target_config(target, config);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        Ok(Pipeline::new(self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faber_ast::AstBuilder;

    #[test]
    fn test_generate_each_target() {
        let b = AstBuilder::new();
        let unit = Unit::new("salve", vec![b.scribe(vec![b.text("salve")])]);
        for target in Target::ALL {
            let code = generate(&unit, target).unwrap();
            assert!(code.contains("salve"), "{target}: {code}");
        }
    }

    #[test]
    fn test_builder_rejects_bad_indent() {
        let result = CompilerBuilder::new().indent(0).build();
        assert!(matches!(result, Err(CodegenError::Config(_))));
    }

    #[test]
    fn test_builder_targets() {
        let pipeline = CompilerBuilder::new()
            .targets(&[Target::Zig, Target::Cpp])
            .build()
            .unwrap();
        assert_eq!(pipeline.config().enabled_targets(), vec![Target::Zig, Target::Cpp]);
    }
}
