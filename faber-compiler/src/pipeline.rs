//! Multi-target generation for one unit
//!
//! Every requested target gets its own backend instance and its own thread.
//! Nothing is shared between them, so one target failing leaves the others
//! untouched.

use crate::{
    backend::{BackendFactory, CodegenDiagnostic, Target},
    config::CompilerConfig,
    error::Result,
};
use faber_ast::Unit;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of generating one unit for one target
#[derive(Debug)]
pub struct TargetOutcome {
    pub target: Target,
    pub output: Result<String>,
    pub diagnostics: Vec<CodegenDiagnostic>,
    pub duration: Duration,
}

impl TargetOutcome {
    pub fn is_success(&self) -> bool {
        self.output.is_ok()
    }
}

/// Outcomes for every requested target, in request order
#[derive(Debug)]
pub struct PipelineReport {
    pub unit: String,
    pub outcomes: Vec<TargetOutcome>,
    pub total: Duration,
}

impl PipelineReport {
    pub fn outcome(&self, target: Target) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|outcome| outcome.target == target)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_success)
    }
}

/// Generation pipeline
pub struct Pipeline {
    config: CompilerConfig,
}

impl Pipeline {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Generate for the configured targets
    pub fn generate_configured(&self, unit: &Unit) -> PipelineReport {
        self.generate(unit, &self.config.enabled_targets())
    }

    /// Generate `unit` for each target on a separate thread
    pub fn generate(&self, unit: &Unit, targets: &[Target]) -> PipelineReport {
        let total_start = Instant::now();

        let outcomes = std::thread::scope(|scope| {
            let handles: Vec<_> = targets
                .iter()
                .map(|&target| scope.spawn(move || self.run_target(unit, target)))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<Vec<_>>()
        });

        for outcome in &outcomes {
            match &outcome.output {
                Ok(code) => info!(
                    unit = %unit.name,
                    target = %outcome.target,
                    bytes = code.len(),
                    elapsed = ?outcome.duration,
                    "generated"
                ),
                Err(error) => warn!(
                    unit = %unit.name,
                    target = %outcome.target,
                    %error,
                    "generation failed"
                ),
            }
        }

        PipelineReport {
            unit: unit.name.clone(),
            outcomes,
            total: total_start.elapsed(),
        }
    }

    fn run_target(&self, unit: &Unit, target: Target) -> TargetOutcome {
        let start = Instant::now();
        let options = self.config.options_for(target);

        let (output, diagnostics) = match BackendFactory::for_target(target) {
            Ok(backend) => match backend.generate_unit(unit, &options) {
                Ok(code) => {
                    let diagnostics = backend.validate_output(&code);
                    (Ok(code), diagnostics)
                }
                Err(error) => (Err(error), Vec::new()),
            },
            Err(error) => (Err(error), Vec::new()),
        };

        TargetOutcome {
            target,
            output,
            diagnostics,
            duration: start.elapsed(),
        }
    }

    /// Write `<unit>.<ext>` for every successful target; returns the written paths
    pub fn write(&self, report: &PipelineReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;

        let mut written = Vec::new();
        for outcome in report.succeeded() {
            if let Ok(code) = &outcome.output {
                let path = out_dir.join(format!("{}.{}", report.unit, outcome.target.file_extension()));
                std::fs::write(&path, code)?;
                written.push(path);
            }
        }

        info!(unit = %report.unit, files = written.len(), dir = %out_dir.display(), "wrote outputs");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CodegenError;
    use faber_ast::AstBuilder;
    use tempfile::TempDir;

    fn greeting() -> Unit {
        let b = AstBuilder::new();
        Unit::new("salve", vec![b.scribe(vec![b.text("salve")])])
    }

    #[test]
    fn test_generate_all_targets() {
        let pipeline = Pipeline::new(CompilerConfig::default());
        let report = pipeline.generate_configured(&greeting());

        assert_eq!(report.outcomes.len(), 6);
        assert!(report.all_succeeded());
        let order: Vec<_> = report.outcomes.iter().map(|o| o.target).collect();
        assert_eq!(order, Target::ALL.to_vec());
    }

    #[test]
    fn test_failure_is_isolated() {
        let b = AstBuilder::new();
        // C++ has no anonymous object literal; everything else does
        let unit = Unit::new(
            "objectum",
            vec![b.fixum("o", None, b.object(vec![("a", b.int(1))]))],
        );

        let pipeline = Pipeline::new(CompilerConfig::default());
        let report = pipeline.generate(&unit, &[Target::TypeScript, Target::Cpp, Target::Python]);

        assert!(report.outcome(Target::TypeScript).unwrap().is_success());
        assert!(report.outcome(Target::Python).unwrap().is_success());
        let cpp = report.outcome(Target::Cpp).unwrap();
        assert!(matches!(cpp.output, Err(CodegenError::Unsupported { backend: Target::Cpp, .. })));
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_indent_from_config() {
        let b = AstBuilder::new();
        let unit = Unit::new(
            "gradus",
            vec![b.if_else(b.bool(true), vec![b.scribe(vec![b.int(1)])], None)],
        );
        let config = CompilerConfig {
            indent: Some(3),
            ..CompilerConfig::default()
        };
        let report = Pipeline::new(config).generate(&unit, &[Target::Python]);
        let code = report.outcome(Target::Python).unwrap().output.as_ref().unwrap();
        assert!(code.contains("\n   print(1)"), "{code}");
    }

    #[test]
    fn test_write_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(CompilerConfig::default());
        let report = pipeline.generate(&greeting(), &[Target::Rust, Target::Zig]);

        let written = pipeline.write(&report, &temp_dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 2);
        assert!(temp_dir.path().join("out/salve.rs").exists());
        let zig = std::fs::read_to_string(temp_dir.path().join("out/salve.zig")).unwrap();
        assert!(zig.contains("salve"));
    }
}
