//! Compiler configuration and settings

use crate::backend::{CodegenOptions, Target};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const INDENT_RANGE: std::ops::RangeInclusive<usize> = 1..=8;

/// Main compiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Targets generated when none are named on the command line
    pub targets: Vec<Target>,
    /// Spaces per indentation level for every target without its own setting
    pub indent: Option<usize>,
    pub output_dir: PathBuf,
    pub emit_preamble: bool,
    /// Per-target overrides, keyed by target name
    #[serde(rename = "target")]
    pub target_configs: BTreeMap<String, TargetConfig>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            targets: Target::ALL.to_vec(),
            indent: None,
            output_dir: PathBuf::from("out"),
            emit_preamble: true,
            target_configs: BTreeMap::new(),
        }
    }
}

/// Target-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub enabled: bool,
    pub indent: Option<usize>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            indent: None,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize { error: e })?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                error: e,
            })?;
        }

        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e,
        })
    }

    /// Get target-specific configuration
    pub fn target_config(&self, target: Target) -> TargetConfig {
        self.target_configs
            .get(target.name())
            .cloned()
            .unwrap_or_default()
    }

    /// Set target-specific configuration
    pub fn set_target_config(&mut self, target: Target, config: TargetConfig) {
        self.target_configs.insert(target.name().to_string(), config);
    }

    pub fn is_target_enabled(&self, target: Target) -> bool {
        self.target_config(target).enabled
    }

    /// Configured targets that are not switched off, in configuration order
    pub fn enabled_targets(&self) -> Vec<Target> {
        let mut targets = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            if self.is_target_enabled(*target) && !targets.contains(target) {
                targets.push(*target);
            }
        }
        targets
    }

    /// Generation options for one target; its own indent wins over the global one
    pub fn options_for(&self, target: Target) -> CodegenOptions {
        let indent = self
            .target_configs
            .get(target.name())
            .and_then(|config| config.indent)
            .or(self.indent);
        CodegenOptions {
            indent,
            emit_preamble: self.emit_preamble,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_indent("indent", self.indent)?;

        for (name, config) in &self.target_configs {
            if Target::from_name(name).is_none() {
                return Err(ConfigError::Invalid {
                    field: format!("target.{name}"),
                    message: format!(
                        "unknown target; expected one of {}",
                        Target::ALL.map(Target::name).join(", ")
                    ),
                });
            }
            check_indent(&format!("target.{name}.indent"), config.indent)?;
        }

        if self.targets.is_empty() {
            return Err(ConfigError::Invalid {
                field: "targets".to_string(),
                message: "at least one target is required".to_string(),
            });
        }

        Ok(())
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge(&mut self, other: CompilerConfig) {
        let defaults = CompilerConfig::default();
        if other.targets != defaults.targets {
            self.targets = other.targets;
        }
        if other.indent.is_some() {
            self.indent = other.indent;
        }
        if other.output_dir != defaults.output_dir {
            self.output_dir = other.output_dir;
        }
        if !other.emit_preamble {
            self.emit_preamble = false;
        }

        for (target, config) in other.target_configs {
            self.target_configs.insert(target, config);
        }
    }
}

fn check_indent(field: &str, indent: Option<usize>) -> Result<(), ConfigError> {
    match indent {
        Some(width) if !INDENT_RANGE.contains(&width) => Err(ConfigError::Invalid {
            field: field.to_string(),
            message: format!(
                "indentation width must be {}-{}, got {}",
                INDENT_RANGE.start(),
                INDENT_RANGE.end(),
                width
            ),
        }),
        _ => Ok(()),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error for {path:?}: {error}")]
    Io { path: PathBuf, error: std::io::Error },

    #[error("Parse error for {path:?}: {error}")]
    Parse { path: PathBuf, error: toml::de::Error },

    #[error("Serialization error: {error}")]
    Serialize { error: toml::ser::Error },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Predefined configurations
pub mod presets {
    use super::*;

    /// Targets that compile to native code
    pub fn native() -> CompilerConfig {
        CompilerConfig {
            targets: vec![Target::Rust, Target::Zig, Target::Cpp],
            ..CompilerConfig::default()
        }
    }

    /// Garbage-collected scripting targets
    pub fn scripting() -> CompilerConfig {
        CompilerConfig {
            targets: vec![Target::TypeScript, Target::Python],
            ..CompilerConfig::default()
        }
    }

    /// Only the canonical Faber form, for formatting and review
    pub fn canonical() -> CompilerConfig {
        CompilerConfig {
            targets: vec![Target::Faber],
            emit_preamble: false,
            ..CompilerConfig::default()
        }
    }

    /// Two-space TypeScript, as most formatters expect
    pub fn typescript_compact() -> TargetConfig {
        TargetConfig {
            indent: Some(2),
            ..TargetConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.targets.len(), 6);
        assert_eq!(config.indent, None);
        assert!(config.emit_preamble);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_indent_precedence() {
        let mut config = CompilerConfig {
            indent: Some(3),
            ..CompilerConfig::default()
        };
        config.set_target_config(Target::TypeScript, presets::typescript_compact());

        assert_eq!(config.options_for(Target::TypeScript).indent_for(Target::TypeScript), 2);
        assert_eq!(config.options_for(Target::Zig).indent_for(Target::Zig), 3);
        assert_eq!(CompilerConfig::default().options_for(Target::Python).indent_for(Target::Python), 4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CompilerConfig {
            indent: Some(9),
            ..CompilerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field, .. }) if field == "indent"));

        config.indent = Some(8);
        assert!(config.validate().is_ok());

        config.target_configs.insert("cobol".to_string(), TargetConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_target_is_skipped() {
        let mut config = presets::native();
        config.set_target_config(
            Target::Zig,
            TargetConfig {
                enabled: false,
                ..TargetConfig::default()
            },
        );
        assert_eq!(config.enabled_targets(), vec![Target::Rust, Target::Cpp]);
    }

    #[test]
    fn test_config_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("faber.toml");

        let mut config = presets::scripting();
        config.indent = Some(2);
        config.set_target_config(Target::Python, TargetConfig {
            indent: Some(4),
            ..TargetConfig::default()
        });

        config.to_file(&config_path).unwrap();
        let loaded = CompilerConfig::from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_handwritten_toml() {
        let config: CompilerConfig = toml::from_str(
            r#"
            targets = ["rust", "cpp"]
            emit_preamble = false

            [target.cpp]
            indent = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.targets, vec![Target::Rust, Target::Cpp]);
        assert!(!config.emit_preamble);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.options_for(Target::Cpp).indent, Some(2));
    }

    #[test]
    fn test_target_section_holds_only_read_settings() {
        let mut config = CompilerConfig::default();
        config.set_target_config(Target::TypeScript, presets::typescript_compact());
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("[target.typescript]"), "{text}");
        assert!(text.contains("indent = 2"), "{text}");
        assert!(!text.contains("style"), "{text}");
        assert!(!text.contains("options"), "{text}");
    }

    #[test]
    fn test_config_merge() {
        let mut base = CompilerConfig::default();
        let other = CompilerConfig {
            indent: Some(2),
            emit_preamble: false,
            ..presets::native()
        };
        base.merge(other);
        assert_eq!(base.targets, vec![Target::Rust, Target::Zig, Target::Cpp]);
        assert_eq!(base.indent, Some(2));
        assert!(!base.emit_preamble);
        assert_eq!(base.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = CompilerConfig::from_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
