//! Compile options
//!
//! Options are plain data deserialized from TOML. Every field has a default
//! so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Build mode, which decides how TODO markers are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Debug,
    Release,
}

impl BuildMode {
    pub fn is_release(self) -> bool {
        matches!(self, BuildMode::Release)
    }
}

/// Compile-time constant supplied by the build, visible to prerun code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Options for one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Name of the produced IR module
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub mode: BuildMode,

    /// Width in bits of `usize`, `isize` and mark types
    #[serde(default = "default_pointer_width")]
    pub pointer_width: u32,

    /// Maximum iterations of a single compile-time loop
    #[serde(default = "default_prerun_loop_limit")]
    pub prerun_loop_limit: u64,

    /// Maximum nesting of compile-time function calls
    #[serde(default = "default_prerun_call_depth")]
    pub prerun_call_depth: usize,

    #[serde(default)]
    pub defines: BTreeMap<String, DefineValue>,
}

fn default_name() -> String {
    "main".to_string()
}

fn default_pointer_width() -> u32 {
    64
}

fn default_prerun_loop_limit() -> u64 {
    65_536
}

fn default_prerun_call_depth() -> usize {
    256
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            name: default_name(),
            mode: BuildMode::default(),
            pointer_width: default_pointer_width(),
            prerun_loop_limit: default_prerun_loop_limit(),
            prerun_call_depth: default_prerun_call_depth(),
            defines: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    pub fn release() -> Self {
        Self {
            mode: BuildMode::Release,
            ..Self::default()
        }
    }

    pub fn with_define(mut self, name: impl Into<String>, value: DefineValue) -> Self {
        self.defines.insert(name.into(), value);
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let options: CompileOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.pointer_width, 16 | 32 | 64) {
            return Err(ConfigError::InvalidPointerWidth(self.pointer_width));
        }
        if self.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        Ok(())
    }
}

/// Errors that can occur when loading compile options
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unsupported pointer width {0}, expected 16, 32 or 64")]
    InvalidPointerWidth(u32),

    #[error("Module name must not be empty")]
    MissingName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_uses_defaults() {
        let options = CompileOptions::from_toml_str("").unwrap();
        assert_eq!(options, CompileOptions::default());
        assert_eq!(options.mode, BuildMode::Debug);
    }

    #[test]
    fn test_parse_full_options() {
        let source = r#"
            name = "app"
            mode = "release"
            pointer_width = 32

            [defines]
            release_build = true
            level = 3
            target_os = "linux"
        "#;
        let options = CompileOptions::from_toml_str(source).unwrap();
        assert_eq!(options.name, "app");
        assert!(options.mode.is_release());
        assert_eq!(options.pointer_width, 32);
        assert_eq!(options.defines.get("release_build"), Some(&DefineValue::Bool(true)));
        assert_eq!(options.defines.get("level"), Some(&DefineValue::Int(3)));
        assert_eq!(
            options.defines.get("target_os"),
            Some(&DefineValue::Str("linux".to_string()))
        );
    }

    #[test]
    fn test_invalid_pointer_width() {
        let err = CompileOptions::from_toml_str("pointer_width = 48").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPointerWidth(48)));
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let err = CompileOptions::from_toml_str("mode = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
