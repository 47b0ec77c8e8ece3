//! Compiler configuration.
//!
//! Recognized keys mirror spec §6: `std`, `trigraphs`, `include_path`. Only
//! `std` has any effect inside this crate (it gates `restrict`/`inline`
//! recognition in the lexer and parser); `trigraphs` and `include_path`
//! are accepted and stored for the benefit of an external preprocessor this
//! crate does not implement.
//!
//! # Example
//!
//! ```
//! use cfront::config::{CompilerConfig, Dialect};
//!
//! let config = CompilerConfig::new()
//!     .with_dialect(Dialect::C99)
//!     .with_trigraphs(false);
//! assert_eq!(config.std, Dialect::C99);
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which C dialect the front end should recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// ANSI C89/C90. The default.
    #[default]
    C89,
    /// C99: adds the `restrict` qualifier and the `inline` keyword.
    C99,
}

impl Dialect {
    pub fn allows_restrict(self) -> bool {
        matches!(self, Dialect::C99)
    }

    pub fn allows_inline(self) -> bool {
        matches!(self, Dialect::C99)
    }
}

/// Compiler configuration for a single translation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Which C dialect to recognize.
    pub std: Dialect,
    /// Whether trigraphs should be expanded upstream. Consumed by the
    /// preprocessor, not the core; stored here purely for pass-through.
    pub trigraphs: bool,
    /// Ordered list of include directories. Consumed by the preprocessor.
    pub include_path: Vec<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            std: Dialect::C89,
            trigraphs: false,
            include_path: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.std = dialect;
        self
    }

    pub fn with_trigraphs(mut self, trigraphs: bool) -> Self {
        self.trigraphs = trigraphs;
        self
    }

    pub fn with_include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_path.push(path.into());
        self
    }

    /// Load configuration from a TOML file, falling back to defaults for
    /// any key it omits.
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid configuration: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_c89_without_trigraphs() {
        let config = CompilerConfig::new();
        assert_eq!(config.std, Dialect::C89);
        assert!(!config.trigraphs);
        assert!(config.include_path.is_empty());
    }

    #[test]
    fn c99_enables_restrict_and_inline() {
        let config = CompilerConfig::new().with_dialect(Dialect::C99);
        assert!(config.std.allows_restrict());
        assert!(config.std.allows_inline());
        assert!(!Dialect::C89.allows_restrict());
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let config = CompilerConfig::from_toml_str("std = \"c99\"\n").unwrap();
        assert_eq!(config.std, Dialect::C99);
        assert!(!config.trigraphs);
    }
}
