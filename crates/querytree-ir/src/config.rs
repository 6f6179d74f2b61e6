//! Per-Command configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IrError, Result};

/// Environment switch that turns off VarVec and enumerator pooling so that
/// use-after-release bugs are not masked by storage reuse.
pub const DISABLE_POOLING_ENV: &str = "QUERYTREE_DISABLE_POOLING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Recycle released VarVecs.
    pub var_vec_pooling: bool,
    /// Recycle released VarVec enumerators.
    pub enumerator_pooling: bool,
    /// Free-list capacity per pool; releases beyond it are dropped.
    pub max_pooled: usize,
    /// Record relationship properties referenced by navigation ops.
    pub track_rel_properties: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            var_vec_pooling: true,
            enumerator_pooling: true,
            max_pooled: 64,
            track_rel_properties: true,
        }
    }
}

impl CommandConfig {
    /// Config with both pools disabled (diagnostic mode).
    pub fn without_pooling() -> Self {
        Self {
            var_vec_pooling: false,
            enumerator_pooling: false,
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| IrError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| IrError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `QUERYTREE_DISABLE_POOLING` if set to a truthy value.
    pub fn with_env_overrides(self) -> Self {
        let disabled = std::env::var(DISABLE_POOLING_ENV)
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        self.with_pooling_disabled_if(disabled)
    }

    fn with_pooling_disabled_if(mut self, disabled: bool) -> Self {
        if disabled {
            self.var_vec_pooling = false;
            self.enumerator_pooling = false;
        }
        self
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "var_vec_pooling": false }}"#).unwrap();

        let config = CommandConfig::from_path(file.path()).unwrap();
        assert!(!config.var_vec_pooling);
        assert!(config.enumerator_pooling);
        assert_eq!(config.max_pooled, 64);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = CommandConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, IrError::ConfigParse { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CommandConfig::from_path(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, IrError::ConfigIo { .. }));
    }

    #[test]
    fn pooling_switch() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" On "));
        assert!(!is_truthy("0"));

        let config = CommandConfig::default().with_pooling_disabled_if(true);
        assert_eq!(config, CommandConfig::without_pooling());
    }
}
