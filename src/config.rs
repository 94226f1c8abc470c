//! Host-side configuration
//!
//! Read from a TOML file by the demo host. Every field has a default, so an
//! empty file (or no file) yields a working setup.

use crate::error::ConfigError;
use crate::focus::FocusPolicy;
use crate::session::SessionOptions;
use crate::theme::AppearanceConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedConfig {
    /// Exported to the shell as `TERM_PROGRAM` and used in the welcome line
    pub app_name: String,
    pub cols: u16,
    pub rows: u16,
    /// Grace period between hangup and kill when a session is disposed
    pub dispose_grace_ms: u64,
    pub focus: FocusPolicy,
    pub appearance: AppearanceConfig,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            app_name: "rustty".to_string(),
            cols: 80,
            rows: 24,
            dispose_grace_ms: 500,
            focus: FocusPolicy::default(),
            appearance: AppearanceConfig::default(),
        }
    }
}

impl EmbedConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::Invalid("app_name must not be empty".into()));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(ConfigError::Invalid("cols and rows must be positive".into()));
        }
        if self.focus.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "focus.max_attempts must be at least 1".into(),
            ));
        }
        if self.appearance.font.size <= 0.0 {
            return Err(ConfigError::Invalid("font size must be positive".into()));
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            app_name: self.app_name.clone(),
            grid_size: (self.cols, self.rows),
            focus: self.focus,
            dispose_grace: Duration::from_millis(self.dispose_grace_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EmbedConfig::from_toml_str("").unwrap();
        assert_eq!(config, EmbedConfig::default());
    }

    #[test]
    fn test_full_config() {
        let config = EmbedConfig::from_toml_str(
            r##"
            app_name = "paneterm"
            cols = 120
            rows = 40
            dispose_grace_ms = 250

            [focus]
            max_attempts = 4

            [appearance.font]
            family = "Fira Code"
            size = 14.5

            [appearance.selection]
            background = "#334455"
            "##,
        )
        .unwrap();

        assert_eq!(config.app_name, "paneterm");
        assert_eq!(config.focus.max_attempts, 4);
        assert_eq!(config.focus.initial_backoff, Duration::from_millis(50));
        assert_eq!(config.appearance.font.size, 14.5);
        assert_eq!(
            config.appearance.selection.background,
            Color::new(0x33, 0x44, 0x55)
        );

        let options = config.session_options();
        assert_eq!(options.grid_size, (120, 40));
        assert_eq!(options.dispose_grace, Duration::from_millis(250));
        assert_eq!(options.app_name, "paneterm");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(matches!(
            EmbedConfig::from_toml_str("shell = \"/bin/fish\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for text in [
            "app_name = \"\"",
            "cols = 0",
            "[focus]\nmax_attempts = 0",
            "[appearance.font]\nsize = 0.0",
        ] {
            assert!(
                matches!(EmbedConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "{text} accepted"
            );
        }
    }

    #[test]
    fn test_bad_color_is_a_parse_error() {
        assert!(matches!(
            EmbedConfig::from_toml_str("[appearance.palette]\nbackground = \"black\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rows = 50").unwrap();

        let config = EmbedConfig::load(file.path()).unwrap();
        assert_eq!(config.rows, 50);

        let missing = EmbedConfig::load(Path::new("/no/such/rustty.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
