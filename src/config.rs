use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogFormat;
use crate::shamir::FieldModulus;

/// Largest number of shares the CLI hands out
pub const MAX_SHARES: usize = 999;

/// Defaults for the `split` and `combine` commands
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Threshold required to recover a secret (default: 2)
    pub default_threshold: usize,
    /// Number of shares to create (default: 3)
    pub default_shares: usize,
    /// Whether to run secrets through the diffusion layer (default: true)
    pub diffusion: bool,
    /// Fixed security level in bits; `None` sizes the field to the secret
    pub security_level: Option<u32>,
    /// Treat secrets as hex instead of text (default: false)
    pub hex_mode: bool,
    /// Format of diagnostic log output
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_threshold: 2,
            default_shares: 3,
            diffusion: true,
            security_level: None,
            hex_mode: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Default config file path in the user's config directory
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "secret-splitter", "secret-splitter")
            .context("Failed to determine configuration directory")?;

        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Load configuration from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;

        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_threshold < 2 {
            bail!("Invalid config: threshold must be at least 2");
        }
        if self.default_shares < self.default_threshold {
            bail!("Invalid config: number of shares smaller than threshold");
        }
        if self.default_shares > MAX_SHARES {
            bail!("Invalid config: at most {} shares are supported", MAX_SHARES);
        }
        if let Some(level) = self.security_level {
            if !FieldModulus::is_valid_degree(level) {
                bail!("Invalid config: invalid security level {}", level);
            }
        }
        Ok(())
    }

    /// Ask the user for new defaults and save them to `path`
    pub fn initialize(path: &Path) -> Result<Self> {
        use console::style;
        use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

        println!("{}", style("Welcome to secret-splitter").bold().green());
        println!("Let's set up your defaults...");

        let theme = ColorfulTheme::default();

        let default_threshold: usize = Input::with_theme(&theme)
            .with_prompt("Shares needed to recover a secret")
            .default(2)
            .validate_with(|input: &usize| if *input >= 2 { Ok(()) } else { Err("Must be at least 2") })
            .interact_text()?;

        let default_shares: usize = Input::with_theme(&theme)
            .with_prompt("Shares to create")
            .default(default_threshold.max(3))
            .validate_with(move |input: &usize| {
                if *input < default_threshold {
                    Err("Cannot be smaller than the threshold")
                } else if *input > MAX_SHARES {
                    Err("At most 999 shares are supported")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        let diffusion = Confirm::with_theme(&theme)
            .with_prompt("Use the diffusion layer?")
            .default(true)
            .interact()?;

        let hex_mode = Confirm::with_theme(&theme)
            .with_prompt("Enter secrets as hex by default?")
            .default(false)
            .interact()?;

        let format_idx = Select::with_theme(&theme)
            .with_prompt("Log format")
            .default(0)
            .items(&["pretty", "json"])
            .interact()?;

        let config = Config {
            default_threshold,
            default_shares,
            diffusion,
            security_level: None,
            hex_mode,
            log_format: if format_idx == 1 { LogFormat::Json } else { LogFormat::Pretty },
        };

        config.validate()?;
        config.save_to(path)?;

        println!("{}", style("\nConfiguration saved successfully!").green());

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_creates_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            default_threshold: 3,
            default_shares: 5,
            diffusion: false,
            security_level: Some(256),
            hex_mode: true,
            log_format: LogFormat::Json,
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_shares": 7 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.default_shares, 7);
        assert_eq!(config.default_threshold, 2);
        assert!(config.diffusion);
    }

    #[test]
    fn test_validate_rejects_bad_defaults() {
        let bad = [
            Config { default_threshold: 1, ..Config::default() },
            Config { default_threshold: 4, default_shares: 3, ..Config::default() },
            Config { default_shares: 1000, ..Config::default() },
            Config { security_level: Some(12), ..Config::default() },
            Config { security_level: Some(2048), ..Config::default() },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{:?} should be invalid", config);
        }
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_threshold": 0 }"#).unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
