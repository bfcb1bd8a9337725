// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "cell-rs.toml";
const CONFIG_DIR_NAME: &str = "cell-rs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Default search paths for `cell-rs.toml`, in priority order
/// (current directory, then the user config dir, then /etc).
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    paths
}

/// Extract and deserialize a named section from a TOML document.
///
/// `Ok(None)` when the section is absent.
fn parse_section<T: DeserializeOwned>(
    path: &Path,
    content: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let parse_err = |e: &dyn std::fmt::Display| ConfigError::ParseError(path.to_path_buf(), e.to_string());

    let table: toml::Table = toml::from_str(content).map_err(|e| parse_err(&e))?;
    let Some(section) = table.get(key) else {
        return Ok(None);
    };

    // Re-serialize the section then parse as T so all serde defaults apply.
    let section_toml = toml::to_string(section).map_err(|e| parse_err(&e))?;
    let cfg = toml::from_str::<T>(&section_toml).map_err(|e| parse_err(&e))?;
    Ok(Some(cfg))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(path, &content, key)
}

/// Trait for loading configuration from a `cell-rs.toml` section.
pub trait ConfigFile: Sized + Default + DeserializeOwned {
    /// Section key in `cell-rs.toml` (e.g. `"cell-ctl"`).
    fn section_key() -> &'static str;

    /// Load the section from a specific file path.
    ///
    /// Fails if the file cannot be read, is not valid TOML, or has no
    /// `[<section_key>]` table.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Parse the section out of an in-memory document.
    fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let path = Path::new("<inline>");
        parse_section::<Self>(path, content, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Load the first file on the default search path that contains the
    /// expected section.
    ///
    /// Returns `(config, path_where_found)`, or `(Default::default(), None)`
    /// when no file has the section.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        cycle_ms: u64,
        name: String,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                cycle_ms: 25,
                name: "cell".to_string(),
            }
        }
    }

    impl ConfigFile for Sample {
        fn section_key() -> &'static str {
            "sample"
        }
    }

    #[test]
    fn test_section_defaults_apply() {
        let cfg = Sample::load_from_str("[sample]\ncycle_ms = 10\n").unwrap();
        assert_eq!(cfg.cycle_ms, 10);
        assert_eq!(cfg.name, "cell");
    }

    #[test]
    fn test_missing_section() {
        let err = Sample::load_from_str("[other]\nx = 1\n").unwrap_err();
        assert!(err.to_string().contains("missing [sample] section"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Sample::load_from_str("[sample"),
            Err(ConfigError::ParseError(..))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("cell-app-config-{}.toml", std::process::id()));
        std::fs::write(&path, "[sample]\nname = \"bench\"\n").unwrap();
        let cfg = Sample::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(cfg.name, "bench");
        assert_eq!(cfg.cycle_ms, 25);
    }

    #[test]
    fn test_unreadable_file() {
        let err = Sample::load_from_file(Path::new("/nonexistent/cell-rs.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(..)));
    }

    #[test]
    fn test_search_paths_start_in_cwd() {
        let paths = config_search_paths();
        assert_eq!(paths[0], PathBuf::from("cell-rs.toml"));
        assert!(paths.last().unwrap().starts_with("/etc/cell-rs"));
    }
}
