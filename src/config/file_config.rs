//! Configuration file support for paper-match.
//!
//! # Configuration File Format
//!
//! ```toml
//! [scan]
//! recursive = true
//! extension = "pdf"
//! timeout_seconds = 0
//!
//! [matching]
//! parallel = true
//!
//! [[matching.doi_prefixes]]
//! prefix = "misq."
//! registrant = "10.25300"
//!
//! [output]
//! directory = "./match_results"
//! write_bom = true
//! summary = true
//!
//! [copy]
//! enabled = false
//! directory = "./pdfs"
//! overwrite = false
//!
//! [fields]
//! title = "Title"
//! doi = "DOI"
//!
//! [logging]
//! level = "info"
//! directory = "./logs"
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// A TOML configuration file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The per-user location, `<config_dir>/paper-match/config.toml`
    pub fn user_default() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("paper-match").join("config.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Parse the file without environment overrides
    pub fn load(&self) -> Result<Config, ConfigFileError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Write `config`, creating parent directories. An existing file is only
    /// replaced when `force` is set.
    pub fn save(&self, config: &Config, force: bool) -> Result<(), ConfigFileError> {
        if self.exists() && !force {
            return Err(ConfigFileError::Exists(self.path.display().to_string()));
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(&self.path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Config file already exists: {0} (use --force to overwrite)")]
    Exists(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::DoiPrefix;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[scan]
extension = "PDF"

[output]
directory = "/tmp/results"
write_bom = false

[copy]
enabled = true
overwrite = true

[logging]
level = "debug"
directory = "/tmp/logs"
"#;
        std::fs::write(&path, toml_content).unwrap();

        let config = ConfigFile::new(&path).load().unwrap();
        assert_eq!(config.scan.extension, "PDF");
        assert!(config.scan.recursive);
        assert_eq!(config.output.directory, PathBuf::from("/tmp/results"));
        assert!(!config.output.write_bom);
        assert!(config.copy.enabled);
        assert!(config.copy.overwrite);
        assert_eq!(config.copy.directory, PathBuf::from("./pdfs"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.directory, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("nested/config.toml"));

        let mut config = Config::default();
        config.scan.timeout_seconds = 60;
        config.fields.uuid = Some("uuid".to_string());
        config
            .matching
            .doi_prefixes
            .push(DoiPrefix::expanded("misq.", "10.25300"));

        file.save(&config, false).unwrap();
        assert!(file.exists());

        let loaded = file.load().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_refuses_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let file = ConfigFile::new(dir.path().join("config.toml"));

        file.save(&Config::default(), false).unwrap();
        assert!(matches!(
            file.save(&Config::default(), false),
            Err(ConfigFileError::Exists(_))
        ));
        file.save(&Config::default(), true).unwrap();
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = ConfigFile::new("/nonexistent/config.toml").load();
        assert!(matches!(result, Err(ConfigFileError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = ConfigFile::new(&path).load();
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }
}
