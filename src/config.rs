use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config directory")]
    ConfigDir,

    #[error("Failed to load config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to deserialize config file: {0}")]
    Deserialize(#[from] toml::de::Error),
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    /// Path to BIOS file.
    pub bios: PathBuf,
    /// PS-X EXE to side-load once the BIOS has started the shell.
    pub exe: Option<PathBuf>,
    /// Emulated seconds to run for.
    pub run_seconds: f64,
    /// Log filter used when `RUST_LOG` isn't set.
    pub log_level: String,
    /// Stop when the CPU hits an instruction it can't execute.
    pub stop_on_fault: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bios: PathBuf::new(),
            exe: None,
            run_seconds: 1.0,
            log_level: String::from("info"),
            stop_on_fault: true,
        }
    }
}

impl Config {
    /// Load the config file at `path`, or from the config directory if `path` is `None`. A
    /// missing file in the config directory gives the default config.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    fn default_path() -> Result<PathBuf, ConfigError> {
        let project = ProjectDirs::from("kestrel", "", "")
            .ok_or(ConfigError::ConfigDir)?;
        Ok(project.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file() {
        let config: Config = toml::from_str(r#"
            bios = "scph1001.bin"
            run_seconds = 2.5
        "#).unwrap();

        assert_eq!(config.bios, Path::new("scph1001.bin"));
        assert_eq!(config.run_seconds, 2.5);
        assert_eq!(config.exe, None);
        assert_eq!(config.log_level, "info");
        assert!(config.stop_on_fault);
    }

    #[test]
    fn missing_explicit_file() {
        let res = Config::load(Some(Path::new("/nonexistent/kestrel.toml")));
        assert!(matches!(res, Err(ConfigError::Io(_))));
    }
}
