use crate::telemetry::logging::LogConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("usage: slotgrid <scenario.yaml> [config.yaml]")]
    Usage,
    #[error("read config {} failed: {1}", .0.display())]
    Read(PathBuf, std::io::Error),
    #[error("parse config {} failed: {1}", .0.display())]
    Parse(PathBuf, serde_yaml::Error),
    #[error("invalid {key} '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
    /// Entries kept by the resolver cache; 0 disables caching.
    pub resolver_cache: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 4,
            height: 1,
            resolver_cache: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct GridOverrides {
    pub width: Option<usize>,
    pub height: Option<usize>,
    pub resolver_cache: Option<usize>,
}

impl GridConfig {
    pub fn capacity(&self) -> usize {
        self.width * self.height
    }

    /// A new configuration built from `self` with `overrides` applied.
    pub fn with_overrides(&self, overrides: &GridOverrides) -> GridConfig {
        GridConfig {
            width: overrides.width.unwrap_or(self.width),
            height: overrides.height.unwrap_or(self.height),
            resolver_cache: overrides.resolver_cache.unwrap_or(self.resolver_cache),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    grid: GridConfig,
    log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scenario: PathBuf,
    pub grid: GridConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::from_args_with_env(args, |key| std::env::var(key).ok())
    }

    pub fn from_args_with_env(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if args.len() < 2 {
            return Err(ConfigError::Usage);
        }
        let scenario = Path::new(&args[1]).to_path_buf();
        let file = match args.get(2) {
            Some(path) => load_file(Path::new(path))?,
            None => FileConfig::default(),
        };

        let env_value = |key: &str| {
            env(key).and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };
        let overrides = GridOverrides {
            width: parse_env(&env_value, "SLOTGRID_WIDTH")?,
            height: parse_env(&env_value, "SLOTGRID_HEIGHT")?,
            resolver_cache: parse_env(&env_value, "SLOTGRID_RESOLVER_CACHE")?,
        };
        let mut log = file.log;
        if let Some(level) = env_value("SLOTGRID_LOG_LEVEL") {
            log.level = level;
        }
        if let Some(directory) = env_value("SLOTGRID_LOG_DIR") {
            log.directory = Some(PathBuf::from(directory));
        }
        Ok(Self {
            scenario,
            grid: file.grid.with_overrides(&overrides),
            log,
        })
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
    serde_yaml::from_str(&content).map_err(|err| ConfigError::Parse(path.to_path_buf(), err))
}

fn parse_env(
    env_value: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<usize>, ConfigError> {
    match env_value(key) {
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_scenario_is_usage_error() {
        let result = AppConfig::from_args_with_env(&args(&["slotgrid"]), no_env);
        assert!(matches!(result, Err(ConfigError::Usage)));
    }

    #[test]
    fn defaults_without_config_file() {
        let config = AppConfig::from_args_with_env(&args(&["slotgrid", "bag.yaml"]), no_env).unwrap();
        assert_eq!(config.scenario, PathBuf::from("bag.yaml"));
        assert_eq!(config.grid, GridConfig::default());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn config_file_and_env_overrides() {
        let dir = std::env::temp_dir().join(format!("slotgrid-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("slotgrid.yaml");
        std::fs::write(
            &path,
            "grid:\n  width: 3\n  height: 2\nlog:\n  level: debug\n",
        )
        .unwrap();

        let env: HashMap<&str, &str> = [("SLOTGRID_HEIGHT", " 4 "), ("SLOTGRID_LOG_DIR", "logs")]
            .into_iter()
            .collect();
        let config = AppConfig::from_args_with_env(
            &args(&["slotgrid", "bag.yaml", path.to_str().unwrap()]),
            |key| env.get(key).map(|value| value.to_string()),
        )
        .unwrap();
        assert_eq!(config.grid.width, 3);
        assert_eq!(config.grid.height, 4);
        assert_eq!(config.grid.resolver_cache, 64);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.directory, Some(PathBuf::from("logs")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_env_value_is_reported() {
        let result = AppConfig::from_args_with_env(&args(&["slotgrid", "bag.yaml"]), |key| {
            (key == "SLOTGRID_WIDTH").then(|| "wide".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "SLOTGRID_WIDTH", .. })
        ));
    }

    #[test]
    fn overrides_build_a_new_value() {
        let base = GridConfig::default();
        let wide = base.with_overrides(&GridOverrides {
            width: Some(8),
            ..GridOverrides::default()
        });
        assert_eq!(base.width, 4);
        assert_eq!(wide.width, 8);
        assert_eq!(wide.capacity(), 8);
    }
}
