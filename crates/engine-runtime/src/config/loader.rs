//! Configuration file loader (spec §6 "ambient, added").

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::error::{ConfigError, ConfigResult};
use super::schema::EngineConfig;
use super::validation::validate_config;

const CONFIG_NAMES: &[&str] = &["stratum.yaml", "stratum.yml", ".stratum.yaml", ".stratum.yml"];

const DISABLE_ACQUISITION_VAR: &str = "DISABLE_AUTOMATIC_PLUGIN_ACQUISITION";
const FUZZ_REPRO_DIR_VAR: &str = "LIFECYCLE_TEST_FUZZ_REPRO_DIR";

/// Configuration loader with search-path based file discovery.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a new configuration loader with no search paths.
    pub fn new() -> Self {
        Self { search_paths: Vec::new() }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() { self.add_search_path(cwd) } else { self }
    }

    /// Adds the user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() { self.add_search_path(config_dir.join("stratum")) } else { self }
    }

    /// Loads configuration from the first available source, falling back to
    /// defaults if no file is found.
    pub fn load(&self) -> ConfigResult<EngineConfig> {
        let mut config = match self.find_config_file() {
            Some(path) => self.load_from_file(&path)?,
            None => {
                info!("no configuration file found, using defaults");
                EngineConfig::default()
            }
        };
        self.apply_environment(&mut config);
        Ok(config)
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<EngineConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config = self.parse_yaml(&content)?;
        self.apply_environment(&mut config);
        Ok(config)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> ConfigResult<EngineConfig> {
        let mut config = self.parse_yaml(yaml)?;
        self.apply_environment(&mut config);
        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!(path = %path.display(), "checking for config file");
                if path.exists() {
                    info!(path = %path.display(), "found configuration file");
                    return Some(path);
                }
            }
        }
        None
    }

    fn parse_yaml(&self, content: &str) -> ConfigResult<EngineConfig> {
        let expanded = expand_env_vars(content)?;
        let config: EngineConfig = serde_yaml::from_str(&expanded)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Threads `DISABLE_AUTOMATIC_PLUGIN_ACQUISITION` and
    /// `LIFECYCLE_TEST_FUZZ_REPRO_DIR` (spec §6) into the config so
    /// downstream crates read them from here, not the environment directly.
    fn apply_environment(&self, config: &mut EngineConfig) {
        config.disable_automatic_plugin_acquisition =
            std::env::var(DISABLE_ACQUISITION_VAR).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        config.lifecycle_test_fuzz_repro_dir = std::env::var(FUZZ_REPRO_DIR_VAR).ok().map(PathBuf::from);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands `${VAR_NAME}` / `${VAR_NAME:-default}` references in `content`.
fn expand_env_vars(content: &str) -> ConfigResult<String> {
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}").expect("valid regex literal");
    let mut result = String::with_capacity(content.len());
    let mut last_end = 0;

    for cap in re.captures_iter(content) {
        let whole = cap.get(0).expect("group 0 always matches");
        let var_name = cap.get(1).expect("group 1 required by pattern").as_str();
        let default_value = cap.get(3).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default_value {
                Some(d) => d.to_string(),
                None => return Err(ConfigError::EnvVarError(var_name.to_string())),
            },
        };

        result.push_str(&content[last_end..whole.start()]);
        result.push_str(&value);
        last_end = whole.end();
    }
    result.push_str(&content[last_end..]);
    Ok(result)
}

/// Convenience function to load configuration with default search paths.
pub fn load_config() -> ConfigResult<EngineConfig> {
    ConfigLoader::default().load()
}

/// Convenience function to load configuration from a specific file.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<EngineConfig> {
    ConfigLoader::new().load_from_file(path)
}
