use super::Config;
use crate::error::{ConfigError, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        Self::load_or_init_in(&home.join(".gistline"))
    }

    /// Load `config.toml` from `dir`, writing defaults there on first run.
    ///
    /// Runs before logging is set up, so nothing is logged here; a freshly
    /// written file is reported through [`Config::created`].
    pub fn load_or_init_in(dir: &Path) -> Result<Self> {
        let config_path = dir.join("config.toml");
        fs::create_dir_all(dir).map_err(ConfigError::from)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(ConfigError::from)?;
            let mut config: Config = toml::from_str(&contents).map_err(|err| {
                ConfigError::Load(format!("failed to parse {}: {err}", config_path.display()))
            })?;
            config.config_path.clone_from(&config_path);
            config.data_dir = dir.to_path_buf();
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                data_dir: dir.to_path_buf(),
                created: true,
                ..Self::default()
            };
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|err| ConfigError::Load(format!("failed to serialize config: {err}")))?;
        fs::write(&self.config_path, toml_str).map_err(ConfigError::from)?;
        Ok(())
    }
}
