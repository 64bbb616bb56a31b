pub mod report;
pub mod run;

use anyhow::{Context, Result};
use momentum_alerts::Config;

/// Load the config file, or defaults plus environment when none is given
pub fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::from_file(path).with_context(|| format!("Failed to load config from {}", path))
        }
        None => {
            let mut config = Config::default();
            config.apply_env();
            config.validate()?;
            Ok(config)
        }
    }
}
