/// `load_config` module: Loads a static YAML config and injects secrets from the environment.
///
/// This is the only place where user-supplied YAML is parsed and mapped to the typed [`Config`].
///
/// # Responsibilities
/// - Parse the YAML file into `storage`, `discovery` and `render` sections, applying defaults
/// - Inject the storage API key (`SUPABASE_KEY`) from the environment for remote storage
/// - Fail with clear diagnostics mentioning whether reading or parsing went wrong
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use std::fs;
use std::path::Path;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::{Config, StorageConfig};
use crate::storage::supabase::KEY_ENV;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: Config = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let StorageConfig::Supabase(supabase) = &mut config.storage {
        match std::env::var(KEY_ENV) {
            Ok(key) => {
                info!("SUPABASE_KEY found in env");
                supabase.api_key = Some(key);
            }
            Err(_) => {
                warn!("SUPABASE_KEY not set; storage requests will be anonymous");
            }
        }
    }

    if config.render.width == 0 || config.render.height == 0 {
        anyhow::bail!(
            "render.width and render.height must be positive, got {}x{}",
            config.render.width,
            config.render.height
        );
    }

    config.trace_loaded();
    Ok(config)
}
