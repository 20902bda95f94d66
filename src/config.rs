use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub origin: String,
    pub max_attempts: u32,
    pub workspace: Option<PathBuf>,
    pub token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            workspace: None,
            token: None,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self {
            origin: try_load("EKNOWS_ORIGIN", DEFAULT_ORIGIN.to_string()),
            max_attempts: try_load("EKNOWS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            workspace: optional("EKNOWS_WORKSPACE").map(PathBuf::from),
            token: optional("EKNOWS_TOKEN"),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = optional(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    match raw.parse() {
        Ok(v) => v,
        Err(e) => {
            warn!("Invalid {key} value {raw:?}: {e}; using default: {default}");
            default
        }
    }
}
