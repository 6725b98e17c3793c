use std::env;
use std::path::PathBuf;

use crate::models::OverduePolicy;

const DEFAULT_DB_NAME: &str = "spaced.db";
const DEFAULT_USER: &str = "local";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub user_id: String,
    /// Policy used when a command does not pass `--overdue` explicitly.
    pub default_policy: OverduePolicy,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = match lookup("SPACED_DB") {
            Some(path) => PathBuf::from(path),
            None => default_db_path(),
        };

        let user_id = lookup("SPACED_USER")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let default_policy = match lookup("SPACED_MARK_OVERDUE") {
            Some(raw) => OverduePolicy::from_str(raw.trim()).unwrap_or_else(|| {
                tracing::warn!(
                    value = %raw,
                    "SPACED_MARK_OVERDUE not understood, keeping overdue dates incomplete"
                );
                OverduePolicy::KeepIncomplete
            }),
            None => OverduePolicy::KeepIncomplete,
        };

        Self {
            db_path,
            user_id,
            default_policy,
        }
    }
}

fn default_db_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spaced");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}
