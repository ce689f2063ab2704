use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Plain key/value configuration inputs to the initialiser (spec §6).
/// No env-parsing crate is introduced here — that belongs to the excluded
/// CLI/bootstrap layer; `Config` only holds the data and offers
/// `from_env_map` so any outer loader can hand it a `HashMap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,

    pub server_user: String,
    pub server_password: String,

    pub create_db: bool,
    pub run_migrations: bool,
    pub seed_os_user_as_admin: bool,

    pub log_dir: Option<String>,
    pub log_level: LogLevel,

    pub api_port: u16,
    pub key_file: Option<String>,

    pub auth_url: Option<String>,
    pub auth_role: Option<String>,
    pub auth_key_file: Option<String>,

    pub pool_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_host: "localhost".to_string(),
            db_port: 2424,
            db_name: "kb".to_string(),
            db_user: "admin".to_string(),
            db_password: String::new(),
            server_user: "root".to_string(),
            server_password: String::new(),
            create_db: false,
            run_migrations: false,
            seed_os_user_as_admin: false,
            log_dir: None,
            log_level: LogLevel::Info,
            api_port: 8080,
            key_file: None,
            auth_url: None,
            auth_role: None,
            auth_key_file: None,
            pool_size: 10,
        }
    }
}

impl Config {
    /// Builds a `Config` out of a flat string map, applying `Default` for
    /// any key that is absent. Booleans accept the same loose vocabulary
    /// as `kb_schema::cast::cast_boolean`.
    pub fn from_env_map(map: &HashMap<String, String>) -> Self {
        let mut config = Config::default();

        macro_rules! set_string {
            ($key:literal, $field:ident) => {
                if let Some(v) = map.get($key) {
                    config.$field = v.clone();
                }
            };
        }
        macro_rules! set_number {
            ($key:literal, $field:ident) => {
                if let Some(v) = map.get($key) {
                    if let Ok(n) = v.parse() {
                        config.$field = n;
                    }
                }
            };
        }
        macro_rules! set_bool {
            ($key:literal, $field:ident) => {
                if let Some(v) = map.get($key) {
                    config.$field = parse_loose_bool(v).unwrap_or(config.$field);
                }
            };
        }
        macro_rules! set_option_string {
            ($key:literal, $field:ident) => {
                if let Some(v) = map.get($key) {
                    config.$field = Some(v.clone());
                }
            };
        }

        set_string!("DB_HOST", db_host);
        set_number!("DB_PORT", db_port);
        set_string!("DB_NAME", db_name);
        set_string!("DB_USER", db_user);
        set_string!("DB_PASSWORD", db_password);
        set_string!("GKB_USER", server_user);
        set_string!("GKB_PASSWORD", server_password);
        set_bool!("GKB_DB_CREATE", create_db);
        set_bool!("GKB_DB_MIGRATE", run_migrations);
        set_bool!("GKB_DBS_PASS", seed_os_user_as_admin);
        set_option_string!("GKB_LOG_DIR", log_dir);
        if let Some(v) = map.get("GKB_LOG_LEVEL") {
            if let Some(level) = parse_log_level(v) {
                config.log_level = level;
            }
        }
        set_number!("GKB_PORT", api_port);
        set_option_string!("GKB_KEY_FILE", key_file);
        set_option_string!("GKB_KEYCLOAK_URI", auth_url);
        set_option_string!("GKB_KEYCLOAK_ROLE", auth_role);
        set_option_string!("GKB_KEYCLOAK_KEYFILE", auth_key_file);
        set_number!("GKB_POOL_SIZE", pool_size);

        config
    }
}

fn parse_loose_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_log_level(s: &str) -> Option<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" => Some(LogLevel::Error),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_map_applies_defaults_for_missing_keys() {
        let map = HashMap::new();
        let config = Config::from_env_map(&map);
        assert_eq!(config.db_host, "localhost");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn from_env_map_parses_loose_booleans_and_log_level() {
        let mut map = HashMap::new();
        map.insert("GKB_DB_CREATE".to_string(), "T".to_string());
        map.insert("GKB_LOG_LEVEL".to_string(), "DEBUG".to_string());
        map.insert("DB_PORT".to_string(), "1234".to_string());
        let config = Config::from_env_map(&map);
        assert!(config.create_db);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.db_port, 1234);
    }

    #[test]
    fn from_env_map_ignores_malformed_values() {
        let mut map = HashMap::new();
        map.insert("DB_PORT".to_string(), "not-a-number".to_string());
        map.insert("GKB_LOG_LEVEL".to_string(), "nonsense".to_string());
        let config = Config::from_env_map(&map);
        assert_eq!(config.db_port, Config::default().db_port);
        assert_eq!(config.log_level, Config::default().log_level);
    }
}
