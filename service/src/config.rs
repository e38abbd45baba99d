use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Service settings: built-in defaults, overridden by `CLF_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    /// Largest accepted upload, in bytes
    pub max_upload_bytes: usize,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("CLF").try_parsing(true))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_addr", "127.0.0.1:8080")?
            .set_default("data_dir", "./data")?
            // 1 GB, access logs for a busy month get large
            .set_default("max_upload_bytes", 1024_i64 * 1024 * 1024)?
            .add_source(env)
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let mut map = config::Map::new();
        for (k, v) in vars {
            map.insert(k.to_string(), v.to_string());
        }
        Environment::with_prefix("CLF").try_parsing(true).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let cfg = ServiceConfig::load_from(env(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert_eq!(cfg.max_upload_bytes, 1024 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = ServiceConfig::load_from(env(&[
            ("CLF_BIND_ADDR", "0.0.0.0:9000"),
            ("CLF_DATA_DIR", "/var/lib/clf"),
            ("CLF_MAX_UPLOAD_BYTES", "4096"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/clf"));
        assert_eq!(cfg.max_upload_bytes, 4096);
    }
}
