use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Sqlite(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub database: DatabaseTarget,
    /// Fixed seed for the scoring noise; `None` draws from OS entropy.
    pub noise_seed: Option<u64>,
    pub seed_demo_data: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let database = match std::env::var("DATABASE_PATH") {
            Ok(path) if path.trim() == MEMORY_DATABASE => DatabaseTarget::Memory,
            Ok(path) if !path.trim().is_empty() => DatabaseTarget::Sqlite(PathBuf::from(path.trim())),
            _ => DatabaseTarget::Sqlite(default_database_path()),
        };

        let noise_seed = std::env::var("NOISE_SEED")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok());

        let seed_demo_data = std::env::var("SEED_DEMO_DATA")
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(true);

        Self {
            host,
            port,
            log_level,
            database,
            noise_seed,
            seed_demo_data,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("studysense")
        .join("data.db")
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path();
        assert!(path.ends_with("studysense/data.db"));
    }
}
