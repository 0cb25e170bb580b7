use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "akilo".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };
        Ok(Self {
            database_url,
            jwt,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the client-side core.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    pub flag_store_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".into(),
            flag_store_path: PathBuf::from(".akilo/onboarding.json"),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: std::env::var("AKILO_API_URL").unwrap_or(defaults.api_url),
            flag_store_path: std::env::var("AKILO_FLAG_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.flag_store_path),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.api_url, "http://localhost:8080");
        assert!(c.flag_store_path.ends_with("onboarding.json"));
    }

    #[test]
    fn client_reads_env_overrides() {
        std::env::set_var("AKILO_API_URL", "https://api.akilo.test");
        std::env::set_var("AKILO_FLAG_STORE", "/tmp/akilo/flags.json");
        let c = ClientConfig::from_env();
        assert_eq!(c.api_url, "https://api.akilo.test");
        assert_eq!(c.flag_store_path, PathBuf::from("/tmp/akilo/flags.json"));

        std::env::remove_var("AKILO_API_URL");
        std::env::remove_var("AKILO_FLAG_STORE");
        let c = ClientConfig::from_env();
        assert_eq!(c.api_url, "http://localhost:8080");
        assert_eq!(c.flag_store_path, PathBuf::from(".akilo/onboarding.json"));
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let c = AppConfig {
            database_url: String::new(),
            jwt: JwtConfig {
                secret: "s".into(),
                issuer: "i".into(),
                audience: "a".into(),
                ttl_minutes: 1,
                refresh_ttl_minutes: 2,
            },
            host: "127.0.0.1".into(),
            port: 9000,
        };
        assert_eq!(c.bind_addr(), "127.0.0.1:9000");
    }
}
