use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Recognition gateway
    pub luxand_api_token: Option<String>,
    pub luxand_base_url: String,
    pub recognition_threshold: f64,

    pub sync_max_attempts: u32,
    pub roster_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so parsing can be exercised
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        fn parsed<T: FromStr>(
            lookup: &dyn Fn(&str) -> Option<String>,
            key: &'static str,
            default: T,
        ) -> Result<T, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid { key, value: raw }),
            }
        }
        let lookup_ref: &dyn Fn(&str) -> Option<String> = &lookup;

        let recognition_threshold: f64 = parsed(lookup_ref, "RECOGNITION_THRESHOLD", 0.7)?;
        if !(0.0..=1.0).contains(&recognition_threshold) {
            return Err(ConfigError::Invalid {
                key: "RECOGNITION_THRESHOLD",
                value: recognition_threshold.to_string(),
            });
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed(lookup_ref, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parsed(lookup_ref, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parsed(lookup_ref, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed(lookup_ref, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parsed(lookup_ref, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parsed(lookup_ref, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),

            luxand_api_token: lookup("LUXAND_API_TOKEN").filter(|t| !t.trim().is_empty()),
            luxand_base_url: lookup("LUXAND_BASE_URL")
                .unwrap_or_else(|| "https://api.luxand.cloud".to_string()),
            recognition_threshold,

            sync_max_attempts: parsed(lookup_ref, "SYNC_MAX_ATTEMPTS", 3)?,
            roster_cache_ttl_secs: parsed(lookup_ref, "ROSTER_CACHE_TTL_SECS", 300)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/attendance"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_fill_optional_settings() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.recognition_threshold, 0.7);
        assert_eq!(config.sync_max_attempts, 3);
        assert_eq!(config.luxand_api_token, None);
        assert_eq!(config.luxand_base_url, "https://api.luxand.cloud");
    }

    #[test]
    fn missing_required_key_is_reported() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn unparsable_values_are_errors_not_panics() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LOGIN_PER_MIN", "lots"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "RATE_LOGIN_PER_MIN",
                value: "lots".to_string()
            }
        );

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RECOGNITION_THRESHOLD", "1.5"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
