use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
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
    pub log_level: tracing::Level,

    // Defaults applied when an admin leaves a field out
    pub default_late_tolerance_minutes: u32,
    pub default_early_out_tolerance_minutes: u32,
    pub default_radius_meter: u32,

    /// Lets `/auth/register` create ADMIN accounts. Off in production.
    pub allow_admin_signup: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse_or(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse_or(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse_or(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            log_level: parse_or(&lookup, "LOG_LEVEL", tracing::Level::DEBUG)?,

            default_late_tolerance_minutes: parse_or(&lookup, "DEFAULT_LATE_TOLERANCE_MINUTES", 30)?,
            default_early_out_tolerance_minutes: parse_or(
                &lookup,
                "DEFAULT_EARLY_OUT_TOLERANCE_MINUTES",
                30,
            )?,
            default_radius_meter: parse_or(&lookup, "DEFAULT_RADIUS_METER", 100)?,

            allow_admin_signup: parse_or(&lookup, "ALLOW_ADMIN_SIGNUP", false)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value `{raw}`")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/attendance"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_fill_optional_keys() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert_eq!(config.default_late_tolerance_minutes, 30);
        assert_eq!(config.default_early_out_tolerance_minutes, 30);
        assert_eq!(config.default_radius_meter, 100);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert!(!config.allow_admin_signup);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DEFAULT_RADIUS_METER", "250"),
            ("LOG_LEVEL", "warn"),
            ("ALLOW_ADMIN_SIGNUP", "true"),
            ("API_PREFIX", "/v1"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.default_radius_meter, 250);
        assert_eq!(config.log_level, tracing::Level::WARN);
        assert!(config.allow_admin_signup);
        assert_eq!(config.api_prefix, "/v1");
    }

    #[test]
    fn missing_required_key_is_named() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err.to_string(), "JWT_SECRET must be set");
    }

    #[test]
    fn malformed_number_is_named() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RATE_LOGIN_PER_MIN", "lots"));
        let err = Config::from_lookup(lookup_from(&pairs)).unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }
}
