use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct RightsConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Tunables of the resolution engine.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// How far in the past a new grant boundary may lie.
    pub clock_skew_tolerance_seconds: i64,
    pub capability_cache_ttl_seconds: u64,
    /// Keep targets without any reading right in per-node reports.
    pub report_empty_rights: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_seconds: 60,
            capability_cache_ttl_seconds: 300,
            report_empty_rights: false,
        }
    }
}

impl RightsConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = RightsConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("rights-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            },
            engine: EngineConfig {
                clock_skew_tolerance_seconds: parse_env(
                    "CLOCK_SKEW_TOLERANCE_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                capability_cache_ttl_seconds: parse_env(
                    "CAPABILITY_CACHE_TTL_SECONDS",
                    Some("300"),
                    is_prod,
                )?,
                report_empty_rights: parse_env("REPORT_EMPTY_RIGHTS", Some("false"), is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be greater than 0"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.engine.clock_skew_tolerance_seconds < 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "CLOCK_SKEW_TOLERANCE_SECONDS must not be negative"
            )));
        }

        if self.environment == Environment::Prod && self.engine.report_empty_rights {
            tracing::warn!("REPORT_EMPTY_RIGHTS is enabled in production");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!(format!("{} is invalid: {}", key, e)))
    })
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_engine_defaults() {
        let engine = EngineConfig::default();
        assert_eq!(engine.clock_skew_tolerance_seconds, 60);
        assert_eq!(engine.capability_cache_ttl_seconds, 300);
        assert!(!engine.report_empty_rights);
    }

    #[test]
    fn test_get_env_requires_value_in_prod() {
        let err = get_env("RIGHTS_TEST_UNSET_VARIABLE", Some("x"), true).unwrap_err();
        assert!(err.to_string().contains("required in production"));
        assert_eq!(
            get_env("RIGHTS_TEST_UNSET_VARIABLE", Some("x"), false).unwrap(),
            "x"
        );
    }

    #[test]
    fn test_parse_env_reports_key() {
        let err = parse_env::<u32>("RIGHTS_TEST_UNSET_NUMBER", Some("abc"), false).unwrap_err();
        assert!(err.to_string().contains("RIGHTS_TEST_UNSET_NUMBER"));
    }
}
