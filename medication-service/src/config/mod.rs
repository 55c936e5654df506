use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct MedicationConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    /// Present whenever `store` is `MongoDb`.
    pub mongodb: Option<MongoConfig>,
    pub cors: CorsConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    pub connect_secs: u64,
    pub operation_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.operation_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            operation_secs: 5,
        }
    }
}

impl MedicationConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the service settings from `lookup`, which maps a variable name to
    /// its value when set.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings {
            lookup: &lookup,
            is_prod: lookup("ENVIRONMENT").as_deref() == Some("prod"),
        };

        let store: StoreBackend = settings
            .get("MEDICATION_STORE", Some("mongodb"))?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let mongodb = match store {
            StoreBackend::MongoDb => Some(MongoConfig {
                uri: settings.get("MONGODB_URI", None)?,
                database: settings.get("MONGODB_DB_NAME", None)?,
                collection: settings.get("MONGODB_COLLECTION", None)?,
            }),
            StoreBackend::Memory => None,
        };

        let defaults = TimeoutConfig::default();

        Ok(MedicationConfig {
            common,
            service_name: settings.get("SERVICE_NAME", Some("medication-service"))?,
            log_level: settings.get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            store,
            mongodb,
            cors: CorsConfig {
                enabled: settings.parsed("CORS_ENABLED", true)?,
            },
            timeouts: TimeoutConfig {
                connect_secs: settings.parsed("CONNECT_TIMEOUT_SECS", defaults.connect_secs)?,
                operation_secs: settings
                    .parsed("OPERATION_TIMEOUT_SECS", defaults.operation_secs)?,
            },
        })
    }

    /// Settings for running against the in-memory store, e.g. in tests.
    pub fn in_memory() -> Self {
        MedicationConfig {
            common: core_config::Config::default(),
            service_name: "medication-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            store: StoreBackend::Memory,
            mongodb: None,
            cors: CorsConfig { enabled: true },
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid medication store: {}", s)),
        }
    }
}

struct Settings<'a, F> {
    lookup: &'a F,
    is_prod: bool,
}

impl<F> Settings<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match (self.lookup)(key).filter(|v| !v.is_empty()) {
            Some(val) => Ok(val),
            None => {
                if self.is_prod {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required but not set",
                        key
                    )))
                }
            }
        }
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: std::str::FromStr + ToString,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(key, Some(default.to_string().as_str()))?;
        raw.parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        })
    }
}
