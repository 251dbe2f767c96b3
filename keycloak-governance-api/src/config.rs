use keycloak_governance_domain::{
    application::ports::{AppConfig, ConfigurationPort},
    domain::errors::{ConfigError, DomainResult},
    infrastructure::adapters::EnvConfigurationAdapter,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: Option<String>,
    pub settings: Arc<dyn ConfigurationPort>,
}

impl Config {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT".to_string(),
                message: format!("Not a valid port: {port}"),
            })?,
            None => 3000,
        };
        let api_key = lookup("API_KEY").filter(|key| !key.trim().is_empty());
        let app = AppConfig::from_lookup(&lookup)?;

        Ok(Self::new(port, api_key, app))
    }

    pub fn new(port: u16, api_key: Option<String>, app: AppConfig) -> Self {
        Self {
            port,
            api_key,
            settings: Arc::new(EnvConfigurationAdapter::from_config(app)),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("keycloak_url", &self.settings.get_keycloak_config().url)
            .finish()
    }
}
