use crate::domain::errors::{ConfigError, DomainResult};
use crate::domain::policy::{GovernancePolicy, RoleCatalog, DEFAULT_GOVERNANCE_ROLES};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration port for accessing application configuration
pub trait ConfigurationPort: Send + Sync {
    fn get_keycloak_config(&self) -> &KeycloakConfig;

    fn get_http_config(&self) -> &HttpConfig;

    fn get_logging_config(&self) -> &LoggingConfig;

    fn get_governance_config(&self) -> &GovernanceConfig;

    /// Validate all configuration
    fn validate(&self) -> DomainResult<()>;
}

/// Keycloak server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    pub url: String,
    pub admin_realm: String,
    pub admin_client_id: String,
    pub admin_username: String,
    pub admin_password: String,
    pub default_realm: Option<String>,
}

impl KeycloakConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "KEYCLOAK_URL".to_string(),
            }
            .into());
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "KEYCLOAK_URL".to_string(),
                message: "Must start with http:// or https://".to_string(),
            }
            .into());
        }

        let required = [
            ("KEYCLOAK_ADMIN_USERNAME", &self.admin_username),
            ("KEYCLOAK_ADMIN_PASSWORD", &self.admin_password),
            ("KEYCLOAK_ADMIN_REALM", &self.admin_realm),
            ("KEYCLOAK_ADMIN_CLIENT_ID", &self.admin_client_id),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(ConfigError::MissingRequired {
                key: key.to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Realm that governed users live in
    pub fn target_realm(&self) -> &str {
        self.default_realm.as_deref().unwrap_or(&self.admin_realm)
    }

    pub fn token_url(&self, realm: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url(),
            realm
        )
    }

    pub fn logout_url(&self, realm: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/logout",
            self.base_url(),
            realm
        )
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: concat!("keycloak-governance/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HTTP_TIMEOUT_SECONDS".to_string(),
                message: "Must be greater than 0".to_string(),
            }
            .into());
        }

        if self.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HTTP_CONNECT_TIMEOUT_SECONDS".to_string(),
                message: "Must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Build the shared HTTP client with the configured timeouts
    pub fn build_client(&self) -> DomainResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.get_timeout())
            .connect_timeout(self.get_connect_timeout())
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| {
                ConfigError::InvalidValue {
                    key: "HTTP".to_string(),
                    message: e.to_string(),
                }
                .into()
            })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Role lists driving the assignment policy and operator authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub governance_roles: Vec<String>,
    pub application_admin_roles: Vec<String>,
    /// Operator roles allowed to change users and roles
    pub manage_roles: Vec<String>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        let catalog = RoleCatalog::default();
        Self {
            governance_roles: catalog.governance_roles().to_vec(),
            application_admin_roles: catalog.application_admin_roles().to_vec(),
            manage_roles: vec![DEFAULT_GOVERNANCE_ROLES[0].to_string()],
        }
    }
}

impl GovernanceConfig {
    pub fn validate(&self) -> DomainResult<()> {
        let catalog = self.catalog();
        if let Some(role) = catalog
            .governance_roles()
            .iter()
            .find(|role| catalog.application_admin_roles().contains(role))
        {
            return Err(ConfigError::InvalidValue {
                key: "APPLICATION_ADMIN_ROLES".to_string(),
                message: format!("{role} is also listed as a governance role"),
            }
            .into());
        }

        if self.manage_roles.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "GOVERNANCE_MANAGE_ROLES".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn catalog(&self) -> RoleCatalog {
        RoleCatalog::new(&self.governance_roles, &self.application_admin_roles)
    }

    pub fn policy(&self) -> GovernancePolicy {
        GovernancePolicy::new(self.catalog())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Test,
    Staging,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub keycloak: KeycloakConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub governance: GovernanceConfig,
}

impl AppConfig {
    pub fn validate(&self) -> DomainResult<()> {
        self.keycloak.validate()?;
        self.http.validate()?;
        self.governance.validate()?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value for a key
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| ConfigError::MissingRequired {
                key: key.to_string(),
            })
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str, default: u64| {
            lookup(key)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(default)
        };
        let list = |key: &str| -> Vec<String> {
            lookup(key)
                .map(|value| {
                    value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        let environment = or_default("ENVIRONMENT", "development")
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "ENVIRONMENT".to_string(),
                message: "Must be one of: development, test, staging, production".to_string(),
            })?;

        let keycloak = KeycloakConfig {
            url: required("KEYCLOAK_URL")?,
            admin_realm: or_default("KEYCLOAK_ADMIN_REALM", "master"),
            admin_client_id: or_default("KEYCLOAK_ADMIN_CLIENT_ID", "admin-cli"),
            admin_username: required("KEYCLOAK_ADMIN_USERNAME")?,
            admin_password: required("KEYCLOAK_ADMIN_PASSWORD")?,
            default_realm: lookup("KEYCLOAK_DEFAULT_REALM").filter(|realm| !realm.is_empty()),
        };

        let http_defaults = HttpConfig::default();
        let http = HttpConfig {
            timeout_seconds: parsed("HTTP_TIMEOUT_SECONDS", http_defaults.timeout_seconds),
            connect_timeout_seconds: parsed(
                "HTTP_CONNECT_TIMEOUT_SECONDS",
                http_defaults.connect_timeout_seconds,
            ),
            user_agent: lookup("HTTP_USER_AGENT").unwrap_or(http_defaults.user_agent),
        };

        let logging = LoggingConfig {
            level: LogLevel::from_str(&or_default("LOG_LEVEL", "info")).unwrap_or(LogLevel::Info),
            format: LogFormat::from_str(&or_default("LOG_FORMAT", "compact"))
                .unwrap_or(LogFormat::Compact),
        };

        let defaults = GovernanceConfig::default();
        let non_empty = |values: Vec<String>, fallback: Vec<String>| {
            if values.is_empty() {
                fallback
            } else {
                values
            }
        };
        let governance = GovernanceConfig {
            governance_roles: non_empty(list("GOVERNANCE_ROLES"), defaults.governance_roles),
            application_admin_roles: non_empty(
                list("APPLICATION_ADMIN_ROLES"),
                defaults.application_admin_roles,
            ),
            manage_roles: non_empty(list("GOVERNANCE_MANAGE_ROLES"), defaults.manage_roles),
        };

        let config = AppConfig {
            environment,
            keycloak,
            http,
            logging,
            governance,
        };

        config.validate()?;
        Ok(config)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!("Invalid environment: {s}")),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {s}")),
        }
    }
}
