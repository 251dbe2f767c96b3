use thiserror::Error;

use crate::domain::entities::RoleCategory;

/// Domain-specific errors for governance console operations
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("User not found: {user_id} in realm {realm}")]
    UserNotFound { user_id: String, realm: String },

    #[error("Role not found: {role_name} in realm {realm}")]
    RoleNotFound { role_name: String, realm: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Authorization failed: user {user_id} lacks permission {permission}")]
    AuthorizationFailed { user_id: String, permission: String },

    #[error("Policy violation for role {role_name}: {violation}")]
    PolicyViolation {
        role_name: String,
        violation: AssignmentViolation,
    },

    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("{entity_type} already exists: {identifier}")]
    AlreadyExists {
        entity_type: String,
        identifier: String,
    },
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Reason a role may not be granted to a user.
///
/// Returned by the policy as a value; never raised as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentViolation {
    #[error("data security roles are assigned from the personnel security level")]
    DataRoleManaged,

    #[error("governance roles are exclusive with application admin role {held}")]
    GovernanceConflict { held: String },

    #[error("application admin roles are exclusive with governance role {held}")]
    ApplicationAdminConflict { held: String },
}

impl AssignmentViolation {
    /// Category of the role that could not be granted
    pub fn candidate_category(&self) -> RoleCategory {
        match self {
            AssignmentViolation::DataRoleManaged => RoleCategory::DataRole,
            AssignmentViolation::GovernanceConflict { .. } => RoleCategory::GovernanceRole,
            AssignmentViolation::ApplicationAdminConflict { .. } => {
                RoleCategory::ApplicationAdminRole
            }
        }
    }
}

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token acquisition failed: {reason}")]
    TokenAcquisitionFailed { reason: String },

    #[error("Token refresh failed: {reason}")]
    TokenRefreshFailed { reason: String },

    #[error("Token revocation failed: {reason}")]
    TokenRevocationFailed { reason: String },

    #[error("Session is not signed in")]
    NotSignedIn,
}

impl From<AuthError> for DomainError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => DomainError::AuthenticationFailed {
                reason: "Invalid credentials".to_string(),
            },
            AuthError::TokenAcquisitionFailed { reason } => {
                DomainError::AuthenticationFailed { reason }
            }
            AuthError::TokenRefreshFailed { reason } => DomainError::InvalidToken { reason },
            AuthError::TokenRevocationFailed { reason } => DomainError::InvalidToken { reason },
            AuthError::NotSignedIn => DomainError::AuthenticationFailed {
                reason: "Session is not signed in".to_string(),
            },
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingRequired { key } => DomainError::Configuration {
                message: format!("Missing required configuration: {key}"),
            },
            ConfigError::InvalidValue { key, message } => DomainError::Configuration {
                message: format!("Invalid value for {key}: {message}"),
            },
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization {
            message: err.to_string(),
        }
    }
}
