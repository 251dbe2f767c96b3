use crate::domain::errors::AuthError;
use crate::domain::policy::RoleCatalog;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Authentication token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl AuthToken {
    pub fn new(
        access_token: String,
        expires_in: i64,
        refresh_token: Option<String>,
        token_type: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
            token_type: token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn is_expiring_soon(&self, seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(seconds) >= self.expires_at
    }
}

/// Credentials used to sign an operator in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInCredentials {
    pub username: String,
    pub password: String,
    pub realm: String,
    pub client_id: String,
    pub grant_type: String,
}

impl SignInCredentials {
    pub fn password(username: String, password: String, realm: String, client_id: String) -> Self {
        Self {
            username,
            password,
            realm,
            client_id,
            grant_type: "password".to_string(),
        }
    }

    pub fn service_account(client_id: String, client_secret: String, realm: String) -> Self {
        Self {
            username: client_id.clone(),
            password: client_secret,
            realm,
            client_id,
            grant_type: "client_credentials".to_string(),
        }
    }

    pub fn is_service_account(&self) -> bool {
        self.grant_type == "client_credentials"
    }
}

/// Token management port over the OpenID Connect token endpoint
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Acquire a new token using credentials
    async fn acquire_token(&self, credentials: &SignInCredentials)
        -> Result<AuthToken, AuthError>;

    /// Refresh an existing token
    async fn refresh_token(&self, token: &AuthToken) -> Result<AuthToken, AuthError>;

    /// Revoke a token (logout)
    async fn revoke_token(&self, token: &AuthToken) -> Result<(), AuthError>;
}

/// The signed-in operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl SessionUser {
    pub fn new(id: String, username: String) -> Self {
        Self {
            id,
            username,
            email: None,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roles = clean_names(roles);
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permissions = clean_names(permissions);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role.trim()))
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        roles.iter().any(|role| self.has_role(role.as_ref()))
    }
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order
fn clean_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_string())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Operator context shared between request handling and the admin REST client
pub type SharedSession = Arc<RwLock<SessionContext>>;

/// Who is calling, passed explicitly to every service operation that
/// reaches Keycloak.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub realm: String,
    pub user: Option<SessionUser>,
    pub token: Option<AuthToken>,
}

impl SessionContext {
    pub fn new(realm: String) -> Self {
        Self {
            realm,
            user: None,
            token: None,
        }
    }

    pub fn load(&mut self, user: SessionUser, token: AuthToken) {
        let SessionUser {
            id,
            username,
            email,
            roles,
            permissions,
        } = user;
        self.user = Some(
            SessionUser::new(id, username)
                .with_email(email)
                .with_roles(roles)
                .with_permissions(permissions),
        );
        self.token = Some(token);
    }

    pub fn shared(realm: String) -> SharedSession {
        Arc::new(RwLock::new(Self::new(realm)))
    }

    /// Hold a freshly issued token while the operator behind it is resolved
    pub fn adopt_token(&mut self, token: AuthToken) {
        self.user = None;
        self.token = Some(token);
    }

    /// Bearer token for admin calls, while it is still valid
    pub fn access_token(&self) -> Option<&str> {
        self.token
            .as_ref()
            .filter(|token| !token.is_expired())
            .map(|token| token.access_token.as_str())
    }

    pub fn clear(&mut self) {
        self.user = None;
        self.token = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.as_ref().is_some_and(|token| !token.is_expired())
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    pub fn has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        self.user
            .as_ref()
            .is_some_and(|user| user.has_any_role(roles))
    }

    /// Governance role held by the operator, in catalog order
    pub fn admin_role<'a>(&self, catalog: &'a RoleCatalog) -> Option<&'a str> {
        let user = self.user.as_ref()?;
        catalog
            .governance_roles()
            .iter()
            .map(String::as_str)
            .find(|role| user.has_role(role))
    }
}
