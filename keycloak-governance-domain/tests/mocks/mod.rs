#![allow(dead_code)]

use async_trait::async_trait;
use keycloak_governance_domain::{
    application::ports::{
        auth::{AuthToken, SignInCredentials, TokenManager},
        events::{DomainEvent, EventError, EventPublisher},
        repository::IdentityRepository,
    },
    domain::{
        entities::*,
        errors::{AuthError, DomainError, DomainResult},
    },
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory identity repository
pub struct MockIdentityRepository {
    pub users: Arc<Mutex<HashMap<String, Vec<User>>>>, // realm -> users
    pub roles: Arc<Mutex<HashMap<String, Vec<Role>>>>, // realm -> roles
    pub role_mappings: Arc<Mutex<HashMap<String, Vec<String>>>>, // user id -> realm roles
    pub profile_config: Arc<Mutex<Option<UserProfileConfig>>>,
    pub writes: Arc<Mutex<Vec<String>>>,
    pub user_counter: Arc<Mutex<u32>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockIdentityRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(HashMap::new())),
            roles: Arc::new(Mutex::new(HashMap::new())),
            role_mappings: Arc::new(Mutex::new(HashMap::new())),
            profile_config: Arc::new(Mutex::new(None)),
            writes: Arc::new(Mutex::new(Vec::new())),
            user_counter: Arc::new(Mutex::new(0)),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        *self.should_fail.lock().unwrap() = should_fail;
    }

    fn check_should_fail(&self) -> DomainResult<()> {
        if *self.should_fail.lock().unwrap() {
            Err(DomainError::ExternalService {
                service: "mock-keycloak".to_string(),
                message: "Mock failure enabled".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn generate_user_id(&self) -> String {
        let mut counter = self.user_counter.lock().unwrap();
        *counter += 1;
        format!("user-{}", counter)
    }

    /// Seed a user with attributes and realm roles; returns its id
    pub fn add_user(
        &self,
        realm: &str,
        username: &str,
        attributes: &[(&str, &str)],
        roles: &[&str],
    ) -> String {
        let id = self.generate_user_id();
        let mut user = User::new(username.to_string()).unwrap();
        user.id = Some(EntityId::from(id.as_str()));
        user.first_name = Some(format!("{} Example", username));
        user.set_attributes(
            attributes
                .iter()
                .map(|(key, value)| (key.to_string(), vec![value.to_string()]))
                .collect(),
        );

        self.users
            .lock()
            .unwrap()
            .entry(realm.to_string())
            .or_default()
            .push(user);
        self.role_mappings
            .lock()
            .unwrap()
            .insert(id.clone(), roles.iter().map(|r| r.to_string()).collect());
        id
    }

    pub fn add_role(&self, realm: &str, name: &str) {
        let mut role = Role::new_realm_role(name.to_string()).unwrap();
        role.id = Some(EntityId::from(format!("role-{}", name.to_lowercase())));
        self.roles
            .lock()
            .unwrap()
            .entry(realm.to_string())
            .or_default()
            .push(role);
    }

    pub fn set_profile_config(&self, config: UserProfileConfig) {
        *self.profile_config.lock().unwrap() = Some(config);
    }

    pub fn roles_of(&self, user_id: &str) -> Vec<String> {
        self.role_mappings
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn stored_user(&self, realm: &str, user_id: &str) -> Option<User> {
        self.users.lock().unwrap().get(realm).and_then(|users| {
            users
                .iter()
                .find(|u| u.id.as_ref().map(|id| id.as_str()) == Some(user_id))
                .cloned()
        })
    }

    pub fn stored_role(&self, realm: &str, name: &str) -> Option<Role> {
        self.roles
            .lock()
            .unwrap()
            .get(realm)
            .and_then(|roles| roles.iter().find(|r| r.name == name).cloned())
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn record_write(&self, write: String) {
        self.writes.lock().unwrap().push(write);
    }
}

#[async_trait]
impl IdentityRepository for MockIdentityRepository {
    async fn find_user_by_id(&self, realm: &str, user_id: &str) -> DomainResult<User> {
        self.check_should_fail()?;

        self.stored_user(realm, user_id)
            .ok_or_else(|| DomainError::UserNotFound {
                user_id: user_id.to_string(),
                realm: realm.to_string(),
            })
    }

    async fn find_user_by_username(
        &self,
        realm: &str,
        username: &str,
    ) -> DomainResult<Option<User>> {
        self.check_should_fail()?;

        let users = self.users.lock().unwrap();
        Ok(users
            .get(realm)
            .and_then(|users| users.iter().find(|u| u.username == username).cloned()))
    }

    async fn create_user(&self, realm: &str, user: &User) -> DomainResult<EntityId> {
        self.check_should_fail()?;

        let id = self.generate_user_id();
        let mut stored = user.clone();
        stored.id = Some(EntityId::from(id.as_str()));
        self.users
            .lock()
            .unwrap()
            .entry(realm.to_string())
            .or_default()
            .push(stored);
        self.role_mappings
            .lock()
            .unwrap()
            .insert(id.clone(), Vec::new());
        self.record_write(format!("create_user:{}", user.username));
        Ok(EntityId::from(id))
    }

    async fn update_user(&self, realm: &str, user: &User) -> DomainResult<()> {
        self.check_should_fail()?;

        let user_id = user.id.as_ref().map(|id| id.to_string()).unwrap_or_default();
        let mut users = self.users.lock().unwrap();
        let stored = users
            .get_mut(realm)
            .and_then(|users| {
                users
                    .iter_mut()
                    .find(|u| u.id.as_ref().map(|id| id.as_str()) == Some(user_id.as_str()))
            })
            .ok_or_else(|| DomainError::UserNotFound {
                user_id: user_id.clone(),
                realm: realm.to_string(),
            })?;
        *stored = user.clone();
        drop(users);
        self.record_write(format!("update_user:{}", user_id));
        Ok(())
    }

    async fn list_realm_roles(&self, realm: &str) -> DomainResult<Vec<Role>> {
        self.check_should_fail()?;

        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(realm)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_realm_role_by_name(&self, realm: &str, role_name: &str) -> DomainResult<Role> {
        self.check_should_fail()?;

        self.stored_role(realm, role_name)
            .ok_or_else(|| DomainError::RoleNotFound {
                role_name: role_name.to_string(),
                realm: realm.to_string(),
            })
    }

    async fn update_realm_role(&self, realm: &str, role: &Role) -> DomainResult<()> {
        self.check_should_fail()?;

        let mut roles = self.roles.lock().unwrap();
        let stored = roles
            .get_mut(realm)
            .and_then(|roles| roles.iter_mut().find(|r| r.name == role.name))
            .ok_or_else(|| DomainError::RoleNotFound {
                role_name: role.name.clone(),
                realm: realm.to_string(),
            })?;
        *stored = role.clone();
        drop(roles);
        self.record_write(format!("update_role:{}", role.name));
        Ok(())
    }

    async fn get_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
    ) -> DomainResult<RoleMapping> {
        self.check_should_fail()?;

        Ok(RoleMapping::new(self.roles_of(user_id)))
    }

    async fn add_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        self.check_should_fail()?;
        if roles.is_empty() {
            return Ok(());
        }

        let mut mappings = self.role_mappings.lock().unwrap();
        let held = mappings.entry(user_id.to_string()).or_default();
        for role in roles {
            if !held.contains(role) {
                held.push(role.clone());
            }
        }
        drop(mappings);
        self.record_write(format!("add_roles:{}", roles.join(",")));
        Ok(())
    }

    async fn remove_user_realm_roles(
        &self,
        _realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        self.check_should_fail()?;
        if roles.is_empty() {
            return Ok(());
        }

        let mut mappings = self.role_mappings.lock().unwrap();
        if let Some(held) = mappings.get_mut(user_id) {
            held.retain(|role| !roles.contains(role));
        }
        drop(mappings);
        self.record_write(format!("remove_roles:{}", roles.join(",")));
        Ok(())
    }

    async fn get_user_profile_config(&self, _realm: &str) -> DomainResult<UserProfileConfig> {
        self.check_should_fail()?;

        self.profile_config
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DomainError::ExternalService {
                service: "mock-keycloak".to_string(),
                message: "User profile not configured".to_string(),
            })
    }
}

/// Token manager accepting a single username/password pair
pub struct MockTokenManager {
    pub username: String,
    pub password: String,
    pub expires_in: Arc<Mutex<i64>>,
    pub revoked: Arc<Mutex<Vec<String>>>,
    pub refreshed: Arc<Mutex<u32>>,
    pub acquired: Arc<Mutex<u32>>,
    pub fail_revoke: Arc<Mutex<bool>>,
    pub fail_refresh: Arc<Mutex<bool>>,
}

impl MockTokenManager {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            expires_in: Arc::new(Mutex::new(300)),
            revoked: Arc::new(Mutex::new(Vec::new())),
            refreshed: Arc::new(Mutex::new(0)),
            acquired: Arc::new(Mutex::new(0)),
            fail_revoke: Arc::new(Mutex::new(false)),
            fail_refresh: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_expires_in(&self, seconds: i64) {
        *self.expires_in.lock().unwrap() = seconds;
    }

    pub fn set_fail_revoke(&self, fail: bool) {
        *self.fail_revoke.lock().unwrap() = fail;
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        *self.fail_refresh.lock().unwrap() = fail;
    }

    fn issue(&self) -> AuthToken {
        let mut token = AuthToken::new(
            "access-token".to_string(),
            *self.expires_in.lock().unwrap(),
            Some("refresh-token".to_string()),
            None,
        );
        token.scope = Some("openid profile".to_string());
        token
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    async fn acquire_token(&self, credentials: &SignInCredentials) -> Result<AuthToken, AuthError> {
        if credentials.username == self.username && credentials.password == self.password {
            *self.acquired.lock().unwrap() += 1;
            Ok(self.issue())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn refresh_token(&self, _token: &AuthToken) -> Result<AuthToken, AuthError> {
        if *self.fail_refresh.lock().unwrap() {
            return Err(AuthError::TokenRefreshFailed {
                reason: "Mock refresh failure".to_string(),
            });
        }
        *self.refreshed.lock().unwrap() += 1;
        let mut token = self.issue();
        token.expires_at = chrono::Utc::now() + chrono::Duration::seconds(300);
        Ok(token)
    }

    async fn revoke_token(&self, token: &AuthToken) -> Result<(), AuthError> {
        if *self.fail_revoke.lock().unwrap() {
            return Err(AuthError::TokenRevocationFailed {
                reason: "Mock revocation failure".to_string(),
            });
        }
        self.revoked
            .lock()
            .unwrap()
            .push(token.refresh_token.clone().unwrap_or_default());
        Ok(())
    }
}

/// Event publisher collecting events in memory
pub struct MockEventPublisher {
    pub published_events: Arc<Mutex<Vec<DomainEvent>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self {
            published_events: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        *self.should_fail.lock().unwrap() = should_fail;
    }

    pub fn get_published_events(&self) -> Vec<DomainEvent> {
        self.published_events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), EventError> {
        if *self.should_fail.lock().unwrap() {
            return Err(EventError::PublishFailed {
                message: "Mock failure enabled".to_string(),
            });
        }

        self.published_events.lock().unwrap().push(event);
        Ok(())
    }

    async fn publish_batch(&self, events: Vec<DomainEvent>) -> Result<(), EventError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), EventError> {
        Ok(())
    }
}
