use crate::domain::{entities::*, errors::DomainResult};
use async_trait::async_trait;

/// Repository port over the Keycloak admin REST API
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    // User operations
    async fn find_user_by_id(&self, realm: &str, user_id: &str) -> DomainResult<User>;
    async fn find_user_by_username(
        &self,
        realm: &str,
        username: &str,
    ) -> DomainResult<Option<User>>;
    async fn create_user(&self, realm: &str, user: &User) -> DomainResult<EntityId>;
    async fn update_user(&self, realm: &str, user: &User) -> DomainResult<()>;

    // Role operations
    async fn list_realm_roles(&self, realm: &str) -> DomainResult<Vec<Role>>;
    async fn find_realm_role_by_name(&self, realm: &str, role_name: &str) -> DomainResult<Role>;
    async fn update_realm_role(&self, realm: &str, role: &Role) -> DomainResult<()>;

    // Role mapping operations
    async fn get_user_realm_roles(&self, realm: &str, user_id: &str)
        -> DomainResult<RoleMapping>;
    async fn add_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()>;
    async fn remove_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()>;

    // User profile
    async fn get_user_profile_config(&self, realm: &str) -> DomainResult<UserProfileConfig>;
}
