use async_trait::async_trait;
use keycloak::types::*;
use keycloak::{KeycloakAdmin, KeycloakError, KeycloakTokenSupplier};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::session_token_supplier::SessionTokenSupplier;
use crate::application::ports::auth::SharedSession;
use crate::application::ports::config::KeycloakConfig;
use crate::application::ports::repository::*;
use crate::domain::{entities::*, errors::*};

const SERVICE: &str = "Keycloak";

fn external(action: &str, e: KeycloakError) -> DomainError {
    if is_status(&e, 401) {
        return DomainError::AuthenticationFailed {
            reason: format!("Keycloak rejected the operator token while trying to {action}"),
        };
    }
    DomainError::ExternalService {
        service: SERVICE.to_string(),
        message: format!("Failed to {action}: {e}"),
    }
}

fn is_status(e: &KeycloakError, expected: u16) -> bool {
    matches!(e, KeycloakError::HttpFailure { status, .. } if *status == expected)
}

/// Keycloak REST API adapter implementing the IdentityRepository port
pub struct KeycloakRestAdapter<TS: KeycloakTokenSupplier> {
    admin: Arc<KeycloakAdmin<TS>>,
}

impl<TS: KeycloakTokenSupplier + Send + Sync> KeycloakRestAdapter<TS> {
    pub fn new(admin: KeycloakAdmin<TS>) -> Self {
        Self {
            admin: Arc::new(admin),
        }
    }
}

impl KeycloakRestAdapter<SessionTokenSupplier> {
    /// Admin client that authenticates with the operator session's token
    pub fn with_session(
        config: &KeycloakConfig,
        session: SharedSession,
        client: reqwest::Client,
    ) -> Self {
        Self::new(KeycloakAdmin::new(
            config.base_url(),
            SessionTokenSupplier::new(session),
            client,
        ))
    }
}

#[async_trait]
impl<TS: KeycloakTokenSupplier + Send + Sync> IdentityRepository for KeycloakRestAdapter<TS> {
    async fn find_user_by_id(&self, realm: &str, user_id: &str) -> DomainResult<User> {
        let keycloak_user = self
            .admin
            .realm_users_with_user_id_get(realm, user_id, None)
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    DomainError::UserNotFound {
                        user_id: user_id.to_string(),
                        realm: realm.to_string(),
                    }
                } else {
                    external("find user by ID", e)
                }
            })?;

        convert_user_from_keycloak(keycloak_user)
    }

    async fn find_user_by_username(
        &self,
        realm: &str,
        username: &str,
    ) -> DomainResult<Option<User>> {
        let users = self
            .admin
            .realm_users_get(
                realm,
                None,       // brief_representation
                None,       // email
                None,       // email_verified
                None,       // enabled
                Some(true), // exact
                None,       // first
                None,       // first_name
                None,       // idp_alias
                None,       // idp_user_id
                None,       // last_name
                None,       // max
                None,       // q
                None,       // search
                Some(username.to_string()),
            )
            .await
            .map_err(|e| external("find user by username", e))?;

        users
            .into_iter()
            .find(|u| {
                u.username
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(username))
            })
            .map(convert_user_from_keycloak)
            .transpose()
    }

    async fn create_user(&self, realm: &str, user: &User) -> DomainResult<EntityId> {
        self.admin
            .realm_users_post(realm, convert_user_to_keycloak(user))
            .await
            .map_err(|e| {
                if is_status(&e, 409) {
                    DomainError::AlreadyExists {
                        entity_type: "User".to_string(),
                        identifier: user.username.clone(),
                    }
                } else {
                    external("create user", e)
                }
            })?;

        // The create endpoint only answers with a Location header
        self.find_user_by_username(realm, &user.username)
            .await?
            .and_then(|u| u.id)
            .ok_or_else(|| DomainError::ExternalService {
                service: SERVICE.to_string(),
                message: "User created but could not retrieve ID".to_string(),
            })
    }

    async fn update_user(&self, realm: &str, user: &User) -> DomainResult<()> {
        let user_id = user.id.as_ref().ok_or_else(|| DomainError::Validation {
            field: "id".to_string(),
            message: "User ID is required for updates".to_string(),
        })?;

        self.admin
            .realm_users_with_user_id_put(realm, user_id.as_str(), convert_user_to_keycloak(user))
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    DomainError::UserNotFound {
                        user_id: user_id.to_string(),
                        realm: realm.to_string(),
                    }
                } else {
                    external("update user", e)
                }
            })?;

        Ok(())
    }

    async fn list_realm_roles(&self, realm: &str) -> DomainResult<Vec<Role>> {
        let keycloak_roles = self
            .admin
            .realm_roles_get(realm, Some(false), None, None, None)
            .await
            .map_err(|e| external("list realm roles", e))?;

        keycloak_roles
            .into_iter()
            .map(convert_role_from_keycloak)
            .collect()
    }

    async fn find_realm_role_by_name(&self, realm: &str, role_name: &str) -> DomainResult<Role> {
        let keycloak_role = self
            .admin
            .realm_roles_with_role_name_get(realm, role_name)
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    DomainError::RoleNotFound {
                        role_name: role_name.to_string(),
                        realm: realm.to_string(),
                    }
                } else {
                    external("find realm role by name", e)
                }
            })?;

        convert_role_from_keycloak(keycloak_role)
    }

    async fn update_realm_role(&self, realm: &str, role: &Role) -> DomainResult<()> {
        self.admin
            .realm_roles_with_role_name_put(realm, &role.name, convert_role_to_keycloak(role))
            .await
            .map_err(|e| external("update realm role", e))?;

        Ok(())
    }

    async fn get_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
    ) -> DomainResult<RoleMapping> {
        let mappings = self
            .admin
            .realm_users_with_user_id_role_mappings_get(realm, user_id)
            .await
            .map_err(|e| {
                if is_status(&e, 404) {
                    DomainError::UserNotFound {
                        user_id: user_id.to_string(),
                        realm: realm.to_string(),
                    }
                } else {
                    external("get user role mappings", e)
                }
            })?;

        let realm_roles = mappings
            .realm_mappings
            .unwrap_or_default()
            .into_iter()
            .filter_map(|role| role.name.map(|name| name.to_string()))
            .collect();

        Ok(RoleMapping::new(realm_roles))
    }

    async fn add_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let representations = self.role_representations(realm, roles).await?;

        self.admin
            .realm_users_with_user_id_role_mappings_realm_post(realm, user_id, representations)
            .await
            .map_err(|e| external("add user realm roles", e))?;

        Ok(())
    }

    async fn remove_user_realm_roles(
        &self,
        realm: &str,
        user_id: &str,
        roles: &[String],
    ) -> DomainResult<()> {
        if roles.is_empty() {
            return Ok(());
        }
        let representations = self.role_representations(realm, roles).await?;

        self.admin
            .realm_users_with_user_id_role_mappings_realm_delete(realm, user_id, representations)
            .await
            .map_err(|e| external("remove user realm roles", e))?;

        Ok(())
    }

    async fn get_user_profile_config(&self, realm: &str) -> DomainResult<UserProfileConfig> {
        let config = self
            .admin
            .realm_users_profile_get(realm)
            .await
            .map_err(|e| external("read user profile configuration", e))?;

        let attributes = config
            .attributes
            .unwrap_or_default()
            .into_iter()
            .filter_map(|attribute| {
                let name = attribute.name?.to_string();
                Some(ProfileAttribute {
                    name,
                    display_name: attribute.display_name.map(|d| d.to_string()),
                    required: attribute.required.is_some(),
                })
            })
            .collect();

        Ok(UserProfileConfig { attributes })
    }
}

impl<TS: KeycloakTokenSupplier + Send + Sync> KeycloakRestAdapter<TS> {
    /// Role-mapping endpoints need full role representations, including ids
    async fn role_representations(
        &self,
        realm: &str,
        roles: &[String],
    ) -> DomainResult<Vec<RoleRepresentation>> {
        let mut representations = Vec::with_capacity(roles.len());
        for role_name in roles {
            debug!("Resolving realm role {} in {}", role_name, realm);
            let role = self.find_realm_role_by_name(realm, role_name).await?;
            representations.push(convert_role_to_keycloak(&role));
        }
        Ok(representations)
    }
}

fn convert_user_from_keycloak(keycloak_user: UserRepresentation) -> DomainResult<User> {
    let username = keycloak_user
        .username
        .ok_or_else(|| DomainError::Validation {
            field: "username".to_string(),
            message: "Username is required".to_string(),
        })?
        .to_string();

    let mut user = User::new(username)?;
    user.id = keycloak_user
        .id
        .map(|id| EntityId::from_string(id.to_string()));
    user.email = keycloak_user.email.map(|e| e.to_string());
    user.email_verified = keycloak_user.email_verified.unwrap_or(false);
    user.first_name = keycloak_user.first_name.map(|f| f.to_string());
    user.last_name = keycloak_user.last_name.map(|l| l.to_string());
    user.enabled = keycloak_user.enabled.unwrap_or(true);

    if let Some(attrs) = keycloak_user.attributes {
        let attributes: HashMap<String, Vec<String>> = attrs
            .iter()
            .map(|(key, values)| {
                (
                    key.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect();
        user.attributes = Attributes::from(attributes);
    }

    if let Some(created) = keycloak_user.created_timestamp {
        user.timestamps.created_timestamp = chrono::DateTime::from_timestamp_millis(created);
    }

    Ok(user)
}

fn convert_user_to_keycloak(user: &User) -> UserRepresentation {
    let attributes: HashMap<String, Vec<String>> = user.attributes.attributes.clone();

    UserRepresentation {
        id: user.id.as_ref().map(|id| id.to_string().into()),
        username: Some(user.username.clone().into()),
        email: user.email.clone().map(Into::into),
        email_verified: Some(user.email_verified),
        first_name: user.first_name.clone().map(Into::into),
        last_name: user.last_name.clone().map(Into::into),
        enabled: Some(user.enabled),
        attributes: Some(
            attributes
                .into_iter()
                .map(|(key, values)| (key.into(), values.into_iter().map(Into::into).collect()))
                .collect(),
        ),
        ..Default::default()
    }
}

fn convert_role_from_keycloak(keycloak_role: RoleRepresentation) -> DomainResult<Role> {
    let name = keycloak_role.name.ok_or_else(|| DomainError::Validation {
        field: "name".to_string(),
        message: "Role name is required".to_string(),
    })?;

    // Names created outside the console may not pass the console's own rules
    let mut role = Role {
        id: keycloak_role
            .id
            .map(|id| EntityId::from_string(id.to_string())),
        name: name.to_string(),
        description: keycloak_role.description.map(|d| d.to_string()),
        composite: keycloak_role.composite.unwrap_or(false),
        client_role: keycloak_role.client_role.unwrap_or(false),
        container_id: keycloak_role.container_id.map(|c| c.to_string()),
        attributes: Attributes::new(),
        timestamps: Timestamps::default(),
    };

    if let Some(attrs) = keycloak_role.attributes {
        for (key, values) in attrs.iter() {
            role.attributes.set_attribute(
                key.to_string(),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
    }

    Ok(role)
}

fn convert_role_to_keycloak(role: &Role) -> RoleRepresentation {
    RoleRepresentation {
        id: role.id.as_ref().map(|id| id.as_str().into()),
        name: Some(role.name.clone().into()),
        description: role.description.clone().map(Into::into),
        composite: Some(role.composite),
        client_role: Some(role.client_role),
        container_id: role.container_id.clone().map(Into::into),
        attributes: Some(
            role.attributes
                .attributes
                .iter()
                .map(|(key, values)| {
                    (
                        key.clone().into(),
                        values.iter().cloned().map(Into::into).collect(),
                    )
                })
                .collect(),
        ),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_round_trips_attributes() {
        let mut user = User::new("jdoe".to_string()).unwrap();
        user.id = Some(EntityId::from("abc"));
        user.first_name = Some("Jane Doe".to_string());
        user.set_attributes(HashMap::from([(
            "personnel_security_level".to_string(),
            vec!["SECRET".to_string()],
        )]));

        let converted = convert_user_from_keycloak(convert_user_to_keycloak(&user)).unwrap();
        assert_eq!(converted.id, user.id);
        assert_eq!(converted.attributes, user.attributes);
        assert_eq!(converted.full_name(), Some("Jane Doe"));
    }

    #[test]
    fn foreign_role_names_are_accepted() {
        let role = convert_role_from_keycloak(RoleRepresentation {
            name: Some("default-roles-corp".into()),
            attributes: Some(HashMap::from([(
                "dataSecurityLevel".into(),
                vec!["DATA_SECRET".into()],
            )])),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            role.security_profile().data_security_level,
            DataSecurityLevel::DataSecret
        );
        assert!(convert_role_from_keycloak(RoleRepresentation::default()).is_err());
    }

    #[test]
    fn rejected_token_is_an_authentication_failure() {
        let unauthorized = KeycloakError::HttpFailure {
            status: 401,
            body: None,
            text: "Unauthorized".to_string(),
        };
        assert!(matches!(
            external("list users", unauthorized),
            DomainError::AuthenticationFailed { .. }
        ));

        let unavailable = KeycloakError::HttpFailure {
            status: 503,
            body: None,
            text: "Service Unavailable".to_string(),
        };
        assert!(matches!(
            external("list users", unavailable),
            DomainError::ExternalService { .. }
        ));
    }
}
