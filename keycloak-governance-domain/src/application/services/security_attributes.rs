use crate::{
    application::ports::*,
    domain::{
        entities::*,
        errors::{AssignmentViolation, DomainError, DomainResult},
        policy::{same_role, DataRoleSync, GovernancePolicy},
        session::UserEditSession,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of submitting a user edit session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    NoChanges,
    Applied {
        user_updated: bool,
        roles_added: Vec<String>,
        roles_removed: Vec<String>,
        data_roles: DataRoleSync,
    },
}

/// Security attribute use cases: editing a user's clearance and roles, and
/// maintaining role security profiles.
pub struct SecurityAttributeService {
    repository: Arc<dyn IdentityRepository>,
    event_publisher: Arc<dyn EventPublisher>,
    policy: GovernancePolicy,
    manage_roles: Vec<String>,
}

impl SecurityAttributeService {
    pub fn new(
        repository: Arc<dyn IdentityRepository>,
        event_publisher: Arc<dyn EventPublisher>,
        governance: &GovernanceConfig,
    ) -> Self {
        Self {
            repository,
            event_publisher,
            policy: governance.policy(),
            manage_roles: governance.manage_roles.clone(),
        }
    }

    pub fn policy(&self) -> &GovernancePolicy {
        &self.policy
    }

    fn require_authenticated(&self, ctx: &SessionContext) -> DomainResult<()> {
        if ctx.is_authenticated() {
            Ok(())
        } else {
            Err(DomainError::AuthenticationFailed {
                reason: "Session is not signed in or has expired".to_string(),
            })
        }
    }

    fn require_manage(&self, ctx: &SessionContext, permission: &str) -> DomainResult<()> {
        self.require_authenticated(ctx)?;
        if ctx.has_any_role(&self.manage_roles) {
            Ok(())
        } else {
            Err(DomainError::AuthorizationFailed {
                user_id: ctx.user_id().unwrap_or_default().to_string(),
                permission: permission.to_string(),
            })
        }
    }

    fn metadata(&self, ctx: &SessionContext) -> EventMetadata {
        EventMetadata::new()
            .with_user_id(ctx.user_id().unwrap_or_default().to_string())
            .with_correlation_id(Uuid::new_v4().to_string())
    }

    async fn publish_all(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.event_publisher.publish_batch(events).await {
            warn!("Failed to publish governance events: {}", e);
        }
    }

    /// A missing user-profile configuration only skips the required-attribute check
    async fn profile_config(&self, realm: &str) -> Option<UserProfileConfig> {
        match self.repository.get_user_profile_config(realm).await {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("User profile configuration unavailable for '{}': {}", realm, e);
                None
            }
        }
    }

    /// Realm role names as Keycloak spells them, without client roles
    async fn realm_role_names(&self, realm: &str) -> DomainResult<Vec<String>> {
        Ok(self
            .repository
            .list_realm_roles(realm)
            .await?
            .into_iter()
            .filter(|role| !role.client_role)
            .map(|role| role.name)
            .collect())
    }

    /// Load a user and their realm roles into a fresh edit session
    #[instrument(skip(self, ctx), fields(realm = %realm, user_id = %user_id))]
    pub async fn open_user_session(
        &self,
        realm: &str,
        user_id: &str,
        ctx: &SessionContext,
    ) -> DomainResult<UserEditSession> {
        self.require_authenticated(ctx)?;

        let user = self.repository.find_user_by_id(realm, user_id).await?;
        let roles = self.repository.get_user_realm_roles(realm, user_id).await?;

        info!(
            "Opened edit session for '{}' holding {} realm roles",
            user.username,
            roles.realm_roles.len()
        );
        Ok(UserEditSession::for_existing(&user, roles.realm_roles).with_policy(self.policy.clone()))
    }

    /// Realm roles the session's user could be granted from the editor
    #[instrument(skip(self, session, ctx), fields(realm = %realm))]
    pub async fn list_assignable_roles(
        &self,
        realm: &str,
        session: &UserEditSession,
        ctx: &SessionContext,
    ) -> DomainResult<Vec<String>> {
        self.require_authenticated(ctx)?;

        let names = self.realm_role_names(realm).await?;
        Ok(session.assignable_roles(&names))
    }

    /// Persist an edit session.
    ///
    /// Every manual role change is checked against the roles Keycloak reports
    /// now, before anything is written. Data roles are then reconciled with the
    /// session's personnel level. Roles to grant must exist in the realm.
    #[instrument(skip(self, session, ctx), fields(realm = %realm, username = %session.username))]
    pub async fn submit_user_session(
        &self,
        realm: &str,
        session: &UserEditSession,
        ctx: &SessionContext,
    ) -> DomainResult<SubmitOutcome> {
        self.require_manage(ctx, "users:manage")?;

        let user_id = session
            .user_id()
            .ok_or_else(|| DomainError::Validation {
                field: "id".to_string(),
                message: "Only existing users can be submitted; create the user first".to_string(),
            })?
            .to_string();

        let profile_config = self.profile_config(realm).await;
        session.validate(profile_config.as_ref())?;

        let current = self
            .repository
            .get_user_realm_roles(realm, &user_id)
            .await?
            .realm_roles;
        let (to_add, to_remove) = session.role_changes();

        let roles_removed: Vec<String> = to_remove
            .iter()
            .filter_map(|role| current.iter().find(|held| same_role(held, role)).cloned())
            .collect();
        if let Some(role) = roles_removed.iter().find(|r| !self.policy.can_remove_role(r)) {
            return Err(DomainError::PolicyViolation {
                role_name: role.clone(),
                violation: AssignmentViolation::DataRoleManaged,
            });
        }

        let mut effective: Vec<String> = current
            .iter()
            .filter(|role| !roles_removed.contains(role))
            .cloned()
            .collect();
        let mut roles_added = Vec::new();
        for role in to_add {
            if effective.iter().any(|held| same_role(held, &role)) {
                continue;
            }
            self.policy
                .check_role_assignment(&role, &effective)
                .map_err(|violation| {
                    warn!("Rejected assignment of '{}': {}", role, violation);
                    DomainError::PolicyViolation {
                        role_name: role.clone(),
                        violation,
                    }
                })?;
            effective.push(role.clone());
            roles_added.push(role);
        }

        let mut data_roles = self
            .policy
            .plan_data_role_sync(session.personnel_level(), &effective);
        let user_updated = session.has_user_info_changes();

        if !user_updated && roles_added.is_empty() && roles_removed.is_empty() && data_roles.is_empty()
        {
            info!("Nothing to submit for '{}'", session.username);
            return Ok(SubmitOutcome::NoChanges);
        }

        if !roles_added.is_empty() || !data_roles.to_add.is_empty() {
            let available = self.realm_role_names(realm).await?;
            roles_added = resolve_role_names(&available, &roles_added, realm)?;
            data_roles.to_add = resolve_role_names(&available, &data_roles.to_add, realm)?;
        }

        let mut events = Vec::new();
        let metadata = self.metadata(ctx);

        if user_updated {
            let mut user = self.repository.find_user_by_id(realm, &user_id).await?;
            session.apply_to(&mut user);
            self.repository.update_user(realm, &user).await?;
            events.push(
                DomainEvent::user_security_updated(
                    user_id.clone(),
                    realm.to_string(),
                    user.username.clone(),
                    session.personnel_level(),
                    user.attributes.attributes.clone(),
                )
                .with_metadata(metadata.clone()),
            );
        }

        self.repository
            .remove_user_realm_roles(realm, &user_id, &roles_removed)
            .await?;
        self.repository
            .add_user_realm_roles(realm, &user_id, &roles_added)
            .await?;
        self.repository
            .remove_user_realm_roles(realm, &user_id, &data_roles.to_remove)
            .await?;
        self.repository
            .add_user_realm_roles(realm, &user_id, &data_roles.to_add)
            .await?;

        let username = session.username.trim().to_string();
        if !roles_added.is_empty() {
            events.push(
                DomainEvent::user_roles_added(
                    user_id.clone(),
                    realm.to_string(),
                    username.clone(),
                    roles_added.clone(),
                )
                .with_metadata(metadata.clone()),
            );
        }
        if !roles_removed.is_empty() {
            events.push(
                DomainEvent::user_roles_removed(
                    user_id.clone(),
                    realm.to_string(),
                    username.clone(),
                    roles_removed.clone(),
                )
                .with_metadata(metadata.clone()),
            );
        }
        if !data_roles.is_empty() {
            events.push(
                DomainEvent::data_roles_synchronized(
                    user_id.clone(),
                    realm.to_string(),
                    username,
                    data_roles.to_add.clone(),
                    data_roles.to_remove.clone(),
                )
                .with_metadata(metadata),
            );
        }
        self.publish_all(events).await;

        info!(
            "Submitted '{}': {} roles added, {} removed, data roles +{}/-{}",
            session.username,
            roles_added.len(),
            roles_removed.len(),
            data_roles.to_add.len(),
            data_roles.to_remove.len()
        );

        Ok(SubmitOutcome::Applied {
            user_updated,
            roles_added,
            roles_removed,
            data_roles,
        })
    }

    /// Create the user described by a new-user session and grant its roles.
    ///
    /// Roles are checked against the policy and resolved in the realm before
    /// the user is created.
    #[instrument(skip(self, session, ctx), fields(realm = %realm, username = %session.username))]
    pub async fn create_user(
        &self,
        realm: &str,
        session: &UserEditSession,
        ctx: &SessionContext,
    ) -> DomainResult<EntityId> {
        self.require_manage(ctx, "users:create")?;

        let profile_config = self.profile_config(realm).await;
        session.validate(profile_config.as_ref())?;

        let username = session.username.trim();
        if self
            .repository
            .find_user_by_username(realm, username)
            .await?
            .is_some()
        {
            return Err(DomainError::AlreadyExists {
                entity_type: "User".to_string(),
                identifier: username.to_string(),
            });
        }

        let (to_add, _) = session.role_changes();
        let mut granted: Vec<String> = Vec::new();
        for role in to_add {
            if granted.iter().any(|held| same_role(held, &role)) {
                continue;
            }
            self.policy
                .check_role_assignment(&role, &granted)
                .map_err(|violation| DomainError::PolicyViolation {
                    role_name: role.clone(),
                    violation,
                })?;
            granted.push(role);
        }

        let mut data_roles = self
            .policy
            .plan_data_role_sync(session.personnel_level(), &granted);
        if !granted.is_empty() || !data_roles.to_add.is_empty() {
            let available = self.realm_role_names(realm).await?;
            granted = resolve_role_names(&available, &granted, realm)?;
            data_roles.to_add = resolve_role_names(&available, &data_roles.to_add, realm)?;
        }

        let mut user = session.to_user()?;
        user.id = None;
        let user_id = self.repository.create_user(realm, &user).await?;

        granted.extend(data_roles.to_add.iter().cloned());
        if let Err(e) = self
            .repository
            .add_user_realm_roles(realm, user_id.as_str(), &granted)
            .await
        {
            warn!(
                "User '{}' was created as '{}' but granting {:?} failed: {}",
                username, user_id, granted, e
            );
            return Err(e);
        }

        let metadata = self.metadata(ctx);
        let mut events = vec![DomainEvent::user_created(
            user_id.to_string(),
            realm.to_string(),
            username.to_string(),
            session.personnel_level(),
        )
        .with_metadata(metadata.clone())];
        if !data_roles.to_add.is_empty() {
            events.push(
                DomainEvent::data_roles_synchronized(
                    user_id.to_string(),
                    realm.to_string(),
                    username.to_string(),
                    data_roles.to_add,
                    Vec::new(),
                )
                .with_metadata(metadata),
            );
        }
        self.publish_all(events).await;

        info!("Created user '{}' with ID '{}'", username, user_id);
        Ok(user_id)
    }

    #[instrument(skip(self, ctx), fields(realm = %realm, role_name = %role_name))]
    pub async fn get_role_profile(
        &self,
        realm: &str,
        role_name: &str,
        ctx: &SessionContext,
    ) -> DomainResult<RoleSecurityProfile> {
        self.require_authenticated(ctx)?;

        let role = self
            .repository
            .find_realm_role_by_name(realm, role_name)
            .await?;
        Ok(role.security_profile())
    }

    /// Merge a security profile into a realm role's attributes.
    ///
    /// With `known_menus`, menu ids missing from the tree are dropped first.
    #[instrument(skip(self, profile, known_menus, ctx), fields(realm = %realm, role_name = %role_name))]
    pub async fn update_role_profile(
        &self,
        realm: &str,
        role_name: &str,
        profile: RoleSecurityProfile,
        known_menus: Option<&MenuTree>,
        ctx: &SessionContext,
    ) -> DomainResult<RoleSecurityProfile> {
        self.require_manage(ctx, "roles:manage")?;
        Role::validate_role_name(role_name)?;

        let profile = match known_menus {
            Some(tree) => profile.restricted_to(tree),
            None => profile,
        };

        let mut role = self
            .repository
            .find_realm_role_by_name(realm, role_name)
            .await?;
        role.apply_security_profile(&profile)?;
        self.repository.update_realm_role(realm, &role).await?;

        let stored = role.security_profile();
        self.publish_all(vec![DomainEvent::role_profile_updated(
            role.id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| role.name.clone()),
            realm.to_string(),
            role.name.clone(),
            stored.data_security_level.to_string(),
            stored.menu_ids.clone(),
        )
        .with_metadata(self.metadata(ctx))])
        .await;

        info!(
            "Updated profile of role '{}' to {} with {} menus",
            role_name,
            stored.data_security_level,
            stored.menu_ids.len()
        );
        Ok(stored)
    }
}

/// Map requested role names onto the realm's spelling; exact names win
fn resolve_role_names(
    available: &[String],
    requested: &[String],
    realm: &str,
) -> DomainResult<Vec<String>> {
    requested
        .iter()
        .map(|role| {
            available
                .iter()
                .find(|name| *name == role)
                .or_else(|| available.iter().find(|name| same_role(name, role)))
                .cloned()
                .ok_or_else(|| DomainError::RoleNotFound {
                    role_name: role.clone(),
                    realm: realm.to_string(),
                })
        })
        .collect()
}
