//! Editing state for a single user form.
//!
//! A [`UserEditSession`] is opened from a user and their realm roles, edited in
//! memory, and submitted by the security attribute service. It never talks to
//! Keycloak itself.

use crate::domain::entities::{
    DataSecurityLevel, EntityId, PersonnelSecurityLevel, RoleCategory, SecurityAttributes, User,
    UserAttributeKey, UserProfileConfig,
};
use crate::domain::errors::{AssignmentViolation, DomainError, DomainResult};
use crate::domain::policy::{same_role, DataRoleSync, GovernancePolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Profile attributes edited through dedicated form fields
const BASIC_PROFILE_FIELDS: [&str; 4] = ["username", "email", "firstName", "lastName"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleChangeKind {
    Add,
    Remove,
}

/// Pending manual role change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChange {
    pub role: String,
    pub kind: RoleChangeKind,
}

/// Values the session was opened with
#[derive(Debug, Clone, PartialEq, Eq)]
struct UserSnapshot {
    username: String,
    full_name: String,
    email: String,
    enabled: bool,
    email_verified: bool,
    attributes: SecurityAttributes,
    roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UserEditSession {
    user_id: Option<EntityId>,
    original: UserSnapshot,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub enabled: bool,
    pub email_verified: bool,
    attributes: SecurityAttributes,
    roles: Vec<String>,
    role_changes: Vec<RoleChange>,
    policy: GovernancePolicy,
}

impl UserEditSession {
    pub fn for_new_user() -> Self {
        let attributes = SecurityAttributes {
            personnel_level: Some(PersonnelSecurityLevel::default()),
            ..SecurityAttributes::default()
        };

        Self {
            user_id: None,
            original: UserSnapshot {
                username: String::new(),
                full_name: String::new(),
                email: String::new(),
                enabled: true,
                email_verified: false,
                attributes: attributes.clone(),
                roles: Vec::new(),
            },
            username: String::new(),
            full_name: String::new(),
            email: String::new(),
            enabled: true,
            email_verified: false,
            attributes,
            roles: Vec::new(),
            role_changes: Vec::new(),
            policy: GovernancePolicy::default(),
        }
    }

    /// Open a session over an existing user and the realm roles they hold.
    ///
    /// Users without a recognizable stored level start at the default level.
    pub fn for_existing(user: &User, roles: Vec<String>) -> Self {
        let mut attributes = user.security_attributes();
        attributes.personnel_level = Some(attributes.personnel_level.unwrap_or_default());
        let full_name = user.full_name().unwrap_or_default().to_string();
        let email = user.email.clone().unwrap_or_default();

        Self {
            user_id: user.id.clone(),
            original: UserSnapshot {
                username: user.username.clone(),
                full_name: full_name.clone(),
                email: email.clone(),
                enabled: user.enabled,
                email_verified: user.email_verified,
                attributes: attributes.clone(),
                roles: roles.clone(),
            },
            username: user.username.clone(),
            full_name,
            email,
            enabled: user.enabled,
            email_verified: user.email_verified,
            attributes,
            roles,
            role_changes: Vec::new(),
            policy: GovernancePolicy::default(),
        }
    }

    /// Use a configured policy instead of the built-in role catalog
    pub fn with_policy(mut self, policy: GovernancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn user_id(&self) -> Option<&EntityId> {
        self.user_id.as_ref()
    }

    pub fn set_user_id(&mut self, user_id: EntityId) {
        self.user_id = Some(user_id);
    }

    pub fn personnel_level(&self) -> PersonnelSecurityLevel {
        self.attributes.personnel_level.unwrap_or_default()
    }

    pub fn data_levels(&self) -> BTreeSet<DataSecurityLevel> {
        self.personnel_level().data_levels()
    }

    pub fn security_attributes(&self) -> &SecurityAttributes {
        &self.attributes
    }

    pub fn current_roles(&self) -> &[String] {
        &self.roles
    }

    pub fn set_personnel_level(&mut self, level: PersonnelSecurityLevel) {
        self.attributes.personnel_level = Some(level);
    }

    /// Set `key` to a single trimmed value; a blank value clears it.
    ///
    /// Level aliases route through [`Self::set_personnel_level`]. `data_levels`
    /// is derived and rejected. Unrecognized keys are kept as profile
    /// attributes and checked by [`Self::validate`].
    pub fn set_single_attribute(&mut self, key: &str, value: &str) -> DomainResult<()> {
        let value = value.trim();
        let text = Some(value).filter(|v| !v.is_empty()).map(str::to_string);

        match UserAttributeKey::parse(key) {
            Some(UserAttributeKey::DataLevels) => Err(DomainError::Validation {
                field: key.to_string(),
                message: "Data levels are derived from the personnel security level".to_string(),
            }),
            Some(
                UserAttributeKey::PersonnelSecurityLevel
                | UserAttributeKey::PersonSecurityLevel
                | UserAttributeKey::PersonLevel,
            ) => {
                let level =
                    PersonnelSecurityLevel::parse(value).ok_or_else(|| DomainError::Validation {
                        field: key.to_string(),
                        message: format!("Unknown personnel security level: {value}"),
                    })?;
                self.set_personnel_level(level);
                Ok(())
            }
            Some(UserAttributeKey::Department) => {
                self.attributes.department = text;
                Ok(())
            }
            Some(UserAttributeKey::Position) => {
                self.attributes.position = text;
                Ok(())
            }
            Some(UserAttributeKey::FullName) => {
                self.attributes.full_name = text;
                Ok(())
            }
            None if key.trim().is_empty() => Err(DomainError::Validation {
                field: "attributes".to_string(),
                message: "Attribute name cannot be empty".to_string(),
            }),
            None => {
                match text {
                    Some(value) => {
                        self.attributes.extra.insert(key.to_string(), vec![value]);
                    }
                    None => {
                        self.attributes.extra.remove(key);
                    }
                }
                Ok(())
            }
        }
    }

    /// Grant or revoke `role`, recording the change for submission.
    ///
    /// Data roles are rejected without touching any state. Granting checks the
    /// governance / application admin exclusion against the roles held now.
    pub fn toggle_role(&mut self, role: &str) -> Result<RoleChangeKind, AssignmentViolation> {
        if self.policy.classify_role(role) == RoleCategory::DataRole {
            return Err(AssignmentViolation::DataRoleManaged);
        }

        if let Some(held) = self.held_name(role) {
            self.roles.retain(|name| *name != held);
            self.record(&held, RoleChangeKind::Remove);
            Ok(RoleChangeKind::Remove)
        } else {
            self.policy.check_role_assignment(role, self.roles.as_slice())?;
            self.roles.push(role.to_string());
            self.record(role, RoleChangeKind::Add);
            Ok(RoleChangeKind::Add)
        }
    }

    /// Whether the user holds `role`; Keycloak role names match without case
    pub fn holds(&self, role: &str) -> bool {
        self.held_name(role).is_some()
    }

    fn held_name(&self, role: &str) -> Option<String> {
        self.roles.iter().find(|held| same_role(held, role)).cloned()
    }

    /// A toggle cancels a pending opposite change; it only becomes pending
    /// when it moves the role away from its original state.
    fn record(&mut self, role: &str, kind: RoleChangeKind) {
        self.role_changes.retain(|change| !same_role(&change.role, role));

        let originally_held = self.original.roles.iter().any(|held| same_role(held, role));
        let differs = match kind {
            RoleChangeKind::Add => !originally_held,
            RoleChangeKind::Remove => originally_held,
        };
        if differs {
            self.role_changes.push(RoleChange {
                role: role.to_string(),
                kind,
            });
        }
    }

    /// Roles from `available` the editor may offer for granting
    pub fn assignable_roles<S: AsRef<str>>(&self, available: &[S]) -> Vec<String> {
        available
            .iter()
            .map(|role| role.as_ref())
            .filter(|role| !self.holds(role))
            .filter(|role| self.policy.classify_role(role) != RoleCategory::DataRole)
            .map(str::to_string)
            .collect()
    }

    pub fn pending_role_changes(&self) -> &[RoleChange] {
        &self.role_changes
    }

    /// Pending manual changes as `(to_add, to_remove)`
    pub fn role_changes(&self) -> (Vec<String>, Vec<String>) {
        let by_kind = |kind: RoleChangeKind| {
            self.role_changes
                .iter()
                .filter(|change| change.kind == kind)
                .map(|change| change.role.clone())
                .collect::<Vec<_>>()
        };
        (by_kind(RoleChangeKind::Add), by_kind(RoleChangeKind::Remove))
    }

    /// Data role changes that keep the held roles aligned with the level
    pub fn data_role_sync(&self) -> DataRoleSync {
        self.policy
            .plan_data_role_sync(self.personnel_level(), self.roles.as_slice())
    }

    /// Attribute bag for Keycloak, with level aliases and data levels in sync
    pub fn attributes_payload(&self) -> HashMap<String, Vec<String>> {
        self.attributes.to_raw()
    }

    pub fn has_user_info_changes(&self) -> bool {
        self.username != self.original.username
            || self.full_name != self.original.full_name
            || self.email != self.original.email
            || self.enabled != self.original.enabled
            || self.email_verified != self.original.email_verified
            || self.attributes != self.original.attributes
    }

    pub fn has_changes(&self) -> bool {
        self.has_user_info_changes() || !self.role_changes.is_empty()
    }

    /// Check the form before submission.
    ///
    /// Required user-profile attributes are looked up in the attribute payload,
    /// except for the fields the form edits directly. Free-form attributes the
    /// user did not already have must be declared by the user profile.
    pub fn validate(&self, profile_config: Option<&UserProfileConfig>) -> DomainResult<()> {
        User::validate_username(self.username.trim())?;

        if self.full_name.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "fullName".to_string(),
                message: "Full name cannot be empty".to_string(),
            });
        }

        if !self.email.trim().is_empty() {
            User::validate_email(self.email.trim())?;
        }

        if let Some(config) = profile_config {
            let payload = self.attributes_payload();
            for attribute in config.attributes.iter().filter(|a| a.required) {
                if BASIC_PROFILE_FIELDS.contains(&attribute.name.as_str()) {
                    continue;
                }
                let present = payload
                    .get(&attribute.name)
                    .is_some_and(|values| values.iter().any(|v| !v.trim().is_empty()));
                if !present {
                    return Err(DomainError::Validation {
                        field: attribute.name.clone(),
                        message: format!("{} is required", attribute.label()),
                    });
                }
            }
        }

        let declared: HashSet<&str> = profile_config
            .map(|config| {
                config
                    .custom_attributes()
                    .map(|attribute| attribute.name.as_str())
                    .collect()
            })
            .unwrap_or_default();
        let undeclared = self.attributes.extra.keys().find(|key| {
            !self.original.attributes.extra.contains_key(*key) && !declared.contains(key.as_str())
        });
        if let Some(key) = undeclared {
            return Err(DomainError::Validation {
                field: key.clone(),
                message: format!("'{key}' is not an attribute of the user profile"),
            });
        }

        Ok(())
    }

    /// Build the user representation to send to Keycloak
    pub fn to_user(&self) -> DomainResult<User> {
        let mut user = User::new(self.username.trim().to_string())?;
        user.id = self.user_id.clone();
        self.apply_to(&mut user);
        Ok(user)
    }

    /// Overlay the edited fields on a stored user, keeping everything else
    pub fn apply_to(&self, user: &mut User) {
        user.username = self.username.trim().to_string();
        user.first_name = Some(self.full_name.trim().to_string());
        user.email = Some(self.email.trim())
            .filter(|email| !email.is_empty())
            .map(str::to_string);
        user.enabled = self.enabled;
        user.email_verified = self.email_verified;
        user.set_attributes(self.attributes_payload());
    }
}
