use super::common::*;
use super::menu::MenuTree;
use super::security_level::DataSecurityLevel;
use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Role attribute carrying the data level a role is cleared for
pub const DATA_SECURITY_LEVEL_ATTRIBUTE: &str = "dataSecurityLevel";

/// Role attribute carrying the JSON-encoded menu identifiers a role exposes
pub const MENU_IDS_ATTRIBUTE: &str = "menuIds";

/// Domain entity representing a Keycloak realm role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Option<EntityId>,
    pub name: String,
    pub description: Option<String>,
    pub composite: bool,
    pub client_role: bool,
    pub container_id: Option<String>,
    pub attributes: Attributes,
    pub timestamps: Timestamps,
}

impl Role {
    /// Create a new realm role
    pub fn new_realm_role(name: String) -> DomainResult<Self> {
        Self::validate_role_name(&name)?;

        Ok(Self {
            id: None,
            name,
            description: None,
            composite: false,
            client_role: false,
            container_id: None,
            attributes: Attributes::new(),
            timestamps: Timestamps::default(),
        })
    }

    /// Role names are limited to ASCII letters, digits, `_` and `-`.
    pub fn validate_role_name(name: &str) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "name".to_string(),
                message: "Role name cannot be empty".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(DomainError::Validation {
                field: "name".to_string(),
                message: "Role name can only contain letters, digits, hyphens and underscores"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Read the console-managed security profile from the role attributes
    pub fn security_profile(&self) -> RoleSecurityProfile {
        RoleSecurityProfile::from_attributes(&self.attributes)
    }

    /// Merge a security profile into the existing attributes
    pub fn apply_security_profile(&mut self, profile: &RoleSecurityProfile) -> DomainResult<()> {
        profile.apply_to(&mut self.attributes)?;
        self.timestamps.touch();
        Ok(())
    }
}

/// Policy category of a role, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleCategory {
    DataRole,
    GovernanceRole,
    ApplicationAdminRole,
    Other,
}

impl RoleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleCategory::DataRole => "data_role",
            RoleCategory::GovernanceRole => "governance_role",
            RoleCategory::ApplicationAdminRole => "application_admin_role",
            RoleCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Console-managed attributes of a role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSecurityProfile {
    pub data_security_level: DataSecurityLevel,
    pub menu_ids: Vec<String>,
}

impl RoleSecurityProfile {
    pub fn from_attributes(attributes: &Attributes) -> Self {
        let data_security_level = attributes
            .get_single_attribute(DATA_SECURITY_LEVEL_ATTRIBUTE)
            .and_then(|level| DataSecurityLevel::parse(level))
            .unwrap_or_default();

        let menu_ids = attributes
            .get_single_attribute(MENU_IDS_ATTRIBUTE)
            .map(|raw| parse_menu_ids(raw))
            .unwrap_or_default();

        Self {
            data_security_level,
            menu_ids,
        }
    }

    /// Write the profile over `attributes`, leaving unrelated keys alone.
    ///
    /// An empty menu selection removes the `menuIds` attribute.
    pub fn apply_to(&self, attributes: &mut Attributes) -> DomainResult<()> {
        attributes.set_attribute(
            DATA_SECURITY_LEVEL_ATTRIBUTE.to_string(),
            vec![self.data_security_level.as_str().to_string()],
        );

        let menu_ids: Vec<&str> = self
            .menu_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();

        if menu_ids.is_empty() {
            attributes.remove_attribute(MENU_IDS_ATTRIBUTE);
        } else {
            attributes.set_attribute(
                MENU_IDS_ATTRIBUTE.to_string(),
                vec![serde_json::to_string(&menu_ids)?],
            );
        }

        Ok(())
    }

    /// Keep only menu ids present in `tree`
    pub fn restricted_to(mut self, tree: &MenuTree) -> Self {
        self.menu_ids = tree.retain_known(&self.menu_ids);
        self
    }
}

fn parse_menu_ids(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|value| match value {
                serde_json::Value::String(id) => Some(id),
                serde_json::Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .filter(|id| !id.trim().is_empty())
            .collect(),
        Err(e) => {
            warn!("Ignoring malformed {} attribute: {}", MENU_IDS_ATTRIBUTE, e);
            Vec::new()
        }
    }
}

/// Realm role names held by a user, as reported by the role-mapping endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    pub realm_roles: Vec<String>,
}

impl RoleMapping {
    pub fn new(realm_roles: Vec<String>) -> Self {
        Self { realm_roles }
    }

    pub fn contains(&self, role_name: &str) -> bool {
        self.realm_roles.iter().any(|role| role == role_name)
    }
}
