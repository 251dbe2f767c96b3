use keycloak_governance_domain::{
    domain::entities::*, domain::session::UserEditSession, GovernancePolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Request and response bodies of the governance API

#[derive(Debug, Clone, Deserialize)]
pub struct DeriveDataLevelsRequest {
    pub personnel_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeriveDataLevelsResponse {
    pub personnel_level: String,
    pub data_levels: BTreeSet<DataSecurityLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleCategoryResponse {
    pub role_name: String,
    pub category: RoleCategory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanAssignRequest {
    pub candidate: String,
    #[serde(default)]
    pub current_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanAssignResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeAttributesRequest {
    #[serde(default)]
    pub attributes: HashMap<String, Vec<String>>,
    pub personnel_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeAttributesResponse {
    pub attributes: HashMap<String, Vec<String>>,
    pub personnel_level: Option<PersonnelSecurityLevel>,
    pub data_levels: BTreeSet<DataSecurityLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleView {
    pub name: String,
    pub category: RoleCategory,
}

/// Security view of one user as shown by the console editor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSecurityView {
    pub user_id: Option<String>,
    pub username: String,
    pub full_name: String,
    pub personnel_level: PersonnelSecurityLevel,
    pub data_levels: BTreeSet<DataSecurityLevel>,
    pub attributes: HashMap<String, Vec<String>>,
    pub roles: Vec<RoleView>,
    pub assignable_roles: Vec<String>,
}

impl UserSecurityView {
    pub fn new(
        session: &UserEditSession,
        policy: &GovernancePolicy,
        assignable_roles: Vec<String>,
    ) -> Self {
        Self {
            user_id: session.user_id().map(|id| id.to_string()),
            username: session.username.clone(),
            full_name: session.full_name.clone(),
            personnel_level: session.personnel_level(),
            data_levels: session.data_levels(),
            attributes: session.attributes_payload(),
            roles: session
                .current_roles()
                .iter()
                .map(|name| RoleView {
                    name: name.clone(),
                    category: policy.classify_role(name),
                })
                .collect(),
            assignable_roles,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserSecurityRequest {
    pub personnel_level: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub add_roles: Vec<String>,
    #[serde(default)]
    pub remove_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub personnel_level: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleProfileRequest {
    #[serde(default)]
    pub data_security_level: DataSecurityLevel,
    #[serde(default)]
    pub menu_ids: Vec<String>,
    /// When present, menu ids missing from this tree are dropped
    pub menu_tree: Option<Vec<MenuNode>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub realm: String,
    pub authenticated: bool,
    pub username: Option<String>,
    pub admin_role: Option<String>,
    pub roles: Vec<String>,
}
