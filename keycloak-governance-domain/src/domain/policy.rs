//! Security attribute policy.
//!
//! Pure functions deciding which data levels a clearance reaches, how a role
//! name is categorized, and whether a role may be granted next to the roles a
//! user already holds. Nothing here performs I/O or fails loudly: unknown
//! levels and role names fall through to the most restrictive answer.

use crate::domain::entities::{DataSecurityLevel, PersonnelSecurityLevel, RoleCategory};
use crate::domain::errors::AssignmentViolation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub use crate::domain::entities::derive_data_levels;

/// Console administrator roles, in the order an operator's admin role is resolved
pub const DEFAULT_GOVERNANCE_ROLES: [&str; 3] = ["SYSADMIN", "AUTHADMIN", "AUDITADMIN"];

pub const DEFAULT_APPLICATION_ADMIN_ROLES: [&str; 4] =
    ["APPADMIN", "APP_ADMIN", "APPLICATION_ADMIN", "OPADMIN"];

fn canonical(role_name: &str) -> String {
    role_name.trim().to_ascii_uppercase()
}

/// Whether two role names refer to the same role, ignoring case and padding
pub fn same_role(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Role name lists the classifier matches against.
///
/// Data roles are always the data level names and are not configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCatalog {
    governance_roles: Vec<String>,
    application_admin_roles: Vec<String>,
}

impl RoleCatalog {
    /// Build a catalog; an empty list keeps the built-in defaults for that category.
    pub fn new<G, A>(governance_roles: G, application_admin_roles: A) -> Self
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        let normalize = |names: Vec<String>, defaults: &[&str]| {
            let mut seen = BTreeSet::new();
            let names: Vec<String> = names
                .into_iter()
                .filter(|name| !name.is_empty() && seen.insert(name.clone()))
                .collect();
            if names.is_empty() {
                defaults.iter().map(|name| name.to_string()).collect()
            } else {
                names
            }
        };

        Self {
            governance_roles: normalize(
                governance_roles
                    .into_iter()
                    .map(|name| canonical(name.as_ref()))
                    .collect(),
                &DEFAULT_GOVERNANCE_ROLES[..],
            ),
            application_admin_roles: normalize(
                application_admin_roles
                    .into_iter()
                    .map(|name| canonical(name.as_ref()))
                    .collect(),
                &DEFAULT_APPLICATION_ADMIN_ROLES[..],
            ),
        }
    }

    pub fn governance_roles(&self) -> &[String] {
        &self.governance_roles
    }

    pub fn application_admin_roles(&self) -> &[String] {
        &self.application_admin_roles
    }

    /// Data role names, ascending by level
    pub fn data_roles(&self) -> impl Iterator<Item = &'static str> {
        DataSecurityLevel::ALL.into_iter().map(|level| level.role_name())
    }

    pub fn classify(&self, role_name: &str) -> RoleCategory {
        let name = canonical(role_name);

        if DataSecurityLevel::parse(&name).is_some() {
            RoleCategory::DataRole
        } else if self.governance_roles.contains(&name) {
            RoleCategory::GovernanceRole
        } else if self.application_admin_roles.contains(&name) {
            RoleCategory::ApplicationAdminRole
        } else {
            RoleCategory::Other
        }
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_GOVERNANCE_ROLES, DEFAULT_APPLICATION_ADMIN_ROLES)
    }
}

/// Role changes that make a user's data roles match their clearance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRoleSync {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl DataRoleSync {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Assignment policy bound to a role catalog
#[derive(Debug, Clone, Default)]
pub struct GovernancePolicy {
    catalog: RoleCatalog,
}

impl GovernancePolicy {
    pub fn new(catalog: RoleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn classify_role(&self, role_name: &str) -> RoleCategory {
        self.catalog.classify(role_name)
    }

    /// Explain why `candidate` may not be granted next to `current_roles`.
    ///
    /// Data roles are never assignable by hand. Governance and application
    /// admin roles exclude each other; the first conflicting held role is reported.
    pub fn check_role_assignment<S: AsRef<str>>(
        &self,
        candidate: &str,
        current_roles: &[S],
    ) -> Result<(), AssignmentViolation> {
        let conflicting = |category: RoleCategory| {
            current_roles
                .iter()
                .map(|role| role.as_ref())
                .find(|held| self.classify_role(held) == category)
                .map(str::to_string)
        };

        match self.classify_role(candidate) {
            RoleCategory::DataRole => Err(AssignmentViolation::DataRoleManaged),
            RoleCategory::GovernanceRole => {
                match conflicting(RoleCategory::ApplicationAdminRole) {
                    Some(held) => Err(AssignmentViolation::GovernanceConflict { held }),
                    None => Ok(()),
                }
            }
            RoleCategory::ApplicationAdminRole => match conflicting(RoleCategory::GovernanceRole) {
                Some(held) => Err(AssignmentViolation::ApplicationAdminConflict { held }),
                None => Ok(()),
            },
            RoleCategory::Other => Ok(()),
        }
    }

    pub fn can_assign_role<S: AsRef<str>>(&self, candidate: &str, current_roles: &[S]) -> bool {
        self.check_role_assignment(candidate, current_roles).is_ok()
    }

    /// Data roles follow the clearance and cannot be removed by hand.
    pub fn can_remove_role(&self, role_name: &str) -> bool {
        self.classify_role(role_name) != RoleCategory::DataRole
    }

    /// Changes that bring the held data roles in line with `level`.
    ///
    /// Held data roles outside the derived set are removed under the name they
    /// are held as; missing ones are added under their canonical name.
    pub fn plan_data_role_sync<S: AsRef<str>>(
        &self,
        level: PersonnelSecurityLevel,
        current_roles: &[S],
    ) -> DataRoleSync {
        let target = level.data_levels();
        let mut held = BTreeSet::new();
        let mut to_remove = Vec::new();

        for role in current_roles.iter().map(|role| role.as_ref()) {
            if self.classify_role(role) != RoleCategory::DataRole {
                continue;
            }
            match DataSecurityLevel::parse(role) {
                Some(data_level) if target.contains(&data_level) => {
                    held.insert(data_level);
                }
                _ => to_remove.push(role.to_string()),
            }
        }

        let to_add = target
            .difference(&held)
            .map(|data_level| data_level.role_name().to_string())
            .collect();

        DataRoleSync { to_add, to_remove }
    }
}

fn builtin_policy() -> &'static GovernancePolicy {
    static POLICY: OnceLock<GovernancePolicy> = OnceLock::new();
    POLICY.get_or_init(GovernancePolicy::default)
}

/// Categorize a role name against the built-in catalog
pub fn classify_role(role_name: &str) -> RoleCategory {
    builtin_policy().classify_role(role_name)
}

pub fn check_role_assignment<S: AsRef<str>>(
    candidate: &str,
    current_roles: &[S],
) -> Result<(), AssignmentViolation> {
    builtin_policy().check_role_assignment(candidate, current_roles)
}

pub fn can_assign_role<S: AsRef<str>>(candidate: &str, current_roles: &[S]) -> bool {
    builtin_policy().can_assign_role(candidate, current_roles)
}

pub fn can_remove_role(role_name: &str) -> bool {
    builtin_policy().can_remove_role(role_name)
}

pub fn plan_data_role_sync<S: AsRef<str>>(
    level: PersonnelSecurityLevel,
    current_roles: &[S],
) -> DataRoleSync {
    builtin_policy().plan_data_role_sync(level, current_roles)
}
