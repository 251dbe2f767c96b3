/*!
# Keycloak Governance Domain

Security attribute policy for a Keycloak governance console, built with hexagonal
architecture principles.

This crate provides:
- The pure security attribute policy: personnel to data level derivation, role
  classification and mutual exclusion rules
- Typed user security attributes and role security profiles
- A user edit session that tracks pending attribute and role changes
- Port definitions for Keycloak, tokens, configuration and audit events
- Application services and infrastructure adapters

## Architecture

```text
┌─────────────────────────────────────────────────────────────┐
│                    Primary Adapters                         │
├─────────────────────────────────────────────────────────────┤
│                 HTTP Server (Axum Handlers)                 │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│                   Application Layer                         │
├─────────────────────────────────────────────────────────────┤
│  • SecurityAttributeService    • SessionService             │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│            Domain Layer (Policy, Session, Ports)            │
├─────────────────────────────────────────────────────────────┤
│  • GovernancePolicy            • UserEditSession            │
│  • IdentityRepository          • TokenManager               │
│  • ConfigurationPort           • EventPublisher             │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│              Infrastructure Layer (Adapters)                │
├─────────────────────────────────────────────────────────────┤
│  • KeycloakRestAdapter         • KeycloakTokenManager       │
│  • EnvConfigurationAdapter     • MemoryEventPublisher       │
└─────────────────────────────────────────────────────────────┘
```

## Usage

```rust,ignore
use keycloak_governance_domain::{can_assign_role, derive_data_levels, DataSecurityLevel};

let levels = derive_data_levels("SECRET");
assert!(levels.contains(&DataSecurityLevel::DataSecret));
assert!(!can_assign_role("SYSADMIN", &["APPADMIN"]));
```
*/

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::ports::*;
pub use application::services::*;
pub use domain::entities::*;
pub use domain::errors::*;
pub use domain::policy::{
    can_assign_role, can_remove_role, check_role_assignment, classify_role,
    plan_data_role_sync, same_role, DataRoleSync, GovernancePolicy, RoleCatalog,
};
pub use domain::session::*;
