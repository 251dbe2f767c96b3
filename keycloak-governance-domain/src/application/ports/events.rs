use crate::domain::entities::PersonnelSecurityLevel;
use crate::domain::errors::DomainError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Event publisher port for governance events handed off to audit
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single domain event
    async fn publish(&self, event: DomainEvent) -> Result<(), EventError>;

    /// Publish multiple domain events
    async fn publish_batch(&self, events: Vec<DomainEvent>) -> Result<(), EventError>;

    /// Flush any pending events
    async fn flush(&self) -> Result<(), EventError>;
}

/// Something that happened to a user, role or operator session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub event_type: EventType,
    pub aggregate_id: String,
    pub aggregate_type: AggregateType,
    pub realm: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: EventMetadata,
    pub data: EventData,
}

impl DomainEvent {
    pub fn new(
        event_type: EventType,
        aggregate_id: String,
        aggregate_type: AggregateType,
        realm: String,
        data: EventData,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type,
            aggregate_id,
            aggregate_type,
            realm,
            timestamp: Utc::now(),
            metadata: EventMetadata::default(),
            data,
        }
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    UserCreated,
    UserSecurityUpdated,
    UserRolesAdded,
    UserRolesRemoved,
    DataRolesSynchronized,
    RoleProfileUpdated,
    OperatorSignedIn,
    OperatorSignedOut,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::UserCreated => "UserCreated",
            EventType::UserSecurityUpdated => "UserSecurityUpdated",
            EventType::UserRolesAdded => "UserRolesAdded",
            EventType::UserRolesRemoved => "UserRolesRemoved",
            EventType::DataRolesSynchronized => "DataRolesSynchronized",
            EventType::RoleProfileUpdated => "RoleProfileUpdated",
            EventType::OperatorSignedIn => "OperatorSignedIn",
            EventType::OperatorSignedOut => "OperatorSignedOut",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AggregateType {
    User,
    Role,
    Session,
}

/// Event metadata containing contextual information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
    pub request_id: Option<String>,
    pub additional: HashMap<String, String>,
}

impl EventMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Operator who caused the event
    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn add_additional(mut self, key: String, value: String) -> Self {
        self.additional.insert(key, value);
        self
    }
}

/// Event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventData {
    UserCreated {
        username: String,
        personnel_level: PersonnelSecurityLevel,
    },
    UserSecurityUpdated {
        username: String,
        personnel_level: PersonnelSecurityLevel,
        attributes: HashMap<String, Vec<String>>,
    },
    UserRolesAdded {
        username: String,
        roles: Vec<String>,
    },
    UserRolesRemoved {
        username: String,
        roles: Vec<String>,
    },
    DataRolesSynchronized {
        username: String,
        added: Vec<String>,
        removed: Vec<String>,
    },
    RoleProfileUpdated {
        role_name: String,
        data_security_level: String,
        menu_ids: Vec<String>,
    },
    OperatorSignedIn {
        username: String,
    },
    OperatorSignedOut {
        username: String,
    },
}

/// Event processing errors
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Event serialization failed: {message}")]
    SerializationFailed { message: String },

    #[error("Event publishing failed: {message}")]
    PublishFailed { message: String },
}

impl From<EventError> for DomainError {
    fn from(err: EventError) -> Self {
        DomainError::ExternalService {
            service: "events".to_string(),
            message: err.to_string(),
        }
    }
}

/// Helper functions for creating governance events
impl DomainEvent {
    pub fn user_created(
        user_id: String,
        realm: String,
        username: String,
        personnel_level: PersonnelSecurityLevel,
    ) -> Self {
        Self::new(
            EventType::UserCreated,
            user_id,
            AggregateType::User,
            realm,
            EventData::UserCreated {
                username,
                personnel_level,
            },
        )
    }

    pub fn user_security_updated(
        user_id: String,
        realm: String,
        username: String,
        personnel_level: PersonnelSecurityLevel,
        attributes: HashMap<String, Vec<String>>,
    ) -> Self {
        Self::new(
            EventType::UserSecurityUpdated,
            user_id,
            AggregateType::User,
            realm,
            EventData::UserSecurityUpdated {
                username,
                personnel_level,
                attributes,
            },
        )
    }

    pub fn user_roles_added(
        user_id: String,
        realm: String,
        username: String,
        roles: Vec<String>,
    ) -> Self {
        Self::new(
            EventType::UserRolesAdded,
            user_id,
            AggregateType::User,
            realm,
            EventData::UserRolesAdded { username, roles },
        )
    }

    pub fn user_roles_removed(
        user_id: String,
        realm: String,
        username: String,
        roles: Vec<String>,
    ) -> Self {
        Self::new(
            EventType::UserRolesRemoved,
            user_id,
            AggregateType::User,
            realm,
            EventData::UserRolesRemoved { username, roles },
        )
    }

    pub fn data_roles_synchronized(
        user_id: String,
        realm: String,
        username: String,
        added: Vec<String>,
        removed: Vec<String>,
    ) -> Self {
        Self::new(
            EventType::DataRolesSynchronized,
            user_id,
            AggregateType::User,
            realm,
            EventData::DataRolesSynchronized {
                username,
                added,
                removed,
            },
        )
    }

    pub fn role_profile_updated(
        role_id: String,
        realm: String,
        role_name: String,
        data_security_level: String,
        menu_ids: Vec<String>,
    ) -> Self {
        Self::new(
            EventType::RoleProfileUpdated,
            role_id,
            AggregateType::Role,
            realm,
            EventData::RoleProfileUpdated {
                role_name,
                data_security_level,
                menu_ids,
            },
        )
    }

    pub fn operator_signed_in(user_id: String, realm: String, username: String) -> Self {
        Self::new(
            EventType::OperatorSignedIn,
            user_id,
            AggregateType::Session,
            realm,
            EventData::OperatorSignedIn { username },
        )
    }

    pub fn operator_signed_out(user_id: String, realm: String, username: String) -> Self {
        Self::new(
            EventType::OperatorSignedOut,
            user_id,
            AggregateType::Session,
            realm,
            EventData::OperatorSignedOut { username },
        )
    }
}
