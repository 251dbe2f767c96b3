use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for entities
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp information for entities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_timestamp: Option<DateTime<Utc>>,
    pub updated_timestamp: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_timestamp: Some(now),
            updated_timestamp: Some(now),
        }
    }

    pub fn touch(&mut self) {
        self.updated_timestamp = Some(Utc::now());
    }
}

/// Raw Keycloak attribute bag as it travels over the wire.
///
/// Typed views such as [`super::SecurityAttributes`] are built on top of this.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    pub attributes: HashMap<String, Vec<String>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, key: String, values: Vec<String>) {
        self.attributes.insert(key, values);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Vec<String>> {
        self.attributes.get(key)
    }

    pub fn get_single_attribute(&self, key: &str) -> Option<&String> {
        self.attributes.get(key)?.first()
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Vec<String>> {
        self.attributes.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl From<HashMap<String, Vec<String>>> for Attributes {
    fn from(attributes: HashMap<String, Vec<String>>) -> Self {
        Self { attributes }
    }
}
