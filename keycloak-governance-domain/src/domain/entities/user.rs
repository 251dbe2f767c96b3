use super::common::*;
use super::security_level::{DataSecurityLevel, PersonnelSecurityLevel};
use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Domain entity representing a Keycloak user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Option<EntityId>,
    pub username: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub enabled: bool,
    pub timestamps: Timestamps,
    pub attributes: Attributes,
}

impl User {
    /// Create a new user with required fields
    pub fn new(username: String) -> DomainResult<Self> {
        Self::validate_username(&username)?;

        Ok(Self {
            id: None,
            username,
            email: None,
            email_verified: false,
            first_name: None,
            last_name: None,
            enabled: true,
            timestamps: Timestamps::now(),
            attributes: Attributes::new(),
        })
    }

    /// Validate username according to business rules
    pub fn validate_username(username: &str) -> DomainResult<()> {
        if username.trim().is_empty() {
            return Err(DomainError::Validation {
                field: "username".to_string(),
                message: "Username cannot be empty".to_string(),
            });
        }

        if username.chars().count() > 100 {
            return Err(DomainError::Validation {
                field: "username".to_string(),
                message: "Username cannot exceed 100 characters".to_string(),
            });
        }

        if username.chars().any(char::is_whitespace) {
            return Err(DomainError::Validation {
                field: "username".to_string(),
                message: "Username cannot contain whitespace".to_string(),
            });
        }

        Ok(())
    }

    /// Validate email address
    pub fn validate_email(email: &str) -> DomainResult<()> {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
            return Err(DomainError::Validation {
                field: "email".to_string(),
                message: format!("Invalid email address: {email}"),
            });
        }

        Ok(())
    }

    /// The console stores the person's full name in `firstName`.
    pub fn full_name(&self) -> Option<&str> {
        self.first_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                self.attributes
                    .get_single_attribute(UserAttributeKey::FullName.as_str())
                    .map(String::as_str)
            })
            .or(self.last_name.as_deref())
    }

    /// Typed view over the recognized security attributes
    pub fn security_attributes(&self) -> SecurityAttributes {
        SecurityAttributes::from_raw(&self.attributes.attributes)
    }

    pub fn set_attributes(&mut self, attributes: HashMap<String, Vec<String>>) {
        self.attributes = Attributes::from(attributes);
        self.timestamps.touch();
    }
}

/// Attribute keys with a fixed meaning for the governance console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserAttributeKey {
    PersonnelSecurityLevel,
    PersonSecurityLevel,
    PersonLevel,
    DataLevels,
    Department,
    Position,
    FullName,
}

impl UserAttributeKey {
    pub const ALL: [UserAttributeKey; 7] = [
        UserAttributeKey::PersonnelSecurityLevel,
        UserAttributeKey::PersonSecurityLevel,
        UserAttributeKey::PersonLevel,
        UserAttributeKey::DataLevels,
        UserAttributeKey::Department,
        UserAttributeKey::Position,
        UserAttributeKey::FullName,
    ];

    /// Keys that carry the personnel level, in lookup priority order
    pub const LEVEL_KEYS: [UserAttributeKey; 3] = [
        UserAttributeKey::PersonnelSecurityLevel,
        UserAttributeKey::PersonSecurityLevel,
        UserAttributeKey::PersonLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserAttributeKey::PersonnelSecurityLevel => "personnel_security_level",
            UserAttributeKey::PersonSecurityLevel => "person_security_level",
            UserAttributeKey::PersonLevel => "person_level",
            UserAttributeKey::DataLevels => "data_levels",
            UserAttributeKey::Department => "department",
            UserAttributeKey::Position => "position",
            UserAttributeKey::FullName => "fullname",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == key)
    }
}

impl std::fmt::Display for UserAttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Profile attribute names that never render as free-form user profile fields
pub const RESERVED_PROFILE_ATTRIBUTE_NAMES: [&str; 12] = [
    "username",
    "email",
    "firstName",
    "lastName",
    "fullName",
    "locale",
    "department",
    "position",
    "person_security_level",
    "personnel_security_level",
    "person_level",
    "data_levels",
];

pub fn is_reserved_profile_attribute(name: &str) -> bool {
    RESERVED_PROFILE_ATTRIBUTE_NAMES.contains(&name)
}

/// Typed view of a user's attribute bag.
///
/// Recognized keys become fields; everything else is carried in `extra`
/// so Keycloak user-profile attributes survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityAttributes {
    pub personnel_level: Option<PersonnelSecurityLevel>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub full_name: Option<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

impl SecurityAttributes {
    pub fn from_raw(raw: &HashMap<String, Vec<String>>) -> Self {
        let single = |key: UserAttributeKey| {
            raw.get(key.as_str())
                .and_then(|values| values.iter().map(|v| v.trim()).find(|v| !v.is_empty()))
                .map(str::to_string)
        };

        let extra = raw
            .iter()
            .filter(|(key, _)| UserAttributeKey::parse(key).is_none())
            .filter_map(|(key, values)| {
                let cleaned = clean_values(values);
                (!cleaned.is_empty()).then(|| (key.clone(), cleaned))
            })
            .collect();

        Self {
            personnel_level: resolve_personnel_level(raw, None),
            department: single(UserAttributeKey::Department),
            position: single(UserAttributeKey::Position),
            full_name: single(UserAttributeKey::FullName),
            extra,
        }
    }

    /// Data levels implied by the personnel level; empty when no level is set
    pub fn data_levels(&self) -> BTreeSet<DataSecurityLevel> {
        self.personnel_level
            .map(|level| level.data_levels())
            .unwrap_or_default()
    }

    /// Render back into the wire bag with all level aliases kept in sync
    pub fn to_raw(&self) -> HashMap<String, Vec<String>> {
        let mut raw: HashMap<String, Vec<String>> = self
            .extra
            .iter()
            .map(|(key, values)| (key.clone(), values.clone()))
            .collect();

        let singles = [
            (UserAttributeKey::Department, &self.department),
            (UserAttributeKey::Position, &self.position),
            (UserAttributeKey::FullName, &self.full_name),
        ];
        for (key, value) in singles {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                raw.insert(key.as_str().to_string(), vec![value.to_string()]);
            }
        }

        if let Some(level) = self.personnel_level {
            write_level(&mut raw, level);
        }

        raw
    }
}

fn clean_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn write_level(raw: &mut HashMap<String, Vec<String>>, level: PersonnelSecurityLevel) {
    for key in UserAttributeKey::LEVEL_KEYS {
        raw.insert(key.as_str().to_string(), vec![level.as_str().to_string()]);
    }
    raw.insert(
        UserAttributeKey::DataLevels.as_str().to_string(),
        level
            .data_levels()
            .into_iter()
            .map(|data_level| data_level.as_str().to_string())
            .collect(),
    );
}

/// Resolve the personnel level from an override or the stored attribute aliases.
///
/// A non-blank override wins. Otherwise the first non-blank value among the
/// level keys is used, in priority order. The chosen candidate is not
/// re-resolved if it fails to parse.
pub fn resolve_personnel_level(
    raw: &HashMap<String, Vec<String>>,
    level_override: Option<&str>,
) -> Option<PersonnelSecurityLevel> {
    let candidate = level_override
        .filter(|level| !level.trim().is_empty())
        .map(str::to_string)
        .or_else(|| {
            UserAttributeKey::LEVEL_KEYS.iter().find_map(|key| {
                raw.get(key.as_str())
                    .and_then(|values| values.first())
                    .filter(|value| !value.is_empty())
                    .cloned()
            })
        })?;

    PersonnelSecurityLevel::parse(&candidate)
}

/// Normalize a raw attribute bag before it is shown or submitted.
///
/// When a level resolves, every level alias and `data_levels` are rewritten
/// from it; otherwise all four keys are dropped. Values are trimmed and keys
/// left without values are removed.
pub fn normalize_attributes(
    raw: &HashMap<String, Vec<String>>,
    level_override: Option<&str>,
) -> HashMap<String, Vec<String>> {
    let mut normalized: HashMap<String, Vec<String>> = raw.clone();

    for key in UserAttributeKey::LEVEL_KEYS {
        normalized.remove(key.as_str());
    }
    normalized.remove(UserAttributeKey::DataLevels.as_str());

    if let Some(level) = resolve_personnel_level(raw, level_override) {
        write_level(&mut normalized, level);
    }

    normalized
        .into_iter()
        .filter_map(|(key, values)| {
            let cleaned = clean_values(&values);
            (!cleaned.is_empty()).then_some((key, cleaned))
        })
        .collect()
}

/// Attribute definition from the realm's user-profile configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttribute {
    pub name: String,
    pub display_name: Option<String>,
    pub required: bool,
}

impl ProfileAttribute {
    /// Display name with `${...}` message placeholders unwrapped
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(display) if !display.trim().is_empty() => display
                .trim()
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .unwrap_or(display.trim())
                .to_string(),
            _ => self.name.clone(),
        }
    }
}

/// Realm user-profile configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfileConfig {
    pub attributes: Vec<ProfileAttribute>,
}

impl UserProfileConfig {
    /// Profile attributes rendered as extra fields in the user editor
    pub fn custom_attributes(&self) -> impl Iterator<Item = &ProfileAttribute> {
        self.attributes
            .iter()
            .filter(|attribute| !is_reserved_profile_attribute(&attribute.name))
    }
}
