use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Clearance tier of a user, stored as a Keycloak user attribute.
///
/// Variants are declared in ascending order so the derived `Ord` follows clearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonnelSecurityLevel {
    NonSecret,
    Internal,
    Secret,
    TopSecret,
}

impl PersonnelSecurityLevel {
    pub const ALL: [PersonnelSecurityLevel; 4] = [
        PersonnelSecurityLevel::NonSecret,
        PersonnelSecurityLevel::Internal,
        PersonnelSecurityLevel::Secret,
        PersonnelSecurityLevel::TopSecret,
    ];

    /// Parse a stored or submitted level. Whitespace and case are ignored.
    ///
    /// Returns `None` for anything outside the known set; callers treat that
    /// as "no clearance" rather than an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NON_SECRET" => Some(PersonnelSecurityLevel::NonSecret),
            "INTERNAL" => Some(PersonnelSecurityLevel::Internal),
            "SECRET" => Some(PersonnelSecurityLevel::Secret),
            "TOP_SECRET" => Some(PersonnelSecurityLevel::TopSecret),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonnelSecurityLevel::NonSecret => "NON_SECRET",
            PersonnelSecurityLevel::Internal => "INTERNAL",
            PersonnelSecurityLevel::Secret => "SECRET",
            PersonnelSecurityLevel::TopSecret => "TOP_SECRET",
        }
    }

    /// Highest data level this clearance may read
    pub fn ceiling(&self) -> DataSecurityLevel {
        match self {
            PersonnelSecurityLevel::NonSecret => DataSecurityLevel::DataPublic,
            PersonnelSecurityLevel::Internal => DataSecurityLevel::DataInternal,
            PersonnelSecurityLevel::Secret => DataSecurityLevel::DataSecret,
            PersonnelSecurityLevel::TopSecret => DataSecurityLevel::DataTopSecret,
        }
    }

    /// Every data level at or below this clearance's ceiling
    pub fn data_levels(&self) -> BTreeSet<DataSecurityLevel> {
        let ceiling = self.ceiling();
        DataSecurityLevel::ALL
            .into_iter()
            .filter(|level| *level <= ceiling)
            .collect()
    }
}

impl Default for PersonnelSecurityLevel {
    fn default() -> Self {
        PersonnelSecurityLevel::NonSecret
    }
}

impl std::fmt::Display for PersonnelSecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sensitivity classification of data a user may access
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSecurityLevel {
    DataPublic,
    DataInternal,
    DataSecret,
    DataTopSecret,
}

impl DataSecurityLevel {
    pub const ALL: [DataSecurityLevel; 4] = [
        DataSecurityLevel::DataPublic,
        DataSecurityLevel::DataInternal,
        DataSecurityLevel::DataSecret,
        DataSecurityLevel::DataTopSecret,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DATA_PUBLIC" => Some(DataSecurityLevel::DataPublic),
            "DATA_INTERNAL" => Some(DataSecurityLevel::DataInternal),
            "DATA_SECRET" => Some(DataSecurityLevel::DataSecret),
            "DATA_TOP_SECRET" => Some(DataSecurityLevel::DataTopSecret),
            _ => None,
        }
    }

    /// The level name doubles as the name of the realm role granting it.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSecurityLevel::DataPublic => "DATA_PUBLIC",
            DataSecurityLevel::DataInternal => "DATA_INTERNAL",
            DataSecurityLevel::DataSecret => "DATA_SECRET",
            DataSecurityLevel::DataTopSecret => "DATA_TOP_SECRET",
        }
    }

    pub fn role_name(&self) -> &'static str {
        self.as_str()
    }
}

impl Default for DataSecurityLevel {
    fn default() -> Self {
        DataSecurityLevel::DataInternal
    }
}

impl std::fmt::Display for DataSecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the data levels reachable from a raw personnel level value.
///
/// Unrecognized input yields the empty set.
pub fn derive_data_levels(personnel_level: &str) -> BTreeSet<DataSecurityLevel> {
    PersonnelSecurityLevel::parse(personnel_level)
        .map(|level| level.data_levels())
        .unwrap_or_default()
}
