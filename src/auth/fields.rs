//! Logical to physical field mapping

use crate::config::ConfigError;
use crate::identity::{CREDENTIAL_PASSWORD, CREDENTIAL_USERNAME};
use std::collections::{BTreeMap, HashMap};

const LOGICAL_FIELDS: [&str; 2] = [CREDENTIAL_USERNAME, CREDENTIAL_PASSWORD];

/// Maps the logical credential names (`username`, `password`) onto request or
/// record field names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    /// Identity mapping for both logical fields
    pub fn credentials() -> Self {
        Self::identity(&LOGICAL_FIELDS)
    }

    /// Identity mapping for `username` only
    pub fn username_only() -> Self {
        Self::identity(&[CREDENTIAL_USERNAME])
    }

    fn identity(keys: &[&str]) -> Self {
        Self(
            keys.iter()
                .map(|k| (k.to_string(), k.to_string()))
                .collect(),
        )
    }

    /// Apply configured overrides. Unknown logical names are rejected.
    pub fn with_overrides(mut self, overrides: &HashMap<String, String>) -> Result<Self, ConfigError> {
        for (logical, physical) in overrides {
            if !LOGICAL_FIELDS.contains(&logical.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown field mapping '{}' (expected one of: {})",
                    logical,
                    LOGICAL_FIELDS.join(", ")
                )));
            }
            if physical.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Field mapping for '{}' must not be empty",
                    logical
                )));
            }
            self.0.insert(logical.clone(), physical.clone());
        }
        Ok(self)
    }

    pub fn get(&self, logical: &str) -> Option<&str> {
        self.0.get(logical).map(String::as_str)
    }

    pub fn username(&self) -> &str {
        self.get(CREDENTIAL_USERNAME).unwrap_or(CREDENTIAL_USERNAME)
    }

    pub fn password(&self) -> &str {
        self.get(CREDENTIAL_PASSWORD).unwrap_or(CREDENTIAL_PASSWORD)
    }

    /// `(logical, physical)` pairs in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self::credentials()
    }
}
