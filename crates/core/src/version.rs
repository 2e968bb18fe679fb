//! Migration version parsing and ordering
//!
//! Versions are dot- or underscore-separated numeric components
//! (`1`, `2.1`, `2024_01_15`). Ordering is component-wise numeric, so
//! `1.2.10` sorts after `1.2.9` and `1.2` sorts before `1.2.1`.

use std::cmp::Ordering;
use std::fmt;

use crate::error::{MigrationError, MigrationResult};

/// A parsed migration version with a total ordering
///
/// Equality and ordering are defined over the numeric components, not the
/// raw text, so `1.0` and `1_0` compare equal while displaying as written.
#[derive(Debug, Clone)]
pub struct MigrationVersion {
    raw: String,
    components: Vec<u64>,
}

impl MigrationVersion {
    /// Parse a version string under the strict grammar
    ///
    /// Components must be non-empty and numeric; anything else is an
    /// [`MigrationError::InvalidVersion`], never a silently defaulted value.
    pub fn parse(raw: &str) -> MigrationResult<Self> {
        if raw.is_empty() {
            return Err(MigrationError::InvalidVersion {
                raw: raw.to_string(),
                reason: "version is empty".to_string(),
            });
        }

        let mut components = Vec::new();
        for part in raw.split(['.', '_']) {
            if part.is_empty() {
                return Err(MigrationError::InvalidVersion {
                    raw: raw.to_string(),
                    reason: "empty version component".to_string(),
                });
            }
            let value = part.parse::<u64>().map_err(|_| MigrationError::InvalidVersion {
                raw: raw.to_string(),
                reason: format!("non-numeric version component '{}'", part),
            })?;
            components.push(value);
        }

        Ok(Self {
            raw: raw.to_string(),
            components,
        })
    }

    /// The version exactly as written in the source name
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed numeric components
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl fmt::Display for MigrationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for MigrationVersion {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl Eq for MigrationVersion {}

impl PartialOrd for MigrationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MigrationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components.cmp(&other.components)
    }
}

impl std::hash::Hash for MigrationVersion {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}
