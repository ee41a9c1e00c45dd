//! Which verdicts a caller lets the migrator act on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::delta::SchemaPatchDifference;

/// Auto-create policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoCreate {
    /// Never change the database.
    #[default]
    None,
    /// Only create missing tables.
    CreateOnly,
    /// Create missing tables and patch existing ones.
    CreateOrUpdate,
    /// Also drop and recreate tables that cannot be patched.
    All,
}

impl AutoCreate {
    /// Returns `true` if a table with this verdict may be changed.
    #[must_use]
    pub const fn permits(self, difference: SchemaPatchDifference) -> bool {
        match difference {
            SchemaPatchDifference::None => true,
            SchemaPatchDifference::Create => !matches!(self, Self::None),
            SchemaPatchDifference::Update => matches!(self, Self::CreateOrUpdate | Self::All),
            SchemaPatchDifference::Invalid => matches!(self, Self::All),
        }
    }

    /// Returns the policy's config spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CreateOnly => "create_only",
            Self::CreateOrUpdate => "create_or_update",
            Self::All => "all",
        }
    }
}

impl fmt::Display for AutoCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutoCreate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "create_only" => Ok(Self::CreateOnly),
            "create_or_update" => Ok(Self::CreateOrUpdate),
            "all" => Ok(Self::All),
            _ => Err(format!("unknown auto-create policy '{s}'")),
        }
    }
}
