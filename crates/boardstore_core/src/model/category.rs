//! User-defined sidebar categories.
//!
//! # Invariants
//! - A category belongs to exactly one `(user_id, team_id)` pair.
//! - A block sits in at most one live category per user.

use super::{new_id, now_millis, require_non_empty, IdType, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub team_id: String,
    pub create_at: i64,
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub collapsed: bool,
}

impl Category {
    pub fn new(
        name: impl Into<String>,
        user_id: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: new_id(IdType::None),
            name: name.into(),
            user_id: user_id.into(),
            team_id: team_id.into(),
            create_at: now,
            update_at: now,
            delete_at: 0,
            collapsed: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("category", "id", &self.id)?;
        require_non_empty("category", "name", &self.name)?;
        require_non_empty("category", "user_id", &self.user_id)?;
        require_non_empty("category", "team_id", &self.team_id)?;
        Ok(())
    }
}

/// A category together with the ids of the blocks filed under it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBlocks {
    #[serde(flatten)]
    pub category: Category,
    pub block_ids: Vec<String>,
}
