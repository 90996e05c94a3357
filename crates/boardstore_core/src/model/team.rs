//! Team (tenant) model.

use super::{require_non_empty, JsonMap, ValidationError};
use serde::{Deserialize, Serialize};

/// Workspace grouping users and boards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub signup_token: String,
    #[serde(default)]
    pub settings: JsonMap,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub update_at: i64,
}

impl Team {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("team", "id", &self.id)
    }
}
