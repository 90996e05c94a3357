//! Public sharing configuration, keyed by the shared root (board) id.

use super::{require_non_empty, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sharing {
    pub id: String,
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default)]
    pub update_at: i64,
}

impl Sharing {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("sharing", "id", &self.id)
    }
}
