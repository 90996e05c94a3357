//! Block domain model.
//!
//! # Responsibility
//! - Define the content node stored under a board.
//! - Provide patch semantics and query option types for block reads.
//!
//! # Invariants
//! - `id` and `board_id` are never empty for persisted blocks.
//! - `parent_id`/`root_id` are either empty or reference another block
//!   (or the owning board).
//! - A block is never its own parent.
//! - Inserted blocks are live (`delete_at == 0`).

use super::{
    new_id, now_millis, require_live, require_non_empty, require_non_negative, IdType, JsonMap,
    ValidationError,
};
use serde::{Deserialize, Serialize};

/// Content kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Unknown,
    Board,
    /// Top-level work item within a board.
    Card,
    View,
    Text,
    Checkbox,
    Comment,
    Image,
    Attachment,
    Divider,
    H1,
    H2,
    H3,
}

impl BlockType {
    /// Storage/wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Board => "board",
            Self::Card => "card",
            Self::View => "view",
            Self::Text => "text",
            Self::Checkbox => "checkbox",
            Self::Comment => "comment",
            Self::Image => "image",
            Self::Attachment => "attachment",
            Self::Divider => "divider",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
        }
    }

    /// Parses a storage name; `None` for unknown spellings.
    pub fn parse(value: &str) -> Option<Self> {
        let kind = match value {
            "unknown" => Self::Unknown,
            "board" => Self::Board,
            "card" => Self::Card,
            "view" => Self::View,
            "text" => Self::Text,
            "checkbox" => Self::Checkbox,
            "comment" => Self::Comment,
            "image" => Self::Image,
            "attachment" => Self::Attachment,
            "divider" => Self::Divider,
            "h1" => Self::H1,
            "h2" => Self::H2,
            "h3" => Self::H3,
            _ => return None,
        };
        Some(kind)
    }

    pub(crate) fn id_type(self) -> IdType {
        match self {
            Self::Card => IdType::Card,
            Self::View => IdType::View,
            Self::Board => IdType::Board,
            _ => IdType::Block,
        }
    }
}

/// Smallest content unit of a board. Blocks form a parent/root tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    /// Empty for top-level blocks.
    #[serde(default)]
    pub parent_id: String,
    /// Empty when the block is not attached to a root.
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    pub schema: i64,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: JsonMap,
    pub create_at: i64,
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    pub board_id: String,
}

impl Block {
    /// Creates a live block with a generated id on `board_id`.
    pub fn new(board_id: impl Into<String>, block_type: BlockType) -> Self {
        let now = now_millis();
        Self {
            id: new_id(block_type.id_type()),
            parent_id: String::new(),
            root_id: String::new(),
            created_by: String::new(),
            modified_by: String::new(),
            schema: 1,
            block_type,
            title: String::new(),
            fields: JsonMap::new(),
            create_at: now,
            update_at: now,
            delete_at: 0,
            board_id: board_id.into(),
        }
    }

    /// Validates write-path invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("block", "id", &self.id)?;
        require_non_empty("block", "board_id", &self.board_id)?;
        if self.parent_id == self.id {
            return Err(ValidationError::SelfParent(self.id.clone()));
        }
        require_non_negative("block", "create_at", self.create_at)?;
        require_non_negative("block", "update_at", self.update_at)?;
        require_live("block", &self.id, self.delete_at)?;
        Ok(())
    }

    pub fn is_card(&self) -> bool {
        self.block_type == BlockType::Card
    }
}

/// Partial update of a block. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlockPatch {
    pub parent_id: Option<String>,
    pub root_id: Option<String>,
    pub schema: Option<i64>,
    #[serde(rename = "type")]
    pub block_type: Option<BlockType>,
    pub title: Option<String>,
    /// Merged into `fields`, replacing existing keys.
    pub updated_fields: JsonMap,
    /// Keys removed from `fields` after the merge.
    pub deleted_fields: Vec<String>,
}

impl BlockPatch {
    /// Returns a copy of `block` with this patch applied.
    pub fn patch(&self, block: &Block) -> Block {
        let mut patched = block.clone();
        if let Some(parent_id) = &self.parent_id {
            patched.parent_id = parent_id.clone();
        }
        if let Some(root_id) = &self.root_id {
            patched.root_id = root_id.clone();
        }
        if let Some(schema) = self.schema {
            patched.schema = schema;
        }
        if let Some(block_type) = self.block_type {
            patched.block_type = block_type;
        }
        if let Some(title) = &self.title {
            patched.title = title.clone();
        }
        for (key, value) in &self.updated_fields {
            patched.fields.insert(key.clone(), value.clone());
        }
        for key in &self.deleted_fields {
            patched.fields.remove(key);
        }
        patched
    }
}

/// Patches for several blocks, matched by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockPatchBatch {
    pub block_ids: Vec<String>,
    pub block_patches: Vec<BlockPatch>,
}

impl BlockPatchBatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.block_ids.len() != self.block_patches.len() {
            return Err(ValidationError::BatchLengthMismatch {
                entity: "block",
                ids: self.block_ids.len(),
                patches: self.block_patches.len(),
            });
        }
        Ok(())
    }
}

/// Filters for bounded subtree reads. Zero values disable a bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuerySubtreeOptions {
    /// Only blocks updated strictly before this instant.
    pub before_update_at: i64,
    /// Only blocks updated strictly after this instant.
    pub after_update_at: i64,
    /// Maximum number of blocks returned.
    pub limit: u64,
}

/// Filters for block history reads. Zero values disable a bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryBlockHistoryOptions {
    pub before_update_at: i64,
    pub after_update_at: i64,
    pub limit: u64,
    /// Newest revision first when set.
    pub descending: bool,
}

#[cfg(test)]
mod tests {
    use super::{Block, BlockPatch, BlockPatchBatch, BlockType};
    use crate::model::ValidationError;
    use serde_json::json;

    #[test]
    fn block_type_names_roundtrip() {
        for kind in [BlockType::Card, BlockType::View, BlockType::H2, BlockType::Comment] {
            assert_eq!(BlockType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BlockType::parse("CARD"), None);
    }

    #[test]
    fn new_card_gets_card_prefix() {
        let card = Block::new("board-1", BlockType::Card);
        assert!(card.id.starts_with('c'));
        assert!(card.is_card());
        card.validate().expect("fresh card should be valid");
    }

    #[test]
    fn validate_rejects_missing_board_and_self_parent() {
        let mut block = Block::new("", BlockType::Text);
        assert_eq!(
            block.validate(),
            Err(ValidationError::EmptyField {
                entity: "block",
                field: "board_id"
            })
        );

        block.board_id = "board-1".to_string();
        block.parent_id = block.id.clone();
        assert!(matches!(block.validate(), Err(ValidationError::SelfParent(_))));
    }

    #[test]
    fn validate_rejects_tombstoned_block() {
        let mut block = Block::new("board-1", BlockType::Card);
        block.delete_at = 5;
        assert_eq!(
            block.validate(),
            Err(ValidationError::DeletedOnWrite {
                entity: "block",
                id: block.id.clone()
            })
        );
    }

    #[test]
    fn patch_merges_and_removes_fields() {
        let mut block = Block::new("board-1", BlockType::Card);
        block.fields.insert("icon".to_string(), json!("x"));
        block.fields.insert("stale".to_string(), json!(true));

        let mut patch = BlockPatch {
            title: Some("renamed".to_string()),
            deleted_fields: vec!["stale".to_string()],
            ..BlockPatch::default()
        };
        patch.updated_fields.insert("icon".to_string(), json!("y"));

        let patched = patch.patch(&block);
        assert_eq!(patched.title, "renamed");
        assert_eq!(patched.fields.get("icon"), Some(&json!("y")));
        assert!(!patched.fields.contains_key("stale"));
        assert_eq!(patched.id, block.id);
    }

    #[test]
    fn patch_batch_requires_matching_lengths() {
        let batch = BlockPatchBatch {
            block_ids: vec!["a".to_string(), "b".to_string()],
            block_patches: vec![BlockPatch::default()],
        };
        assert!(matches!(
            batch.validate(),
            Err(ValidationError::BatchLengthMismatch { ids: 2, patches: 1, .. })
        ));
    }
}
