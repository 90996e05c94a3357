//! Board, membership and batch models.
//!
//! # Responsibility
//! - Define the board container and its membership join entity.
//! - Define combined board+block batches used by transactional writes.
//!
//! # Invariants
//! - `id` and `team_id` are never empty for persisted boards.
//! - Batch blocks always belong to a board of the same batch.
//! - Inserted boards are live (`delete_at == 0`).

use super::block::{Block, BlockPatch};
use super::{
    new_id, now_millis, require_live, require_non_empty, IdType, JsonMap, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Creator id of built-in templates.
pub const SYSTEM_USER_ID: &str = "system";

/// Visibility of a board inside its team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
}

impl BoardType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Private => "P",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "O" => Some(Self::Open),
            "P" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Container of blocks owned by a team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub team_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(rename = "type")]
    pub board_type: BoardType,
    #[serde(default)]
    pub minimum_role: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub show_description: bool,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub template_version: i64,
    #[serde(default)]
    pub properties: JsonMap,
    /// Card property templates; each entry is keyed by its `id` member.
    #[serde(default)]
    pub card_properties: Vec<JsonMap>,
    pub create_at: i64,
    pub update_at: i64,
    #[serde(default)]
    pub delete_at: i64,
}

impl Board {
    /// Creates an open board with a generated id in `team_id`.
    pub fn new(team_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(IdType::Board),
            team_id: team_id.into(),
            channel_id: String::new(),
            created_by: String::new(),
            modified_by: String::new(),
            board_type: BoardType::Open,
            minimum_role: String::new(),
            title: title.into(),
            description: String::new(),
            icon: String::new(),
            show_description: false,
            is_template: false,
            template_version: 0,
            properties: JsonMap::new(),
            card_properties: Vec::new(),
            create_at: now,
            update_at: now,
            delete_at: 0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("board", "id", &self.id)?;
        require_non_empty("board", "team_id", &self.team_id)?;
        require_live("board", &self.id, self.delete_at)?;
        Ok(())
    }
}

/// Partial update of a board. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoardPatch {
    #[serde(rename = "type")]
    pub board_type: Option<BoardType>,
    pub minimum_role: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub show_description: Option<bool>,
    pub channel_id: Option<String>,
    pub updated_properties: JsonMap,
    pub deleted_properties: Vec<String>,
    /// Replaces the card property with the same `id`, or appends.
    pub updated_card_properties: Vec<JsonMap>,
    /// Removes card properties by `id`.
    pub deleted_card_properties: Vec<String>,
}

impl BoardPatch {
    /// Returns a copy of `board` with this patch applied.
    pub fn patch(&self, board: &Board) -> Board {
        let mut patched = board.clone();
        if let Some(board_type) = self.board_type {
            patched.board_type = board_type;
        }
        if let Some(minimum_role) = &self.minimum_role {
            patched.minimum_role = minimum_role.clone();
        }
        if let Some(title) = &self.title {
            patched.title = title.clone();
        }
        if let Some(description) = &self.description {
            patched.description = description.clone();
        }
        if let Some(icon) = &self.icon {
            patched.icon = icon.clone();
        }
        if let Some(show_description) = self.show_description {
            patched.show_description = show_description;
        }
        if let Some(channel_id) = &self.channel_id {
            patched.channel_id = channel_id.clone();
        }

        for (key, value) in &self.updated_properties {
            patched.properties.insert(key.clone(), value.clone());
        }
        for key in &self.deleted_properties {
            patched.properties.remove(key);
        }

        for update in &self.updated_card_properties {
            let position = card_property_id(update).and_then(|id| {
                patched
                    .card_properties
                    .iter()
                    .position(|property| card_property_id(property) == Some(id))
            });
            match position {
                Some(index) => patched.card_properties[index] = update.clone(),
                None => patched.card_properties.push(update.clone()),
            }
        }
        patched.card_properties.retain(|property| {
            card_property_id(property)
                .map_or(true, |id| !self.deleted_card_properties.iter().any(|d| d == id))
        });
        patched
    }
}

fn card_property_id(property: &JsonMap) -> Option<&str> {
    property.get("id").and_then(|value| value.as_str())
}

/// Join entity granting a user access to a board.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMember {
    pub board_id: String,
    pub user_id: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub minimum_role: String,
    #[serde(default)]
    pub scheme_admin: bool,
    #[serde(default)]
    pub scheme_editor: bool,
    #[serde(default)]
    pub scheme_commenter: bool,
    #[serde(default)]
    pub scheme_viewer: bool,
}

impl BoardMember {
    /// Member with every scheme role, as granted to board creators.
    pub fn admin(board_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            board_id: board_id.into(),
            user_id: user_id.into(),
            roles: String::new(),
            minimum_role: String::new(),
            scheme_admin: true,
            scheme_editor: true,
            scheme_commenter: true,
            scheme_viewer: true,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("board_member", "board_id", &self.board_id)?;
        require_non_empty("board_member", "user_id", &self.user_id)?;
        Ok(())
    }
}

/// Boards and blocks written or returned as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardsAndBlocks {
    pub boards: Vec<Board>,
    pub blocks: Vec<Block>,
}

impl BoardsAndBlocks {
    /// Checks every entity and that each block belongs to a batch board.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let board_ids: HashSet<&str> = self.boards.iter().map(|board| board.id.as_str()).collect();
        for board in &self.boards {
            board.validate()?;
        }
        for block in &self.blocks {
            block.validate()?;
            if !board_ids.contains(block.board_id.as_str()) {
                return Err(ValidationError::BlockOutsideBatch {
                    block_id: block.id.clone(),
                    board_id: block.board_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Returns a copy with fresh board and block ids.
    ///
    /// References between entities of the batch (`board_id`, `parent_id`,
    /// `root_id`) are rewritten to the new ids; references pointing outside
    /// the batch are left untouched.
    pub fn with_generated_ids(&self) -> Self {
        let board_ids: HashMap<String, String> = self
            .boards
            .iter()
            .map(|board| (board.id.clone(), new_id(IdType::Board)))
            .collect();
        let block_ids: HashMap<String, String> = self
            .blocks
            .iter()
            .map(|block| (block.id.clone(), new_id(block.block_type.id_type())))
            .collect();

        let remap = |value: &str| -> String {
            block_ids
                .get(value)
                .or_else(|| board_ids.get(value))
                .cloned()
                .unwrap_or_else(|| value.to_string())
        };

        let boards = self
            .boards
            .iter()
            .map(|board| {
                let mut board = board.clone();
                board.id = remap(&board.id);
                board
            })
            .collect();
        let blocks = self
            .blocks
            .iter()
            .map(|block| {
                let mut block = block.clone();
                block.id = remap(&block.id);
                block.board_id = remap(&block.board_id);
                block.parent_id = remap(&block.parent_id);
                block.root_id = remap(&block.root_id);
                block
            })
            .collect();

        Self { boards, blocks }
    }
}

/// Patches for several boards and blocks, matched by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBoardsAndBlocks {
    pub board_ids: Vec<String>,
    pub board_patches: Vec<BoardPatch>,
    pub block_ids: Vec<String>,
    pub block_patches: Vec<BlockPatch>,
}

impl PatchBoardsAndBlocks {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.board_ids.len() != self.board_patches.len() {
            return Err(ValidationError::BatchLengthMismatch {
                entity: "board",
                ids: self.board_ids.len(),
                patches: self.board_patches.len(),
            });
        }
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

/// Ids of boards and blocks removed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBoardsAndBlocks {
    pub boards: Vec<String>,
    pub blocks: Vec<String>,
}

impl DeleteBoardsAndBlocks {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.boards.is_empty() && self.blocks.is_empty() {
            return Err(ValidationError::EmptyBatch("delete boards and blocks"));
        }
        for id in &self.boards {
            require_non_empty("board", "id", id)?;
        }
        for id in &self.blocks {
            require_non_empty("block", "id", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Board, BoardPatch, BoardsAndBlocks, DeleteBoardsAndBlocks};
    use crate::model::block::{Block, BlockType};
    use crate::model::{JsonMap, ValidationError};
    use serde_json::json;

    fn card_property(id: &str, name: &str) -> JsonMap {
        let mut property = JsonMap::new();
        property.insert("id".to_string(), json!(id));
        property.insert("name".to_string(), json!(name));
        property
    }

    #[test]
    fn patch_replaces_appends_and_deletes_card_properties() {
        let mut board = Board::new("team-1", "Roadmap");
        board.card_properties = vec![card_property("p1", "Status"), card_property("p2", "Owner")];

        let patch = BoardPatch {
            title: Some("Roadmap 2".to_string()),
            updated_card_properties: vec![
                card_property("p1", "State"),
                card_property("p3", "Due"),
            ],
            deleted_card_properties: vec!["p2".to_string()],
            ..BoardPatch::default()
        };

        let patched = patch.patch(&board);
        assert_eq!(patched.title, "Roadmap 2");
        let names: Vec<_> = patched
            .card_properties
            .iter()
            .map(|property| property["name"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(names, vec!["State", "Due"]);
    }

    #[test]
    fn validate_rejects_block_of_foreign_board() {
        let board = Board::new("team-1", "A");
        let block = Block::new("other-board", BlockType::Card);
        let bab = BoardsAndBlocks {
            boards: vec![board],
            blocks: vec![block],
        };
        assert!(matches!(
            bab.validate(),
            Err(ValidationError::BlockOutsideBatch { .. })
        ));
    }

    #[test]
    fn generated_ids_keep_internal_references() {
        let board = Board::new("team-1", "A");
        let mut card = Block::new(board.id.clone(), BlockType::Card);
        card.root_id = card.id.clone();
        let mut text = Block::new(board.id.clone(), BlockType::Text);
        text.parent_id = card.id.clone();
        text.root_id = card.id.clone();

        let original = BoardsAndBlocks {
            boards: vec![board.clone()],
            blocks: vec![card.clone(), text],
        };
        let copy = original.with_generated_ids();

        assert_ne!(copy.boards[0].id, board.id);
        assert_ne!(copy.blocks[0].id, card.id);
        assert!(copy.blocks[0].id.starts_with('c'));
        assert_eq!(copy.blocks[0].root_id, copy.blocks[0].id);
        assert_eq!(copy.blocks[1].parent_id, copy.blocks[0].id);
        assert!(copy.blocks.iter().all(|block| block.board_id == copy.boards[0].id));
    }

    #[test]
    fn validate_rejects_tombstoned_board() {
        let mut board = Board::new("team-1", "Gone");
        board.delete_at = 1;
        assert!(matches!(
            board.validate(),
            Err(ValidationError::DeletedOnWrite { entity: "board", .. })
        ));
    }

    #[test]
    fn delete_batch_needs_ids() {
        let empty = DeleteBoardsAndBlocks::default();
        assert!(matches!(
            empty.validate(),
            Err(ValidationError::EmptyBatch(_))
        ));

        let blank = DeleteBoardsAndBlocks {
            boards: vec!["board-1".to_string(), " ".to_string()],
            blocks: Vec::new(),
        };
        assert_eq!(
            blank.validate(),
            Err(ValidationError::EmptyField {
                entity: "board",
                field: "id"
            })
        );

        let blocks_only = DeleteBoardsAndBlocks {
            boards: Vec::new(),
            blocks: vec!["card-1".to_string()],
        };
        assert!(blocks_only.validate().is_ok());
    }
}
