//! Board tool domain model.
//!
//! # Responsibility
//! - Define the records persisted by the store (boards, blocks, users, ...).
//! - Provide identifier generation and write-path validation.
//!
//! # Invariants
//! - Identifiers are opaque strings, unique per entity family.
//! - Timestamps are Unix epoch milliseconds; `delete_at == 0` means live.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod block;
pub mod board;
pub mod category;
pub mod sharing;
pub mod subscription;
pub mod team;
pub mod user;

/// JSON object column shared by blocks, boards, teams, users and sessions.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Entity family marker used as identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    None,
    Team,
    Board,
    Card,
    View,
    Session,
    User,
    Token,
    Block,
}

impl IdType {
    fn prefix(self) -> char {
        match self {
            Self::None => '7',
            Self::Team => 't',
            Self::Board => 'b',
            Self::Card => 'c',
            Self::View => 'v',
            Self::Session => 's',
            Self::User => 'u',
            Self::Token => 'k',
            Self::Block => 'a',
        }
    }
}

/// Generates a fresh identifier for one entity family.
pub fn new_id(kind: IdType) -> String {
    format!("{}{}", kind.prefix(), Uuid::new_v4().simple())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Write-path validation failure. Nothing is persisted when one is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field is blank.
    EmptyField {
        entity: &'static str,
        field: &'static str,
    },
    /// Timestamp field holds a negative value.
    NegativeTimestamp {
        entity: &'static str,
        field: &'static str,
    },
    /// Block names itself as parent.
    SelfParent(String),
    /// Block references a block that neither exists nor is part of the batch.
    DanglingReference {
        block_id: String,
        field: &'static str,
        target: String,
    },
    /// Batch block belongs to a board that is not part of the batch.
    BlockOutsideBatch { block_id: String, board_id: String },
    /// Parallel id/patch vectors differ in length.
    BatchLengthMismatch {
        entity: &'static str,
        ids: usize,
        patches: usize,
    },
    /// Insert carries a non-zero `delete_at`. Tombstones come only from deletes.
    DeletedOnWrite { entity: &'static str, id: String },
    /// Batch names nothing to act on.
    EmptyBatch(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField { entity, field } => write!(f, "{entity}.{field} must not be empty"),
            Self::NegativeTimestamp { entity, field } => {
                write!(f, "{entity}.{field} must not be negative")
            }
            Self::SelfParent(id) => write!(f, "block {id} cannot be its own parent"),
            Self::DanglingReference {
                block_id,
                field,
                target,
            } => write!(f, "block {block_id} {field} references unknown block {target}"),
            Self::BlockOutsideBatch { block_id, board_id } => write!(
                f,
                "block {block_id} belongs to board {board_id} which is not part of the batch"
            ),
            Self::BatchLengthMismatch {
                entity,
                ids,
                patches,
            } => write!(f, "{entity} batch has {ids} ids but {patches} patches"),
            Self::DeletedOnWrite { entity, id } => {
                write!(f, "{entity} {id} cannot be written with delete_at set")
            }
            Self::EmptyBatch(operation) => write!(f, "{operation} batch is empty"),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_non_empty(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { entity, field });
    }
    Ok(())
}

pub(crate) fn require_non_negative(
    entity: &'static str,
    field: &'static str,
    value: i64,
) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::NegativeTimestamp { entity, field });
    }
    Ok(())
}

pub(crate) fn require_live(
    entity: &'static str,
    id: &str,
    delete_at: i64,
) -> Result<(), ValidationError> {
    if delete_at != 0 {
        return Err(ValidationError::DeletedOnWrite {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{new_id, now_millis, IdType};

    #[test]
    fn new_id_uses_type_prefix_and_is_unique() {
        let first = new_id(IdType::Board);
        let second = new_id(IdType::Board);
        assert!(first.starts_with('b'));
        assert_eq!(first.len(), 33);
        assert_ne!(first, second);
        assert!(new_id(IdType::Token).starts_with('k'));
    }

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
