//! Persistence layer for a collaborative board tool.
//!
//! The [`Store`] trait is the contract between application logic and
//! storage; [`SqliteStore`] is its SQLite implementation.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::block::{
    Block, BlockPatch, BlockPatchBatch, BlockType, QueryBlockHistoryOptions, QuerySubtreeOptions,
};
pub use model::board::{
    Board, BoardMember, BoardPatch, BoardType, BoardsAndBlocks, DeleteBoardsAndBlocks,
    PatchBoardsAndBlocks,
};
pub use model::category::{Category, CategoryBlocks};
pub use model::sharing::Sharing;
pub use model::subscription::{NotificationHint, Subscriber, SubscriberType, Subscription};
pub use model::team::Team;
pub use model::user::{Session, User};
pub use model::ValidationError;
pub use store::sqlite::SqliteStore;
pub use store::{is_err_not_found, Store, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
