//! Persistence contract between the application layer and storage.
//!
//! # Responsibility
//! - Define identifier-keyed CRUD and relationship queries for every
//!   entity family of the board tool.
//! - Define the `NotFound` classification callers branch on.
//!
//! # Invariants
//! - Lookups by identifier either return the entity or fail with
//!   `StoreError::NotFound`.
//! - Operations documented as transactional apply all of their writes or
//!   none of them, and are never observed half-applied.
//! - Calls are synchronous; the store is shareable across threads.

use crate::model::block::{
    Block, BlockPatch, BlockPatchBatch, QueryBlockHistoryOptions, QuerySubtreeOptions,
};
use crate::model::board::{
    Board, BoardMember, BoardPatch, BoardsAndBlocks, DeleteBoardsAndBlocks, PatchBoardsAndBlocks,
};
use crate::model::category::{Category, CategoryBlocks};
use crate::model::sharing::Sharing;
use crate::model::subscription::{NotificationHint, Subscriber, Subscription};
use crate::model::team::Team;
use crate::model::user::{Session, User};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

mod error;
pub mod sqlite;

pub use error::{is_err_not_found, StoreError, StoreResult};

/// Data storage abstraction for boards, blocks and their satellites.
///
/// Methods marked *transactional* run inside a single database transaction
/// in every conforming implementation.
pub trait Store: Send + Sync {
    // Blocks.

    fn get_blocks_with_parent_and_type(
        &self,
        board_id: &str,
        parent_id: &str,
        block_type: &str,
    ) -> StoreResult<Vec<Block>>;
    fn get_blocks_with_parent(&self, board_id: &str, parent_id: &str) -> StoreResult<Vec<Block>>;
    fn get_blocks_with_root_id(&self, board_id: &str, root_id: &str) -> StoreResult<Vec<Block>>;
    fn get_blocks_with_type(&self, board_id: &str, block_type: &str) -> StoreResult<Vec<Block>>;
    /// Block plus its direct children.
    fn get_sub_tree2(
        &self,
        board_id: &str,
        block_id: &str,
        opts: &QuerySubtreeOptions,
    ) -> StoreResult<Vec<Block>>;
    /// Block plus children and grandchildren.
    fn get_sub_tree3(
        &self,
        board_id: &str,
        block_id: &str,
        opts: &QuerySubtreeOptions,
    ) -> StoreResult<Vec<Block>>;
    fn get_blocks_for_board(&self, board_id: &str) -> StoreResult<Vec<Block>>;
    /// Transactional. Creates or replaces one block.
    fn insert_block(&self, block: &Block, user_id: &str) -> StoreResult<()>;
    /// Transactional. Removes a block and its descendants; missing ids are a no-op.
    fn delete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<()>;
    /// Transactional. All blocks are written or none.
    fn insert_blocks(&self, blocks: &[Block], user_id: &str) -> StoreResult<()>;
    /// Transactional.
    fn get_block_counts_by_type(&self) -> StoreResult<HashMap<String, i64>>;
    fn get_block(&self, block_id: &str) -> StoreResult<Block>;
    /// Transactional.
    fn patch_block(&self, block_id: &str, patch: &BlockPatch, user_id: &str) -> StoreResult<()>;
    fn get_block_history(
        &self,
        block_id: &str,
        opts: &QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>>;
    /// Owning board and nearest card of the block with `block_id`.
    fn get_board_and_card_by_id(&self, block_id: &str) -> StoreResult<(Board, Block)>;
    /// Owning board and nearest card of `block`.
    fn get_board_and_card(&self, block: &Block) -> StoreResult<(Board, Block)>;
    /// Transactional.
    fn duplicate_board(
        &self,
        board_id: &str,
        user_id: &str,
        as_template: bool,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)>;
    /// Transactional.
    fn patch_blocks(&self, patches: &BlockPatchBatch, user_id: &str) -> StoreResult<()>;

    /// Releases the backing connection. Later calls fail with `StoreError::Closed`.
    fn shutdown(&self) -> StoreResult<()>;

    // System settings.

    fn get_system_setting(&self, key: &str) -> StoreResult<String>;
    fn get_system_settings(&self) -> StoreResult<HashMap<String, String>>;
    fn set_system_setting(&self, key: &str, value: &str) -> StoreResult<()>;

    // Users.

    fn get_registered_user_count(&self) -> StoreResult<i64>;
    fn get_user_by_id(&self, user_id: &str) -> StoreResult<User>;
    fn get_user_by_email(&self, email: &str) -> StoreResult<User>;
    fn get_user_by_username(&self, username: &str) -> StoreResult<User>;
    fn create_user(&self, user: &User) -> StoreResult<()>;
    fn update_user(&self, user: &User) -> StoreResult<()>;
    fn update_user_password(&self, username: &str, password: &str) -> StoreResult<()>;
    fn update_user_password_by_id(&self, user_id: &str, password: &str) -> StoreResult<()>;
    fn get_users_by_team(&self, team_id: &str) -> StoreResult<Vec<User>>;

    // Sessions.

    fn get_active_user_count(&self, updated_seconds_ago: i64) -> StoreResult<i64>;
    /// Session for `token` unless it has been idle for `expire_time` seconds.
    fn get_session(&self, token: &str, expire_time: i64) -> StoreResult<Session>;
    fn create_session(&self, session: &Session) -> StoreResult<()>;
    fn refresh_session(&self, session: &Session) -> StoreResult<()>;
    fn update_session(&self, session: &Session) -> StoreResult<()>;
    fn delete_session(&self, session_id: &str) -> StoreResult<()>;
    fn clean_up_sessions(&self, expire_time: i64) -> StoreResult<()>;

    // Sharing.

    fn upsert_sharing(&self, sharing: &Sharing) -> StoreResult<()>;
    fn get_sharing(&self, root_id: &str) -> StoreResult<Sharing>;

    // Teams.

    fn upsert_team_signup_token(&self, team: &Team) -> StoreResult<()>;
    fn upsert_team_settings(&self, team: &Team) -> StoreResult<()>;
    fn get_team(&self, team_id: &str) -> StoreResult<Team>;
    fn get_teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>>;
    fn get_all_teams(&self) -> StoreResult<Vec<Team>>;
    fn get_team_count(&self) -> StoreResult<i64>;

    // Boards.

    fn insert_board(&self, board: &Board, user_id: &str) -> StoreResult<Board>;
    /// Transactional. Inserts the board and makes `user_id` its admin.
    fn insert_board_with_admin(
        &self,
        board: &Board,
        user_id: &str,
    ) -> StoreResult<(Board, BoardMember)>;
    /// Transactional.
    fn patch_board(&self, board_id: &str, patch: &BoardPatch, user_id: &str)
        -> StoreResult<Board>;
    fn get_board(&self, board_id: &str) -> StoreResult<Board>;
    fn get_boards_for_user_and_team(&self, user_id: &str, team_id: &str)
        -> StoreResult<Vec<Board>>;
    /// Transactional. Removes the board, its members and blocks; missing ids are a no-op.
    fn delete_board(&self, board_id: &str, user_id: &str) -> StoreResult<()>;

    // Board members.

    fn save_member(&self, member: &BoardMember) -> StoreResult<BoardMember>;
    fn delete_member(&self, board_id: &str, user_id: &str) -> StoreResult<()>;
    fn get_member_for_board(&self, board_id: &str, user_id: &str) -> StoreResult<BoardMember>;
    fn get_members_for_board(&self, board_id: &str) -> StoreResult<Vec<BoardMember>>;
    fn search_boards_for_user_and_team(
        &self,
        term: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Board>>;

    // Combined batches, all transactional.

    fn create_boards_and_blocks_with_admin(
        &self,
        bab: &BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)>;
    fn create_boards_and_blocks(
        &self,
        bab: &BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks>;
    fn patch_boards_and_blocks(
        &self,
        pbab: &PatchBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks>;
    fn delete_boards_and_blocks(&self, dbab: &DeleteBoardsAndBlocks, user_id: &str)
        -> StoreResult<()>;

    // Categories.

    fn get_category(&self, category_id: &str) -> StoreResult<Category>;
    fn create_category(&self, category: &Category) -> StoreResult<()>;
    fn update_category(&self, category: &Category) -> StoreResult<()>;
    fn delete_category(&self, category_id: &str, user_id: &str, team_id: &str)
        -> StoreResult<()>;
    fn get_user_category_blocks(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<CategoryBlocks>>;
    fn add_update_category_block(
        &self,
        user_id: &str,
        category_id: &str,
        block_id: &str,
    ) -> StoreResult<()>;

    // Subscriptions.

    fn create_subscription(&self, sub: &Subscription) -> StoreResult<Subscription>;
    fn delete_subscription(&self, block_id: &str, subscriber_id: &str) -> StoreResult<()>;
    fn get_subscription(&self, block_id: &str, subscriber_id: &str) -> StoreResult<Subscription>;
    fn get_subscriptions(&self, subscriber_id: &str) -> StoreResult<Vec<Subscription>>;
    fn get_subscribers_for_block(&self, block_id: &str) -> StoreResult<Vec<Subscriber>>;
    fn get_subscribers_count_for_block(&self, block_id: &str) -> StoreResult<i64>;
    fn update_subscribers_notified_at(&self, block_id: &str, notified_at: i64)
        -> StoreResult<()>;

    // Notification hints.

    /// Creates the hint due in `notification_freq`, or postpones an existing one.
    fn upsert_notification_hint(
        &self,
        hint: &NotificationHint,
        notification_freq: Duration,
    ) -> StoreResult<NotificationHint>;
    fn delete_notification_hint(&self, block_id: &str) -> StoreResult<()>;
    fn get_notification_hint(&self, block_id: &str) -> StoreResult<NotificationHint>;
    /// Earliest-due hint. With `remove`, it is claimed by exactly one caller.
    fn get_next_notification_hint(&self, remove: bool) -> StoreResult<NotificationHint>;

    // Templates.

    /// Deletes the built-in templates among `boards`.
    fn remove_default_templates(&self, boards: &[Board]) -> StoreResult<()>;
    fn get_template_boards(&self, team_id: &str) -> StoreResult<Vec<Board>>;

    /// See [`is_err_not_found`].
    fn is_err_not_found(&self, err: &(dyn Error + 'static)) -> bool {
        is_err_not_found(err)
    }
}
