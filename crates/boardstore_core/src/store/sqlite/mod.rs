//! SQLite implementation of [`Store`].
//!
//! # Responsibility
//! - Own one migrated SQLite connection and serialize access to it.
//! - Run transactional operations inside one IMMEDIATE transaction.
//!
//! # Invariants
//! - Transactional operations receive a `&Transaction`, never a bare
//!   connection; they commit on `Ok` and roll back on `Err`.
//! - After `shutdown`, every call fails with `StoreError::Closed`.

use crate::config::StoreConfig;
use crate::db::{self, migrations};
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
use crate::store::{Store, StoreError, StoreResult};
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

mod blocks;
mod boards;
mod categories;
mod rows;
mod subscriptions;
mod teams;
mod users;

use blocks::SubtreeDepth;

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Wraps an already migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema is not at the latest version.
    pub fn new(conn: Connection) -> StoreResult<Self> {
        let expected_version = migrations::latest_version();
        let actual_version = migrations::current_user_version(&conn)?;
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(db::open_db(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::new(db::open_db_in_memory()?)
    }

    /// Opens the database named by `config`, or an in-memory one when no
    /// path is configured.
    pub fn open_with_config(config: &StoreConfig) -> StoreResult<Self> {
        let conn = match &config.database_path {
            Some(path) => db::open_db_with_busy_timeout(path, config.busy_timeout())?,
            None => db::open_db_in_memory()?,
        };
        Self::new(conn)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn with_conn<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Connection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::Closed)?;
        let result = f(conn);
        if let Err(err) = &result {
            log_failure(op, err);
        }
        result
    }

    fn with_tx<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        let started_at = Instant::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                debug!(
                    "event=store_tx module=store op={op} status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                log_failure(op, &err);
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=store_tx module=store op={op} status=error stage=rollback error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }
}

fn log_failure(op: &'static str, err: &StoreError) {
    if err.is_not_found() {
        debug!("event=store_call module=store op={op} status=not_found");
    } else {
        warn!("event=store_call module=store op={op} status=error error={err}");
    }
}

impl Store for SqliteStore {
    fn get_blocks_with_parent_and_type(
        &self,
        board_id: &str,
        parent_id: &str,
        block_type: &str,
    ) -> StoreResult<Vec<Block>> {
        self.with_conn("get_blocks_with_parent_and_type", |conn| {
            blocks::get_blocks_with_parent_and_type(conn, board_id, parent_id, block_type)
        })
    }

    fn get_blocks_with_parent(&self, board_id: &str, parent_id: &str) -> StoreResult<Vec<Block>> {
        self.with_conn("get_blocks_with_parent", |conn| {
            blocks::get_blocks_with_parent(conn, board_id, parent_id)
        })
    }

    fn get_blocks_with_root_id(&self, board_id: &str, root_id: &str) -> StoreResult<Vec<Block>> {
        self.with_conn("get_blocks_with_root_id", |conn| {
            blocks::get_blocks_with_root_id(conn, board_id, root_id)
        })
    }

    fn get_blocks_with_type(&self, board_id: &str, block_type: &str) -> StoreResult<Vec<Block>> {
        self.with_conn("get_blocks_with_type", |conn| {
            blocks::get_blocks_with_type(conn, board_id, block_type)
        })
    }

    fn get_sub_tree2(
        &self,
        board_id: &str,
        block_id: &str,
        opts: &QuerySubtreeOptions,
    ) -> StoreResult<Vec<Block>> {
        self.with_conn("get_sub_tree2", |conn| {
            blocks::get_sub_tree(conn, board_id, block_id, SubtreeDepth::Two, opts)
        })
    }

    fn get_sub_tree3(
        &self,
        board_id: &str,
        block_id: &str,
        opts: &QuerySubtreeOptions,
    ) -> StoreResult<Vec<Block>> {
        self.with_conn("get_sub_tree3", |conn| {
            blocks::get_sub_tree(conn, board_id, block_id, SubtreeDepth::Three, opts)
        })
    }

    fn get_blocks_for_board(&self, board_id: &str) -> StoreResult<Vec<Block>> {
        self.with_conn("get_blocks_for_board", |conn| {
            blocks::get_blocks_for_board(conn, board_id)
        })
    }

    fn insert_block(&self, block: &Block, user_id: &str) -> StoreResult<()> {
        self.with_tx("insert_block", |tx| blocks::insert_block(tx, block, user_id))
    }

    fn delete_block(&self, block_id: &str, modified_by: &str) -> StoreResult<()> {
        self.with_tx("delete_block", |tx| {
            blocks::delete_block(tx, block_id, modified_by)
        })
    }

    fn insert_blocks(&self, blocks: &[Block], user_id: &str) -> StoreResult<()> {
        self.with_tx("insert_blocks", |tx| {
            blocks::insert_blocks(tx, blocks, user_id)
        })
    }

    fn get_block_counts_by_type(&self) -> StoreResult<HashMap<String, i64>> {
        self.with_tx("get_block_counts_by_type", blocks::get_block_counts_by_type)
    }

    fn get_block(&self, block_id: &str) -> StoreResult<Block> {
        self.with_conn("get_block", |conn| blocks::get_block(conn, block_id))
    }

    fn patch_block(&self, block_id: &str, patch: &BlockPatch, user_id: &str) -> StoreResult<()> {
        self.with_tx("patch_block", |tx| {
            blocks::patch_block(tx, block_id, patch, user_id)
        })
    }

    fn get_block_history(
        &self,
        block_id: &str,
        opts: &QueryBlockHistoryOptions,
    ) -> StoreResult<Vec<Block>> {
        self.with_conn("get_block_history", |conn| {
            blocks::get_block_history(conn, block_id, opts)
        })
    }

    fn get_board_and_card_by_id(&self, block_id: &str) -> StoreResult<(Board, Block)> {
        self.with_conn("get_board_and_card_by_id", |conn| {
            let block = blocks::get_block(conn, block_id)?;
            blocks::get_board_and_card(conn, &block)
        })
    }

    fn get_board_and_card(&self, block: &Block) -> StoreResult<(Board, Block)> {
        self.with_conn("get_board_and_card", |conn| {
            blocks::get_board_and_card(conn, block)
        })
    }

    fn duplicate_board(
        &self,
        board_id: &str,
        user_id: &str,
        as_template: bool,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
        self.with_tx("duplicate_board", |tx| {
            boards::duplicate_board(tx, board_id, user_id, as_template)
        })
    }

    fn patch_blocks(&self, patches: &BlockPatchBatch, user_id: &str) -> StoreResult<()> {
        self.with_tx("patch_blocks", |tx| {
            blocks::patch_blocks(tx, patches, user_id)
        })
    }

    fn shutdown(&self) -> StoreResult<()> {
        let conn = self.lock()?.take().ok_or(StoreError::Closed)?;
        conn.close().map_err(|(_, err)| StoreError::from(err))?;
        info!("event=store_shutdown module=store status=ok");
        Ok(())
    }

    fn get_system_setting(&self, key: &str) -> StoreResult<String> {
        self.with_conn("get_system_setting", |conn| {
            teams::get_system_setting(conn, key)
        })
    }

    fn get_system_settings(&self) -> StoreResult<HashMap<String, String>> {
        self.with_conn("get_system_settings", teams::get_system_settings)
    }

    fn set_system_setting(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_conn("set_system_setting", |conn| {
            teams::set_system_setting(conn, key, value)
        })
    }

    fn get_registered_user_count(&self) -> StoreResult<i64> {
        self.with_conn("get_registered_user_count", users::get_registered_user_count)
    }

    fn get_user_by_id(&self, user_id: &str) -> StoreResult<User> {
        self.with_conn("get_user_by_id", |conn| users::get_user_by_id(conn, user_id))
    }

    fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.with_conn("get_user_by_email", |conn| {
            users::get_user_by_email(conn, email)
        })
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        self.with_conn("get_user_by_username", |conn| {
            users::get_user_by_username(conn, username)
        })
    }

    fn create_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn("create_user", |conn| users::create_user(conn, user))
    }

    fn update_user(&self, user: &User) -> StoreResult<()> {
        self.with_conn("update_user", |conn| users::update_user(conn, user))
    }

    fn update_user_password(&self, username: &str, password: &str) -> StoreResult<()> {
        self.with_conn("update_user_password", |conn| {
            users::update_user_password(conn, username, password)
        })
    }

    fn update_user_password_by_id(&self, user_id: &str, password: &str) -> StoreResult<()> {
        self.with_conn("update_user_password_by_id", |conn| {
            users::update_user_password_by_id(conn, user_id, password)
        })
    }

    fn get_users_by_team(&self, team_id: &str) -> StoreResult<Vec<User>> {
        self.with_conn("get_users_by_team", |conn| {
            users::get_users_by_team(conn, team_id)
        })
    }

    fn get_active_user_count(&self, updated_seconds_ago: i64) -> StoreResult<i64> {
        self.with_conn("get_active_user_count", |conn| {
            users::get_active_user_count(conn, updated_seconds_ago)
        })
    }

    fn get_session(&self, token: &str, expire_time: i64) -> StoreResult<Session> {
        self.with_conn("get_session", |conn| {
            users::get_session(conn, token, expire_time)
        })
    }

    fn create_session(&self, session: &Session) -> StoreResult<()> {
        self.with_conn("create_session", |conn| {
            users::create_session(conn, session)
        })
    }

    fn refresh_session(&self, session: &Session) -> StoreResult<()> {
        self.with_conn("refresh_session", |conn| {
            users::refresh_session(conn, session)
        })
    }

    fn update_session(&self, session: &Session) -> StoreResult<()> {
        self.with_conn("update_session", |conn| {
            users::update_session(conn, session)
        })
    }

    fn delete_session(&self, session_id: &str) -> StoreResult<()> {
        self.with_conn("delete_session", |conn| {
            users::delete_session(conn, session_id)
        })
    }

    fn clean_up_sessions(&self, expire_time: i64) -> StoreResult<()> {
        self.with_conn("clean_up_sessions", |conn| {
            users::clean_up_sessions(conn, expire_time)
        })
    }

    fn upsert_sharing(&self, sharing: &Sharing) -> StoreResult<()> {
        self.with_conn("upsert_sharing", |conn| teams::upsert_sharing(conn, sharing))
    }

    fn get_sharing(&self, root_id: &str) -> StoreResult<Sharing> {
        self.with_conn("get_sharing", |conn| teams::get_sharing(conn, root_id))
    }

    fn upsert_team_signup_token(&self, team: &Team) -> StoreResult<()> {
        self.with_conn("upsert_team_signup_token", |conn| {
            teams::upsert_team_signup_token(conn, team)
        })
    }

    fn upsert_team_settings(&self, team: &Team) -> StoreResult<()> {
        self.with_conn("upsert_team_settings", |conn| {
            teams::upsert_team_settings(conn, team)
        })
    }

    fn get_team(&self, team_id: &str) -> StoreResult<Team> {
        self.with_conn("get_team", |conn| teams::get_team(conn, team_id))
    }

    fn get_teams_for_user(&self, user_id: &str) -> StoreResult<Vec<Team>> {
        self.with_conn("get_teams_for_user", |conn| {
            teams::get_teams_for_user(conn, user_id)
        })
    }

    fn get_all_teams(&self) -> StoreResult<Vec<Team>> {
        self.with_conn("get_all_teams", teams::get_all_teams)
    }

    fn get_team_count(&self) -> StoreResult<i64> {
        self.with_conn("get_team_count", teams::get_team_count)
    }

    fn insert_board(&self, board: &Board, user_id: &str) -> StoreResult<Board> {
        self.with_tx("insert_board", |tx| boards::insert_board(tx, board, user_id))
    }

    fn insert_board_with_admin(
        &self,
        board: &Board,
        user_id: &str,
    ) -> StoreResult<(Board, BoardMember)> {
        self.with_tx("insert_board_with_admin", |tx| {
            boards::insert_board_with_admin(tx, board, user_id)
        })
    }

    fn patch_board(
        &self,
        board_id: &str,
        patch: &BoardPatch,
        user_id: &str,
    ) -> StoreResult<Board> {
        self.with_tx("patch_board", |tx| {
            boards::patch_board(tx, board_id, patch, user_id)
        })
    }

    fn get_board(&self, board_id: &str) -> StoreResult<Board> {
        self.with_conn("get_board", |conn| boards::get_board(conn, board_id))
    }

    fn get_boards_for_user_and_team(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Board>> {
        self.with_conn("get_boards_for_user_and_team", |conn| {
            boards::get_boards_for_user_and_team(conn, user_id, team_id)
        })
    }

    fn delete_board(&self, board_id: &str, user_id: &str) -> StoreResult<()> {
        self.with_tx("delete_board", |tx| {
            boards::delete_board(tx, board_id, user_id)
        })
    }

    fn save_member(&self, member: &BoardMember) -> StoreResult<BoardMember> {
        self.with_conn("save_member", |conn| boards::save_member(conn, member))
    }

    fn delete_member(&self, board_id: &str, user_id: &str) -> StoreResult<()> {
        self.with_conn("delete_member", |conn| {
            boards::delete_member(conn, board_id, user_id)
        })
    }

    fn get_member_for_board(&self, board_id: &str, user_id: &str) -> StoreResult<BoardMember> {
        self.with_conn("get_member_for_board", |conn| {
            boards::get_member_for_board(conn, board_id, user_id)
        })
    }

    fn get_members_for_board(&self, board_id: &str) -> StoreResult<Vec<BoardMember>> {
        self.with_conn("get_members_for_board", |conn| {
            boards::get_members_for_board(conn, board_id)
        })
    }

    fn search_boards_for_user_and_team(
        &self,
        term: &str,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<Board>> {
        self.with_conn("search_boards_for_user_and_team", |conn| {
            boards::search_boards_for_user_and_team(conn, term, user_id, team_id)
        })
    }

    fn create_boards_and_blocks_with_admin(
        &self,
        bab: &BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
        self.with_tx("create_boards_and_blocks_with_admin", |tx| {
            boards::create_boards_and_blocks_with_admin(tx, bab, user_id)
        })
    }

    fn create_boards_and_blocks(
        &self,
        bab: &BoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks> {
        self.with_tx("create_boards_and_blocks", |tx| {
            boards::create_boards_and_blocks(tx, bab, user_id)
        })
    }

    fn patch_boards_and_blocks(
        &self,
        pbab: &PatchBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<BoardsAndBlocks> {
        self.with_tx("patch_boards_and_blocks", |tx| {
            boards::patch_boards_and_blocks(tx, pbab, user_id)
        })
    }

    fn delete_boards_and_blocks(
        &self,
        dbab: &DeleteBoardsAndBlocks,
        user_id: &str,
    ) -> StoreResult<()> {
        self.with_tx("delete_boards_and_blocks", |tx| {
            boards::delete_boards_and_blocks(tx, dbab, user_id)
        })
    }

    fn get_category(&self, category_id: &str) -> StoreResult<Category> {
        self.with_conn("get_category", |conn| {
            categories::get_category(conn, category_id)
        })
    }

    fn create_category(&self, category: &Category) -> StoreResult<()> {
        self.with_conn("create_category", |conn| {
            categories::create_category(conn, category)
        })
    }

    fn update_category(&self, category: &Category) -> StoreResult<()> {
        self.with_conn("update_category", |conn| {
            categories::update_category(conn, category)
        })
    }

    fn delete_category(&self, category_id: &str, user_id: &str, team_id: &str) -> StoreResult<()> {
        self.with_tx("delete_category", |tx| {
            categories::delete_category(tx, category_id, user_id, team_id)
        })
    }

    fn get_user_category_blocks(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> StoreResult<Vec<CategoryBlocks>> {
        self.with_conn("get_user_category_blocks", |conn| {
            categories::get_user_category_blocks(conn, user_id, team_id)
        })
    }

    fn add_update_category_block(
        &self,
        user_id: &str,
        category_id: &str,
        block_id: &str,
    ) -> StoreResult<()> {
        self.with_tx("add_update_category_block", |tx| {
            categories::add_update_category_block(tx, user_id, category_id, block_id)
        })
    }

    fn create_subscription(&self, sub: &Subscription) -> StoreResult<Subscription> {
        self.with_tx("create_subscription", |tx| {
            subscriptions::create_subscription(tx, sub)
        })
    }

    fn delete_subscription(&self, block_id: &str, subscriber_id: &str) -> StoreResult<()> {
        self.with_conn("delete_subscription", |conn| {
            subscriptions::delete_subscription(conn, block_id, subscriber_id)
        })
    }

    fn get_subscription(&self, block_id: &str, subscriber_id: &str) -> StoreResult<Subscription> {
        self.with_conn("get_subscription", |conn| {
            subscriptions::get_subscription(conn, block_id, subscriber_id)
        })
    }

    fn get_subscriptions(&self, subscriber_id: &str) -> StoreResult<Vec<Subscription>> {
        self.with_conn("get_subscriptions", |conn| {
            subscriptions::get_subscriptions(conn, subscriber_id)
        })
    }

    fn get_subscribers_for_block(&self, block_id: &str) -> StoreResult<Vec<Subscriber>> {
        self.with_conn("get_subscribers_for_block", |conn| {
            subscriptions::get_subscribers_for_block(conn, block_id)
        })
    }

    fn get_subscribers_count_for_block(&self, block_id: &str) -> StoreResult<i64> {
        self.with_conn("get_subscribers_count_for_block", |conn| {
            subscriptions::get_subscribers_count_for_block(conn, block_id)
        })
    }

    fn update_subscribers_notified_at(&self, block_id: &str, notified_at: i64) -> StoreResult<()> {
        self.with_conn("update_subscribers_notified_at", |conn| {
            subscriptions::update_subscribers_notified_at(conn, block_id, notified_at)
        })
    }

    fn upsert_notification_hint(
        &self,
        hint: &NotificationHint,
        notification_freq: Duration,
    ) -> StoreResult<NotificationHint> {
        self.with_tx("upsert_notification_hint", |tx| {
            subscriptions::upsert_notification_hint(tx, hint, notification_freq)
        })
    }

    fn delete_notification_hint(&self, block_id: &str) -> StoreResult<()> {
        self.with_conn("delete_notification_hint", |conn| {
            subscriptions::delete_notification_hint(conn, block_id)
        })
    }

    fn get_notification_hint(&self, block_id: &str) -> StoreResult<NotificationHint> {
        self.with_conn("get_notification_hint", |conn| {
            subscriptions::get_notification_hint(conn, block_id)
        })
    }

    fn get_next_notification_hint(&self, remove: bool) -> StoreResult<NotificationHint> {
        self.with_tx("get_next_notification_hint", |tx| {
            subscriptions::get_next_notification_hint(tx, remove)
        })
    }

    fn remove_default_templates(&self, boards: &[Board]) -> StoreResult<()> {
        self.with_tx("remove_default_templates", |tx| {
            boards::remove_default_templates(tx, boards)
        })
    }

    fn get_template_boards(&self, team_id: &str) -> StoreResult<Vec<Board>> {
        self.with_conn("get_template_boards", |conn| {
            boards::get_template_boards(conn, team_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::db::open_db_in_memory;
    use crate::store::{Store, StoreError};
    use rusqlite::Connection;

    #[test]
    fn rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().expect("open raw connection");
        let err = SqliteStore::new(conn)
            .err()
            .expect("unmigrated connection must be rejected");
        assert!(matches!(
            err,
            StoreError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn shutdown_closes_the_store() {
        let store = SqliteStore::new(open_db_in_memory().expect("open db")).expect("store");
        store.shutdown().expect("first shutdown");
        assert!(matches!(store.get_team_count(), Err(StoreError::Closed)));
        assert!(matches!(store.shutdown(), Err(StoreError::Closed)));
    }

    #[test]
    fn failed_transaction_leaves_no_partial_writes() {
        let store = SqliteStore::open_in_memory().expect("store");
        let result: Result<(), StoreError> = store.with_tx("test_rollback", |tx| {
            tx.execute(
                "INSERT INTO system_settings (id, value) VALUES ('k', 'v');",
                [],
            )?;
            Err(StoreError::not_found("forced"))
        });
        assert!(result.is_err());
        assert!(store
            .get_system_setting("k")
            .expect_err("rolled back write must not be visible")
            .is_not_found());
    }
}
