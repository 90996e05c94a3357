//! Per-user sidebar categories and their block assignments.
//!
//! # Invariants
//! - Categories and assignments are soft-deleted (`delete_at > 0`).
//! - A block is assigned to at most one live category per user.

use super::rows::{bool_to_int, get_bool, query_all, query_required, require_changed};
use crate::model::category::{Category, CategoryBlocks};
use crate::model::{new_id, now_millis, IdType};
use crate::store::StoreResult;
use rusqlite::{params, Connection, Row, Transaction};

const CATEGORY_COLUMNS: &str = "id, name, user_id, team_id, create_at, update_at, delete_at, collapsed";

pub(super) fn get_category(conn: &Connection, category_id: &str) -> StoreResult<Category> {
    query_required(
        conn,
        &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1;"),
        [category_id],
        || format!("category {category_id}"),
        parse_category_row,
    )
}

pub(super) fn create_category(conn: &Connection, category: &Category) -> StoreResult<()> {
    category.validate()?;
    let now = now_millis();
    let create_at = if category.create_at > 0 {
        category.create_at
    } else {
        now
    };
    conn.execute(
        &format!(
            "INSERT INTO categories ({CATEGORY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7);"
        ),
        params![
            category.id,
            category.name,
            category.user_id,
            category.team_id,
            create_at,
            now,
            bool_to_int(category.collapsed),
        ],
    )?;
    Ok(())
}

pub(super) fn update_category(conn: &Connection, category: &Category) -> StoreResult<()> {
    category.validate()?;
    let changed = conn.execute(
        "UPDATE categories
         SET name = ?2,
             collapsed = ?3,
             update_at = ?4
         WHERE id = ?1
           AND delete_at = 0;",
        params![
            category.id,
            category.name,
            bool_to_int(category.collapsed),
            now_millis()
        ],
    )?;
    require_changed(changed, || format!("category {}", category.id))
}

/// Soft-deletes the category owned by `user_id` in `team_id` together with
/// its block assignments. Unknown or foreign categories are a no-op.
pub(super) fn delete_category(
    tx: &Transaction<'_>,
    category_id: &str,
    user_id: &str,
    team_id: &str,
) -> StoreResult<()> {
    let now = now_millis();
    let changed = tx.execute(
        "UPDATE categories
         SET delete_at = ?4,
             update_at = ?4
         WHERE id = ?1
           AND user_id = ?2
           AND team_id = ?3
           AND delete_at = 0;",
        params![category_id, user_id, team_id, now],
    )?;
    if changed > 0 {
        tx.execute(
            "UPDATE category_blocks
             SET delete_at = ?2,
                 update_at = ?2
             WHERE category_id = ?1
               AND delete_at = 0;",
            params![category_id, now],
        )?;
    }
    Ok(())
}

/// Live categories of a user in a team with their assigned block ids.
pub(super) fn get_user_category_blocks(
    conn: &Connection,
    user_id: &str,
    team_id: &str,
) -> StoreResult<Vec<CategoryBlocks>> {
    let categories = query_all(
        conn,
        &format!(
            "SELECT {CATEGORY_COLUMNS}
             FROM categories
             WHERE user_id = ?1
               AND team_id = ?2
               AND delete_at = 0
             ORDER BY name ASC, id ASC;"
        ),
        params![user_id, team_id],
        parse_category_row,
    )?;

    let mut result = Vec::with_capacity(categories.len());
    for category in categories {
        let block_ids = query_all(
            conn,
            "SELECT block_id
             FROM category_blocks
             WHERE category_id = ?1
               AND user_id = ?2
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;",
            params![category.id, user_id],
            |row| Ok(row.get::<_, String>("block_id")?),
        )?;
        result.push(CategoryBlocks {
            category,
            block_ids,
        });
    }
    Ok(result)
}

/// Moves `block_id` into `category_id` for `user_id`, releasing any
/// previous assignment of that block.
pub(super) fn add_update_category_block(
    tx: &Transaction<'_>,
    user_id: &str,
    category_id: &str,
    block_id: &str,
) -> StoreResult<()> {
    let now = now_millis();
    tx.execute(
        "UPDATE category_blocks
         SET delete_at = ?3,
             update_at = ?3
         WHERE user_id = ?1
           AND block_id = ?2
           AND delete_at = 0;",
        params![user_id, block_id, now],
    )?;
    tx.execute(
        "INSERT INTO category_blocks (id, user_id, category_id, block_id, create_at, update_at, delete_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0);",
        params![new_id(IdType::None), user_id, category_id, block_id, now],
    )?;
    Ok(())
}

fn parse_category_row(row: &Row<'_>) -> StoreResult<Category> {
    Ok(Category {
        id: row.get("id")?,
        name: row.get("name")?,
        user_id: row.get("user_id")?,
        team_id: row.get("team_id")?,
        create_at: row.get("create_at")?,
        update_at: row.get("update_at")?,
        delete_at: row.get("delete_at")?,
        collapsed: get_bool(row, "collapsed")?,
    })
}
