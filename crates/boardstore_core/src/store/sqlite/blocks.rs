//! Block persistence: tree queries, upserts with history, subtree deletion.
//!
//! # Invariants
//! - Every write appends one row to `blocks_history`.
//! - Functions taking `&Transaction` are only reachable inside a
//!   transaction opened by the store.
//! - Child listing is deterministic: `create_at ASC, id ASC`.

use super::boards;
use super::rows::{
    get_block_type, get_json_map, json_text, query_all, query_optional, query_required,
};
use crate::model::block::{
    Block, BlockPatch, BlockPatchBatch, QueryBlockHistoryOptions, QuerySubtreeOptions,
};
use crate::model::board::Board;
use crate::model::{now_millis, ValidationError};
use crate::store::{StoreError, StoreResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::collections::{HashMap, HashSet};

/// Upper bound of parent hops when resolving the card of a block.
const MAX_CARD_LOOKUP_DEPTH: usize = 16;

const BLOCK_COLUMNS: &str = "id,
    board_id,
    parent_id,
    root_id,
    created_by,
    modified_by,
    schema,
    type,
    title,
    fields,
    create_at,
    update_at,
    delete_at";

pub(super) fn get_blocks_with_parent_and_type(
    conn: &Connection,
    board_id: &str,
    parent_id: &str,
    block_type: &str,
) -> StoreResult<Vec<Block>> {
    query_all(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE board_id = ?1
               AND parent_id = ?2
               AND type = ?3
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;"
        ),
        params![board_id, parent_id, block_type],
        parse_block_row,
    )
}

pub(super) fn get_blocks_with_parent(
    conn: &Connection,
    board_id: &str,
    parent_id: &str,
) -> StoreResult<Vec<Block>> {
    query_all(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE board_id = ?1
               AND parent_id = ?2
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;"
        ),
        params![board_id, parent_id],
        parse_block_row,
    )
}

pub(super) fn get_blocks_with_root_id(
    conn: &Connection,
    board_id: &str,
    root_id: &str,
) -> StoreResult<Vec<Block>> {
    query_all(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE board_id = ?1
               AND root_id = ?2
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;"
        ),
        params![board_id, root_id],
        parse_block_row,
    )
}

pub(super) fn get_blocks_with_type(
    conn: &Connection,
    board_id: &str,
    block_type: &str,
) -> StoreResult<Vec<Block>> {
    query_all(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE board_id = ?1
               AND type = ?2
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;"
        ),
        params![board_id, block_type],
        parse_block_row,
    )
}

pub(super) fn get_blocks_for_board(conn: &Connection, board_id: &str) -> StoreResult<Vec<Block>> {
    query_all(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE board_id = ?1
               AND delete_at = 0
             ORDER BY create_at ASC, id ASC;"
        ),
        [board_id],
        parse_block_row,
    )
}

/// Depth of a bounded subtree read, counting the starting block as level 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SubtreeDepth {
    Two,
    Three,
}

/// Reads `block_id` and its descendants down to `depth` levels.
///
/// A missing starting block yields an empty list.
pub(super) fn get_sub_tree(
    conn: &Connection,
    board_id: &str,
    block_id: &str,
    depth: SubtreeDepth,
    opts: &QuerySubtreeOptions,
) -> StoreResult<Vec<Block>> {
    let mut sql = format!(
        "SELECT {BLOCK_COLUMNS}
         FROM blocks
         WHERE board_id = ?1
           AND delete_at = 0"
    );
    match depth {
        SubtreeDepth::Two => sql.push_str(" AND (id = ?2 OR parent_id = ?2)"),
        SubtreeDepth::Three => sql.push_str(
            " AND (
                id = ?2
                OR parent_id = ?2
                OR parent_id IN (
                    SELECT id
                    FROM blocks
                    WHERE board_id = ?1
                      AND parent_id = ?2
                      AND delete_at = 0
                )
            )",
        ),
    }

    let mut bind_values = vec![
        Value::Text(board_id.to_string()),
        Value::Text(block_id.to_string()),
    ];
    if opts.after_update_at > 0 {
        sql.push_str(&format!(" AND update_at > ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(opts.after_update_at));
    }
    if opts.before_update_at > 0 {
        sql.push_str(&format!(" AND update_at < ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(opts.before_update_at));
    }
    sql.push_str(" ORDER BY create_at ASC, id ASC");
    if opts.limit > 0 {
        sql.push_str(&format!(" LIMIT ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(i64::try_from(opts.limit).unwrap_or(i64::MAX)));
    }

    query_all(conn, &sql, params_from_iter(bind_values), parse_block_row)
}

pub(super) fn get_block(conn: &Connection, block_id: &str) -> StoreResult<Block> {
    query_required(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE id = ?1
               AND delete_at = 0;"
        ),
        [block_id],
        || format!("block {block_id}"),
        parse_block_row,
    )
}

fn find_block(conn: &Connection, block_id: &str) -> StoreResult<Option<Block>> {
    query_optional(
        conn,
        &format!(
            "SELECT {BLOCK_COLUMNS}
             FROM blocks
             WHERE id = ?1;"
        ),
        [block_id],
        parse_block_row,
    )
}

fn block_exists(conn: &Connection, block_id: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blocks WHERE id = ?1 AND delete_at = 0);",
        [block_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(super) fn insert_block(tx: &Transaction<'_>, block: &Block, user_id: &str) -> StoreResult<()> {
    block.validate()?;
    write_block(tx, block, user_id, &HashSet::new())
}

/// Writes every block or none: validation of the whole batch happens
/// before the first row is touched, and the caller's transaction rolls
/// back on any later failure.
pub(super) fn insert_blocks(
    tx: &Transaction<'_>,
    blocks: &[Block],
    user_id: &str,
) -> StoreResult<()> {
    for block in blocks {
        block.validate()?;
    }
    let batch_ids: HashSet<&str> = blocks.iter().map(|block| block.id.as_str()).collect();
    for block in blocks {
        ensure_references(tx, block, &batch_ids)?;
    }
    for block in blocks {
        write_block(tx, block, user_id, &batch_ids)?;
    }
    Ok(())
}

fn write_block(
    tx: &Transaction<'_>,
    block: &Block,
    user_id: &str,
    batch_ids: &HashSet<&str>,
) -> StoreResult<()> {
    ensure_references(tx, block, batch_ids)?;

    let now = now_millis();
    let mut row = block.clone();
    row.modified_by = user_id.to_string();
    row.update_at = now;

    match find_block(tx, &block.id)? {
        Some(existing) => {
            row.created_by = existing.created_by;
            row.create_at = existing.create_at;
            tx.execute(
                "UPDATE blocks
                 SET board_id = ?2,
                     parent_id = ?3,
                     root_id = ?4,
                     modified_by = ?5,
                     schema = ?6,
                     type = ?7,
                     title = ?8,
                     fields = ?9,
                     update_at = ?10,
                     delete_at = ?11
                 WHERE id = ?1;",
                params![
                    row.id,
                    row.board_id,
                    row.parent_id,
                    row.root_id,
                    row.modified_by,
                    row.schema,
                    row.block_type.as_str(),
                    row.title,
                    json_text(&row.fields)?,
                    row.update_at,
                    row.delete_at,
                ],
            )?;
        }
        None => {
            row.created_by = user_id.to_string();
            if row.create_at == 0 {
                row.create_at = now;
            }
            tx.execute(
                &format!(
                    "INSERT INTO blocks ({BLOCK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);"
                ),
                params![
                    row.id,
                    row.board_id,
                    row.parent_id,
                    row.root_id,
                    row.created_by,
                    row.modified_by,
                    row.schema,
                    row.block_type.as_str(),
                    row.title,
                    json_text(&row.fields)?,
                    row.create_at,
                    row.update_at,
                    row.delete_at,
                ],
            )?;
        }
    }

    append_history(tx, &row)
}

fn ensure_references(
    conn: &Connection,
    block: &Block,
    batch_ids: &HashSet<&str>,
) -> StoreResult<()> {
    let resolves = |target: &str| -> StoreResult<bool> {
        Ok(target == block.board_id
            || batch_ids.contains(target)
            || block_exists(conn, target)?)
    };

    if !block.parent_id.is_empty() && !resolves(&block.parent_id)? {
        return Err(ValidationError::DanglingReference {
            block_id: block.id.clone(),
            field: "parent_id",
            target: block.parent_id.clone(),
        }
        .into());
    }
    if !block.root_id.is_empty() && block.root_id != block.id && !resolves(&block.root_id)? {
        return Err(ValidationError::DanglingReference {
            block_id: block.id.clone(),
            field: "root_id",
            target: block.root_id.clone(),
        }
        .into());
    }
    Ok(())
}

fn append_history(conn: &Connection, block: &Block) -> StoreResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO blocks_history ({BLOCK_COLUMNS}, insert_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14);"
        ),
        params![
            block.id,
            block.board_id,
            block.parent_id,
            block.root_id,
            block.created_by,
            block.modified_by,
            block.schema,
            block.block_type.as_str(),
            block.title,
            json_text(&block.fields)?,
            block.create_at,
            block.update_at,
            block.delete_at,
            now_millis(),
        ],
    )?;
    Ok(())
}

/// Deletes a block and all of its descendants, recording a tombstone
/// revision for each. Unknown ids are a no-op.
pub(super) fn delete_block(
    tx: &Transaction<'_>,
    block_id: &str,
    modified_by: &str,
) -> StoreResult<()> {
    let ids: Vec<String> = query_all(
        tx,
        "WITH RECURSIVE subtree(id) AS (
            SELECT id
            FROM blocks
            WHERE id = ?1
            UNION
            SELECT child.id
            FROM blocks child
            INNER JOIN subtree parent ON child.parent_id = parent.id
        )
        SELECT id FROM subtree;",
        [block_id],
        |row| Ok(row.get::<_, String>(0)?),
    )?;

    if ids.is_empty() {
        debug!("event=block_delete module=store status=noop block_id={block_id}");
        return Ok(());
    }

    for id in &ids {
        tombstone_block(tx, id, modified_by)?;
    }
    debug!(
        "event=block_delete module=store status=ok block_id={} removed={}",
        block_id,
        ids.len()
    );
    Ok(())
}

/// Deletes every block of a board, recording tombstones.
pub(super) fn delete_blocks_for_board(
    tx: &Transaction<'_>,
    board_id: &str,
    modified_by: &str,
) -> StoreResult<()> {
    let ids: Vec<String> = query_all(
        tx,
        "SELECT id FROM blocks WHERE board_id = ?1;",
        [board_id],
        |row| Ok(row.get::<_, String>(0)?),
    )?;
    for id in &ids {
        tombstone_block(tx, id, modified_by)?;
    }
    Ok(())
}

fn tombstone_block(tx: &Transaction<'_>, block_id: &str, modified_by: &str) -> StoreResult<()> {
    let Some(mut block) = find_block(tx, block_id)? else {
        return Ok(());
    };
    let now = now_millis();
    block.modified_by = modified_by.to_string();
    block.update_at = now;
    block.delete_at = now;
    append_history(tx, &block)?;
    tx.execute("DELETE FROM blocks WHERE id = ?1;", [block_id])?;
    Ok(())
}

pub(super) fn get_block_counts_by_type(tx: &Transaction<'_>) -> StoreResult<HashMap<String, i64>> {
    let counts = query_all(
        tx,
        "SELECT type, COUNT(*) AS total
         FROM blocks
         WHERE delete_at = 0
         GROUP BY type;",
        [],
        |row| Ok((row.get::<_, String>("type")?, row.get::<_, i64>("total")?)),
    )?;
    Ok(counts.into_iter().collect())
}

pub(super) fn patch_block(
    tx: &Transaction<'_>,
    block_id: &str,
    patch: &BlockPatch,
    user_id: &str,
) -> StoreResult<()> {
    let existing = get_block(tx, block_id)?;
    let patched = patch.patch(&existing);
    patched.validate()?;
    write_block(tx, &patched, user_id, &HashSet::new())
}

pub(super) fn patch_blocks(
    tx: &Transaction<'_>,
    batch: &BlockPatchBatch,
    user_id: &str,
) -> StoreResult<()> {
    batch.validate()?;
    for (block_id, patch) in batch.block_ids.iter().zip(&batch.block_patches) {
        patch_block(tx, block_id, patch, user_id)?;
    }
    Ok(())
}

pub(super) fn get_block_history(
    conn: &Connection,
    block_id: &str,
    opts: &QueryBlockHistoryOptions,
) -> StoreResult<Vec<Block>> {
    let mut sql = format!(
        "SELECT {BLOCK_COLUMNS}
         FROM blocks_history
         WHERE id = ?1"
    );
    let mut bind_values = vec![Value::Text(block_id.to_string())];
    if opts.after_update_at > 0 {
        sql.push_str(&format!(" AND update_at > ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(opts.after_update_at));
    }
    if opts.before_update_at > 0 {
        sql.push_str(&format!(" AND update_at < ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(opts.before_update_at));
    }
    if opts.descending {
        sql.push_str(" ORDER BY update_at DESC, history_id DESC");
    } else {
        sql.push_str(" ORDER BY update_at ASC, history_id ASC");
    }
    if opts.limit > 0 {
        sql.push_str(&format!(" LIMIT ?{}", bind_values.len() + 1));
        bind_values.push(Value::Integer(i64::try_from(opts.limit).unwrap_or(i64::MAX)));
    }

    query_all(conn, &sql, params_from_iter(bind_values), parse_block_row)
}

/// Resolves the owning board and the nearest card at or above `block`.
pub(super) fn get_board_and_card(conn: &Connection, block: &Block) -> StoreResult<(Board, Block)> {
    let mut current = block.clone();
    let mut card = None;
    for _ in 0..MAX_CARD_LOOKUP_DEPTH {
        if current.is_card() {
            card = Some(current);
            break;
        }
        if current.parent_id.is_empty() || current.parent_id == current.board_id {
            break;
        }
        current = get_block(conn, &current.parent_id)?;
    }

    let card = card.ok_or_else(|| StoreError::not_found(format!("card for block {}", block.id)))?;
    let board = boards::get_board(conn, &card.board_id)?;
    Ok((board, card))
}

pub(super) fn parse_block_row(row: &Row<'_>) -> StoreResult<Block> {
    Ok(Block {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        root_id: row.get("root_id")?,
        created_by: row.get("created_by")?,
        modified_by: row.get("modified_by")?,
        schema: row.get("schema")?,
        block_type: get_block_type(row, "type")?,
        title: row.get("title")?,
        fields: get_json_map(row, "fields")?,
        create_at: row.get("create_at")?,
        update_at: row.get("update_at")?,
        delete_at: row.get("delete_at")?,
        board_id: row.get("board_id")?,
    })
}
