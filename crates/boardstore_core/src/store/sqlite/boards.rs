//! Board persistence, membership, templates and combined batches.
//!
//! # Invariants
//! - Every board write appends one row to `boards_history`.
//! - Deleting a board removes its members and blocks in the same transaction.
//! - Member listings are deterministic: `user_id ASC`; board listings
//!   `title ASC, id ASC`.

use super::blocks;
use super::rows::{
    bool_to_int, get_bool, get_json_list, get_json_map, json_text, like_escape, query_all,
    query_optional, query_required,
};
use crate::model::board::{
    Board, BoardMember, BoardPatch, BoardType, BoardsAndBlocks, DeleteBoardsAndBlocks,
    PatchBoardsAndBlocks, SYSTEM_USER_ID,
};
use crate::model::now_millis;
use crate::store::{StoreError, StoreResult};
use log::{debug, info};
use rusqlite::{params, Connection, Row, Transaction};

const BOARD_COLUMNS: &str = "id,
    team_id,
    channel_id,
    created_by,
    modified_by,
    type,
    minimum_role,
    title,
    description,
    icon,
    show_description,
    is_template,
    template_version,
    properties,
    card_properties,
    create_at,
    update_at,
    delete_at";

const MEMBER_COLUMNS: &str = "board_id,
    user_id,
    roles,
    minimum_role,
    scheme_admin,
    scheme_editor,
    scheme_commenter,
    scheme_viewer";

pub(super) fn get_board(conn: &Connection, board_id: &str) -> StoreResult<Board> {
    query_required(
        conn,
        &format!(
            "SELECT {BOARD_COLUMNS}
             FROM boards
             WHERE id = ?1
               AND delete_at = 0;"
        ),
        [board_id],
        || format!("board {board_id}"),
        parse_board_row,
    )
}

fn find_board(conn: &Connection, board_id: &str) -> StoreResult<Option<Board>> {
    query_optional(
        conn,
        &format!("SELECT {BOARD_COLUMNS} FROM boards WHERE id = ?1;"),
        [board_id],
        parse_board_row,
    )
}

/// Creates or replaces one board and records the revision.
///
/// New boards get `created_by = user_id`; replacements keep their
/// original creator and creation time.
pub(super) fn insert_board(conn: &Connection, board: &Board, user_id: &str) -> StoreResult<Board> {
    board.validate()?;

    let now = now_millis();
    let mut row = board.clone();
    row.modified_by = user_id.to_string();
    row.update_at = now;

    match find_board(conn, &board.id)? {
        Some(existing) => {
            row.created_by = existing.created_by;
            row.create_at = existing.create_at;
            conn.execute(
                "UPDATE boards
                 SET team_id = ?2,
                     channel_id = ?3,
                     modified_by = ?4,
                     type = ?5,
                     minimum_role = ?6,
                     title = ?7,
                     description = ?8,
                     icon = ?9,
                     show_description = ?10,
                     is_template = ?11,
                     template_version = ?12,
                     properties = ?13,
                     card_properties = ?14,
                     update_at = ?15,
                     delete_at = ?16
                 WHERE id = ?1;",
                params![
                    row.id,
                    row.team_id,
                    row.channel_id,
                    row.modified_by,
                    row.board_type.as_str(),
                    row.minimum_role,
                    row.title,
                    row.description,
                    row.icon,
                    bool_to_int(row.show_description),
                    bool_to_int(row.is_template),
                    row.template_version,
                    json_text(&row.properties)?,
                    json_text(&row.card_properties)?,
                    row.update_at,
                    row.delete_at,
                ],
            )?;
        }
        None => {
            row.created_by = user_id.to_string();
            row.create_at = now;
            write_board_row(conn, "boards", &row, None)?;
        }
    }

    write_board_row(conn, "boards_history", &row, Some(now))?;
    get_board(conn, &row.id)
}

fn write_board_row(
    conn: &Connection,
    table: &'static str,
    board: &Board,
    insert_at: Option<i64>,
) -> StoreResult<()> {
    let (extra_column, extra_value) = match insert_at {
        Some(_) => (", insert_at", ", ?19"),
        None => ("", ""),
    };
    let sql = format!(
        "INSERT INTO {table} ({BOARD_COLUMNS}{extra_column})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18{extra_value});"
    );
    let properties = json_text(&board.properties)?;
    let card_properties = json_text(&board.card_properties)?;
    let show_description = bool_to_int(board.show_description);
    let is_template = bool_to_int(board.is_template);
    let board_type = board.board_type.as_str();

    let mut values: Vec<&dyn rusqlite::ToSql> = vec![
        &board.id,
        &board.team_id,
        &board.channel_id,
        &board.created_by,
        &board.modified_by,
        &board_type,
        &board.minimum_role,
        &board.title,
        &board.description,
        &board.icon,
        &show_description,
        &is_template,
        &board.template_version,
        &properties,
        &card_properties,
        &board.create_at,
        &board.update_at,
        &board.delete_at,
    ];
    if let Some(insert_at) = insert_at.as_ref() {
        values.push(insert_at);
    }
    conn.execute(&sql, values.as_slice())?;
    Ok(())
}

pub(super) fn insert_board_with_admin(
    tx: &Transaction<'_>,
    board: &Board,
    user_id: &str,
) -> StoreResult<(Board, BoardMember)> {
    let board = insert_board(tx, board, user_id)?;
    let member = save_member(tx, &BoardMember::admin(board.id.clone(), user_id))?;
    Ok((board, member))
}

pub(super) fn patch_board(
    tx: &Transaction<'_>,
    board_id: &str,
    patch: &BoardPatch,
    user_id: &str,
) -> StoreResult<Board> {
    let existing = get_board(tx, board_id)?;
    insert_board(tx, &patch.patch(&existing), user_id)
}

/// Deletes a board with its members and blocks. Unknown ids are a no-op.
pub(super) fn delete_board(tx: &Transaction<'_>, board_id: &str, user_id: &str) -> StoreResult<()> {
    let Some(mut board) = find_board(tx, board_id)? else {
        debug!("event=board_delete module=store status=noop board_id={board_id}");
        return Ok(());
    };

    let now = now_millis();
    board.modified_by = user_id.to_string();
    board.update_at = now;
    board.delete_at = now;
    write_board_row(tx, "boards_history", &board, Some(now))?;

    blocks::delete_blocks_for_board(tx, board_id, user_id)?;
    tx.execute("DELETE FROM board_members WHERE board_id = ?1;", [board_id])?;
    tx.execute("DELETE FROM boards WHERE id = ?1;", [board_id])?;
    debug!("event=board_delete module=store status=ok board_id={board_id}");
    Ok(())
}

/// Live, non-template boards of `team_id` that `user_id` is a member of.
pub(super) fn get_boards_for_user_and_team(
    conn: &Connection,
    user_id: &str,
    team_id: &str,
) -> StoreResult<Vec<Board>> {
    query_all(
        conn,
        &format!(
            "SELECT {BOARD_COLUMNS}
             FROM boards
             WHERE team_id = ?2
               AND delete_at = 0
               AND is_template = 0
               AND id IN (SELECT board_id FROM board_members WHERE user_id = ?1)
             ORDER BY title ASC, id ASC;"
        ),
        params![user_id, team_id],
        parse_board_row,
    )
}

/// Live, non-template member boards whose title contains `term`, ignoring
/// ASCII case.
pub(super) fn search_boards_for_user_and_team(
    conn: &Connection,
    term: &str,
    user_id: &str,
    team_id: &str,
) -> StoreResult<Vec<Board>> {
    let pattern = format!("%{}%", like_escape(term));
    query_all(
        conn,
        &format!(
            "SELECT {BOARD_COLUMNS}
             FROM boards
             WHERE team_id = ?3
               AND delete_at = 0
               AND is_template = 0
               AND title LIKE ?1 ESCAPE '\\'
               AND id IN (SELECT board_id FROM board_members WHERE user_id = ?2)
             ORDER BY title ASC, id ASC;"
        ),
        params![pattern, user_id, team_id],
        parse_board_row,
    )
}

pub(super) fn get_template_boards(conn: &Connection, team_id: &str) -> StoreResult<Vec<Board>> {
    query_all(
        conn,
        &format!(
            "SELECT {BOARD_COLUMNS}
             FROM boards
             WHERE team_id = ?1
               AND is_template = 1
               AND delete_at = 0
             ORDER BY title ASC, id ASC;"
        ),
        [team_id],
        parse_board_row,
    )
}

/// Deletes the built-in templates among `boards` without history.
///
/// Boards not created by the system user, or no longer templates, are skipped.
pub(super) fn remove_default_templates(tx: &Transaction<'_>, boards: &[Board]) -> StoreResult<()> {
    let mut removed = 0usize;
    for board in boards {
        if board.created_by != SYSTEM_USER_ID {
            continue;
        }
        let changed = tx.execute(
            "DELETE FROM boards WHERE id = ?1 AND is_template = 1 AND created_by = ?2;",
            params![board.id, SYSTEM_USER_ID],
        )?;
        if changed == 0 {
            continue;
        }
        tx.execute("DELETE FROM blocks WHERE board_id = ?1;", [&board.id])?;
        tx.execute("DELETE FROM board_members WHERE board_id = ?1;", [&board.id])?;
        removed += 1;
    }
    info!("event=templates_remove module=store status=ok removed={removed}");
    Ok(())
}

/// Copies a board with all of its blocks under fresh ids.
pub(super) fn duplicate_board(
    tx: &Transaction<'_>,
    board_id: &str,
    user_id: &str,
    as_template: bool,
) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
    let board = get_board(tx, board_id)?;
    let source = BoardsAndBlocks {
        boards: vec![board],
        blocks: blocks::get_blocks_for_board(tx, board_id)?,
    };

    let mut copy = source.with_generated_ids();
    for board in &mut copy.boards {
        board.is_template = as_template;
    }
    create_boards_and_blocks_with_admin(tx, &copy, user_id)
}

pub(super) fn save_member(conn: &Connection, member: &BoardMember) -> StoreResult<BoardMember> {
    member.validate()?;
    conn.execute(
        &format!(
            "INSERT INTO board_members ({MEMBER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(board_id, user_id) DO UPDATE SET
                roles = excluded.roles,
                minimum_role = excluded.minimum_role,
                scheme_admin = excluded.scheme_admin,
                scheme_editor = excluded.scheme_editor,
                scheme_commenter = excluded.scheme_commenter,
                scheme_viewer = excluded.scheme_viewer;"
        ),
        params![
            member.board_id,
            member.user_id,
            member.roles,
            member.minimum_role,
            bool_to_int(member.scheme_admin),
            bool_to_int(member.scheme_editor),
            bool_to_int(member.scheme_commenter),
            bool_to_int(member.scheme_viewer),
        ],
    )?;
    get_member_for_board(conn, &member.board_id, &member.user_id)
}

pub(super) fn delete_member(conn: &Connection, board_id: &str, user_id: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM board_members WHERE board_id = ?1 AND user_id = ?2;",
        params![board_id, user_id],
    )?;
    Ok(())
}

pub(super) fn get_member_for_board(
    conn: &Connection,
    board_id: &str,
    user_id: &str,
) -> StoreResult<BoardMember> {
    query_required(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS}
             FROM board_members
             WHERE board_id = ?1
               AND user_id = ?2;"
        ),
        params![board_id, user_id],
        || format!("board member {user_id} of board {board_id}"),
        parse_member_row,
    )
}

pub(super) fn get_members_for_board(
    conn: &Connection,
    board_id: &str,
) -> StoreResult<Vec<BoardMember>> {
    query_all(
        conn,
        &format!(
            "SELECT {MEMBER_COLUMNS}
             FROM board_members
             WHERE board_id = ?1
             ORDER BY user_id ASC;"
        ),
        [board_id],
        parse_member_row,
    )
}

pub(super) fn create_boards_and_blocks(
    tx: &Transaction<'_>,
    bab: &BoardsAndBlocks,
    user_id: &str,
) -> StoreResult<BoardsAndBlocks> {
    bab.validate()?;

    let mut boards = Vec::with_capacity(bab.boards.len());
    for board in &bab.boards {
        boards.push(insert_board(tx, board, user_id)?);
    }
    blocks::insert_blocks(tx, &bab.blocks, user_id)?;

    let mut stored_blocks = Vec::with_capacity(bab.blocks.len());
    for block in &bab.blocks {
        stored_blocks.push(blocks::get_block(tx, &block.id)?);
    }
    Ok(BoardsAndBlocks {
        boards,
        blocks: stored_blocks,
    })
}

pub(super) fn create_boards_and_blocks_with_admin(
    tx: &Transaction<'_>,
    bab: &BoardsAndBlocks,
    user_id: &str,
) -> StoreResult<(BoardsAndBlocks, Vec<BoardMember>)> {
    let created = create_boards_and_blocks(tx, bab, user_id)?;
    let mut members = Vec::with_capacity(created.boards.len());
    for board in &created.boards {
        members.push(save_member(tx, &BoardMember::admin(board.id.clone(), user_id))?);
    }
    Ok((created, members))
}

pub(super) fn patch_boards_and_blocks(
    tx: &Transaction<'_>,
    pbab: &PatchBoardsAndBlocks,
    user_id: &str,
) -> StoreResult<BoardsAndBlocks> {
    pbab.validate()?;

    let mut boards = Vec::with_capacity(pbab.board_ids.len());
    for (board_id, patch) in pbab.board_ids.iter().zip(&pbab.board_patches) {
        boards.push(patch_board(tx, board_id, patch, user_id)?);
    }

    let mut patched_blocks = Vec::with_capacity(pbab.block_ids.len());
    for (block_id, patch) in pbab.block_ids.iter().zip(&pbab.block_patches) {
        blocks::patch_block(tx, block_id, patch, user_id)?;
        patched_blocks.push(blocks::get_block(tx, block_id)?);
    }

    Ok(BoardsAndBlocks {
        boards,
        blocks: patched_blocks,
    })
}

pub(super) fn delete_boards_and_blocks(
    tx: &Transaction<'_>,
    dbab: &DeleteBoardsAndBlocks,
    user_id: &str,
) -> StoreResult<()> {
    dbab.validate()?;

    for block_id in &dbab.blocks {
        blocks::delete_block(tx, block_id, user_id)?;
    }
    for board_id in &dbab.boards {
        delete_board(tx, board_id, user_id)?;
    }
    Ok(())
}

fn parse_board_row(row: &Row<'_>) -> StoreResult<Board> {
    let type_text: String = row.get("type")?;
    let board_type = BoardType::parse(&type_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid board type `{type_text}` in boards.type"))
    })?;

    Ok(Board {
        id: row.get("id")?,
        team_id: row.get("team_id")?,
        channel_id: row.get("channel_id")?,
        created_by: row.get("created_by")?,
        modified_by: row.get("modified_by")?,
        board_type,
        minimum_role: row.get("minimum_role")?,
        title: row.get("title")?,
        description: row.get("description")?,
        icon: row.get("icon")?,
        show_description: get_bool(row, "show_description")?,
        is_template: get_bool(row, "is_template")?,
        template_version: row.get("template_version")?,
        properties: get_json_map(row, "properties")?,
        card_properties: get_json_list(row, "card_properties")?,
        create_at: row.get("create_at")?,
        update_at: row.get("update_at")?,
        delete_at: row.get("delete_at")?,
    })
}

fn parse_member_row(row: &Row<'_>) -> StoreResult<BoardMember> {
    Ok(BoardMember {
        board_id: row.get("board_id")?,
        user_id: row.get("user_id")?,
        roles: row.get("roles")?,
        minimum_role: row.get("minimum_role")?,
        scheme_admin: get_bool(row, "scheme_admin")?,
        scheme_editor: get_bool(row, "scheme_editor")?,
        scheme_commenter: get_bool(row, "scheme_commenter")?,
        scheme_viewer: get_bool(row, "scheme_viewer")?,
    })
}
