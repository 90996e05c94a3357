//! Teams, sharing records and system settings.

use super::rows::{bool_to_int, get_bool, get_json_map, json_text, query_all, query_required};
use crate::model::now_millis;
use crate::model::sharing::Sharing;
use crate::model::team::Team;
use crate::store::StoreResult;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;

const TEAM_COLUMNS: &str = "id, title, signup_token, settings, modified_by, update_at";

pub(super) fn get_system_setting(conn: &Connection, key: &str) -> StoreResult<String> {
    query_required(
        conn,
        "SELECT value FROM system_settings WHERE id = ?1;",
        [key],
        || format!("system setting {key}"),
        |row| Ok(row.get::<_, String>("value")?),
    )
}

pub(super) fn get_system_settings(conn: &Connection) -> StoreResult<HashMap<String, String>> {
    let pairs = query_all(
        conn,
        "SELECT id, value FROM system_settings ORDER BY id ASC;",
        [],
        |row| Ok((row.get::<_, String>("id")?, row.get::<_, String>("value")?)),
    )?;
    Ok(pairs.into_iter().collect())
}

pub(super) fn set_system_setting(conn: &Connection, key: &str, value: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO system_settings (id, value)
         VALUES (?1, ?2)
         ON CONFLICT(id) DO UPDATE SET value = excluded.value;",
        params![key, value],
    )?;
    Ok(())
}

pub(super) fn upsert_team_signup_token(conn: &Connection, team: &Team) -> StoreResult<()> {
    team.validate()?;
    conn.execute(
        "INSERT INTO teams (id, title, signup_token, modified_by, update_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            signup_token = excluded.signup_token,
            modified_by = excluded.modified_by,
            update_at = excluded.update_at;",
        params![
            team.id,
            team.title,
            team.signup_token,
            team.modified_by,
            now_millis()
        ],
    )?;
    Ok(())
}

pub(super) fn upsert_team_settings(conn: &Connection, team: &Team) -> StoreResult<()> {
    team.validate()?;
    conn.execute(
        "INSERT INTO teams (id, title, settings, modified_by, update_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            settings = excluded.settings,
            modified_by = excluded.modified_by,
            update_at = excluded.update_at;",
        params![
            team.id,
            team.title,
            json_text(&team.settings)?,
            team.modified_by,
            now_millis()
        ],
    )?;
    Ok(())
}

pub(super) fn get_team(conn: &Connection, team_id: &str) -> StoreResult<Team> {
    query_required(
        conn,
        &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1;"),
        [team_id],
        || format!("team {team_id}"),
        parse_team_row,
    )
}

/// Teams owning at least one live board `user_id` is a member of.
pub(super) fn get_teams_for_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<Team>> {
    query_all(
        conn,
        &format!(
            "SELECT {TEAM_COLUMNS}
             FROM teams
             WHERE id IN (
                 SELECT board.team_id
                 FROM boards board
                 INNER JOIN board_members member ON member.board_id = board.id
                 WHERE member.user_id = ?1
                   AND board.delete_at = 0
             )
             ORDER BY id ASC;"
        ),
        [user_id],
        parse_team_row,
    )
}

pub(super) fn get_all_teams(conn: &Connection) -> StoreResult<Vec<Team>> {
    query_all(
        conn,
        &format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY id ASC;"),
        [],
        parse_team_row,
    )
}

pub(super) fn get_team_count(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM teams;", [], |row| row.get(0))?)
}

pub(super) fn upsert_sharing(conn: &Connection, sharing: &Sharing) -> StoreResult<()> {
    sharing.validate()?;
    conn.execute(
        "INSERT INTO sharing (id, enabled, token, modified_by, update_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            enabled = excluded.enabled,
            token = excluded.token,
            modified_by = excluded.modified_by,
            update_at = excluded.update_at;",
        params![
            sharing.id,
            bool_to_int(sharing.enabled),
            sharing.token,
            sharing.modified_by,
            now_millis()
        ],
    )?;
    Ok(())
}

pub(super) fn get_sharing(conn: &Connection, root_id: &str) -> StoreResult<Sharing> {
    query_required(
        conn,
        "SELECT id, enabled, token, modified_by, update_at FROM sharing WHERE id = ?1;",
        [root_id],
        || format!("sharing {root_id}"),
        |row| {
            Ok(Sharing {
                id: row.get("id")?,
                enabled: get_bool(row, "enabled")?,
                token: row.get("token")?,
                modified_by: row.get("modified_by")?,
                update_at: row.get("update_at")?,
            })
        },
    )
}

fn parse_team_row(row: &Row<'_>) -> StoreResult<Team> {
    Ok(Team {
        id: row.get("id")?,
        title: row.get("title")?,
        signup_token: row.get("signup_token")?,
        settings: get_json_map(row, "settings")?,
        modified_by: row.get("modified_by")?,
        update_at: row.get("update_at")?,
    })
}
