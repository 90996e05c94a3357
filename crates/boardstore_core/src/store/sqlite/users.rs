//! Users and sessions.
//!
//! # Invariants
//! - Usernames and emails are unique ignoring ASCII case.
//! - A session is live while `update_at > now - expire_time * 1000`.

use super::rows::{
    bool_to_int, get_bool, get_json_map, json_text, query_all, query_required, require_changed,
};
use crate::model::now_millis;
use crate::model::user::{Session, User};
use crate::store::StoreResult;
use log::debug;
use rusqlite::{params, Connection, Row};

const USER_COLUMNS: &str = "id,
    username,
    email,
    password,
    mfa_secret,
    auth_service,
    auth_data,
    props,
    create_at,
    update_at,
    delete_at,
    is_bot,
    is_guest";

const SESSION_COLUMNS: &str = "id, token, user_id, auth_service, props, create_at, update_at";

pub(super) fn get_registered_user_count(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE delete_at = 0;",
        [],
        |row| row.get(0),
    )?)
}

pub(super) fn get_user_by_id(conn: &Connection, user_id: &str) -> StoreResult<User> {
    query_required(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1;"),
        [user_id],
        || format!("user {user_id}"),
        parse_user_row,
    )
}

pub(super) fn get_user_by_email(conn: &Connection, email: &str) -> StoreResult<User> {
    query_required(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1;"),
        [email],
        || "user by email".to_string(),
        parse_user_row,
    )
}

pub(super) fn get_user_by_username(conn: &Connection, username: &str) -> StoreResult<User> {
    query_required(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1;"),
        [username],
        || format!("user {username}"),
        parse_user_row,
    )
}

pub(super) fn create_user(conn: &Connection, user: &User) -> StoreResult<()> {
    user.validate()?;
    let now = now_millis();
    let create_at = if user.create_at > 0 { user.create_at } else { now };
    conn.execute(
        &format!(
            "INSERT INTO users ({USER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);"
        ),
        params![
            user.id,
            user.username,
            user.email,
            user.password,
            user.mfa_secret,
            user.auth_service,
            user.auth_data,
            json_text(&user.props)?,
            create_at,
            now,
            user.delete_at,
            bool_to_int(user.is_bot),
            bool_to_int(user.is_guest),
        ],
    )?;
    debug!("event=user_create module=store status=ok user_id={}", user.id);
    Ok(())
}

pub(super) fn update_user(conn: &Connection, user: &User) -> StoreResult<()> {
    user.validate()?;
    let changed = conn.execute(
        "UPDATE users
         SET username = ?2,
             email = ?3,
             props = ?4,
             update_at = ?5,
             delete_at = ?6
         WHERE id = ?1;",
        params![
            user.id,
            user.username,
            user.email,
            json_text(&user.props)?,
            now_millis(),
            user.delete_at,
        ],
    )?;
    require_changed(changed, || format!("user {}", user.id))
}

pub(super) fn update_user_password(
    conn: &Connection,
    username: &str,
    password: &str,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2, update_at = ?3 WHERE username = ?1;",
        params![username, password, now_millis()],
    )?;
    require_changed(changed, || format!("user {username}"))
}

pub(super) fn update_user_password_by_id(
    conn: &Connection,
    user_id: &str,
    password: &str,
) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE users SET password = ?2, update_at = ?3 WHERE id = ?1;",
        params![user_id, password, now_millis()],
    )?;
    require_changed(changed, || format!("user {user_id}"))
}

/// Users who are members of at least one live board of `team_id`.
pub(super) fn get_users_by_team(conn: &Connection, team_id: &str) -> StoreResult<Vec<User>> {
    query_all(
        conn,
        &format!(
            "SELECT {USER_COLUMNS}
             FROM users
             WHERE delete_at = 0
               AND id IN (
                   SELECT member.user_id
                   FROM board_members member
                   INNER JOIN boards board ON board.id = member.board_id
                   WHERE board.team_id = ?1
                     AND board.delete_at = 0
               )
             ORDER BY username ASC;"
        ),
        [team_id],
        parse_user_row,
    )
}

pub(super) fn get_active_user_count(conn: &Connection, updated_seconds_ago: i64) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(DISTINCT user_id) FROM sessions WHERE update_at > ?1;",
        [window_start(updated_seconds_ago)],
        |row| row.get(0),
    )?)
}

pub(super) fn get_session(conn: &Connection, token: &str, expire_time: i64) -> StoreResult<Session> {
    get_session_after(conn, token, window_start(expire_time))
}

fn get_session_after(conn: &Connection, token: &str, cutoff: i64) -> StoreResult<Session> {
    query_required(
        conn,
        &format!(
            "SELECT {SESSION_COLUMNS}
             FROM sessions
             WHERE token = ?1
               AND update_at > ?2;"
        ),
        params![token, cutoff],
        || "session".to_string(),
        parse_session_row,
    )
}

pub(super) fn create_session(conn: &Connection, session: &Session) -> StoreResult<()> {
    session.validate()?;
    let now = now_millis();
    conn.execute(
        &format!(
            "INSERT INTO sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);"
        ),
        params![
            session.id,
            session.token,
            session.user_id,
            session.auth_service,
            json_text(&session.props)?,
            now,
            now,
        ],
    )?;
    Ok(())
}

pub(super) fn refresh_session(conn: &Connection, session: &Session) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE sessions SET update_at = ?2 WHERE id = ?1;",
        params![session.id, now_millis()],
    )?;
    require_changed(changed, || format!("session {}", session.id))
}

pub(super) fn update_session(conn: &Connection, session: &Session) -> StoreResult<()> {
    let changed = conn.execute(
        "UPDATE sessions SET props = ?2, update_at = ?3 WHERE id = ?1;",
        params![session.id, json_text(&session.props)?, now_millis()],
    )?;
    require_changed(changed, || format!("session {}", session.id))
}

pub(super) fn delete_session(conn: &Connection, session_id: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM sessions WHERE id = ?1;", [session_id])?;
    Ok(())
}

pub(super) fn clean_up_sessions(conn: &Connection, expire_time: i64) -> StoreResult<()> {
    delete_sessions_through(conn, window_start(expire_time))
}

/// Removes every session that `get_session_after` would no longer return.
fn delete_sessions_through(conn: &Connection, cutoff: i64) -> StoreResult<()> {
    let removed = conn.execute("DELETE FROM sessions WHERE update_at <= ?1;", [cutoff])?;
    debug!("event=session_cleanup module=store status=ok removed={removed}");
    Ok(())
}

fn window_start(seconds: i64) -> i64 {
    now_millis().saturating_sub(seconds.saturating_mul(1000))
}

fn parse_user_row(row: &Row<'_>) -> StoreResult<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        password: row.get("password")?,
        mfa_secret: row.get("mfa_secret")?,
        auth_service: row.get("auth_service")?,
        auth_data: row.get("auth_data")?,
        props: get_json_map(row, "props")?,
        create_at: row.get("create_at")?,
        update_at: row.get("update_at")?,
        delete_at: row.get("delete_at")?,
        is_bot: get_bool(row, "is_bot")?,
        is_guest: get_bool(row, "is_guest")?,
    })
}

fn parse_session_row(row: &Row<'_>) -> StoreResult<Session> {
    Ok(Session {
        id: row.get("id")?,
        token: row.get("token")?,
        user_id: row.get("user_id")?,
        auth_service: row.get("auth_service")?,
        props: get_json_map(row, "props")?,
        create_at: row.get("create_at")?,
        update_at: row.get("update_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::{create_session, delete_sessions_through, get_session_after};
    use crate::db::open_db_in_memory;
    use crate::model::user::Session;
    use rusqlite::{params, Connection};

    fn session_touched_at(conn: &Connection, update_at: i64) -> Session {
        let session = Session::new("user-1");
        create_session(conn, &session).unwrap();
        conn.execute(
            "UPDATE sessions SET update_at = ?2 WHERE id = ?1;",
            params![session.id, update_at],
        )
        .unwrap();
        session
    }

    fn session_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM sessions;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn session_on_the_cutoff_is_expired_and_cleaned_up() {
        let conn = open_db_in_memory().unwrap();
        let session = session_touched_at(&conn, 1_000);

        assert!(get_session_after(&conn, &session.token, 999).is_ok());
        assert!(get_session_after(&conn, &session.token, 1_000)
            .unwrap_err()
            .is_not_found());

        delete_sessions_through(&conn, 999).unwrap();
        assert_eq!(session_count(&conn), 1);
        delete_sessions_through(&conn, 1_000).unwrap();
        assert_eq!(session_count(&conn), 0);
    }
}
