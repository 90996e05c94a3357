//! Shared row decoding and query helpers for the SQLite adapter.

use crate::model::block::BlockType;
use crate::model::JsonMap;
use crate::store::{StoreError, StoreResult};
use rusqlite::{Connection, Params, Row};

/// Runs `sql` and decodes every row.
pub(super) fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: impl Fn(&Row<'_>) -> StoreResult<T>,
) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params)?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse(row)?);
    }
    Ok(items)
}

/// Runs `sql` and decodes the first row, if any.
pub(super) fn query_optional<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    parse: impl Fn(&Row<'_>) -> StoreResult<T>,
) -> StoreResult<Option<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(parse(row)?)),
        None => Ok(None),
    }
}

/// Same as [`query_optional`] but an empty result is `NotFound(resource)`.
pub(super) fn query_required<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    resource: impl FnOnce() -> String,
    parse: impl Fn(&Row<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    query_optional(conn, sql, params, parse)?.ok_or_else(|| StoreError::NotFound(resource()))
}

/// Maps an UPDATE that matched no row to `NotFound(resource)`.
pub(super) fn require_changed(changed: usize, resource: impl FnOnce() -> String) -> StoreResult<()> {
    if changed == 0 {
        return Err(StoreError::NotFound(resource()));
    }
    Ok(())
}

pub(super) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(super) fn get_bool(row: &Row<'_>, column: &'static str) -> StoreResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(super) fn get_json_map(row: &Row<'_>, column: &'static str) -> StoreResult<JsonMap> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text)
        .map_err(|err| StoreError::InvalidData(format!("invalid json object in {column}: {err}")))
}

pub(super) fn get_json_list(row: &Row<'_>, column: &'static str) -> StoreResult<Vec<JsonMap>> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text)
        .map_err(|err| StoreError::InvalidData(format!("invalid json array in {column}: {err}")))
}

pub(super) fn get_block_type(row: &Row<'_>, column: &'static str) -> StoreResult<BlockType> {
    let text: String = row.get(column)?;
    BlockType::parse(&text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid block type `{text}` in {column}"))
    })
}

pub(super) fn json_text<T: serde::Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub(super) fn like_escape(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::like_escape;

    #[test]
    fn like_escape_protects_wildcards() {
        assert_eq!(like_escape("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(like_escape("plain"), "plain");
    }
}
