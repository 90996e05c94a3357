//! Block subscriptions and the notification hint queue.
//!
//! # Invariants
//! - One subscription row per `(block_id, subscriber_id)`; deletes are soft
//!   and a later create revives the row.
//! - One hint per block. Dequeue order is `notify_at ASC, block_id ASC`.

use super::rows::{get_block_type, query_all, query_required};
use crate::model::now_millis;
use crate::model::subscription::{NotificationHint, SubscriberType, Subscriber, Subscription};
use crate::store::{StoreError, StoreResult};
use log::debug;
use rusqlite::{params, Connection, Row, Transaction};
use std::time::Duration;

const SUBSCRIPTION_COLUMNS: &str = "block_type,
    block_id,
    subscriber_type,
    subscriber_id,
    notified_at,
    create_at,
    delete_at";

const HINT_COLUMNS: &str = "block_type, block_id, modified_by_id, create_at, notify_at";

pub(super) fn create_subscription(
    tx: &Transaction<'_>,
    sub: &Subscription,
) -> StoreResult<Subscription> {
    sub.validate()?;
    let now = now_millis();
    tx.execute(
        &format!(
            "INSERT INTO subscriptions ({SUBSCRIPTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)
             ON CONFLICT(block_id, subscriber_id) DO UPDATE SET
                block_type = excluded.block_type,
                subscriber_type = excluded.subscriber_type,
                notified_at = excluded.notified_at,
                create_at = excluded.create_at,
                delete_at = 0;"
        ),
        params![
            sub.block_type.as_str(),
            sub.block_id,
            sub.subscriber_type.as_str(),
            sub.subscriber_id,
            now,
        ],
    )?;
    get_subscription(tx, &sub.block_id, &sub.subscriber_id)
}

pub(super) fn delete_subscription(
    conn: &Connection,
    block_id: &str,
    subscriber_id: &str,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET delete_at = ?3
         WHERE block_id = ?1
           AND subscriber_id = ?2
           AND delete_at = 0;",
        params![block_id, subscriber_id, now_millis()],
    )?;
    Ok(())
}

pub(super) fn get_subscription(
    conn: &Connection,
    block_id: &str,
    subscriber_id: &str,
) -> StoreResult<Subscription> {
    query_required(
        conn,
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS}
             FROM subscriptions
             WHERE block_id = ?1
               AND subscriber_id = ?2
               AND delete_at = 0;"
        ),
        params![block_id, subscriber_id],
        || format!("subscription of {subscriber_id} to block {block_id}"),
        parse_subscription_row,
    )
}

pub(super) fn get_subscriptions(
    conn: &Connection,
    subscriber_id: &str,
) -> StoreResult<Vec<Subscription>> {
    query_all(
        conn,
        &format!(
            "SELECT {SUBSCRIPTION_COLUMNS}
             FROM subscriptions
             WHERE subscriber_id = ?1
               AND delete_at = 0
             ORDER BY create_at ASC, block_id ASC;"
        ),
        [subscriber_id],
        parse_subscription_row,
    )
}

pub(super) fn get_subscribers_for_block(
    conn: &Connection,
    block_id: &str,
) -> StoreResult<Vec<Subscriber>> {
    query_all(
        conn,
        "SELECT subscriber_type, subscriber_id, notified_at
         FROM subscriptions
         WHERE block_id = ?1
           AND delete_at = 0
         ORDER BY subscriber_id ASC;",
        [block_id],
        |row| {
            Ok(Subscriber {
                subscriber_type: get_subscriber_type(row)?,
                subscriber_id: row.get("subscriber_id")?,
                notified_at: row.get("notified_at")?,
            })
        },
    )
}

pub(super) fn get_subscribers_count_for_block(conn: &Connection, block_id: &str) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM subscriptions WHERE block_id = ?1 AND delete_at = 0;",
        [block_id],
        |row| row.get(0),
    )?)
}

pub(super) fn update_subscribers_notified_at(
    conn: &Connection,
    block_id: &str,
    notified_at: i64,
) -> StoreResult<()> {
    conn.execute(
        "UPDATE subscriptions
         SET notified_at = ?2
         WHERE block_id = ?1
           AND delete_at = 0;",
        params![block_id, notified_at],
    )?;
    Ok(())
}

/// Schedules a hint `notification_freq` from now. An existing hint for the
/// same block keeps its `create_at` and is postponed.
pub(super) fn upsert_notification_hint(
    tx: &Transaction<'_>,
    hint: &NotificationHint,
    notification_freq: Duration,
) -> StoreResult<NotificationHint> {
    hint.validate()?;
    let now = now_millis();
    let freq_millis = i64::try_from(notification_freq.as_millis()).unwrap_or(i64::MAX);
    let notify_at = now.saturating_add(freq_millis);

    tx.execute(
        &format!(
            "INSERT INTO notification_hints ({HINT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(block_id) DO UPDATE SET
                modified_by_id = excluded.modified_by_id,
                notify_at = excluded.notify_at;"
        ),
        params![
            hint.block_type.as_str(),
            hint.block_id,
            hint.modified_by_id,
            now,
            notify_at,
        ],
    )?;
    get_notification_hint(tx, &hint.block_id)
}

pub(super) fn delete_notification_hint(conn: &Connection, block_id: &str) -> StoreResult<()> {
    conn.execute(
        "DELETE FROM notification_hints WHERE block_id = ?1;",
        [block_id],
    )?;
    Ok(())
}

pub(super) fn get_notification_hint(
    conn: &Connection,
    block_id: &str,
) -> StoreResult<NotificationHint> {
    query_required(
        conn,
        &format!("SELECT {HINT_COLUMNS} FROM notification_hints WHERE block_id = ?1;"),
        [block_id],
        || format!("notification hint {block_id}"),
        parse_hint_row,
    )
}

/// Earliest hint in the queue. With `remove`, the hint is deleted in the
/// same transaction so concurrent callers never receive it twice.
pub(super) fn get_next_notification_hint(
    tx: &Transaction<'_>,
    remove: bool,
) -> StoreResult<NotificationHint> {
    let hint = query_required(
        tx,
        &format!(
            "SELECT {HINT_COLUMNS}
             FROM notification_hints
             ORDER BY notify_at ASC, block_id ASC
             LIMIT 1;"
        ),
        [],
        || "next notification hint".to_string(),
        parse_hint_row,
    )?;

    if remove {
        tx.execute(
            "DELETE FROM notification_hints WHERE block_id = ?1;",
            [&hint.block_id],
        )?;
        debug!(
            "event=hint_dequeue module=store status=ok block_id={}",
            hint.block_id
        );
    }
    Ok(hint)
}

fn get_subscriber_type(row: &Row<'_>) -> StoreResult<SubscriberType> {
    let text: String = row.get("subscriber_type")?;
    SubscriberType::parse(&text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid subscriber type `{text}` in subscriptions.subscriber_type"
        ))
    })
}

fn parse_subscription_row(row: &Row<'_>) -> StoreResult<Subscription> {
    Ok(Subscription {
        block_type: get_block_type(row, "block_type")?,
        block_id: row.get("block_id")?,
        subscriber_type: get_subscriber_type(row)?,
        subscriber_id: row.get("subscriber_id")?,
        notified_at: row.get("notified_at")?,
        create_at: row.get("create_at")?,
        delete_at: row.get("delete_at")?,
    })
}

fn parse_hint_row(row: &Row<'_>) -> StoreResult<NotificationHint> {
    Ok(NotificationHint {
        block_type: get_block_type(row, "block_type")?,
        block_id: row.get("block_id")?,
        modified_by_id: row.get("modified_by_id")?,
        create_at: row.get("create_at")?,
        notify_at: row.get("notify_at")?,
    })
}
