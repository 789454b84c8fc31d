use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::{optional, select_page};
use crate::db::columns::{self, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::{NewNotification, Notification};
use crate::search::{Conditions, Page};

const NOTIFICATION_COLUMNS: &str = "n.id, n.account_id, n.notification_type, n.title,
    n.message, n.priority, n.is_read, n.read_at, n.action_url, n.created_at, n.updated_at";

const NOTIFICATION_FROM: &str = "FROM notifications n";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: columns::uuid(row, 0)?,
        account_id: columns::uuid(row, 1)?,
        notification_type: columns::parsed(row, 2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        priority: columns::parsed(row, 5)?,
        is_read: row.get(6)?,
        read_at: columns::timestamp_opt(row, 7)?,
        action_url: row.get(8)?,
        created_at: columns::timestamp(row, 9)?,
        updated_at: columns::timestamp(row, 10)?,
    })
}

pub fn insert_notification(
    conn: &Connection,
    new: NewNotification,
    now: &DateTime<Utc>,
) -> Result<Notification, DatabaseError> {
    let notification = Notification {
        id: Uuid::new_v4(),
        account_id: new.account_id,
        notification_type: new.notification_type,
        title: new.title,
        message: new.message,
        priority: new.priority,
        is_read: false,
        read_at: None,
        action_url: new.action_url,
        created_at: *now,
        updated_at: *now,
    };
    conn.execute(
        "INSERT INTO notifications (id, account_id, notification_type, title, message,
         priority, is_read, read_at, action_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7, ?8, ?8)",
        params![
            notification.id.to_string(),
            notification.account_id.to_string(),
            notification.notification_type.as_str(),
            notification.title,
            notification.message,
            notification.priority.as_str(),
            notification.action_url,
            fmt_timestamp(now),
        ],
    )?;
    Ok(notification)
}

pub fn get_notification(conn: &Connection, id: &Uuid) -> Result<Option<Notification>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {NOTIFICATION_COLUMNS} {NOTIFICATION_FROM} WHERE n.id = ?1"),
        params![id.to_string()],
        notification_from_row,
    ))
}

/// An account's notifications, newest first.
pub fn list_notifications(
    conn: &Connection,
    account_id: &Uuid,
    unread_only: bool,
    per_page: u32,
    page: Option<&str>,
) -> Result<Page<Notification>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.push_uuid("n.account_id", *account_id);
    if unread_only {
        conditions.push("n.is_read = 0", []);
    }
    select_page(
        conn,
        NOTIFICATION_COLUMNS,
        NOTIFICATION_FROM,
        "ORDER BY n.created_at DESC",
        &conditions,
        per_page,
        page,
        notification_from_row,
    )
}

pub fn count_unread_notifications(conn: &Connection, account_id: &Uuid) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE account_id = ?1 AND is_read = 0",
        params![account_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}

/// Flag as read. `read_at` is only stamped on the first call.
pub fn mark_notification_read(
    conn: &Connection,
    id: &Uuid,
    now: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let ts = fmt_timestamp(now);
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1, read_at = COALESCE(read_at, ?2), updated_at = ?2
         WHERE id = ?1",
        params![id.to_string(), ts],
    )?;
    super::expect_one(changed, "Notification", id)
}
