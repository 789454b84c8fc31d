//! In-app notifications addressed to a single account.

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::authorization::Actor;
use crate::config::PER_PAGE;
use crate::db::repository as repo;
use crate::error::ServiceError;
use crate::models::enums::{NotificationPriority, NotificationType};
use crate::models::{NewNotification, Notification};
use crate::search::{NotificationFilter, Page};

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread: u64,
}

pub fn list_notifications(
    conn: &Connection,
    actor: &Actor,
    filter: &NotificationFilter,
) -> Result<NotificationPage, ServiceError> {
    let page = repo::list_notifications(
        conn,
        &actor.account_id,
        filter.unread,
        PER_PAGE,
        filter.page.as_deref(),
    )?;
    let unread = repo::count_unread_notifications(conn, &actor.account_id)?;
    Ok(NotificationPage { page, unread })
}

/// Only the addressed account may mark a notification read, staff included.
pub fn mark_read(conn: &Connection, actor: &Actor, id: &Uuid) -> Result<Notification, ServiceError> {
    let notification =
        repo::get_notification(conn, id)?.ok_or(ServiceError::not_found("Notification"))?;
    if notification.account_id != actor.account_id {
        tracing::warn!(
            account_id = %actor.account_id,
            notification_id = %id,
            "Access denied: notification addressed to another account"
        );
        return Err(ServiceError::PermissionDenied);
    }
    if notification.is_read {
        return Ok(notification);
    }

    repo::mark_notification_read(conn, id, &Utc::now())?;
    repo::get_notification(conn, id)?.ok_or(ServiceError::not_found("Notification"))
}

/// Queue a notification inside the caller's transaction.
pub(crate) fn notify(
    conn: &Connection,
    account_id: Uuid,
    notification_type: NotificationType,
    priority: NotificationPriority,
    title: impl Into<String>,
    message: impl Into<String>,
    action_url: Option<String>,
) -> Result<(), ServiceError> {
    let notification = repo::insert_notification(
        conn,
        NewNotification {
            account_id,
            notification_type,
            title: title.into(),
            message: message.into(),
            priority,
            action_url,
        },
        &Utc::now(),
    )?;
    tracing::debug!(
        notification_id = %notification.id,
        account_id = %account_id,
        kind = %notification_type,
        "Notification created"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::Role;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    fn actor(account: &crate::models::Account, role: Role) -> Actor {
        Actor {
            account_id: account.id,
            username: account.username.clone(),
            role,
        }
    }

    fn seed(conn: &Connection, account_id: Uuid, title: &str) {
        notify(
            conn,
            account_id,
            NotificationType::System,
            NotificationPriority::Low,
            title,
            "Body",
            None,
        )
        .unwrap();
    }

    #[test]
    fn list_reports_unread_count() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "pat", false);
        seed(&conn, account.id, "One");
        seed(&conn, account.id, "Two");
        let me = actor(&account, Role::Patient);

        let page = list_notifications(&conn, &me, &NotificationFilter::default()).unwrap();
        assert_eq!(page.page.total, 2);
        assert_eq!(page.unread, 2);

        mark_read(&conn, &me, &page.page.items[0].id).unwrap();
        let filter = NotificationFilter {
            unread: true,
            page: None,
        };
        let page = list_notifications(&conn, &me, &filter).unwrap();
        assert_eq!(page.page.total, 1);
        assert_eq!(page.unread, 1);
    }

    #[test]
    fn staff_cannot_read_someone_elses_notification() {
        let conn = open_memory_database().unwrap();
        let owner = fixtures::account(&conn, "pat", false);
        let staff = fixtures::account(&conn, "desk", true);
        seed(&conn, owner.id, "Private");
        let owner_actor = actor(&owner, Role::Patient);
        let id = list_notifications(&conn, &owner_actor, &NotificationFilter::default())
            .unwrap()
            .page
            .items[0]
            .id;

        assert!(matches!(
            mark_read(&conn, &actor(&staff, Role::Staff), &id),
            Err(ServiceError::PermissionDenied)
        ));
        let read = mark_read(&conn, &owner_actor, &id).unwrap();
        assert!(read.is_read);
        assert!(read.read_at.is_some());
    }
}
