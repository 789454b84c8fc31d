use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use super::optional;
use crate::db::columns::{self, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::Account;

const ACCOUNT_COLUMNS: &str =
    "id, username, first_name, last_name, email, is_staff, is_active, created_at, updated_at";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: columns::uuid(row, 0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        is_staff: row.get(5)?,
        is_active: row.get(6)?,
        created_at: columns::timestamp(row, 7)?,
        updated_at: columns::timestamp(row, 8)?,
    })
}

pub fn insert_account(conn: &Connection, account: &Account) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO accounts (id, username, first_name, last_name, email, is_staff, is_active,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            account.id.to_string(),
            account.username,
            account.first_name,
            account.last_name,
            account.email,
            account.is_staff,
            account.is_active,
            fmt_timestamp(&account.created_at),
            fmt_timestamp(&account.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_account(conn: &Connection, id: &Uuid) -> Result<Option<Account>, DatabaseError> {
    optional(conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![id.to_string()],
        account_from_row,
    ))
}

pub fn count_accounts(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Store the SHA-256 of a freshly issued bearer token.
pub fn insert_api_token(
    conn: &Connection,
    token_hash: &str,
    account_id: &Uuid,
    created_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO api_tokens (token_hash, account_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_hash, account_id.to_string(), fmt_timestamp(created_at)],
    )?;
    Ok(())
}

/// Active account owning the token hash; records the use.
pub fn account_for_token(
    conn: &Connection,
    token_hash: &str,
    now: &DateTime<Utc>,
) -> Result<Option<Account>, DatabaseError> {
    let account = optional(conn.query_row(
        "SELECT a.id, a.username, a.first_name, a.last_name, a.email, a.is_staff, a.is_active,
         a.created_at, a.updated_at
         FROM api_tokens t JOIN accounts a ON a.id = t.account_id
         WHERE t.token_hash = ?1 AND a.is_active = 1",
        params![token_hash],
        account_from_row,
    ))?;
    if account.is_some() {
        conn.execute(
            "UPDATE api_tokens SET last_used_at = ?1 WHERE token_hash = ?2",
            params![fmt_timestamp(now), token_hash],
        )?;
    }
    Ok(account)
}

/// Profile id when the account has an active doctor profile.
pub fn active_doctor_id_for_account(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<Option<Uuid>, DatabaseError> {
    optional(conn.query_row(
        "SELECT id FROM doctors WHERE account_id = ?1 AND is_active = 1",
        params![account_id.to_string()],
        |row| columns::uuid(row, 0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn token_resolves_to_account() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "nurse", true);
        let now = Utc::now();
        insert_api_token(&conn, "hash-1", &account.id, &now).unwrap();

        let found = account_for_token(&conn, "hash-1", &now).unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(found.is_staff);
        assert!(account_for_token(&conn, "hash-2", &now).unwrap().is_none());
    }

    #[test]
    fn inactive_account_token_rejected() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "former", false);
        conn.execute(
            "UPDATE accounts SET is_active = 0 WHERE id = ?1",
            params![account.id.to_string()],
        )
        .unwrap();
        let now = Utc::now();
        insert_api_token(&conn, "hash-x", &account.id, &now).unwrap();
        assert!(account_for_token(&conn, "hash-x", &now).unwrap().is_none());
    }

    #[test]
    fn doctor_profile_lookup() {
        let conn = open_memory_database().unwrap();
        let account = fixtures::account(&conn, "drwho", false);
        assert!(active_doctor_id_for_account(&conn, &account.id).unwrap().is_none());
        let doctor = fixtures::doctor(&conn, account.id, "LIC-1");
        assert_eq!(
            active_doctor_id_for_account(&conn, &account.id).unwrap(),
            Some(doctor.id)
        );
        assert_eq!(count_accounts(&conn).unwrap(), 1);
    }
}
