//! Accounts and bearer tokens.
//!
//! Tokens are 32 random bytes, URL-safe base64 on the wire. Only the
//! SHA-256 of a token is stored, so a token is shown exactly once.

use base64::Engine;
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::authorization::{ensure_staff, Actor, Role};
use crate::db::repository as repo;
use crate::error::{unique_as_field, ServiceError};
use crate::models::{Account, NewAccount};
use crate::validation::validate_account;

const USERNAME_TAKEN: &str = "A user with that username already exists.";
const BOOTSTRAP_USERNAME: &str = "admin";

/// A new account with its token. The token cannot be recovered later.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedAccount {
    pub account: Account,
    pub token: String,
}

/// Generate a cryptographically random bearer token (URL-safe base64).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Storage key for a token.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// Account behind a presented token, if it is known and active.
pub fn authenticate(conn: &Connection, token: &str) -> Result<Option<Account>, ServiceError> {
    Ok(repo::account_for_token(conn, &hash_token(token), &Utc::now())?)
}

/// Resolve what an account acts as: an active doctor profile wins over the
/// staff flag.
pub fn resolve_actor(conn: &Connection, account: &Account) -> Result<Actor, ServiceError> {
    let role = match repo::active_doctor_id_for_account(conn, &account.id)? {
        Some(doctor_id) => Role::Doctor { doctor_id },
        None if account.is_staff => Role::Staff,
        None => Role::Patient,
    };
    Ok(Actor {
        account_id: account.id,
        username: account.username.clone(),
        role,
    })
}

fn issue(conn: &Connection, new: NewAccount) -> Result<IssuedAccount, ServiceError> {
    validate_account(&new)?;

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4(),
        username: new.username.trim().to_string(),
        first_name: new.first_name.trim().to_string(),
        last_name: new.last_name.trim().to_string(),
        email: new.email.filter(|e| !e.trim().is_empty()),
        is_staff: new.is_staff,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let token = generate_token();

    let tx = conn.unchecked_transaction()?;
    repo::insert_account(&tx, &account)
        .map_err(|e| unique_as_field(e, "username", USERNAME_TAKEN))?;
    repo::insert_api_token(&tx, &hash_token(&token), &account.id, &now)?;
    tx.commit()?;

    Ok(IssuedAccount { account, token })
}

/// Staff only.
pub fn create_account(
    conn: &Connection,
    actor: &Actor,
    new: NewAccount,
) -> Result<IssuedAccount, ServiceError> {
    ensure_staff(actor, "create account")?;
    let issued = issue(conn, new)?;
    tracing::info!(
        account_id = %issued.account.id,
        is_staff = issued.account.is_staff,
        created_by = %actor.account_id,
        "Account created"
    );
    Ok(issued)
}

/// Create the first staff account when the store has none.
///
/// Returns the issued account so the caller can hand its token to the
/// operator; `None` once any account exists.
pub fn bootstrap_admin(conn: &Connection) -> Result<Option<IssuedAccount>, ServiceError> {
    if repo::count_accounts(conn)? > 0 {
        return Ok(None);
    }
    let issued = issue(
        conn,
        NewAccount {
            username: BOOTSTRAP_USERNAME.into(),
            first_name: "Clinic".into(),
            last_name: "Administrator".into(),
            email: None,
            is_staff: true,
        },
    )?;
    tracing::info!(account_id = %issued.account.id, "Bootstrapped administrator account");
    Ok(Some(issued))
}
