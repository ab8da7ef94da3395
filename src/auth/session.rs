use rand::Rng;
use rusqlite::{params, OptionalExtension};

use super::AuthError;
use crate::db::DbPool;
use crate::session::Session;

/// Create a new session for an identity. Returns the session token.
pub fn create_session(
    pool: &DbPool,
    identity_id: &str,
    anonymous: bool,
    hours: u64,
) -> Result<String, AuthError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, identity_id, is_anonymous, token, expires_at)
         VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
        params![id, identity_id, anonymous, token, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Look up a live session by token. Expired or unknown tokens yield `None`.
pub fn resolve_session(pool: &DbPool, token: &str) -> Result<Option<Session>, AuthError> {
    let conn = pool.get()?;

    let row: Option<(String, bool)> = conn
        .query_row(
            "SELECT identity_id, is_anonymous FROM sessions
             WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row.map(|(identity, anonymous)| {
        if anonymous {
            Session::anonymous(identity)
        } else {
            Session::credentialed(identity)
        }
    }))
}

/// Delete a session by token.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<(), AuthError> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop sessions whose expiry has passed. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> Result<usize, AuthError> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
