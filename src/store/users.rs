use super::{now, Store, StoreError, StoreResult, User, UserId};
use rusqlite::{params, OptionalExtension, Row};

const USER_COLUMNS: &str = "id, username, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

impl Store {
    /// Registers a user; `token_hash` is the digest of their API token.
    pub fn create_user(&self, username: &str, token_hash: &str) -> StoreResult<User> {
        let conn = self.conn();
        let created_at = now();
        conn.execute(
            "INSERT INTO users (username, token_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, token_hash, created_at],
        )
        .map_err(|err| StoreError::from_constraint(err, "user", username.to_string()))?;

        let user = User {
            id: UserId(conn.last_insert_rowid()),
            username: username.to_string(),
            created_at,
        };
        log::info!("Store: created user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE token_hash = ?1"),
                params![token_hash],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }
}
