//! src/services/credential_store.rs
//!
//! CredentialStore: owns the `users` table. Passwords are stored only as
//! bcrypt hashes and compared with bcrypt's own verification routine.

use super::{ServiceError, ServiceResult, is_blank};
use crate::{
    db::{QueryExecutor, SqlValue, StoreError},
    models::user::{DEFAULT_ROLE, Identity, User},
};
use std::sync::Arc;
use tracing::{debug, info};

/// Work factor for new hashes.
pub const HASH_COST: u32 = 10;

#[derive(Clone)]
pub struct CredentialStore {
    db: Arc<dyn QueryExecutor>,
    hash_cost: u32,
}

impl CredentialStore {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self {
            db,
            hash_cost: HASH_COST,
        }
    }

    /// Cheaper hashing for tests; bcrypt's floor is 4.
    #[cfg(test)]
    pub fn with_cost(db: Arc<dyn QueryExecutor>, hash_cost: u32) -> Self {
        Self { db, hash_cost }
    }

    /// Create an account with the default role.
    ///
    /// The email lookup only gives a friendly early answer; the unique
    /// constraint on `user_email` decides when two signups race.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ServiceResult<()> {
        if is_blank(name) || is_blank(email) || is_blank(password) {
            return Err(ServiceError::Validation("name, email and password"));
        }

        let existing = self
            .db
            .execute(
                "SELECT user_id FROM users WHERE user_email = ?",
                &[SqlValue::text(email)],
            )
            .await?;
        if !existing.is_empty() {
            debug!("signup rejected, email already registered");
            return Err(ServiceError::Conflict("email"));
        }

        let hash = hash_password(password.to_string(), self.hash_cost).await?;

        let inserted = self
            .db
            .execute(
                "INSERT INTO users (user_name, user_email, user_pass, user_role) VALUES (?, ?, ?, ?)",
                &[
                    SqlValue::text(name),
                    SqlValue::text(email),
                    SqlValue::Text(hash),
                    SqlValue::text(DEFAULT_ROLE),
                ],
            )
            .await;

        match inserted {
            Ok(_) => {
                info!("registered new user");
                Ok(())
            }
            Err(StoreError::UniqueViolation) => Err(ServiceError::Conflict("email")),
            Err(err) => Err(err.into()),
        }
    }

    /// Check an email/password pair and return the matching identity.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<Identity> {
        if is_blank(email) || is_blank(password) {
            return Err(ServiceError::Validation("email and password"));
        }

        let rows = self
            .db
            .execute(
                "SELECT user_id, user_name, user_pass, user_role FROM users WHERE user_email = ?",
                &[SqlValue::text(email)],
            )
            .await?;
        let Some(row) = rows.first() else {
            return Err(ServiceError::NotFound("user"));
        };

        let stored_hash = row.get_string("user_pass")?;
        if !verify_password(password.to_string(), stored_hash).await? {
            return Err(ServiceError::InvalidCredential);
        }

        Ok(Identity {
            id: row.get_i64("user_id")?,
            name: row.get_string("user_name")?,
            role: row.get_string("user_role")?,
        })
    }

    /// All users, newest first. Never selects the hash column.
    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        let rows = self
            .db
            .execute(
                "SELECT user_id, user_name, user_email, user_role, created_at
                 FROM users ORDER BY created_at DESC, user_id DESC",
                &[],
            )
            .await?;
        Ok(rows
            .rows
            .iter()
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a user. Unknown ids affect zero rows and are not an error.
    pub async fn delete(&self, id: i64) -> ServiceResult<u64> {
        let result = self
            .db
            .execute("DELETE FROM users WHERE user_id = ?", &[SqlValue::Int(id)])
            .await?;
        Ok(result.rows_affected)
    }
}

/// bcrypt is CPU-bound; keep it off the async workers.
async fn hash_password(password: String, cost: u32) -> ServiceResult<String> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> ServiceResult<bool> {
    Ok(tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??)
}
