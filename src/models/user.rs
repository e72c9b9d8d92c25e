//! User accounts and the identity handed back after login.

use crate::db::{Row, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Role assigned to every self-registered account.
pub const DEFAULT_ROLE: &str = "user";

/// A user as listed to administrators. The password hash is not part of this
/// type, so it cannot leak through serialization.
#[derive(Serialize, Clone, Debug)]
pub struct User {
    #[serde(rename = "user_id")]
    pub id: i64,

    #[serde(rename = "user_name")]
    pub name: String,

    /// Unique, matched case-sensitively.
    #[serde(rename = "user_email")]
    pub email: String,

    #[serde(rename = "user_role")]
    pub role: String,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub(crate) fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: row.get_i64("user_id")?,
            name: row.get_string("user_name")?,
            email: row.get_string("user_email")?,
            role: row.get_string("user_role")?,
            created_at: row.get_timestamp("created_at")?,
        })
    }
}

/// Who just logged in.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub role: String,
}
