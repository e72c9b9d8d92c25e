//! Pet listings.

use crate::db::{Row, StoreResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A stored pet listing.
#[derive(Serialize, Clone, Debug)]
pub struct Pet {
    #[serde(rename = "pet_id")]
    pub id: i64,

    #[serde(rename = "pet_name")]
    pub name: String,

    #[serde(rename = "pet_desc")]
    pub description: Option<String>,

    /// Absolute URL of the uploaded image, if one came with the listing.
    #[serde(rename = "pet_image")]
    pub image_url: Option<String>,

    /// Default list order, newest first.
    pub created_at: DateTime<Utc>,
}

impl Pet {
    pub(crate) fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(Self {
            id: row.get_i64("pet_id")?,
            name: row.get_string("pet_name")?,
            description: row.get_opt_string("pet_desc")?,
            image_url: row.get_opt_string("pet_image")?,
            created_at: row.get_timestamp("created_at")?,
        })
    }
}

/// Input for creating a listing.
#[derive(Debug, Clone, Default)]
pub struct NewPet {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}
