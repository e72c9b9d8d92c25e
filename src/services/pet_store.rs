//! src/services/pet_store.rs
//!
//! PetStore: owns the `pets` table: create, list newest first, delete.

use super::{ServiceError, ServiceResult, is_blank};
use crate::{
    db::{QueryExecutor, SqlValue},
    models::pet::{NewPet, Pet},
};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct PetStore {
    db: Arc<dyn QueryExecutor>,
}

impl PetStore {
    pub fn new(db: Arc<dyn QueryExecutor>) -> Self {
        Self { db }
    }

    /// Insert a listing. Empty description or image URL are stored as NULL.
    pub async fn create(&self, pet: &NewPet) -> ServiceResult<()> {
        if is_blank(&pet.name) {
            return Err(ServiceError::Validation("pet name"));
        }

        self.db
            .execute(
                "INSERT INTO pets (pet_name, pet_desc, pet_image) VALUES (?, ?, ?)",
                &[
                    SqlValue::text(pet.name.as_str()),
                    SqlValue::opt_text(pet.description.as_deref()),
                    SqlValue::opt_text(pet.image_url.as_deref()),
                ],
            )
            .await?;

        info!(has_image = pet.image_url.is_some(), "pet listing created");
        Ok(())
    }

    /// Every listing, newest first. `pet_id` breaks ties between rows created
    /// within the same clock tick.
    pub async fn list(&self) -> ServiceResult<Vec<Pet>> {
        let rows = self
            .db
            .execute(
                "SELECT pet_id, pet_name, pet_desc, pet_image, created_at
                 FROM pets ORDER BY created_at DESC, pet_id DESC",
                &[],
            )
            .await?;
        Ok(rows
            .rows
            .iter()
            .map(Pet::from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a listing. Its image file is left in place.
    pub async fn delete(&self, id: i64) -> ServiceResult<u64> {
        let result = self
            .db
            .execute("DELETE FROM pets WHERE pet_id = ?", &[SqlValue::Int(id)])
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;

    fn named(name: &str) -> NewPet {
        NewPet {
            name: name.to_string(),
            ..NewPet::default()
        }
    }

    #[tokio::test]
    async fn listing_is_strictly_newest_first() {
        let pets = PetStore::new(memory_db().await);
        for name in ["rex", "tom", "kiwi"] {
            pets.create(&named(name)).await.unwrap();
        }

        let listed = pets.list().await.unwrap();
        let names: Vec<_> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["kiwi", "tom", "rex"]);
        assert!(listed.windows(2).all(|w| w[0].id > w[1].id));
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_insert() {
        let pets = PetStore::new(memory_db().await);
        assert!(matches!(
            pets.create(&named("  ")).await,
            Err(ServiceError::Validation("pet name"))
        ));
        assert!(pets.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn optional_fields_round_trip_as_null() {
        let pets = PetStore::new(memory_db().await);
        pets.create(&NewPet {
            name: "rex".into(),
            description: Some(String::new()),
            image_url: None,
        })
        .await
        .unwrap();
        pets.create(&NewPet {
            name: "tom".into(),
            description: Some("grey tabby".into()),
            image_url: Some("http://localhost:3000/uploads/1-a.png".into()),
        })
        .await
        .unwrap();

        let listed = pets.list().await.unwrap();
        assert_eq!(listed[0].description.as_deref(), Some("grey tabby"));
        assert_eq!(
            listed[0].image_url.as_deref(),
            Some("http://localhost:3000/uploads/1-a.png")
        );
        assert_eq!(listed[1].description, None);
        assert_eq!(listed[1].image_url, None);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_an_error() {
        let pets = PetStore::new(memory_db().await);
        pets.create(&named("rex")).await.unwrap();
        let id = pets.list().await.unwrap()[0].id;

        assert_eq!(pets.delete(id).await.unwrap(), 1);
        assert_eq!(pets.delete(id).await.unwrap(), 0);
        assert_eq!(pets.delete(9_999).await.unwrap(), 0);
    }
}
