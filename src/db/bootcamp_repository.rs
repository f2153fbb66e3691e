use async_trait::async_trait;
use bson::{doc, Document};

use crate::db::models::Bootcamp;
use crate::db::query::{fetch_page, ListQuery, Page};
use crate::error::AppError;

/// Earth radius in miles, used to turn a distance into radians.
pub const EARTH_RADIUS_MILES: f64 = 3963.2;

/// Fields a publisher may change through an update. Absent optional fields are unset.
pub const EDITABLE_FIELDS: [&str; 9] = [
    "name",
    "slug",
    "description",
    "website",
    "phone",
    "email",
    "location",
    "careers",
    "housing",
];

/// Repository trait for bootcamp storage.
#[async_trait]
pub trait BootcampRepository: Send + Sync {
    async fn insert(&self, bootcamp: &Bootcamp) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Bootcamp>, AppError>;

    /// The bootcamp published by `user_id`, if any.
    async fn find_by_owner(&self, user_id: &str) -> Result<Option<Bootcamp>, AppError>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Bootcamp>, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<Page<Bootcamp>, AppError>;

    /// Bootcamps located within `radius_miles` of the given point.
    async fn within_radius(
        &self,
        longitude: f64,
        latitude: f64,
        radius_miles: f64,
    ) -> Result<Vec<Bootcamp>, AppError>;

    /// Write the editable fields of `bootcamp`, leaving ownership, photo and
    /// the derived averages as stored.
    async fn update_details(&self, bootcamp: &Bootcamp) -> Result<(), AppError>;

    async fn set_photo(&self, id: &str, photo: &str) -> Result<(), AppError>;

    /// Set or clear the derived `averageCost`.
    async fn set_average_cost(&self, id: &str, value: Option<f64>) -> Result<(), AppError>;

    /// Set or clear the derived `averageRating`.
    async fn set_average_rating(&self, id: &str, value: Option<f64>) -> Result<(), AppError>;

    /// Returns `false` when no bootcamp had that id.
    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn delete_all(&self) -> Result<u64, AppError>;
}

pub struct MongoBootcampRepository {
    collection: mongodb::Collection<Bootcamp>,
}

impl MongoBootcampRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("bootcamps"),
        }
    }

    async fn set_or_unset(&self, id: &str, field: &str, value: Option<f64>) -> Result<(), AppError> {
        let update = match value {
            Some(value) => doc! { "$set": { field: value } },
            None => doc! { "$unset": { field: "" } },
        };
        self.collection.update_one(doc! { "_id": id }, update).await?;
        Ok(())
    }
}

#[async_trait]
impl BootcampRepository for MongoBootcampRepository {
    async fn insert(&self, bootcamp: &Bootcamp) -> Result<(), AppError> {
        self.collection.insert_one(bootcamp).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Bootcamp>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Option<Bootcamp>, AppError> {
        Ok(self.collection.find_one(doc! { "user": user_id }).await?)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Bootcamp>, AppError> {
        use futures::TryStreamExt;

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .collection
            .find(doc! { "_id": { "$in": ids.to_vec() } })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Bootcamp>, AppError> {
        fetch_page(&self.collection, query, doc! {}).await
    }

    async fn within_radius(
        &self,
        longitude: f64,
        latitude: f64,
        radius_miles: f64,
    ) -> Result<Vec<Bootcamp>, AppError> {
        use futures::TryStreamExt;

        let radians = radius_miles / EARTH_RADIUS_MILES;
        let filter = doc! {
            "location": {
                "$geoWithin": {
                    "$centerSphere": [[longitude, latitude], radians]
                }
            }
        };
        let cursor = self.collection.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_details(&self, bootcamp: &Bootcamp) -> Result<(), AppError> {
        let mut encoded = bson::to_document(bootcamp)?;
        let mut set = Document::new();
        let mut unset = Document::new();
        for field in EDITABLE_FIELDS {
            match encoded.remove(field) {
                Some(value) => set.insert(field, value),
                None => unset.insert(field, ""),
            };
        }

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        self.collection
            .update_one(doc! { "_id": &bootcamp.id }, update)
            .await?;
        Ok(())
    }

    async fn set_photo(&self, id: &str, photo: &str) -> Result<(), AppError> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "photo": photo } })
            .await?;
        Ok(())
    }

    async fn set_average_cost(&self, id: &str, value: Option<f64>) -> Result<(), AppError> {
        self.set_or_unset(id, "averageCost", value).await
    }

    async fn set_average_rating(&self, id: &str, value: Option<f64>) -> Result<(), AppError> {
        self.set_or_unset(id, "averageRating", value).await
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }
}
