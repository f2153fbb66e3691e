use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;

use crate::db::aggregates::{average_from, average_pipeline};
use crate::db::models::Review;
use crate::db::query::{fetch_page, ListQuery, Page};
use crate::error::AppError;

/// Repository trait for review storage.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, review: &Review) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Review>, AppError>;

    async fn find_by_bootcamp_and_user(
        &self,
        bootcamp_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<Page<Review>, AppError>;

    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Review>, AppError>;

    async fn replace(&self, review: &Review) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn delete_by_bootcamp(&self, bootcamp_id: &str) -> Result<u64, AppError>;

    /// Mean rating of the bootcamp's reviews, `None` when it has none.
    async fn average_rating(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError>;

    async fn delete_all(&self) -> Result<u64, AppError>;
}

pub struct MongoReviewRepository {
    collection: mongodb::Collection<Review>,
}

impl MongoReviewRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("reviews"),
        }
    }
}

#[async_trait]
impl ReviewRepository for MongoReviewRepository {
    async fn insert(&self, review: &Review) -> Result<(), AppError> {
        self.collection.insert_one(review).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Review>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_bootcamp_and_user(
        &self,
        bootcamp_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, AppError> {
        Ok(self
            .collection
            .find_one(doc! { "bootcamp": bootcamp_id, "user": user_id })
            .await?)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Review>, AppError> {
        fetch_page(&self.collection, query, doc! {}).await
    }

    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Review>, AppError> {
        let cursor = self
            .collection
            .find(doc! { "bootcamp": bootcamp_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace(&self, review: &Review) -> Result<(), AppError> {
        self.collection
            .replace_one(doc! { "_id": &review.id }, review)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let result = self.collection.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_by_bootcamp(&self, bootcamp_id: &str) -> Result<u64, AppError> {
        let result = self
            .collection
            .delete_many(doc! { "bootcamp": bootcamp_id })
            .await?;
        Ok(result.deleted_count)
    }

    async fn average_rating(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError> {
        let mut cursor = self
            .collection
            .aggregate(average_pipeline(bootcamp_id, "rating"))
            .await?;
        Ok(average_from(cursor.try_next().await?))
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }
}
