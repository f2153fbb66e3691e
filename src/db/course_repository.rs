use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;

use crate::db::aggregates::{average_from, average_pipeline};
use crate::db::models::Course;
use crate::db::query::{fetch_page, ListQuery, Page};
use crate::error::AppError;

/// Repository trait for course storage.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn insert(&self, course: &Course) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Course>, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<Page<Course>, AppError>;

    /// All courses of one bootcamp, newest first.
    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Course>, AppError>;

    /// All courses of several bootcamps, used to embed courses in bootcamp listings.
    async fn list_by_bootcamps(&self, bootcamp_ids: &[String]) -> Result<Vec<Course>, AppError>;

    async fn replace(&self, course: &Course) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn delete_by_bootcamp(&self, bootcamp_id: &str) -> Result<u64, AppError>;

    /// Mean tuition of the bootcamp's courses, `None` when it has none.
    async fn average_tuition(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError>;

    async fn delete_all(&self) -> Result<u64, AppError>;
}

pub struct MongoCourseRepository {
    collection: mongodb::Collection<Course>,
}

impl MongoCourseRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("courses"),
        }
    }
}

#[async_trait]
impl CourseRepository for MongoCourseRepository {
    async fn insert(&self, course: &Course) -> Result<(), AppError> {
        self.collection.insert_one(course).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Course>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Course>, AppError> {
        fetch_page(&self.collection, query, doc! {}).await
    }

    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Course>, AppError> {
        let cursor = self
            .collection
            .find(doc! { "bootcamp": bootcamp_id })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn list_by_bootcamps(&self, bootcamp_ids: &[String]) -> Result<Vec<Course>, AppError> {
        if bootcamp_ids.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .collection
            .find(doc! { "bootcamp": { "$in": bootcamp_ids.to_vec() } })
            .sort(doc! { "createdAt": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn replace(&self, course: &Course) -> Result<(), AppError> {
        self.collection
            .replace_one(doc! { "_id": &course.id }, course)
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

    async fn average_tuition(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError> {
        let mut cursor = self
            .collection
            .aggregate(average_pipeline(bootcamp_id, "tuition"))
            .await?;
        Ok(average_from(cursor.try_next().await?))
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let result = self.collection.delete_many(doc! {}).await?;
        Ok(result.deleted_count)
    }
}
