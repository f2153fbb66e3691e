use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::doc;

use crate::db::models::{timestamp, User};
use crate::db::query::{fetch_page, ListQuery, Page};
use crate::error::AppError;

/// Repository trait for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    /// Lookup by email, case-insensitive (emails are stored lowercase).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// The user holding the given reset token hash, if it has not expired at `now`.
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;

    async fn list(&self, query: &ListQuery) -> Result<Page<User>, AppError>;

    async fn replace(&self, user: &User) -> Result<(), AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    async fn delete_all(&self) -> Result<u64, AppError>;
}

pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        self.collection.insert_one(user).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .collection
            .find_one(doc! { "email": email.trim().to_lowercase() })
            .await?)
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        // Timestamps are fixed-width strings, so `$gt` compares chronologically.
        Ok(self
            .collection
            .find_one(doc! {
                "resetPasswordToken": token_hash,
                "resetPasswordExpire": { "$gt": timestamp::format(&now) },
            })
            .await?)
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<User>, AppError> {
        fetch_page(&self.collection, query, doc! {}).await
    }

    async fn replace(&self, user: &User) -> Result<(), AppError> {
        self.collection
            .replace_one(doc! { "_id": &user.id }, user)
            .await?;
        Ok(())
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
