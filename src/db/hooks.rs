//! Post-commit observers and the repository hub that runs them.
//!
//! Writes to child records (courses, reviews) go through [`Repositories`] so
//! that the observers registered for the entity type run after every
//! successful insert, update or delete.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::aggregates::{AverageCostObserver, AverageRatingObserver};
use crate::db::bootcamp_repository::{BootcampRepository, MongoBootcampRepository};
use crate::db::course_repository::{CourseRepository, MongoCourseRepository};
use crate::db::models::{Bootcamp, Course, Review};
use crate::db::review_repository::{MongoReviewRepository, ReviewRepository};
use crate::db::user_repository::{MongoUserRepository, UserRepository};
use crate::error::AppError;

/// What happened to the record an observer is notified about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Saved,
    Deleted,
}

/// Reacts to a committed write on a record of type `T`.
#[async_trait]
pub trait RecordObserver<T: Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_commit(
        &self,
        repos: &Repositories,
        record: &T,
        change: Change,
    ) -> Result<(), AppError>;
}

/// Observers registered for one entity type, run in registration order.
pub struct Observers<T: Sync> {
    list: Vec<Arc<dyn RecordObserver<T>>>,
}

impl<T: Sync> Default for Observers<T> {
    fn default() -> Self {
        Self { list: Vec::new() }
    }
}

impl<T: Sync> Observers<T> {
    pub fn register(mut self, observer: Arc<dyn RecordObserver<T>>) -> Self {
        self.list.push(observer);
        self
    }

    /// Run every observer. Failures are logged and never reach the caller,
    /// the write they follow has already been committed.
    pub async fn notify(&self, repos: &Repositories, record: &T, change: Change) {
        for observer in &self.list {
            if let Err(e) = observer.after_commit(repos, record, change).await {
                tracing::warn!(
                    observer = observer.name(),
                    ?change,
                    error = %e,
                    "Post-commit observer failed"
                );
            }
        }
    }
}

/// Handles to every collection, plus the observers for child records.
#[derive(Clone)]
pub struct Repositories {
    pub bootcamps: Arc<dyn BootcampRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub users: Arc<dyn UserRepository>,
    course_observers: Arc<Observers<Course>>,
    review_observers: Arc<Observers<Review>>,
}

impl Repositories {
    /// Build the hub with the aggregate observers registered.
    pub fn new(
        bootcamps: Arc<dyn BootcampRepository>,
        courses: Arc<dyn CourseRepository>,
        reviews: Arc<dyn ReviewRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self::with_observers(
            bootcamps,
            courses,
            reviews,
            users,
            Observers::default().register(Arc::new(AverageCostObserver)),
            Observers::default().register(Arc::new(AverageRatingObserver)),
        )
    }

    pub fn with_observers(
        bootcamps: Arc<dyn BootcampRepository>,
        courses: Arc<dyn CourseRepository>,
        reviews: Arc<dyn ReviewRepository>,
        users: Arc<dyn UserRepository>,
        course_observers: Observers<Course>,
        review_observers: Observers<Review>,
    ) -> Self {
        Self {
            bootcamps,
            courses,
            reviews,
            users,
            course_observers: Arc::new(course_observers),
            review_observers: Arc::new(review_observers),
        }
    }

    pub fn mongo(db: &mongodb::Database) -> Self {
        Self::new(
            Arc::new(MongoBootcampRepository::new(db)),
            Arc::new(MongoCourseRepository::new(db)),
            Arc::new(MongoReviewRepository::new(db)),
            Arc::new(MongoUserRepository::new(db)),
        )
    }

    pub async fn create_course(&self, course: &Course) -> Result<(), AppError> {
        self.courses.insert(course).await?;
        self.course_observers.notify(self, course, Change::Saved).await;
        Ok(())
    }

    pub async fn save_course(&self, course: &Course) -> Result<(), AppError> {
        self.courses.replace(course).await?;
        self.course_observers.notify(self, course, Change::Saved).await;
        Ok(())
    }

    pub async fn delete_course(&self, course: &Course) -> Result<(), AppError> {
        self.courses.delete(&course.id).await?;
        self.course_observers
            .notify(self, course, Change::Deleted)
            .await;
        Ok(())
    }

    /// Insert a review, rejecting a second review of the same bootcamp by the same user.
    pub async fn create_review(&self, review: &Review) -> Result<(), AppError> {
        if self
            .reviews
            .find_by_bootcamp_and_user(&review.bootcamp, &review.user)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You have already reviewed this bootcamp".into(),
            ));
        }
        self.reviews.insert(review).await?;
        self.review_observers.notify(self, review, Change::Saved).await;
        Ok(())
    }

    pub async fn save_review(&self, review: &Review) -> Result<(), AppError> {
        self.reviews.replace(review).await?;
        self.review_observers.notify(self, review, Change::Saved).await;
        Ok(())
    }

    pub async fn delete_review(&self, review: &Review) -> Result<(), AppError> {
        self.reviews.delete(&review.id).await?;
        self.review_observers
            .notify(self, review, Change::Deleted)
            .await;
        Ok(())
    }

    /// Delete a bootcamp together with its courses and reviews.
    pub async fn delete_bootcamp(&self, bootcamp: &Bootcamp) -> Result<(), AppError> {
        let courses = self.courses.delete_by_bootcamp(&bootcamp.id).await?;
        let reviews = self.reviews.delete_by_bootcamp(&bootcamp.id).await?;
        self.bootcamps.delete(&bootcamp.id).await?;

        tracing::info!(
            bootcamp = %bootcamp.id,
            courses,
            reviews,
            "Bootcamp deleted with its children"
        );
        Ok(())
    }
}
