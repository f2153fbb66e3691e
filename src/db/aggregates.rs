//! Denormalized averages kept on the parent bootcamp.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};

use crate::db::hooks::{Change, RecordObserver, Repositories};
use crate::db::models::{Course, Review};
use crate::error::AppError;

/// Mean tuition rounded up to the next multiple of 10.
pub fn round_average_cost(mean: f64) -> f64 {
    (mean / 10.0).ceil() * 10.0
}

/// `$match`/`$group` pipeline averaging `field` over the children of `bootcamp`.
pub(crate) fn average_pipeline(bootcamp: &str, field: &str) -> Vec<Document> {
    vec![
        doc! { "$match": { "bootcamp": bootcamp } },
        doc! { "$group": { "_id": "$bootcamp", "average": { "$avg": format!("${field}") } } },
    ]
}

/// Reads the `average` produced by [`average_pipeline`].
pub(crate) fn average_from(result: Option<Document>) -> Option<f64> {
    result.and_then(|doc| match doc.get("average") {
        Some(Bson::Double(v)) => Some(*v),
        Some(Bson::Int32(v)) => Some(f64::from(*v)),
        Some(Bson::Int64(v)) => Some(*v as f64),
        _ => None,
    })
}

/// Recomputes `averageCost` of the course's bootcamp.
pub struct AverageCostObserver;

#[async_trait]
impl RecordObserver<Course> for AverageCostObserver {
    fn name(&self) -> &'static str {
        "average_cost"
    }

    async fn after_commit(
        &self,
        repos: &Repositories,
        course: &Course,
        _change: Change,
    ) -> Result<(), AppError> {
        let average = repos
            .courses
            .average_tuition(&course.bootcamp)
            .await?
            .map(round_average_cost);

        tracing::debug!(bootcamp = %course.bootcamp, ?average, "Updating average cost");
        repos
            .bootcamps
            .set_average_cost(&course.bootcamp, average)
            .await
    }
}

/// Recomputes `averageRating` of the review's bootcamp.
pub struct AverageRatingObserver;

#[async_trait]
impl RecordObserver<Review> for AverageRatingObserver {
    fn name(&self) -> &'static str {
        "average_rating"
    }

    async fn after_commit(
        &self,
        repos: &Repositories,
        review: &Review,
        _change: Change,
    ) -> Result<(), AppError> {
        let average = repos.reviews.average_rating(&review.bootcamp).await?;

        tracing::debug!(bootcamp = %review.bootcamp, ?average, "Updating average rating");
        repos
            .bootcamps
            .set_average_rating(&review.bootcamp, average)
            .await
    }
}
