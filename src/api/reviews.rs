use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};

use crate::api::courses::embed_bootcamps;
use crate::api::errors::ApiJson;
use crate::api::response::{DataResponse, ListResponse};
use crate::app::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::auth::policy::{authorize, require_role, REVIEWERS};
use crate::db::hooks::Repositories;
use crate::db::models::{new_id, Review, ReviewInput};
use crate::db::query::ListQuery;
use crate::error::AppError;

fn review_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("No review found with the id of {}", id))
}

async fn find_review(repos: &Repositories, id: &str) -> Result<Review, AppError> {
    repos
        .reviews
        .find_by_id(id)
        .await?
        .ok_or_else(|| review_not_found(id))
}

pub async fn process_list_reviews(
    repos: &Repositories,
    query: &ListQuery,
) -> Result<ListResponse<serde_json::Value>, AppError> {
    let page = repos.reviews.list(query).await?;
    let data = embed_bootcamps(repos, &page.items, |r| r.bootcamp.as_str(), Some(query)).await?;
    Ok(ListResponse::page(data, query.pagination(page.total)))
}

pub async fn process_get_review(
    repos: &Repositories,
    id: &str,
) -> Result<serde_json::Value, AppError> {
    let review = find_review(repos, id).await?;
    let mut data = embed_bootcamps(repos, &[review], |r| r.bootcamp.as_str(), None).await?;
    data.pop().ok_or_else(|| review_not_found(id))
}

/// One review per user and bootcamp; a second attempt is rejected with 400.
pub async fn process_create_review(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    bootcamp_id: &str,
    input: ReviewInput,
    now: DateTime<Utc>,
) -> Result<Review, AppError> {
    require_role(caller, REVIEWERS)?;
    let bootcamp = repos
        .bootcamps
        .find_by_id(bootcamp_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No bootcamp with the id of {}", bootcamp_id)))?;

    let review = Review::from_input(new_id(), input, &bootcamp.id, &caller.user_id, now)?;
    repos.create_review(&review).await?;

    tracing::info!(review = %review.id, bootcamp = %bootcamp.id, "Review created");
    Ok(review)
}

pub async fn process_update_review(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
    input: ReviewInput,
) -> Result<Review, AppError> {
    let mut review = find_review(repos, id).await?;
    authorize(caller, Some(&review.user), REVIEWERS)?;

    review.apply(input);
    review.validate()?;
    repos.save_review(&review).await?;
    Ok(review)
}

pub async fn process_delete_review(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    let review = find_review(repos, id).await?;
    authorize(caller, Some(&review.user), REVIEWERS)?;
    repos.delete_review(&review).await
}

/// `GET /api/v1/reviews`
pub async fn list_reviews_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<serde_json::Value>>, AppError> {
    let query = ListQuery::from_params(&params);
    Ok(Json(process_list_reviews(&state.repos, &query).await?))
}

/// `GET /api/v1/bootcamps/{id}/reviews`
pub async fn list_bootcamp_reviews_handler(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> Result<Json<ListResponse<Review>>, AppError> {
    let reviews = state.repos.reviews.list_by_bootcamp(&bootcamp_id).await?;
    Ok(Json(ListResponse::all(reviews)))
}

/// `GET /api/v1/reviews/{id}`
pub async fn get_review_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    Ok(Json(DataResponse::new(process_get_review(&state.repos, &id).await?)))
}

/// `POST /api/v1/bootcamps/{id}/reviews`
pub async fn create_review_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bootcamp_id): Path<String>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<(StatusCode, Json<DataResponse<Review>>), AppError> {
    let review =
        process_create_review(&state.repos, &user.identity(), &bootcamp_id, input, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(review))))
}

/// `PUT /api/v1/reviews/{id}`
pub async fn update_review_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<Json<DataResponse<Review>>, AppError> {
    let review = process_update_review(&state.repos, &user.identity(), &id, input).await?;
    Ok(Json(DataResponse::new(review)))
}

/// `DELETE /api/v1/reviews/{id}`
pub async fn delete_review_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    process_delete_review(&state.repos, &user.identity(), &id).await?;
    Ok(Json(DataResponse::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bootcamps::process_create_bootcamp;
    use crate::api::bootcamps::tests::{caller, geocoder, input};
    use crate::auth::models::Role;
    use crate::db::memory;
    use crate::db::models::Bootcamp;

    fn review_input(rating: u8) -> ReviewInput {
        ReviewInput {
            title: Some("Learned a ton".into()),
            text: Some("Great instructors and curriculum".into()),
            rating: Some(rating),
        }
    }

    async fn setup() -> (Repositories, Bootcamp) {
        let repos = memory::repositories();
        let bootcamp = process_create_bootcamp(
            &repos,
            &geocoder(),
            &caller("owner", Role::Publisher),
            input("Devworks"),
            Utc::now(),
        )
        .await
        .unwrap();
        (repos, bootcamp)
    }

    #[tokio::test]
    async fn test_create_review_updates_rating() {
        let (repos, bootcamp) = setup().await;
        process_create_review(&repos, &caller("alice", Role::User), &bootcamp.id, review_input(8), Utc::now())
            .await
            .unwrap();
        process_create_review(&repos, &caller("bob", Role::User), &bootcamp.id, review_input(5), Utc::now())
            .await
            .unwrap();

        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_rating, Some(6.5));
    }

    #[tokio::test]
    async fn test_publisher_cannot_review() {
        let (repos, bootcamp) = setup().await;
        let result = process_create_review(
            &repos,
            &caller("owner", Role::Publisher),
            &bootcamp.id,
            review_input(10),
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_second_review_is_rejected() {
        let (repos, bootcamp) = setup().await;
        let alice = caller("alice", Role::User);
        process_create_review(&repos, &alice, &bootcamp.id, review_input(8), Utc::now())
            .await
            .unwrap();

        let again = process_create_review(&repos, &alice, &bootcamp.id, review_input(2), Utc::now()).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_update_review() {
        let (repos, bootcamp) = setup().await;
        let review = process_create_review(
            &repos,
            &caller("alice", Role::User),
            &bootcamp.id,
            review_input(8),
            Utc::now(),
        )
        .await
        .unwrap();

        let result = process_update_review(
            &repos,
            &caller("mallory", Role::User),
            &review.id,
            ReviewInput {
                rating: Some(1),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let stored = repos.reviews.find_by_id(&review.id).await.unwrap().unwrap();
        assert_eq!(stored.rating, 8);
    }

    #[tokio::test]
    async fn test_admin_can_update_and_delete_any_review() {
        let (repos, bootcamp) = setup().await;
        let review = process_create_review(
            &repos,
            &caller("alice", Role::User),
            &bootcamp.id,
            review_input(8),
            Utc::now(),
        )
        .await
        .unwrap();
        let admin = caller("root", Role::Admin);

        let updated = process_update_review(
            &repos,
            &admin,
            &review.id,
            ReviewInput {
                rating: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.rating, 4);
        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_rating, Some(4.0));

        process_delete_review(&repos, &admin, &review.id).await.unwrap();
        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_rating, None);
    }

    #[tokio::test]
    async fn test_review_for_missing_bootcamp() {
        let (repos, _) = setup().await;
        let result = process_create_review(
            &repos,
            &caller("alice", Role::User),
            "missing",
            review_input(8),
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
