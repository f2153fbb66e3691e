use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::errors::ApiJson;
use crate::api::response::{DataResponse, ListResponse};
use crate::app::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::auth::policy::{authorize, ensure_owner_or_admin, require_role, PUBLISHERS};
use crate::db::hooks::Repositories;
use crate::db::models::{new_id, BootcampSummary, Course, CourseInput};
use crate::db::query::ListQuery;
use crate::error::AppError;

/// Replace the `bootcamp` id of each serialized child with the bootcamp's summary.
///
/// Children whose bootcamp no longer exists keep the bare id.
pub(crate) async fn embed_bootcamps<T: Serialize>(
    repos: &Repositories,
    items: &[T],
    bootcamp_of: impl Fn(&T) -> &str,
    query: Option<&ListQuery>,
) -> Result<Vec<serde_json::Value>, AppError> {
    let mut ids: Vec<String> = items.iter().map(|i| bootcamp_of(i).to_string()).collect();
    ids.sort();
    ids.dedup();

    let summaries: HashMap<String, BootcampSummary> = repos
        .bootcamps
        .find_by_ids(&ids)
        .await?
        .iter()
        .map(|b| (b.id.clone(), BootcampSummary::from(b)))
        .collect();

    let mut data = Vec::with_capacity(items.len());
    for item in items {
        let mut value = serde_json::to_value(item)?;
        if let Some(q) = query {
            value = q.project(value);
        }
        if let (serde_json::Value::Object(map), Some(summary)) =
            (&mut value, summaries.get(bootcamp_of(item)))
        {
            if map.contains_key("bootcamp") {
                map.insert("bootcamp".into(), serde_json::to_value(summary)?);
            }
        }
        data.push(value);
    }
    Ok(data)
}

fn course_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("No course with the id of {}", id))
}

async fn find_course(repos: &Repositories, id: &str) -> Result<Course, AppError> {
    repos
        .courses
        .find_by_id(id)
        .await?
        .ok_or_else(|| course_not_found(id))
}

pub async fn process_list_courses(
    repos: &Repositories,
    query: &ListQuery,
) -> Result<ListResponse<serde_json::Value>, AppError> {
    let page = repos.courses.list(query).await?;
    let data = embed_bootcamps(repos, &page.items, |c| c.bootcamp.as_str(), Some(query)).await?;
    Ok(ListResponse::page(data, query.pagination(page.total)))
}

pub async fn process_get_course(
    repos: &Repositories,
    id: &str,
) -> Result<serde_json::Value, AppError> {
    let course = find_course(repos, id).await?;
    let mut data = embed_bootcamps(repos, &[course], |c| c.bootcamp.as_str(), None).await?;
    data.pop().ok_or_else(|| course_not_found(id))
}

/// Add a course to a bootcamp owned by the caller.
pub async fn process_create_course(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    bootcamp_id: &str,
    input: CourseInput,
    now: DateTime<Utc>,
) -> Result<Course, AppError> {
    require_role(caller, PUBLISHERS)?;
    let bootcamp = repos
        .bootcamps
        .find_by_id(bootcamp_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No bootcamp with the id of {}", bootcamp_id)))?;
    ensure_owner_or_admin(caller, &bootcamp.user)?;

    let course = Course::from_input(new_id(), input, &bootcamp.id, &caller.user_id, now)?;
    repos.create_course(&course).await?;

    tracing::info!(course = %course.id, bootcamp = %bootcamp.id, "Course created");
    Ok(course)
}

pub async fn process_update_course(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
    input: CourseInput,
) -> Result<Course, AppError> {
    let mut course = find_course(repos, id).await?;
    authorize(caller, Some(&course.user), PUBLISHERS)?;

    course.apply(input);
    course.validate()?;
    repos.save_course(&course).await?;
    Ok(course)
}

pub async fn process_delete_course(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    let course = find_course(repos, id).await?;
    authorize(caller, Some(&course.user), PUBLISHERS)?;
    repos.delete_course(&course).await
}

/// `GET /api/v1/courses`
pub async fn list_courses_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<serde_json::Value>>, AppError> {
    let query = ListQuery::from_params(&params);
    Ok(Json(process_list_courses(&state.repos, &query).await?))
}

/// `GET /api/v1/bootcamps/{id}/courses`
pub async fn list_bootcamp_courses_handler(
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
) -> Result<Json<ListResponse<Course>>, AppError> {
    let courses = state.repos.courses.list_by_bootcamp(&bootcamp_id).await?;
    Ok(Json(ListResponse::all(courses)))
}

/// `GET /api/v1/courses/{id}`
pub async fn get_course_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    Ok(Json(DataResponse::new(process_get_course(&state.repos, &id).await?)))
}

/// `POST /api/v1/bootcamps/{id}/courses`
pub async fn create_course_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bootcamp_id): Path<String>,
    ApiJson(input): ApiJson<CourseInput>,
) -> Result<(StatusCode, Json<DataResponse<Course>>), AppError> {
    let course =
        process_create_course(&state.repos, &user.identity(), &bootcamp_id, input, Utc::now())
            .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(course))))
}

/// `PUT /api/v1/courses/{id}`
pub async fn update_course_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<CourseInput>,
) -> Result<Json<DataResponse<Course>>, AppError> {
    let course = process_update_course(&state.repos, &user.identity(), &id, input).await?;
    Ok(Json(DataResponse::new(course)))
}

/// `DELETE /api/v1/courses/{id}`
pub async fn delete_course_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    process_delete_course(&state.repos, &user.identity(), &id).await?;
    Ok(Json(DataResponse::empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::bootcamps::process_create_bootcamp;
    use crate::api::bootcamps::tests::{caller, geocoder, input};
    use crate::auth::models::Role;
    use crate::db::memory;
    use crate::db::models::{Bootcamp, SkillLevel};

    fn course_input(title: &str, tuition: f64) -> CourseInput {
        CourseInput {
            title: Some(title.into()),
            description: Some("Learn the basics".into()),
            weeks: Some(8),
            tuition: Some(tuition),
            minimum_skill: Some(SkillLevel::Intermediate),
            scholarship_available: Some(false),
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
    async fn test_create_course_sets_average_cost() {
        let (repos, bootcamp) = setup().await;

        let course = process_create_course(
            &repos,
            &caller("owner", Role::Publisher),
            &bootcamp.id,
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(course.bootcamp, bootcamp.id);
        assert_eq!(course.user, "owner");

        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_cost, Some(100.0));
    }

    #[tokio::test]
    async fn test_create_course_for_missing_bootcamp() {
        let (repos, _) = setup().await;
        let result = process_create_course(
            &repos,
            &caller("owner", Role::Publisher),
            "missing",
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await;
        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "No bootcamp with the id of missing"),
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_only_bootcamp_owner_adds_courses() {
        let (repos, bootcamp) = setup().await;
        let result = process_create_course(
            &repos,
            &caller("other", Role::Publisher),
            &bootcamp.id,
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let admin = process_create_course(
            &repos,
            &caller("root", Role::Admin),
            &bootcamp.id,
            course_input("Back End", 200.0),
            Utc::now(),
        )
        .await;
        assert!(admin.is_ok());
    }

    #[tokio::test]
    async fn test_update_and_delete_course() {
        let (repos, bootcamp) = setup().await;
        let owner = caller("owner", Role::Publisher);
        let course = process_create_course(
            &repos,
            &owner,
            &bootcamp.id,
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await
        .unwrap();

        let updated = process_update_course(
            &repos,
            &owner,
            &course.id,
            CourseInput {
                tuition: Some(250.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.tuition, 250.0);
        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_cost, Some(250.0));

        let forbidden = process_delete_course(&repos, &caller("other", Role::Publisher), &course.id).await;
        assert!(matches!(forbidden, Err(AppError::Forbidden(_))));

        process_delete_course(&repos, &owner, &course.id).await.unwrap();
        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_cost, None);
    }

    #[tokio::test]
    async fn test_update_rejects_negative_tuition() {
        let (repos, bootcamp) = setup().await;
        let owner = caller("owner", Role::Publisher);
        let course = process_create_course(
            &repos,
            &owner,
            &bootcamp.id,
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await
        .unwrap();

        let result = process_update_course(
            &repos,
            &owner,
            &course.id,
            CourseInput {
                tuition: Some(-1.0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let stored = repos.courses.find_by_id(&course.id).await.unwrap().unwrap();
        assert_eq!(stored.tuition, 100.0);
    }

    #[tokio::test]
    async fn test_get_course_embeds_bootcamp_summary() {
        let (repos, bootcamp) = setup().await;
        let course = process_create_course(
            &repos,
            &caller("owner", Role::Publisher),
            &bootcamp.id,
            course_input("Front End", 100.0),
            Utc::now(),
        )
        .await
        .unwrap();

        let value = process_get_course(&repos, &course.id).await.unwrap();
        assert_eq!(
            value["bootcamp"],
            serde_json::json!({
                "_id": bootcamp.id,
                "name": "Devworks",
                "description": "Full stack web development"
            })
        );
    }
}
