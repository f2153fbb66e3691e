use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};

use crate::api::errors::ApiJson;
use crate::api::response::{DataResponse, ListResponse};
use crate::app::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::auth::policy::{authorize, require_role, PUBLISHERS};
use crate::db::hooks::Repositories;
use crate::db::models::{new_id, Bootcamp, BootcampInput};
use crate::db::query::ListQuery;
use crate::error::AppError;
use crate::geocoder::client::Geocoder;

pub(crate) fn bootcamp_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Bootcamp not found with id of {}", id))
}

/// Load a bootcamp or fail with 404.
pub(crate) async fn find_bootcamp(repos: &Repositories, id: &str) -> Result<Bootcamp, AppError> {
    repos
        .bootcamps
        .find_by_id(id)
        .await?
        .ok_or_else(|| bootcamp_not_found(id))
}

/// Paginated bootcamp listing with each bootcamp's courses embedded.
pub async fn process_list_bootcamps(
    repos: &Repositories,
    query: &ListQuery,
) -> Result<ListResponse<serde_json::Value>, AppError> {
    let page = repos.bootcamps.list(query).await?;

    let ids: Vec<String> = page.items.iter().map(|b| b.id.clone()).collect();
    let courses = repos.courses.list_by_bootcamps(&ids).await?;

    let mut data = Vec::with_capacity(page.items.len());
    for bootcamp in &page.items {
        let own: Vec<_> = courses.iter().filter(|c| c.bootcamp == bootcamp.id).collect();
        let mut value = query.project(serde_json::to_value(bootcamp)?);
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("courses".into(), serde_json::to_value(own)?);
        }
        data.push(value);
    }

    Ok(ListResponse::page(data, query.pagination(page.total)))
}

pub async fn process_create_bootcamp(
    repos: &Repositories,
    geocoder: &dyn Geocoder,
    caller: &AuthenticatedUser,
    input: BootcampInput,
    now: DateTime<Utc>,
) -> Result<Bootcamp, AppError> {
    require_role(caller, PUBLISHERS)?;

    // Publishers may own a single bootcamp; admins are not limited.
    if !caller.is_admin() && repos.bootcamps.find_by_owner(&caller.user_id).await?.is_some() {
        return Err(AppError::BadRequest(format!(
            "The user with ID {} has already published a bootcamp",
            caller.user_id
        )));
    }

    let (mut bootcamp, address) = Bootcamp::draft(new_id(), input, &caller.user_id, now)?;
    bootcamp.location = Some(geocoder.geocode(&address).await?.into());

    repos.bootcamps.insert(&bootcamp).await?;
    tracing::info!(bootcamp = %bootcamp.id, slug = %bootcamp.slug, user = %caller.user_id, "Bootcamp created");

    Ok(bootcamp)
}

pub async fn process_update_bootcamp(
    repos: &Repositories,
    geocoder: &dyn Geocoder,
    caller: &AuthenticatedUser,
    id: &str,
    input: BootcampInput,
) -> Result<Bootcamp, AppError> {
    let mut bootcamp = find_bootcamp(repos, id).await?;
    authorize(caller, Some(&bootcamp.user), PUBLISHERS)?;

    let new_address = bootcamp.apply(input);
    bootcamp.validate()?;
    if let Some(address) = new_address {
        bootcamp.location = Some(geocoder.geocode(&address).await?.into());
    }

    repos.bootcamps.update_details(&bootcamp).await?;
    find_bootcamp(repos, id).await
}

pub async fn process_delete_bootcamp(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    let bootcamp = find_bootcamp(repos, id).await?;
    authorize(caller, Some(&bootcamp.user), PUBLISHERS)?;
    repos.delete_bootcamp(&bootcamp).await
}

/// Bootcamps within `distance` miles of the given zipcode.
pub async fn process_bootcamps_in_radius(
    repos: &Repositories,
    geocoder: &dyn Geocoder,
    zipcode: &str,
    distance: &str,
) -> Result<Vec<Bootcamp>, AppError> {
    let miles = distance
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid distance '{}'", distance)))?;

    let origin = geocoder.geocode(zipcode).await?;
    repos
        .bootcamps
        .within_radius(origin.longitude, origin.latitude, miles)
        .await
}

/// `GET /api/v1/bootcamps`
pub async fn list_bootcamps_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<serde_json::Value>>, AppError> {
    let query = ListQuery::from_params(&params);
    Ok(Json(process_list_bootcamps(&state.repos, &query).await?))
}

/// `GET /api/v1/bootcamps/{id}`
pub async fn get_bootcamp_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Bootcamp>>, AppError> {
    Ok(Json(DataResponse::new(find_bootcamp(&state.repos, &id).await?)))
}

/// `POST /api/v1/bootcamps`
pub async fn create_bootcamp_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<BootcampInput>,
) -> Result<(StatusCode, Json<DataResponse<Bootcamp>>), AppError> {
    let bootcamp = process_create_bootcamp(
        &state.repos,
        state.geocoder.as_ref(),
        &user.identity(),
        input,
        Utc::now(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(bootcamp))))
}

/// `PUT /api/v1/bootcamps/{id}`
pub async fn update_bootcamp_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<BootcampInput>,
) -> Result<Json<DataResponse<Bootcamp>>, AppError> {
    let bootcamp = process_update_bootcamp(
        &state.repos,
        state.geocoder.as_ref(),
        &user.identity(),
        &id,
        input,
    )
    .await?;
    Ok(Json(DataResponse::new(bootcamp)))
}

/// `DELETE /api/v1/bootcamps/{id}`
pub async fn delete_bootcamp_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    process_delete_bootcamp(&state.repos, &user.identity(), &id).await?;
    Ok(Json(DataResponse::empty()))
}

/// `GET /api/v1/bootcamps/radius/{zipcode}/{distance}`
pub async fn bootcamps_in_radius_handler(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> Result<Json<ListResponse<Bootcamp>>, AppError> {
    let bootcamps =
        process_bootcamps_in_radius(&state.repos, state.geocoder.as_ref(), &zipcode, &distance)
            .await?;
    Ok(Json(ListResponse::all(bootcamps)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::db::memory;
    use crate::db::models::{Career, Course, CourseInput, SkillLevel};
    use crate::geocoder::client::{GeocodedAddress, StaticEntry, StaticGeocoder};

    pub(crate) fn caller(id: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: id.to_string(),
            email: format!("{id}@example.com"),
            role,
        }
    }

    pub(crate) fn geocoder() -> StaticGeocoder {
        StaticGeocoder::new(vec![
            StaticEntry {
                query: "02215".into(),
                address: GeocodedAddress {
                    latitude: 42.350846,
                    longitude: -71.10675,
                    formatted_address: Some("233 Bay State Rd, Boston, MA 02215, US".into()),
                    street: Some("233 Bay State Rd".into()),
                    city: Some("Boston".into()),
                    state: Some("MA".into()),
                    zipcode: Some("02215".into()),
                    country: Some("US".into()),
                },
            },
            StaticEntry {
                query: "02118".into(),
                address: GeocodedAddress {
                    latitude: 42.3389,
                    longitude: -71.0706,
                    formatted_address: None,
                    street: None,
                    city: Some("Boston".into()),
                    state: Some("MA".into()),
                    zipcode: Some("02118".into()),
                    country: Some("US".into()),
                },
            },
            StaticEntry {
                query: "10001".into(),
                address: GeocodedAddress {
                    latitude: 40.7506,
                    longitude: -73.9972,
                    formatted_address: None,
                    street: None,
                    city: Some("New York".into()),
                    state: Some("NY".into()),
                    zipcode: Some("10001".into()),
                    country: Some("US".into()),
                },
            },
        ])
    }

    pub(crate) fn input(name: &str) -> BootcampInput {
        BootcampInput {
            name: Some(name.to_string()),
            description: Some("Full stack web development".to_string()),
            website: Some("https://devworks.com".to_string()),
            phone: None,
            email: Some("enroll@devworks.com".to_string()),
            address: Some("233 Bay State Rd Boston MA 02215".to_string()),
            careers: Some(vec![Career::WebDevelopment]),
            housing: Some(true),
        }
    }

    #[tokio::test]
    async fn test_create_populates_location() {
        let repos = memory::repositories();
        let publisher = caller("u1", Role::Publisher);

        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &publisher, input("Devworks Bootcamp"), Utc::now())
                .await
                .unwrap();

        assert_eq!(bootcamp.slug, "devworks-bootcamp");
        assert_eq!(bootcamp.user, "u1");
        let location = bootcamp.location.unwrap();
        assert_eq!(location.coordinates, [-71.10675, 42.350846]);
        assert_eq!(location.city.as_deref(), Some("Boston"));
    }

    #[tokio::test]
    async fn test_create_without_address_fails_validation() {
        let repos = memory::repositories();
        let mut body = input("Devworks");
        body.address = None;

        let result = process_create_bootcamp(
            &repos,
            &geocoder(),
            &caller("u1", Role::Publisher),
            body,
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(repos.bootcamps.list(&ListQuery::default()).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_publisher_limited_to_one_bootcamp() {
        let repos = memory::repositories();
        let publisher = caller("u1", Role::Publisher);

        process_create_bootcamp(&repos, &geocoder(), &publisher, input("First"), Utc::now())
            .await
            .unwrap();
        let second =
            process_create_bootcamp(&repos, &geocoder(), &publisher, input("Second"), Utc::now()).await;

        match second {
            Err(AppError::BadRequest(msg)) => {
                assert_eq!(msg, "The user with ID u1 has already published a bootcamp")
            }
            other => panic!("Expected BadRequest, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_admin_may_publish_several_bootcamps() {
        let repos = memory::repositories();
        let admin = caller("root", Role::Admin);

        for name in ["First", "Second"] {
            process_create_bootcamp(&repos, &geocoder(), &admin, input(name), Utc::now())
                .await
                .unwrap();
        }
        assert_eq!(repos.bootcamps.list(&ListQuery::default()).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_plain_user_cannot_create() {
        let repos = memory::repositories();
        let result = process_create_bootcamp(
            &repos,
            &geocoder(),
            &caller("u1", Role::User),
            input("Devworks"),
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden() {
        let repos = memory::repositories();
        let bootcamp = process_create_bootcamp(
            &repos,
            &geocoder(),
            &caller("u1", Role::Publisher),
            input("Devworks"),
            Utc::now(),
        )
        .await
        .unwrap();

        let result = process_update_bootcamp(
            &repos,
            &geocoder(),
            &caller("u2", Role::Publisher),
            &bootcamp.id,
            BootcampInput {
                name: Some("Hijacked".into()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Devworks");
    }

    #[tokio::test]
    async fn test_update_renames_and_regeocodes() {
        let repos = memory::repositories();
        let owner = caller("u1", Role::Publisher);
        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &owner, input("Devworks"), Utc::now())
                .await
                .unwrap();

        let updated = process_update_bootcamp(
            &repos,
            &geocoder(),
            &owner,
            &bootcamp.id,
            BootcampInput {
                name: Some("Devworks NYC".into()),
                address: Some("10001".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.slug, "devworks-nyc");
        assert_eq!(updated.location.unwrap().city.as_deref(), Some("New York"));
    }

    pub(crate) fn course(id: &str, bootcamp: &str, tuition: f64) -> Course {
        Course::from_input(
            id.into(),
            CourseInput {
                title: Some("Front End".into()),
                description: Some("HTML and CSS".into()),
                weeks: Some(8),
                tuition: Some(tuition),
                minimum_skill: Some(SkillLevel::Beginner),
                scholarship_available: None,
            },
            bootcamp,
            "u1",
            Utc::now(),
        )
        .unwrap()
    }

    /// Adds a course to the bootcamp while its new address is being resolved.
    struct CourseAddingGeocoder {
        repos: Repositories,
        bootcamp: String,
    }

    #[async_trait::async_trait]
    impl Geocoder for CourseAddingGeocoder {
        async fn geocode(&self, address: &str) -> Result<GeocodedAddress, AppError> {
            self.repos
                .create_course(&course("c1", &self.bootcamp, 100.0))
                .await?;
            geocoder().geocode(address).await
        }
    }

    #[tokio::test]
    async fn test_update_keeps_average_written_meanwhile() {
        let repos = memory::repositories();
        let owner = caller("u1", Role::Publisher);
        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &owner, input("Devworks"), Utc::now())
                .await
                .unwrap();
        let racing = CourseAddingGeocoder {
            repos: repos.clone(),
            bootcamp: bootcamp.id.clone(),
        };

        let updated = process_update_bootcamp(
            &repos,
            &racing,
            &owner,
            &bootcamp.id,
            BootcampInput {
                address: Some("10001".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.average_cost, Some(100.0));
        let stored = repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().unwrap();
        assert_eq!(stored.average_cost, Some(100.0));
        assert_eq!(stored.location.unwrap().city.as_deref(), Some("New York"));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let repos = memory::repositories();
        let owner = caller("u1", Role::Publisher);
        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &owner, input("Devworks"), Utc::now())
                .await
                .unwrap();

        let updated = process_update_bootcamp(
            &repos,
            &geocoder(),
            &owner,
            &bootcamp.id,
            BootcampInput {
                description: Some("Data science".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.description, "Data science");
        assert_eq!(updated.website.as_deref(), Some("https://devworks.com"));
        assert_eq!(updated.photo, crate::db::models::DEFAULT_PHOTO);
    }

    #[tokio::test]
    async fn test_delete_cascades_courses_and_reviews() {
        let repos = memory::repositories();
        let owner = caller("u1", Role::Publisher);
        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &owner, input("Devworks"), Utc::now())
                .await
                .unwrap();

        let course = Course::from_input(
            "c1".into(),
            CourseInput {
                title: Some("Front End".into()),
                description: Some("HTML and CSS".into()),
                weeks: Some(8),
                tuition: Some(8000.0),
                minimum_skill: Some(SkillLevel::Beginner),
                scholarship_available: None,
            },
            &bootcamp.id,
            "u1",
            Utc::now(),
        )
        .unwrap();
        repos.create_course(&course).await.unwrap();

        process_delete_bootcamp(&repos, &owner, &bootcamp.id).await.unwrap();

        assert!(repos.bootcamps.find_by_id(&bootcamp.id).await.unwrap().is_none());
        assert!(repos.courses.find_by_id("c1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_bootcamp_is_not_found() {
        let repos = memory::repositories();
        let result = process_delete_bootcamp(&repos, &caller("root", Role::Admin), "nope").await;
        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Bootcamp not found with id of nope"),
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_radius_search() {
        let repos = memory::repositories();
        process_create_bootcamp(
            &repos,
            &geocoder(),
            &caller("root", Role::Admin),
            input("Boston Camp"),
            Utc::now(),
        )
        .await
        .unwrap();

        let near = process_bootcamps_in_radius(&repos, &geocoder(), "02118", "10")
            .await
            .unwrap();
        assert_eq!(near.len(), 1);

        let far = process_bootcamps_in_radius(&repos, &geocoder(), "10001", "10")
            .await
            .unwrap();
        assert!(far.is_empty());

        let invalid = process_bootcamps_in_radius(&repos, &geocoder(), "02118", "ten").await;
        assert!(matches!(invalid, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_embeds_courses() {
        let repos = memory::repositories();
        let owner = caller("u1", Role::Publisher);
        let bootcamp =
            process_create_bootcamp(&repos, &geocoder(), &owner, input("Devworks"), Utc::now())
                .await
                .unwrap();
        let course = Course::from_input(
            "c1".into(),
            CourseInput {
                title: Some("Front End".into()),
                description: Some("HTML and CSS".into()),
                weeks: Some(8),
                tuition: Some(100.0),
                minimum_skill: Some(SkillLevel::Beginner),
                scholarship_available: None,
            },
            &bootcamp.id,
            "u1",
            Utc::now(),
        )
        .unwrap();
        repos.create_course(&course).await.unwrap();

        let response = process_list_bootcamps(&repos, &ListQuery::default())
            .await
            .unwrap();
        assert_eq!(response.count, 1);
        assert_eq!(response.data[0]["courses"][0]["title"], "Front End");
        assert_eq!(response.data[0]["averageCost"], 100.0);
    }
}
