use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::errors::ApiJson;
use crate::api::response::{DataResponse, ListResponse};
use crate::app::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::password::{hash_password, validate_password};
use crate::auth::policy::{require_role, ADMINS};
use crate::db::hooks::Repositories;
use crate::db::models::{new_id, User, UserProfile};
use crate::db::query::ListQuery;
use crate::error::AppError;

/// Account fields accepted on registration and admin user management.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
}

/// Validate `input` and build a user with a hashed password.
pub(crate) fn build_user(input: UserInput, now: DateTime<Utc>) -> Result<User, AppError> {
    let password = input
        .password
        .ok_or_else(|| AppError::Validation("Please add a password".into()))?;
    validate_password(&password)?;

    let user = User {
        id: new_id(),
        name: input.name.unwrap_or_default().trim().to_string(),
        email: input.email.unwrap_or_default().trim().to_lowercase(),
        role: input.role.unwrap_or_default(),
        password: String::new(),
        reset_password_token: None,
        reset_password_expire: None,
        created_at: now,
    };
    user.validate()?;

    Ok(User {
        password: hash_password(&password)?,
        ..user
    })
}

fn user_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("No user with the id of {}", id))
}

async fn find_user(repos: &Repositories, id: &str) -> Result<User, AppError> {
    repos
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| user_not_found(id))
}

pub async fn process_list_users(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    query: &ListQuery,
) -> Result<ListResponse<serde_json::Value>, AppError> {
    require_role(caller, ADMINS)?;
    let page = repos.users.list(query).await?;
    let data = page
        .items
        .iter()
        .map(|u| serde_json::to_value(UserProfile::from(u)).map(|v| query.project(v)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ListResponse::page(data, query.pagination(page.total)))
}

pub async fn process_get_user(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<UserProfile, AppError> {
    require_role(caller, ADMINS)?;
    Ok(UserProfile::from(&find_user(repos, id).await?))
}

pub async fn process_create_user(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    input: UserInput,
    now: DateTime<Utc>,
) -> Result<UserProfile, AppError> {
    require_role(caller, ADMINS)?;
    let user = build_user(input, now)?;
    repos.users.insert(&user).await?;
    tracing::info!(user = %user.id, role = %user.role, "User created by admin");
    Ok(UserProfile::from(&user))
}

/// Admin update of name, email and role. Passwords are changed through the auth routes.
pub async fn process_update_user(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
    input: UserInput,
) -> Result<UserProfile, AppError> {
    require_role(caller, ADMINS)?;
    let mut user = find_user(repos, id).await?;

    if let Some(name) = input.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = input.email {
        user.email = email.trim().to_lowercase();
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    user.validate()?;

    repos.users.replace(&user).await?;
    Ok(UserProfile::from(&user))
}

pub async fn process_delete_user(
    repos: &Repositories,
    caller: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    require_role(caller, ADMINS)?;
    if !repos.users.delete(id).await? {
        return Err(user_not_found(id));
    }
    Ok(())
}

/// `GET /api/v1/users`
pub async fn list_users_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<serde_json::Value>>, AppError> {
    let query = ListQuery::from_params(&params);
    Ok(Json(
        process_list_users(&state.repos, &user.identity(), &query).await?,
    ))
}

/// `GET /api/v1/users/{id}`
pub async fn get_user_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<UserProfile>>, AppError> {
    let profile = process_get_user(&state.repos, &user.identity(), &id).await?;
    Ok(Json(DataResponse::new(profile)))
}

/// `POST /api/v1/users`
pub async fn create_user_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<UserInput>,
) -> Result<(StatusCode, Json<DataResponse<UserProfile>>), AppError> {
    let profile = process_create_user(&state.repos, &user.identity(), input, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(profile))))
}

/// `PUT /api/v1/users/{id}`
pub async fn update_user_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UserInput>,
) -> Result<Json<DataResponse<UserProfile>>, AppError> {
    let profile = process_update_user(&state.repos, &user.identity(), &id, input).await?;
    Ok(Json(DataResponse::new(profile)))
}

/// `DELETE /api/v1/users/{id}`
pub async fn delete_user_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<serde_json::Value>>, AppError> {
    process_delete_user(&state.repos, &user.identity(), &id).await?;
    Ok(Json(DataResponse::empty()))
}
