use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::errors::ApiJson;
use crate::api::response::{DataResponse, TokenResponse};
use crate::api::users::{build_user, UserInput};
use crate::app::AppState;
use crate::auth::middleware::{removal_cookie, token_cookie, CurrentUser};
use crate::auth::password::{
    hash_password, hash_reset_token, validate_password, verify_password, ResetToken,
};
use crate::db::hooks::Repositories;
use crate::db::models::{User, UserProfile};
use crate::error::AppError;
use crate::mail::client::{EmailMessage, Mailer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDetailsRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

/// Create an account. Admin accounts can only be created by another admin.
pub async fn process_register(
    repos: &Repositories,
    input: UserInput,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    if let Some(role) = input.role {
        if !role.is_self_assignable() {
            return Err(AppError::BadRequest(format!(
                "The role '{}' cannot be chosen at registration",
                role
            )));
        }
    }

    let user = build_user(input, now)?;
    repos.users.insert(&user).await?;
    tracing::info!(user = %user.id, role = %user.role, "User registered");
    Ok(user)
}

pub async fn process_login(repos: &Repositories, input: LoginRequest) -> Result<User, AppError> {
    let (email, password) = match (input.email, input.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email, password)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Please provide an email and password".into(),
            ))
        }
    };

    let invalid = || AppError::Auth("Invalid credentials".into());
    let user = repos
        .users
        .find_by_email(email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&password, &user.password) {
        tracing::debug!(user = %user.id, "Password mismatch");
        return Err(invalid());
    }
    Ok(user)
}

pub async fn process_update_details(
    repos: &Repositories,
    mut user: User,
    input: UpdateDetailsRequest,
) -> Result<UserProfile, AppError> {
    if let Some(name) = input.name {
        user.name = name.trim().to_string();
    }
    if let Some(email) = input.email {
        user.email = email.trim().to_lowercase();
    }
    user.validate()?;
    repos.users.replace(&user).await?;
    Ok(UserProfile::from(&user))
}

pub async fn process_update_password(
    repos: &Repositories,
    mut user: User,
    input: UpdatePasswordRequest,
) -> Result<User, AppError> {
    let current = required(input.current_password, "Please provide the current password")?;
    let new = required(input.new_password, "Please provide a new password")?;

    if !verify_password(&current, &user.password) {
        return Err(AppError::Auth("Password is incorrect".into()));
    }
    validate_password(&new)?;

    user.password = hash_password(&new)?;
    repos.users.replace(&user).await?;
    Ok(user)
}

/// Issue a reset token and mail the reset link.
///
/// The token is withdrawn again when the message cannot be delivered.
pub async fn process_forgot_password(
    repos: &Repositories,
    mailer: &dyn Mailer,
    public_url: &str,
    input: ForgotPasswordRequest,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let email = required(input.email, "Please provide an email")?;
    let mut user = repos
        .users
        .find_by_email(email.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email".into()))?;

    let token = ResetToken::generate(now);
    user.reset_password_token = Some(token.hash.clone());
    user.reset_password_expire = Some(token.expires_at);
    repos.users.replace(&user).await?;

    let reset_url = format!(
        "{}/api/v1/auth/resetpassword/{}",
        public_url.trim_end_matches('/'),
        token.raw
    );
    let message = EmailMessage {
        to: user.email.clone(),
        subject: "Password reset token".into(),
        body: format!(
            "You are receiving this email because you (or someone else) has requested the reset \
             of a password. Please make a PUT request to: \n\n {}",
            reset_url
        ),
    };

    if let Err(e) = mailer.send(message).await {
        tracing::warn!(user = %user.id, error = %e, "Failed to send reset email");
        user.clear_reset_token();
        repos.users.replace(&user).await?;
        return Err(AppError::Internal("Email could not be sent".into()));
    }

    tracing::info!(user = %user.id, "Password reset token issued");
    Ok(())
}

pub async fn process_reset_password(
    repos: &Repositories,
    raw_token: &str,
    input: ResetPasswordRequest,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let mut user = repos
        .users
        .find_by_reset_token(&hash_reset_token(raw_token), now)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid token".into()))?;

    let password = required(input.password, "Please provide a new password")?;
    validate_password(&password)?;

    user.password = hash_password(&password)?;
    user.clear_reset_token();
    repos.users.replace(&user).await?;
    tracing::info!(user = %user.id, "Password reset");
    Ok(user)
}

/// Sign `user` in: the token goes in the body and in the session cookie.
fn signed_in(
    state: &AppState,
    jar: CookieJar,
    user: &User,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let token = state.jwt.generate_token(&user.id)?;
    let cookie = token_cookie(
        token.clone(),
        state.config.jwt_cookie_expire_days,
        state.config.is_production(),
    );
    Ok((jar.add(cookie), Json(TokenResponse::new(token))))
}

/// `POST /api/v1/auth/register`
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(input): ApiJson<UserInput>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let user = process_register(&state.repos, input, Utc::now()).await?;
    signed_in(&state, jar, &user)
}

/// `POST /api/v1/auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(input): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let user = process_login(&state.repos, input).await?;
    signed_in(&state, jar, &user)
}

/// `GET /api/v1/auth/logout`
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, Json<DataResponse<serde_json::Value>>) {
    (jar.add(removal_cookie()), Json(DataResponse::empty()))
}

/// `GET /api/v1/auth/me`
pub async fn me_handler(user: CurrentUser) -> Json<DataResponse<UserProfile>> {
    Json(DataResponse::new(UserProfile::from(&user.0)))
}

/// `PUT /api/v1/auth/updatedetails`
pub async fn update_details_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<UpdateDetailsRequest>,
) -> Result<Json<DataResponse<UserProfile>>, AppError> {
    let profile = process_update_details(&state.repos, user.0, input).await?;
    Ok(Json(DataResponse::new(profile)))
}

/// `PUT /api/v1/auth/updatepassword`
pub async fn update_password_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    user: CurrentUser,
    ApiJson(input): ApiJson<UpdatePasswordRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let user = process_update_password(&state.repos, user.0, input).await?;
    signed_in(&state, jar, &user)
}

/// `POST /api/v1/auth/forgotpassword`
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<DataResponse<&'static str>>, AppError> {
    process_forgot_password(
        &state.repos,
        state.mailer.as_ref(),
        &state.config.public_url,
        input,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new("Email sent")))
}

/// `PUT /api/v1/auth/resetpassword/{resettoken}`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(raw_token): Path<String>,
    ApiJson(input): ApiJson<ResetPasswordRequest>,
) -> Result<(CookieJar, Json<TokenResponse>), AppError> {
    let user = process_reset_password(&state.repos, &raw_token, input, Utc::now()).await?;
    signed_in(&state, jar, &user)
}
