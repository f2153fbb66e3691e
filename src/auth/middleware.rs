use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::User;
use crate::error::AppError;

/// Name of the cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "token";

fn not_authorized() -> AppError {
    AppError::Auth("Not authorized to access this route".into())
}

/// The session token from `Authorization: Bearer ...`, falling back to the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// The user behind a valid session token.
///
/// Rejects with 401 when the token is missing, invalid, expired, or refers
/// to a user that no longer exists.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn identity(&self) -> AuthenticatedUser {
        AuthenticatedUser::from(&self.0)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(not_authorized)?;
        let claims = state.jwt.validate_token(&token)?;

        let user = state
            .repos
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(not_authorized)?;

        Ok(CurrentUser(user))
    }
}

/// Session cookie set alongside every issued token.
pub fn token_cookie(token: String, expire_days: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(expire_days))
        .build()
}

/// Cookie that clears the session on logout.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, "")).path("/").removal().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; token=xyz"));
        assert_eq!(extract_token(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert("cookie", HeaderValue::from_static("token=from-cookie"));
        assert_eq!(extract_token(&headers), Some("from-header".to_string()));
    }

    #[test]
    fn test_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_token_cookie_attributes() {
        let cookie = token_cookie("abc".into(), 30, false);
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(30)));
    }
}
