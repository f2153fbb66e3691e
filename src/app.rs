use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::jwt::JwtService;
use crate::config::{AppConfig, GeocoderProvider, StorageBackend};
use crate::db::hooks::Repositories;
use crate::geocoder::client::{Geocoder, MapQuestGeocoder, StaticGeocoder};
use crate::mail::client::{LogMailer, Mailer};
use crate::storage::client::{LocalStorageClient, S3StorageClient, StorageClient};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub geocoder: Arc<dyn Geocoder>,
    pub storage_client: Arc<dyn StorageClient>,
    pub mailer: Arc<dyn Mailer>,
    pub jwt: Arc<JwtService>,
    pub config: Arc<AppConfig>,
}

/// Geocoder selected by `config.geocoder_provider`.
pub fn build_geocoder(config: &AppConfig) -> anyhow::Result<Arc<dyn Geocoder>> {
    let geocoder: Arc<dyn Geocoder> = match config.geocoder_provider {
        GeocoderProvider::Mapquest => {
            let key = config
                .geocoder_api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("GEOCODER_API_KEY not set"))?;
            Arc::new(MapQuestGeocoder::new(key))
        }
        GeocoderProvider::Static => match &config.geocoder_static_file {
            Some(path) => Arc::new(StaticGeocoder::from_file(Path::new(path))?),
            None => Arc::new(StaticGeocoder::default()),
        },
    };
    tracing::info!(provider = ?config.geocoder_provider, "Geocoder initialized");
    Ok(geocoder)
}

impl AppState {
    /// Wire the production services selected by `config`.
    pub async fn build(config: AppConfig, db: &mongodb::Database) -> anyhow::Result<Self> {
        let geocoder = build_geocoder(&config)?;

        let storage_client: Arc<dyn StorageClient> = match config.storage_backend {
            StorageBackend::Local => Arc::new(LocalStorageClient::new(&config.file_upload_path)),
            StorageBackend::S3 => {
                let bucket = config
                    .s3_bucket
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("S3_BUCKET not set"))?;
                Arc::new(S3StorageClient::from_env(bucket).await)
            }
        };
        tracing::info!(backend = ?config.storage_backend, "Photo storage initialized");

        Ok(Self {
            repos: Repositories::mongo(db),
            geocoder,
            storage_client,
            mailer: Arc::new(LogMailer),
            jwt: Arc::new(JwtService::new(&config.jwt_secret, config.jwt_expire_days)),
            config: Arc::new(config),
        })
    }
}

/// Extra room on top of the photo limit for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full HTTP router.
pub fn build_router(state: AppState) -> Router {
    let photo_limit = DefaultBodyLimit::max(state.config.max_file_upload + MULTIPART_OVERHEAD);

    let api = Router::new()
        // Bootcamps
        .route(
            "/bootcamps",
            get(api::bootcamps::list_bootcamps_handler).post(api::bootcamps::create_bootcamp_handler),
        )
        .route(
            "/bootcamps/{id}",
            get(api::bootcamps::get_bootcamp_handler)
                .put(api::bootcamps::update_bootcamp_handler)
                .delete(api::bootcamps::delete_bootcamp_handler),
        )
        .route(
            "/bootcamps/radius/{zipcode}/{distance}",
            get(api::bootcamps::bootcamps_in_radius_handler),
        )
        .route(
            "/bootcamps/{id}/photo",
            put(api::upload::upload_photo_handler).layer(photo_limit),
        )
        // Courses
        .route(
            "/bootcamps/{id}/courses",
            get(api::courses::list_bootcamp_courses_handler).post(api::courses::create_course_handler),
        )
        .route("/courses", get(api::courses::list_courses_handler))
        .route(
            "/courses/{id}",
            get(api::courses::get_course_handler)
                .put(api::courses::update_course_handler)
                .delete(api::courses::delete_course_handler),
        )
        // Reviews
        .route(
            "/bootcamps/{id}/reviews",
            get(api::reviews::list_bootcamp_reviews_handler).post(api::reviews::create_review_handler),
        )
        .route("/reviews", get(api::reviews::list_reviews_handler))
        .route(
            "/reviews/{id}",
            get(api::reviews::get_review_handler)
                .put(api::reviews::update_review_handler)
                .delete(api::reviews::delete_review_handler),
        )
        // Users
        .route(
            "/users",
            get(api::users::list_users_handler).post(api::users::create_user_handler),
        )
        .route(
            "/users/{id}",
            get(api::users::get_user_handler)
                .put(api::users::update_user_handler)
                .delete(api::users::delete_user_handler),
        )
        // Auth
        .route("/auth/register", axum::routing::post(api::auth::register_handler))
        .route("/auth/login", axum::routing::post(api::auth::login_handler))
        .route("/auth/logout", get(api::auth::logout_handler))
        .route("/auth/me", get(api::auth::me_handler))
        .route("/auth/updatedetails", put(api::auth::update_details_handler))
        .route("/auth/updatepassword", put(api::auth::update_password_handler))
        .route(
            "/auth/forgotpassword",
            axum::routing::post(api::auth::forgot_password_handler),
        )
        .route(
            "/auth/resetpassword/{resettoken}",
            put(api::auth::reset_password_handler),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/uploads/{filename}", get(api::upload::serve_photo_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
