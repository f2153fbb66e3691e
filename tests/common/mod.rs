use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use bootcamp_directory::app::{build_router, AppState};
use bootcamp_directory::auth::jwt::JwtService;
use bootcamp_directory::auth::models::Role;
use bootcamp_directory::auth::password::hash_password;
use bootcamp_directory::config::AppConfig;
use bootcamp_directory::db::hooks::Repositories;
use bootcamp_directory::db::indexes::ensure_indexes;
use bootcamp_directory::db::models::{new_id, User};
use bootcamp_directory::geocoder::client::{GeocodedAddress, StaticEntry, StaticGeocoder};
use bootcamp_directory::mail::client::LogMailer;
use bootcamp_directory::storage::client::LocalStorageClient;

pub const PASSWORD: &str = "123456";

/// Holds the running MongoDB container and the router wired to it.
///
/// The container and upload directory live as long as this struct.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _uploads: TempDir,
    pub router: Router,
    pub repos: Repositories,
    pub config: Arc<AppConfig>,
}

fn entry(query: &str, latitude: f64, longitude: f64, city: &str, state: &str) -> StaticEntry {
    StaticEntry {
        query: query.to_string(),
        address: GeocodedAddress {
            latitude,
            longitude,
            formatted_address: Some(format!("{city}, {state} {query}, US")),
            street: None,
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            zipcode: Some(query.to_string()),
            country: Some("US".to_string()),
        },
    }
}

impl TestEnv {
    /// Start MongoDB and build a router backed by it.
    pub async fn start() -> Self {
        Self::start_with(AppConfig::default()).await
    }

    pub async fn start_with(config: AppConfig) -> Self {
        let mongo_container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("bootcamp_directory_test");
        ensure_indexes(&mongo_db)
            .await
            .expect("Failed to create indexes");

        let uploads = tempfile::tempdir().expect("Failed to create upload dir");
        let repos = Repositories::mongo(&mongo_db);
        let config = Arc::new(config);

        let state = AppState {
            repos: repos.clone(),
            geocoder: Arc::new(StaticGeocoder::new(vec![
                entry("02215", 42.350846, -71.10675, "Boston", "MA"),
                entry("02118", 42.3389, -71.0706, "Boston", "MA"),
                entry("10001", 40.7506, -73.9972, "New York", "NY"),
            ])),
            storage_client: Arc::new(LocalStorageClient::new(uploads.path())),
            mailer: Arc::new(LogMailer),
            jwt: Arc::new(JwtService::new(&config.jwt_secret, config.jwt_expire_days)),
            config: config.clone(),
        };

        Self {
            _mongo: mongo_container,
            _uploads: uploads,
            router: build_router(state),
            repos,
            config,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
    }

    /// Helper: register a user through the API and return its token.
    pub async fn register(
        &self,
        server: &axum_test::TestServer,
        name: &str,
        email: &str,
        role: &str,
    ) -> String {
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "name": name,
                "email": email,
                "password": PASSWORD,
                "role": role
            }))
            .await;
        response.assert_status_ok();
        token_of(&response)
    }

    /// Helper: insert an admin directly and log in as them.
    pub async fn admin(&self, server: &axum_test::TestServer) -> String {
        let admin = User {
            id: new_id(),
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
            password: hash_password(PASSWORD).expect("Failed to hash password"),
            reset_password_token: None,
            reset_password_expire: None,
            created_at: Utc::now(),
        };
        self.repos
            .users
            .insert(&admin)
            .await
            .expect("Failed to insert admin");

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({ "email": admin.email, "password": PASSWORD }))
            .await;
        response.assert_status_ok();
        token_of(&response)
    }

    /// Helper: create a bootcamp through the API and return its id.
    pub async fn create_bootcamp(
        &self,
        server: &axum_test::TestServer,
        token: &str,
        name: &str,
        zipcode: &str,
    ) -> String {
        let response = server
            .post("/api/v1/bootcamps")
            .authorization_bearer(token)
            .json(&json!({
                "name": name,
                "description": format!("{name} teaches full stack development"),
                "website": "https://example.com",
                "email": "enroll@example.com",
                "address": format!("1 Main St {zipcode}"),
                "careers": ["Web Development", "Data Science"],
                "housing": false
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<serde_json::Value>()["data"]["_id"]
            .as_str()
            .expect("Bootcamp id missing")
            .to_string()
    }
}

pub fn token_of(response: &axum_test::TestResponse) -> String {
    response.json::<serde_json::Value>()["token"]
        .as_str()
        .expect("Response should contain a token")
        .to_string()
}
