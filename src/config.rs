use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocoderProvider {
    Mapquest,
    Static,
}

/// Application settings, read once at startup.
///
/// Sources, later ones winning: `config/default.*`, `config/local.*`, then
/// environment variables (`PORT`, `MONGODB_URI`, `JWT_SECRET`, ...), with a
/// `.env` file loaded first if present.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub environment: Environment,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jwt_secret: String,
    pub jwt_expire_days: i64,
    pub jwt_cookie_expire_days: i64,
    pub file_upload_path: String,
    /// Maximum photo size in bytes.
    pub max_file_upload: usize,
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub geocoder_provider: GeocoderProvider,
    pub geocoder_api_key: Option<String>,
    /// JSON table used by the `static` geocoder.
    pub geocoder_static_file: Option<String>,
    /// Base URL used in password reset links.
    pub public_url: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = config::Config::builder()
            .set_default("port", i64::from(defaults.port))?
            .set_default("environment", "development")?
            .set_default("mongodb_uri", defaults.mongodb_uri)?
            .set_default("mongodb_database", defaults.mongodb_database)?
            .set_default("jwt_expire_days", defaults.jwt_expire_days)?
            .set_default("jwt_cookie_expire_days", defaults.jwt_cookie_expire_days)?
            .set_default("file_upload_path", defaults.file_upload_path)?
            .set_default("max_file_upload", defaults.max_file_upload as i64)?
            .set_default("storage_backend", "local")?
            .set_default("geocoder_provider", "mapquest")?
            .set_default("public_url", defaults.public_url)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: AppConfig = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_none() {
            anyhow::bail!("S3_BUCKET is required when STORAGE_BACKEND=s3");
        }
        if self.geocoder_provider == GeocoderProvider::Mapquest && self.geocoder_api_key.is_none() {
            anyhow::bail!("GEOCODER_API_KEY is required when GEOCODER_PROVIDER=mapquest");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Settings for tests and local runs, using the offline geocoder.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            environment: Environment::Development,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_database: "bootcamp_directory".to_string(),
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expire_days: 30,
            jwt_cookie_expire_days: 30,
            file_upload_path: "./public/uploads".to_string(),
            max_file_upload: 1_000_000,
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            geocoder_provider: GeocoderProvider::Static,
            geocoder_api_key: None,
            geocoder_static_file: None,
            public_url: "http://localhost:5000".to_string(),
        }
    }
}
