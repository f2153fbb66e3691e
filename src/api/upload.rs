use std::path::Path as FsPath;

use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::bootcamps::find_bootcamp;
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::auth::policy::{authorize, PUBLISHERS};
use crate::db::hooks::Repositories;
use crate::error::AppError;
use crate::storage::client::StorageClient;

/// A file received in the `file` field of a multipart form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Stored name of a bootcamp photo: `photo_<bootcamp id><original extension>`.
pub fn photo_file_name(bootcamp_id: &str, original: &str) -> String {
    let ext = FsPath::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();
    format!("photo_{}{}", bootcamp_id, ext)
}

/// Store a bootcamp photo and point the bootcamp at it. Returns the stored file name.
pub async fn process_upload_photo(
    repos: &Repositories,
    storage: &dyn StorageClient,
    caller: &AuthenticatedUser,
    bootcamp_id: &str,
    upload: Option<PhotoUpload>,
    max_size: usize,
) -> Result<String, AppError> {
    let bootcamp = find_bootcamp(repos, bootcamp_id).await?;
    authorize(caller, Some(&bootcamp.user), PUBLISHERS)?;

    let upload = upload.ok_or_else(|| AppError::BadRequest("Please upload a file".into()))?;
    if !upload.content_type.starts_with("image/") {
        return Err(AppError::BadRequest("Please upload an image file".into()));
    }
    if upload.data.len() > max_size {
        return Err(AppError::BadRequest(format!(
            "Please upload an image less than {} bytes",
            max_size
        )));
    }

    let file_name = photo_file_name(&bootcamp.id, &upload.file_name);
    storage.put_object(&file_name, upload.data).await?;

    repos.bootcamps.set_photo(&bootcamp.id, &file_name).await?;

    tracing::info!(bootcamp = %bootcamp.id, photo = %file_name, "Photo uploaded");
    Ok(file_name)
}

async fn read_photo_field(multipart: &mut Multipart) -> Result<Option<PhotoUpload>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;

        return Ok(Some(PhotoUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        }));
    }
    Ok(None)
}

/// `PUT /api/v1/bootcamps/{id}/photo`
pub async fn upload_photo_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(bootcamp_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DataResponse<String>>, AppError> {
    let upload = read_photo_field(&mut multipart).await?;
    let file_name = process_upload_photo(
        &state.repos,
        state.storage_client.as_ref(),
        &user.identity(),
        &bootcamp_id,
        upload,
        state.config.max_file_upload,
    )
    .await?;
    Ok(Json(DataResponse::new(file_name)))
}

/// `GET /uploads/{filename}`
pub async fn serve_photo_handler(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let data = state
        .storage_client
        .get_object(&filename)
        .await?
        .ok_or_else(|| AppError::NotFound("Photo not found".into()))?;

    let content_type = mime_guess::from_path(&filename)
        .first_or_octet_stream()
        .to_string();
    Ok(([(CONTENT_TYPE, content_type)], data).into_response())
}
