mod common;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::Value;

fn png_bytes() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE,
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00,
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33,
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82,
    ]
}

fn png_form(bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_part("file", Part::bytes(bytes).file_name("campus.png").mime_type("image/png"))
}

#[tokio::test]
async fn upload_and_serve_photo() {
    let env = common::TestEnv::start().await;
    let server = env.server();
    let owner = env.register(&server, "Owner", "owner@example.com", "publisher").await;
    let id = env.create_bootcamp(&server, &owner, "Devworks", "02215").await;

    let response = server
        .put(&format!("/api/v1/bootcamps/{id}/photo"))
        .authorization_bearer(&owner)
        .multipart(png_form(png_bytes()))
        .await;
    let file_name = format!("photo_{id}.png");
    assert_eq!(response.json::<Value>()["data"], file_name.as_str());

    let bootcamp: Value = server.get(&format!("/api/v1/bootcamps/{id}")).await.json();
    assert_eq!(bootcamp["data"]["photo"], file_name.as_str());

    let served = server.get(&format!("/uploads/{file_name}")).await;
    let content_type = served
        .headers()
        .get("content-type")
        .expect("Content-Type header should be present")
        .to_str()
        .unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(served.as_bytes().to_vec(), png_bytes());
}

#[tokio::test]
async fn upload_rejects_non_image() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    let owner = env.register(&server, "Owner", "owner@example.com", "publisher").await;
    let id = env.create_bootcamp(&server, &owner, "Devworks", "02215").await;

    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"hello world".to_vec()).file_name("notes.txt").mime_type("text/plain"),
    );
    let response = server
        .put(&format!("/api/v1/bootcamps/{id}/photo"))
        .authorization_bearer(&owner)
        .multipart(form)
        .await;
    response.assert_status_bad_request();
    assert_eq!(response.json::<Value>()["message"], "Please upload an image file");
}

#[tokio::test]
async fn upload_rejects_oversized_image() {
    let config = bootcamp_directory::config::AppConfig {
        max_file_upload: 32,
        ..Default::default()
    };
    let env = common::TestEnv::start_with(config).await;
    let server = env.server_permissive();
    let owner = env.register(&server, "Owner", "owner@example.com", "publisher").await;
    let id = env.create_bootcamp(&server, &owner, "Devworks", "02215").await;

    let response = server
        .put(&format!("/api/v1/bootcamps/{id}/photo"))
        .authorization_bearer(&owner)
        .multipart(png_form(png_bytes()))
        .await;
    response.assert_status_bad_request();
    assert_eq!(
        response.json::<Value>()["message"],
        "Please upload an image less than 32 bytes"
    );
}

#[tokio::test]
async fn upload_requires_ownership() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();
    let owner = env.register(&server, "Owner", "owner@example.com", "publisher").await;
    let other = env.register(&server, "Other", "other@example.com", "publisher").await;
    let id = env.create_bootcamp(&server, &owner, "Devworks", "02215").await;

    server
        .put(&format!("/api/v1/bootcamps/{id}/photo"))
        .authorization_bearer(&other)
        .multipart(png_form(png_bytes()))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .put("/api/v1/bootcamps/missing/photo")
        .authorization_bearer(&owner)
        .multipart(png_form(png_bytes()))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn serve_missing_photo() {
    let env = common::TestEnv::start().await;
    let server = env.server_permissive();

    server
        .get("/uploads/nonexistent_12345.png")
        .await
        .assert_status_not_found();
}
