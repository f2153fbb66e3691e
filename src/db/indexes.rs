use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::IndexModel;

use crate::db::models::{Bootcamp, Course, Review, User};

/// Create the indexes the application relies on. Idempotent.
pub async fn ensure_indexes(db: &mongodb::Database) -> Result<(), mongodb::error::Error> {
    let unique = || IndexOptions::builder().unique(true).build();

    let bootcamps = db.collection::<Bootcamp>("bootcamps");
    bootcamps
        .create_index(
            IndexModel::builder()
                .keys(doc! { "name": 1 })
                .options(unique())
                .build(),
        )
        .await?;
    bootcamps
        .create_index(IndexModel::builder().keys(doc! { "location": "2dsphere" }).build())
        .await?;
    bootcamps
        .create_index(IndexModel::builder().keys(doc! { "user": 1 }).build())
        .await?;

    db.collection::<Course>("courses")
        .create_index(IndexModel::builder().keys(doc! { "bootcamp": 1 }).build())
        .await?;

    db.collection::<Review>("reviews")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "bootcamp": 1, "user": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    db.collection::<User>("users")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    tracing::info!("MongoDB indexes ensured");
    Ok(())
}
