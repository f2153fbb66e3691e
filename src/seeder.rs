//! Bulk import and removal of fixture data.
//!
//! An import directory holds `users.json`, `bootcamps.json`, `courses.json`
//! and `reviews.json`, each a JSON array. Records carry their own `_id` so the
//! files can reference each other.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::users::{build_user, UserInput};
use crate::db::hooks::Repositories;
use crate::db::models::{Bootcamp, BootcampInput, Course, CourseInput, Review, ReviewInput, User};
use crate::geocoder::client::Geocoder;

#[derive(Debug, Deserialize)]
struct SeedUser {
    #[serde(rename = "_id")]
    id: String,
    #[serde(flatten)]
    input: UserInput,
}

#[derive(Debug, Deserialize)]
struct SeedBootcamp {
    #[serde(rename = "_id")]
    id: String,
    user: String,
    #[serde(flatten)]
    input: BootcampInput,
}

#[derive(Debug, Deserialize)]
struct SeedChild<I> {
    #[serde(rename = "_id")]
    id: String,
    user: String,
    bootcamp: String,
    #[serde(flatten)]
    input: I,
}

/// Number of records written per collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub bootcamps: usize,
    pub courses: usize,
    pub reviews: usize,
}

fn read_records<T: DeserializeOwned>(dir: &Path, name: &str) -> anyhow::Result<Vec<T>> {
    let path = dir.join(name);
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Insert every record found in `dir`.
///
/// Users go first and children last, so aggregates are recomputed on the
/// way in exactly as they are for API writes.
pub async fn import(
    repos: &Repositories,
    geocoder: &dyn Geocoder,
    dir: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<SeedSummary> {
    let users: Vec<SeedUser> = read_records(dir, "users.json")?;
    let bootcamps: Vec<SeedBootcamp> = read_records(dir, "bootcamps.json")?;
    let courses: Vec<SeedChild<CourseInput>> = read_records(dir, "courses.json")?;
    let reviews: Vec<SeedChild<ReviewInput>> = read_records(dir, "reviews.json")?;

    let mut summary = SeedSummary::default();

    for seed in users {
        let user = User {
            id: seed.id.clone(),
            ..build_user(seed.input, now).with_context(|| format!("Invalid user {}", seed.id))?
        };
        repos.users.insert(&user).await?;
        summary.users += 1;
    }

    for seed in bootcamps {
        let (mut bootcamp, address) = Bootcamp::draft(seed.id.clone(), seed.input, &seed.user, now)
            .with_context(|| format!("Invalid bootcamp {}", seed.id))?;
        bootcamp.location = Some(geocoder.geocode(&address).await?.into());
        repos.bootcamps.insert(&bootcamp).await?;
        summary.bootcamps += 1;
    }

    for seed in courses {
        let course = Course::from_input(seed.id.clone(), seed.input, &seed.bootcamp, &seed.user, now)
            .with_context(|| format!("Invalid course {}", seed.id))?;
        repos.create_course(&course).await?;
        summary.courses += 1;
    }

    for seed in reviews {
        let review = Review::from_input(seed.id.clone(), seed.input, &seed.bootcamp, &seed.user, now)
            .with_context(|| format!("Invalid review {}", seed.id))?;
        repos.create_review(&review).await?;
        summary.reviews += 1;
    }

    tracing::info!(?summary, "Data imported");
    Ok(summary)
}

/// Delete every document in every collection.
pub async fn destroy(repos: &Repositories) -> anyhow::Result<SeedSummary> {
    let summary = SeedSummary {
        reviews: repos.reviews.delete_all().await? as usize,
        courses: repos.courses.delete_all().await? as usize,
        bootcamps: repos.bootcamps.delete_all().await? as usize,
        users: repos.users.delete_all().await? as usize,
    };
    tracing::info!(?summary, "Data destroyed");
    Ok(summary)
}
