//! In-memory repositories for unit tests.
//!
//! Listing ignores client filters and sort, returning newest first, but
//! applies pagination.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::bootcamp_repository::BootcampRepository;
use crate::db::course_repository::CourseRepository;
use crate::db::hooks::Repositories;
use crate::db::models::{Bootcamp, Course, Review, User};
use crate::db::query::{ListQuery, Page};
use crate::db::review_repository::ReviewRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

fn duplicate() -> AppError {
    AppError::Conflict("Duplicate field value entered".into())
}

fn paginate<T: Clone>(items: &[T], created_at: impl Fn(&T) -> DateTime<Utc>, query: &ListQuery) -> Page<T> {
    let mut sorted: Vec<T> = items.to_vec();
    sorted.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    let total = sorted.len() as u64;
    let items = sorted
        .into_iter()
        .skip(query.skip() as usize)
        .take(query.limit as usize)
        .collect();
    Page { items, total }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

fn replace_where<T: Clone>(items: &mut [T], matches: impl Fn(&T) -> bool, value: &T) {
    if let Some(slot) = items.iter_mut().find(|item| matches(item)) {
        *slot = value.clone();
    }
}

/// Build a repository hub backed by fresh in-memory stores.
pub fn repositories() -> Repositories {
    Repositories::new(
        Arc::new(MemoryBootcampRepository::default()),
        Arc::new(MemoryCourseRepository::default()),
        Arc::new(MemoryReviewRepository::default()),
        Arc::new(MemoryUserRepository::default()),
    )
}

#[derive(Default)]
pub struct MemoryBootcampRepository {
    items: Mutex<Vec<Bootcamp>>,
}

#[async_trait]
impl BootcampRepository for MemoryBootcampRepository {
    async fn insert(&self, bootcamp: &Bootcamp) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|b| b.name == bootcamp.name || b.id == bootcamp.id) {
            return Err(duplicate());
        }
        items.push(bootcamp.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Bootcamp>, AppError> {
        Ok(self.items.lock().unwrap().iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_owner(&self, user_id: &str) -> Result<Option<Bootcamp>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|b| b.user == user_id)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Bootcamp>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|b| ids.contains(&b.id))
            .cloned()
            .collect())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Bootcamp>, AppError> {
        Ok(paginate(&self.items.lock().unwrap(), |b| b.created_at, query))
    }

    async fn within_radius(
        &self,
        longitude: f64,
        latitude: f64,
        radius_miles: f64,
    ) -> Result<Vec<Bootcamp>, AppError> {
        use crate::db::bootcamp_repository::EARTH_RADIUS_MILES;

        // Haversine distance, matching `$centerSphere` semantics.
        let within = |b: &Bootcamp| {
            b.location.as_ref().is_some_and(|location| {
                let [lng, lat] = location.coordinates;
                let (phi1, phi2) = (latitude.to_radians(), lat.to_radians());
                let d_phi = (lat - latitude).to_radians();
                let d_lambda = (lng - longitude).to_radians();
                let a = (d_phi / 2.0).sin().powi(2)
                    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
                let distance = 2.0 * EARTH_RADIUS_MILES * a.sqrt().asin();
                distance <= radius_miles
            })
        };
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|b| within(b))
            .cloned()
            .collect())
    }

    async fn update_details(&self, bootcamp: &Bootcamp) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items
            .iter()
            .any(|b| b.id != bootcamp.id && b.name == bootcamp.name)
        {
            return Err(duplicate());
        }
        if let Some(stored) = items.iter_mut().find(|b| b.id == bootcamp.id) {
            *stored = Bootcamp {
                user: stored.user.clone(),
                photo: stored.photo.clone(),
                average_cost: stored.average_cost,
                average_rating: stored.average_rating,
                created_at: stored.created_at,
                ..bootcamp.clone()
            };
        }
        Ok(())
    }

    async fn set_photo(&self, id: &str, photo: &str) -> Result<(), AppError> {
        if let Some(b) = self.items.lock().unwrap().iter_mut().find(|b| b.id == id) {
            b.photo = photo.to_string();
        }
        Ok(())
    }

    async fn set_average_cost(&self, id: &str, value: Option<f64>) -> Result<(), AppError> {
        if let Some(b) = self.items.lock().unwrap().iter_mut().find(|b| b.id == id) {
            b.average_cost = value;
        }
        Ok(())
    }

    async fn set_average_rating(&self, id: &str, value: Option<f64>) -> Result<(), AppError> {
        if let Some(b) = self.items.lock().unwrap().iter_mut().find(|b| b.id == id) {
            b.average_rating = value;
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|b| b.id != id);
        Ok(items.len() != before)
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let count = items.len() as u64;
        items.clear();
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryCourseRepository {
    items: Mutex<Vec<Course>>,
}

#[async_trait]
impl CourseRepository for MemoryCourseRepository {
    async fn insert(&self, course: &Course) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|c| c.id == course.id) {
            return Err(duplicate());
        }
        items.push(course.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Course>, AppError> {
        Ok(self.items.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Course>, AppError> {
        Ok(paginate(&self.items.lock().unwrap(), |c| c.created_at, query))
    }

    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Course>, AppError> {
        self.list_by_bootcamps(&[bootcamp_id.to_string()]).await
    }

    async fn list_by_bootcamps(&self, bootcamp_ids: &[String]) -> Result<Vec<Course>, AppError> {
        let mut courses: Vec<Course> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|c| bootcamp_ids.contains(&c.bootcamp))
            .cloned()
            .collect();
        courses.sort_by_key(|c| std::cmp::Reverse(c.created_at));
        Ok(courses)
    }

    async fn replace(&self, course: &Course) -> Result<(), AppError> {
        replace_where(&mut self.items.lock().unwrap(), |c| c.id == course.id, course);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|c| c.id != id);
        Ok(items.len() != before)
    }

    async fn delete_by_bootcamp(&self, bootcamp_id: &str) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|c| c.bootcamp != bootcamp_id);
        Ok((before - items.len()) as u64)
    }

    async fn average_tuition(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError> {
        Ok(mean(
            self.items
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.bootcamp == bootcamp_id)
                .map(|c| c.tuition),
        ))
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let count = items.len() as u64;
        items.clear();
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryReviewRepository {
    items: Mutex<Vec<Review>>,
}

#[async_trait]
impl ReviewRepository for MemoryReviewRepository {
    async fn insert(&self, review: &Review) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|r| {
            r.id == review.id || (r.bootcamp == review.bootcamp && r.user == review.user)
        }) {
            return Err(duplicate());
        }
        items.push(review.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Review>, AppError> {
        Ok(self.items.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_bootcamp_and_user(
        &self,
        bootcamp_id: &str,
        user_id: &str,
    ) -> Result<Option<Review>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.bootcamp == bootcamp_id && r.user == user_id)
            .cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<Review>, AppError> {
        Ok(paginate(&self.items.lock().unwrap(), |r| r.created_at, query))
    }

    async fn list_by_bootcamp(&self, bootcamp_id: &str) -> Result<Vec<Review>, AppError> {
        let mut reviews: Vec<Review> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.bootcamp == bootcamp_id)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(reviews)
    }

    async fn replace(&self, review: &Review) -> Result<(), AppError> {
        replace_where(&mut self.items.lock().unwrap(), |r| r.id == review.id, review);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|r| r.id != id);
        Ok(items.len() != before)
    }

    async fn delete_by_bootcamp(&self, bootcamp_id: &str) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|r| r.bootcamp != bootcamp_id);
        Ok((before - items.len()) as u64)
    }

    async fn average_rating(&self, bootcamp_id: &str) -> Result<Option<f64>, AppError> {
        Ok(mean(
            self.items
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.bootcamp == bootcamp_id)
                .map(|r| f64::from(r.rating)),
        ))
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let count = items.len() as u64;
        items.clear();
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryUserRepository {
    items: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|u| u.id == user.id || u.email == user.email) {
            return Err(duplicate());
        }
        items.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.items.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.trim().to_lowercase();
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .find(|u| {
                u.reset_password_token.as_deref() == Some(token_hash)
                    && u.reset_password_expire.is_some_and(|expire| expire > now)
            })
            .cloned())
    }

    async fn list(&self, query: &ListQuery) -> Result<Page<User>, AppError> {
        Ok(paginate(&self.items.lock().unwrap(), |u| u.created_at, query))
    }

    async fn replace(&self, user: &User) -> Result<(), AppError> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|u| u.id != user.id && u.email == user.email) {
            return Err(duplicate());
        }
        replace_where(&mut items, |u| u.id == user.id, user);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut items = self.items.lock().unwrap();
        let before = items.len();
        items.retain(|u| u.id != id);
        Ok(items.len() != before)
    }

    async fn delete_all(&self) -> Result<u64, AppError> {
        let mut items = self.items.lock().unwrap();
        let count = items.len() as u64;
        items.clear();
        Ok(count)
    }
}
