use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;
use crate::db::validation::{is_valid_email, is_valid_url, slugify, Violations};
use crate::error::AppError;
use crate::geocoder::client::GeocodedAddress;

/// Photo assigned to bootcamps that never had one uploaded.
pub const DEFAULT_PHOTO: &str = "no-photo.jpg";

/// Generate a fresh document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Timestamps are stored as fixed-width RFC 3339 strings (millisecond precision)
/// so that string ordering in MongoDB matches chronological ordering.
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    DateTime::parse_from_rfc3339(&raw)
                        .map(|value| value.with_timezone(&Utc))
                        .map_err(serde::de::Error::custom)
                })
                .transpose()
        }
    }
}

/// Career tracks a bootcamp can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Career {
    #[serde(rename = "Web Development")]
    WebDevelopment,
    #[serde(rename = "Mobile Development")]
    MobileDevelopment,
    #[serde(rename = "UI/UX")]
    UiUx,
    #[serde(rename = "Data Science")]
    DataScience,
    Business,
    Other,
}

/// Minimum skill level required by a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoJsonType {
    Point,
}

/// GeoJSON point plus the address components returned by the geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: GeoJsonType,
    /// `[longitude, latitude]`, in GeoJSON order.
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl From<GeocodedAddress> for Location {
    fn from(address: GeocodedAddress) -> Self {
        Self {
            kind: GeoJsonType::Point,
            coordinates: [address.longitude, address.latitude],
            formatted_address: address.formatted_address,
            street: address.street,
            city: address.city,
            state: address.state,
            zipcode: address.zipcode,
            country: address.country,
        }
    }
}

/// A training program listed in the directory, stored in the `bootcamps` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bootcamp {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub careers: Vec<Career>,
    /// Mean review rating, maintained by the review observers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    /// Mean course tuition rounded up to the next 10, maintained by the course observers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_cost: Option<f64>,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default)]
    pub housing: bool,
    /// Id of the owning user.
    pub user: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

/// Client payload for creating or updating a bootcamp.
///
/// Every field is optional so that missing required fields are reported as
/// validation errors and updates can be partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootcampInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Free-form address, resolved to a `Location` by the geocoder.
    pub address: Option<String>,
    pub careers: Option<Vec<Career>>,
    pub housing: Option<bool>,
}

impl Bootcamp {
    /// Build a new bootcamp owned by `owner`.
    ///
    /// Returns the bootcamp (without a location yet) and the address that
    /// must be geocoded before it is stored.
    pub fn draft(
        id: String,
        input: BootcampInput,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<(Self, String), AppError> {
        let name = input.name.unwrap_or_default().trim().to_string();
        let address = input
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let bootcamp = Bootcamp {
            id,
            slug: slugify(&name),
            name,
            description: input.description.unwrap_or_default(),
            website: input.website,
            phone: input.phone,
            email: input.email,
            location: None,
            careers: input.careers.unwrap_or_default(),
            average_rating: None,
            average_cost: None,
            photo: default_photo(),
            housing: input.housing.unwrap_or(false),
            user: owner.to_string(),
            created_at: now,
        };

        let mut violations = bootcamp.violations();
        if address.is_none() {
            violations.push("Please add an address");
        }
        violations.into_result()?;

        match address {
            Some(address) => Ok((bootcamp, address)),
            None => Err(AppError::Validation("Please add an address".into())),
        }
    }

    /// Apply a partial update. Returns the new address when one was supplied.
    pub fn apply(&mut self, input: BootcampInput) -> Option<String> {
        if let Some(name) = input.name {
            self.name = name.trim().to_string();
            self.slug = slugify(&self.name);
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if input.website.is_some() {
            self.website = input.website;
        }
        if input.phone.is_some() {
            self.phone = input.phone;
        }
        if input.email.is_some() {
            self.email = input.email;
        }
        if let Some(careers) = input.careers {
            self.careers = careers;
        }
        if let Some(housing) = input.housing {
            self.housing = housing;
        }

        input
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
    }

    pub fn violations(&self) -> Violations {
        let mut v = Violations::new();
        v.require(&self.name, "Please add a name");
        v.max_len(&self.name, 50, "Name can not be more than 50 characters");
        v.require(&self.description, "Please add a description");
        v.max_len(
            &self.description,
            500,
            "Description can not be more than 500 characters",
        );
        if let Some(website) = &self.website {
            if !is_valid_url(website) {
                v.push("Please use a valid URL with HTTP or HTTPS");
            }
        }
        if let Some(phone) = &self.phone {
            v.max_len(phone, 20, "Phone number can not be longer than 20 characters");
        }
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                v.push("Please add a valid email");
            }
        }
        if self.careers.is_empty() {
            v.push("Please add at least one career");
        }
        if let Some(rating) = self.average_rating {
            if !(1.0..=10.0).contains(&rating) {
                v.push("Rating must be between 1 and 10");
            }
        }
        v
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.violations().into_result()
    }
}

/// A course offered by a bootcamp, stored in the `courses` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    /// Duration in weeks.
    pub weeks: u32,
    pub tuition: f64,
    pub minimum_skill: SkillLevel,
    #[serde(default)]
    pub scholarship_available: bool,
    /// Id of the parent bootcamp.
    pub bootcamp: String,
    /// Id of the creating user.
    pub user: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Client payload for creating or updating a course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weeks: Option<u32>,
    pub tuition: Option<f64>,
    pub minimum_skill: Option<SkillLevel>,
    pub scholarship_available: Option<bool>,
}

impl Course {
    pub fn from_input(
        id: String,
        input: CourseInput,
        bootcamp: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let mut missing = Violations::new();
        if input.tuition.is_none() {
            missing.push("Please add a tuition cost");
        }
        if input.minimum_skill.is_none() {
            missing.push("Please add a minimum skill");
        }

        let course = Course {
            id,
            title: input.title.unwrap_or_default().trim().to_string(),
            description: input.description.unwrap_or_default(),
            weeks: input.weeks.unwrap_or(0),
            tuition: input.tuition.unwrap_or(0.0),
            minimum_skill: input.minimum_skill.unwrap_or(SkillLevel::Beginner),
            scholarship_available: input.scholarship_available.unwrap_or(false),
            bootcamp: bootcamp.to_string(),
            user: user.to_string(),
            created_at: now,
        };

        let mut violations = course.violations();
        violations.extend(missing);
        violations.into_result()?;
        Ok(course)
    }

    pub fn apply(&mut self, input: CourseInput) {
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(weeks) = input.weeks {
            self.weeks = weeks;
        }
        if let Some(tuition) = input.tuition {
            self.tuition = tuition;
        }
        if let Some(skill) = input.minimum_skill {
            self.minimum_skill = skill;
        }
        if let Some(scholarship) = input.scholarship_available {
            self.scholarship_available = scholarship;
        }
    }

    pub fn violations(&self) -> Violations {
        let mut v = Violations::new();
        v.require(&self.title, "Please add a course title");
        v.require(&self.description, "Please add a description");
        if self.weeks == 0 {
            v.push("Please add number of weeks");
        }
        if !self.tuition.is_finite() || self.tuition < 0.0 {
            v.push("Tuition can not be negative");
        }
        v
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.violations().into_result()
    }
}

/// A user's review of a bootcamp, stored in the `reviews` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub text: String,
    /// Rating from 1 to 10.
    pub rating: u8,
    pub bootcamp: String,
    pub user: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Client payload for creating or updating a review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub title: Option<String>,
    pub text: Option<String>,
    pub rating: Option<u8>,
}

impl Review {
    pub fn from_input(
        id: String,
        input: ReviewInput,
        bootcamp: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let review = Review {
            id,
            title: input.title.unwrap_or_default().trim().to_string(),
            text: input.text.unwrap_or_default(),
            rating: input.rating.unwrap_or(0),
            bootcamp: bootcamp.to_string(),
            user: user.to_string(),
            created_at: now,
        };
        review.validate()?;
        Ok(review)
    }

    pub fn apply(&mut self, input: ReviewInput) {
        if let Some(title) = input.title {
            self.title = title.trim().to_string();
        }
        if let Some(text) = input.text {
            self.text = text;
        }
        if let Some(rating) = input.rating {
            self.rating = rating;
        }
    }

    pub fn violations(&self) -> Violations {
        let mut v = Violations::new();
        v.require(&self.title, "Please add a title for the review");
        v.max_len(&self.title, 100, "Title can not be more than 100 characters");
        v.require(&self.text, "Please add some text");
        if !(1..=10).contains(&self.rating) {
            v.push("Please add a rating between 1 and 10");
        }
        v
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.violations().into_result()
    }
}

/// A registered account, stored in the `users` collection.
///
/// Never serialize this to clients: it carries the password hash. Use
/// [`UserProfile`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// Stored lowercase.
    pub email: String,
    #[serde(default)]
    pub role: Role,
    /// bcrypt hash.
    pub password: String,
    /// SHA-256 hex digest of the outstanding reset token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_password_token: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub reset_password_expire: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn violations(&self) -> Violations {
        let mut v = Violations::new();
        v.require(&self.name, "Please add a name");
        if !is_valid_email(&self.email) {
            v.push("Please add a valid email");
        }
        v
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.violations().into_result()
    }

    pub fn clear_reset_token(&mut self) {
        self.reset_password_token = None;
        self.reset_password_expire = None;
    }
}

/// Public representation of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// `_id`, `name` and `description` of a bootcamp, embedded in course and review responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootcampSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&Bootcamp> for BootcampSummary {
    fn from(bootcamp: &Bootcamp) -> Self {
        Self {
            id: bootcamp.id.clone(),
            name: bootcamp.name.clone(),
            description: bootcamp.description.clone(),
        }
    }
}
