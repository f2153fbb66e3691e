pub mod app;
pub mod config;
pub mod error;
pub mod seeder;
pub mod api {
    pub mod auth;
    pub mod bootcamps;
    pub mod courses;
    pub mod errors;
    pub mod response;
    pub mod reviews;
    pub mod upload;
    pub mod users;
}
pub mod auth {
    pub mod jwt;
    pub mod middleware;
    pub mod models;
    pub mod password;
    pub mod policy;
}
pub mod db {
    pub mod aggregates;
    pub mod bootcamp_repository;
    pub mod course_repository;
    pub mod hooks;
    pub mod indexes;
    pub mod models;
    pub mod query;
    pub mod review_repository;
    pub mod user_repository;
    pub mod validation;
    #[cfg(test)]
    pub mod memory;
}
pub mod geocoder {
    pub mod client;
}
pub mod mail {
    pub mod client;
}
pub mod storage {
    pub mod client;
}
