pub mod admin;
pub mod auth;
pub mod courses;
pub mod enrollments;
pub mod payments;
pub mod root;
pub mod verification;
