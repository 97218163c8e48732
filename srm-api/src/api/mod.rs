//! HTTP API handlers for srm-api

pub mod auth;
pub mod exchange;
pub mod health;
pub mod students;

pub use auth::{auth_middleware, login};
pub use exchange::{export_xml, upload_xml};
pub use health::health_routes;
pub use students::{create_student, delete_student, list_students, update_student};
