// Request and response bodies exposed through the OpenAPI surface
pub mod admin;
pub mod auth;
pub mod common;
pub mod permission;
