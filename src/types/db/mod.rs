// Database entities - SeaORM models
pub mod audit_log;
pub mod permission_request;
pub mod user;
