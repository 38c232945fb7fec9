pub mod audit_builder;
pub mod audit_logger;
pub mod login;
pub mod token;

pub use audit_builder::AuditBuilder;
pub use audit_logger::AuditLogger;
