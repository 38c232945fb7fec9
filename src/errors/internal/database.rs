use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {operation} failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: sea_orm::DbErr,
    },
}

impl DatabaseError {
    pub fn operation(&self) -> &str {
        match self {
            DatabaseError::Operation { operation, .. } => operation,
        }
    }
}
