use poem_openapi::Object;

/// Response model for health check endpoint
#[derive(Object, Debug)]
pub struct HealthResponse {
    /// Status of the service
    pub status: String,

    /// Timestamp of the health check (ISO 8601 format)
    pub timestamp: String,

    /// "up" or "down"
    pub auth_database: String,

    /// "up" or "down"
    pub audit_database: String,
}

/// Generic acknowledgement
#[derive(Object, Debug)]
pub struct MessageResponse {
    /// Whether the operation was successful
    pub success: bool,

    /// Human-readable message describing the result
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Number of pages needed for `total` rows
pub fn page_count(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}
