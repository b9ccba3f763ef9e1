#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(String),
}
