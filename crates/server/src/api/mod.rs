pub mod chats;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use routes::create_router;

use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
