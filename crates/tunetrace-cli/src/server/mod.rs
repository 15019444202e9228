//! HTTP and WebSocket front end
//!
//! Upload endpoints feed the ingestion queue; `/ws/stream` runs one
//! streaming session per connection.

mod error;
mod routes;
mod state;
mod stream;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{drain_worker, AppState, Services};
pub use stream::MAX_PENDING_FRAMES;
