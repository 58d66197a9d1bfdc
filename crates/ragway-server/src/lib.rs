//! Ragway HTTP server: streaming chat plus document management routes.

pub mod error;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
