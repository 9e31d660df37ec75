//! HTTP surface over the game facade

pub mod middleware;
pub mod routes;

pub use routes::build_router;
