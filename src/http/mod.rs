//! HTTP surface: health, WebSocket upgrade, client assets

pub mod routes;

pub use routes::build_router;
