//! HTTP API for the diet agent

mod analyze;
mod health;
mod meals;
mod sse;

pub use analyze::analyze_routes;
pub use health::health_routes;
pub use meals::meal_routes;
pub use sse::event_stream;
