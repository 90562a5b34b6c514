//! HTTP API for the fitness agent

mod health;
mod sse;
mod workouts;

pub use health::health_routes;
pub use sse::event_stream;
pub use workouts::workout_routes;
