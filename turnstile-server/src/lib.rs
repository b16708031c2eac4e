//! HTTP transport for the turnstile admission queue.
//!
//! Exposes [`turnstile::QueueEngine`] operations as JSON routes:
//!
//! | Route | Operation |
//! |-------|-----------|
//! | `POST /queue/join` | `join` |
//! | `GET /queue/status/{user_id}` | `status` |
//! | `POST /queue/confirm` | `confirm` |
//! | `POST /queue/leave` | `delete` |
//! | `POST /queue/idle` | `tick` |
//! | `GET /queue/metrics` | `metrics` |
//! | `GET /health` | liveness |

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::{LoggingConfig, ServerConfig};
pub use error::{ApiError, ApiErrorResponse};
pub use router::build_router;
pub use state::AppState;
