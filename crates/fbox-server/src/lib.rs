//! HTTP server for fbox.
//!
//! Exposes box management, the plan/finalize push protocol, blob upload and
//! existence checks, and ranged, cacheable file downloads as JSON-over-HTTP
//! endpoints under `/v0`.
//!
//! Both stores are synchronous, so handlers run every store call on tokio's
//! blocking pool. Blob bodies are streamed in both directions.

mod body;
pub mod config;
pub mod error;
pub mod handler;
pub mod range;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::FboxServer;
pub use state::AppState;
