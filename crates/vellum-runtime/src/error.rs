//! Vellum runtime error types.

use thiserror::Error;
use vellum_core::error::EngineError;

/// Startup and frame-loop errors for the runtime.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The engine rejected a transition, encode or decode.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A document could not be rendered as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
