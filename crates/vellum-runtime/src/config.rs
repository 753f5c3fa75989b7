//! Runtime configuration read from the environment.

use std::time::Duration;

use crate::error::AppError;

const FRAME_INTERVAL_MS: &str = "VELLUM_FRAME_INTERVAL_MS";
const MAX_FRAMES: &str = "VELLUM_MAX_FRAMES";
const DUMP_DOCUMENTS: &str = "VELLUM_DUMP_DOCUMENTS";

/// Settings for the frame loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Time between frames.
    pub frame_interval: Duration,
    /// Stop after this many frames, if set.
    pub max_frames: Option<u64>,
    /// Log every frame's JSON document.
    pub dump_documents: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            max_frames: None,
            dump_documents: false,
        }
    }
}

impl RuntimeConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; unset keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(FRAME_INTERVAL_MS) {
            let millis = parse_whole(FRAME_INTERVAL_MS, &raw)?;
            if millis == 0 {
                return Err(AppError::Config(format!(
                    "{FRAME_INTERVAL_MS} must be greater than zero"
                )));
            }
            config.frame_interval = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(MAX_FRAMES) {
            config.max_frames = Some(parse_whole(MAX_FRAMES, &raw)?);
        }
        if let Some(raw) = lookup(DUMP_DOCUMENTS) {
            config.dump_documents = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(AppError::Config(format!(
                        "{DUMP_DOCUMENTS} must be true or false, got `{raw}`"
                    )));
                }
            };
        }

        Ok(config)
    }
}

fn parse_whole(key: &str, raw: &str) -> Result<u64, AppError> {
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{key} must be a whole number: {e}")))
}
