//! Vellum runtime entry point.

use std::error::Error;

use tracing_subscriber::EnvFilter;
use vellum_core::clock::SystemClock;
use vellum_runtime::config::RuntimeConfig;
use vellum_runtime::driver::FrameDriver;
use vellum_runtime::register_engine;
use vellum_scenes::{SPLASH, SceneStack};
use vellum_serde::registry::register_global;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Vellum runtime");

    let config = RuntimeConfig::from_env()?;
    register_global(register_engine)?;

    let mut stack = SceneStack::new();
    stack.push(&[&SPLASH]);
    let mut driver = FrameDriver::new(SystemClock, stack).with_document_dump(config.dump_documents);

    tracing::info!(
        interval_ms = u64::try_from(config.frame_interval.as_millis()).unwrap_or(u64::MAX),
        max_frames = ?config.max_frames,
        "Running frame loop"
    );

    tokio::select! {
        result = driver.run(config.frame_interval, config.max_frames) => {
            let frames = result?;
            tracing::info!(frames, "Frame loop finished");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping frame loop");
        }
    }

    Ok(())
}
