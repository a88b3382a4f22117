use anyhow::{Context, Result};
use mirage_core::{IdentityMatcher, PassthroughSwap, ReplayTracker, Session};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("miraged starting");

    let config = Config::from_env();

    let tracker = match &config.recording {
        Some(path) => ReplayTracker::open(path)
            .with_context(|| format!("failed to load recording {}", path.display()))?,
        None => {
            tracing::warn!("MIRAGE_RECORDING not set; session will idle with no faces");
            ReplayTracker::from_frames(Vec::new())
        }
    }
    .looping(config.loop_recording);

    let session = Session::new(
        IdentityMatcher::new(config.match_radius_px),
        Box::new(PassthroughSwap::new()),
        config.swap,
    );

    let handle = engine::spawn_engine(
        tracker,
        session,
        config.frame_interval(),
        config.metrics_interval(),
    )?;

    tracing::info!(
        target_fps = config.target_fps,
        quality = config.swap.quality,
        "miraged ready"
    );

    let mut ticker = tokio::time::interval(config.metrics_interval());
    let mut pending_selection = config.selected_face.clone();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = handle.status().await?;

                if let Some(id) = pending_selection.clone() {
                    if status.faces.contains(&id) {
                        handle.select_face(Some(id)).await?;
                        pending_selection = None;
                    }
                }

                tracing::info!(
                    frames = status.frames,
                    faces = status.faces.len(),
                    meshes = status.meshes,
                    selected = status.selected.as_deref().unwrap_or("-"),
                    fps = status.metrics.fps,
                    latency_ms = status.metrics.latency_ms,
                    "status"
                );
                tracing::debug!(status = %serde_json::to_string(&status)?, "status detail");
            }
            res = tokio::signal::ctrl_c() => {
                res?;
                break;
            }
        }
    }

    tracing::info!("miraged shutting down");
    let totals = handle.stop().await?;
    tracing::info!(
        created = totals.created,
        removed = totals.removed,
        swapped = totals.swapped,
        "session closed"
    );

    Ok(())
}
