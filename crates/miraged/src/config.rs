use mirage_core::tracker::DEFAULT_MATCH_RADIUS_PX;
use mirage_core::SwapParams;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// JSON-lines detection recording to replay. Without one the session idles.
    pub recording: Option<PathBuf>,
    /// Restart the recording when it runs out.
    pub loop_recording: bool,
    /// Per-frame tick rate.
    pub target_fps: u32,
    /// Window over which fps and latency are averaged.
    pub metrics_interval_ms: u64,
    /// Per-axis window, in pixels, for keeping a face id across ticks.
    pub match_radius_px: f32,
    /// Face to select once it is tracked.
    pub selected_face: Option<String>,
    /// Initial swap tuning.
    pub swap: SwapParams,
}

impl Config {
    /// Load configuration from `MIRAGE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = SwapParams::default();
        let mut swap = SwapParams {
            quality: defaults.quality,
            preserve_expression: env_bool("MIRAGE_PRESERVE_EXPRESSION", defaults.preserve_expression),
            preserve_color: env_bool("MIRAGE_PRESERVE_COLOR", defaults.preserve_color),
        };
        swap.set_quality(env_parse("MIRAGE_SWAP_QUALITY", defaults.quality as i32));

        Self {
            recording: std::env::var("MIRAGE_RECORDING").ok().map(PathBuf::from),
            loop_recording: env_bool("MIRAGE_LOOP_RECORDING", true),
            target_fps: env_parse("MIRAGE_TARGET_FPS", 30u32).max(1),
            metrics_interval_ms: env_parse("MIRAGE_METRICS_INTERVAL_MS", 1000u64).max(1),
            match_radius_px: env_parse("MIRAGE_MATCH_RADIUS_PX", DEFAULT_MATCH_RADIUS_PX),
            selected_face: std::env::var("MIRAGE_SELECTED_FACE").ok().filter(|s| !s.is_empty()),
            swap,
        }
    }

    /// Time budget of one tick.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps as f64)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}
