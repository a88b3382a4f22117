use mirage_core::{FaceTracker, Session, SwapParams, SwapSettings, TickReport, TrackerError};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("face {0} is not tracked")]
    UnknownFace(String),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

const MIN_METER_WINDOW: Duration = Duration::from_millis(1);

/// Frame rate and per-frame latency, averaged over a fixed window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub fps: u32,
    pub latency_ms: u32,
}

/// Rolling fps/latency meter. Reports once per window; latency holds its
/// previous value over windows in which no face was tracked.
pub struct FrameMeter {
    window: Duration,
    window_start: Instant,
    frames: u32,
    saw_faces: bool,
    current: Metrics,
}

impl FrameMeter {
    /// `window` is raised to at least one millisecond.
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window: window.max(MIN_METER_WINDOW),
            window_start: now,
            frames: 0,
            saw_faces: false,
            current: Metrics::default(),
        }
    }

    /// Record one frame. Returns the fresh metrics when a window closes.
    pub fn record(&mut self, now: Instant, faces: usize) -> Option<Metrics> {
        self.frames += 1;
        self.saw_faces |= faces > 0;

        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }

        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        self.current.fps = (self.frames as f64 * 1000.0 / elapsed_ms).round() as u32;
        if self.saw_faces {
            self.current.latency_ms = (elapsed_ms / self.frames as f64).round() as u32;
        }

        self.window_start = now;
        self.frames = 0;
        self.saw_faces = false;
        Some(self.current)
    }

    pub fn current(&self) -> Metrics {
        self.current
    }
}

/// Snapshot of the session, answered between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub frames: u64,
    pub faces: Vec<String>,
    pub meshes: usize,
    pub uploads: u64,
    pub selected: Option<String>,
    pub params: SwapParams,
    pub swap_ready: bool,
    pub metrics: Metrics,
    pub totals: TickReport,
}

/// Messages sent from the control side to the engine thread.
enum EngineRequest {
    Select {
        face_id: Option<String>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Configure {
        settings: SwapSettings,
        reply: oneshot::Sender<SwapParams>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Stop {
        reply: oneshot::Sender<TickReport>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Select the face swapped onto every other face, or clear the selection.
    pub async fn select_face(&self, face_id: Option<String>) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Select {
            face_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Apply a partial swap-parameter update; returns the resulting parameters.
    pub async fn configure(&self, settings: SwapSettings) -> Result<SwapParams, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Configure {
            settings,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Status { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Stop the engine, dropping every mesh. Returns the session totals.
    pub async fn stop(&self) -> Result<TickReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineRequest::Stop { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the per-frame loop on a dedicated OS thread.
///
/// Initializes the tracker synchronously (fail-fast), then ticks at
/// `frame_interval`, draining control requests between ticks. The thread
/// owns the tracker and the session; nothing else touches them.
pub fn spawn_engine<T>(
    mut tracker: T,
    session: Session,
    frame_interval: Duration,
    metrics_interval: Duration,
) -> Result<EngineHandle, EngineError>
where
    T: FaceTracker + Send + 'static,
{
    tracker.init()?;
    tracing::info!(
        interval_ms = frame_interval.as_millis() as u64,
        swap_ready = session.swap_ready(),
        "tracker initialized"
    );

    let (tx, rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("mirage-engine".into())
        .spawn(move || run_loop(tracker, session, rx, frame_interval, metrics_interval))
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

fn run_loop<T: FaceTracker>(
    mut tracker: T,
    mut session: Session,
    mut rx: mpsc::Receiver<EngineRequest>,
    frame_interval: Duration,
    metrics_interval: Duration,
) {
    tracing::info!("engine thread started");
    let mut meter = FrameMeter::new(metrics_interval, Instant::now());
    let mut totals = TickReport::default();

    'frames: loop {
        let tick_start = Instant::now();

        loop {
            match rx.try_recv() {
                Ok(EngineRequest::Stop { reply }) => {
                    session.shutdown();
                    let _ = reply.send(totals.clone());
                    break 'frames;
                }
                Ok(req) => handle_request(req, &mut session, &meter, &totals),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("all engine handles dropped");
                    session.shutdown();
                    break 'frames;
                }
            }
        }

        match tracker.next_frame() {
            Ok(detections) => {
                let report = session.tick(detections);
                totals.accumulate(&report);
                if let Some(m) = meter.record(Instant::now(), report.faces) {
                    tracing::debug!(fps = m.fps, latency_ms = m.latency_ms, faces = report.faces, "frame metrics");
                }
            }
            Err(e) => tracing::warn!(error = %e, "tracker frame failed; skipping tick"),
        }

        if let Some(rest) = frame_interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    tracing::info!(frames = session.frames(), "engine thread exiting");
}

fn handle_request(req: EngineRequest, session: &mut Session, meter: &FrameMeter, totals: &TickReport) {
    match req {
        EngineRequest::Select { face_id, reply } => {
            let result = if session.select(face_id.as_deref()) {
                Ok(())
            } else {
                Err(EngineError::UnknownFace(face_id.unwrap_or_default()))
            };
            let _ = reply.send(result);
        }
        EngineRequest::Configure { settings, reply } => {
            let _ = reply.send(session.apply_settings(settings));
        }
        EngineRequest::Status { reply } => {
            let _ = reply.send(EngineStatus {
                frames: session.frames(),
                faces: session.faces().iter().map(|f| f.id.clone()).collect(),
                meshes: session.registry().len(),
                uploads: session.scene().uploads(),
                selected: session.selected().map(str::to_string),
                params: session.params(),
                swap_ready: session.swap_ready(),
                metrics: meter.current(),
                totals: totals.clone(),
            });
        }
        // Stop is handled by the loop so it can break out.
        EngineRequest::Stop { reply } => {
            let _ = reply.send(totals.clone());
        }
    }
}
