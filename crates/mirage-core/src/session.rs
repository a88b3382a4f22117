//! One face-swap session: identity matching, mesh upkeep and swapping per tick.

use crate::registry::{MeshRegistry, UpdateOutcome};
use crate::scene::SceneGraph;
use crate::swap::{self, SwapEngine, SwapParams, SwapSettings};
use crate::tracker::IdentityMatcher;
use crate::types::{Detection, Face};
use serde::Serialize;

/// Counters for a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub faces: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub removed: usize,
    pub swapped: usize,
    pub uploaded: usize,
}

impl TickReport {
    /// Fold another tick's counters into this one (`faces` keeps the latest).
    pub fn accumulate(&mut self, other: &TickReport) {
        self.faces = other.faces;
        self.created += other.created;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.removed += other.removed;
        self.swapped += other.swapped;
        self.uploaded += other.uploaded;
    }
}

/// Owns every piece of per-session state. One thread drives
/// [`tick`](Self::tick) and answers control requests between ticks.
pub struct Session {
    matcher: IdentityMatcher,
    registry: MeshRegistry,
    scene: SceneGraph,
    swapper: Box<dyn SwapEngine + Send>,
    params: SwapParams,
    selected: Option<String>,
    faces: Vec<Face>,
    frames: u64,
}

impl Session {
    pub fn new(matcher: IdentityMatcher, swapper: Box<dyn SwapEngine + Send>, params: SwapParams) -> Self {
        Self {
            matcher,
            registry: MeshRegistry::new(),
            scene: SceneGraph::new(),
            swapper,
            params,
            selected: None,
            faces: Vec::new(),
            frames: 0,
        }
    }

    /// Process one tick of detections.
    pub fn tick(&mut self, detections: Vec<Detection>) -> TickReport {
        self.frames += 1;
        let tracked = self.matcher.assign(detections);
        let mut report = TickReport {
            faces: tracked.faces.len(),
            ..Default::default()
        };

        let removed = self
            .registry
            .retain_tracked(tracked.faces.iter().map(|f| f.id.as_str()), &mut self.scene);
        report.removed = removed.len();

        for id in &tracked.departed {
            if self.selected.as_deref() == Some(id.as_str()) {
                tracing::info!(face = %id, "selected face left the frame; selection cleared");
                self.selected = None;
            }
        }

        for face in &tracked.faces {
            match self.registry.update(face, &mut self.scene) {
                UpdateOutcome::Created(_) => report.created += 1,
                UpdateOutcome::Updated(_) => report.updated += 1,
                UpdateOutcome::Skipped(_) => report.skipped += 1,
            }
        }

        for (source, target) in swap::swap_pairs(&tracked.faces, self.selected.as_deref()) {
            match self.swapper.swap(source, target, &self.params) {
                Ok(_) => report.swapped += 1,
                Err(e) => {
                    tracing::warn!(source = %source.id, target = %target.id, error = %e, "swap failed");
                }
            }
        }

        report.uploaded = self.scene.sync(&mut self.registry);
        self.faces = tracked.faces;
        report
    }

    /// Select the face whose appearance is swapped onto every other face.
    /// Returns `false` if `face_id` is not currently tracked.
    pub fn select(&mut self, face_id: Option<&str>) -> bool {
        match face_id {
            None => {
                self.selected = None;
                true
            }
            Some(id) if self.faces.iter().any(|f| f.id == id) => {
                tracing::info!(face = id, "face selected");
                self.selected = Some(id.to_string());
                true
            }
            Some(id) => {
                tracing::warn!(face = id, "cannot select untracked face");
                false
            }
        }
    }

    pub fn apply_settings(&mut self, settings: SwapSettings) -> SwapParams {
        self.params.apply(settings);
        tracing::info!(
            quality = self.params.quality,
            preserve_expression = self.params.preserve_expression,
            preserve_color = self.params.preserve_color,
            "swap parameters changed"
        );
        self.params
    }

    /// Drop every mesh. Called when the session ends.
    pub fn shutdown(&mut self) {
        self.registry.clear(&mut self.scene);
        self.matcher.reset();
        self.faces.clear();
        self.selected = None;
    }

    pub fn params(&self) -> SwapParams {
        self.params
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn registry(&self) -> &MeshRegistry {
        &self.registry
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn swap_ready(&self) -> bool {
        self.swapper.is_ready()
    }
}
