//! Landmark normalization into mesh space.
//!
//! Maps 68 screen-space landmarks to a small Y-up 3D space (pixels / 100)
//! and lifts each point off the image plane with a dome-shaped depth
//! heuristic. This is not a depth estimator; it only gives the mesh enough
//! relief to shade.

use crate::types::{BoundingBox, Point2, LANDMARK_COUNT};
use std::f32::consts::PI;
use thiserror::Error;

// --- Named constants ---
const PIXELS_PER_UNIT: f32 = 100.0;
const DEPTH_AMPLITUDE: f32 = 0.5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("insufficient landmarks: need 68, got {got}")]
    InsufficientLandmarks { got: usize },
}

/// Mesh-space vertex positions for one face.
pub type Positions = [[f32; 3]; LANDMARK_COUNT];

/// Normalize a landmark set into 68 mesh-space positions.
///
/// Only the first 68 landmarks are used. Fails with
/// [`MeshError::InsufficientLandmarks`] when fewer are supplied.
pub fn normalize(landmarks: &[Point2], bbox: &BoundingBox) -> Result<Positions, MeshError> {
    let points = landmark_window(landmarks)?;
    let depths = depth_offsets(points);

    let half_w = bbox.width / 2.0;
    let half_h = bbox.height / 2.0;

    let mut positions = [[0.0f32; 3]; LANDMARK_COUNT];
    for (i, (p, z)) in points.iter().zip(depths.iter()).enumerate() {
        positions[i] = [
            (p.x - half_w) / PIXELS_PER_UNIT,
            -(p.y - half_h) / PIXELS_PER_UNIT,
            *z,
        ];
    }

    Ok(positions)
}

/// Heuristic per-point depth: `-sin(d / d_max * PI) * 0.5`, where `d` is the
/// distance to the landmark centroid in screen space.
///
/// Zero at the centroid and at the outermost point, bottoming out at -0.5
/// halfway between. Coincident points give zero depth everywhere.
pub fn depth_offsets(points: &[Point2]) -> Vec<f32> {
    if points.is_empty() {
        return Vec::new();
    }

    let n = points.len() as f32;
    let centroid = Point2::new(
        points.iter().map(|p| p.x).sum::<f32>() / n,
        points.iter().map(|p| p.y).sum::<f32>() / n,
    );

    let distances: Vec<f32> = points.iter().map(|p| p.distance(&centroid)).collect();
    let max_distance = distances.iter().copied().fold(0.0f32, f32::max);

    distances
        .iter()
        .map(|&d| {
            let normalized = if max_distance > 0.0 { d / max_distance } else { 0.0 };
            -(normalized * PI).sin() * DEPTH_AMPLITUDE
        })
        .collect()
}

/// The first 68 landmarks, or an error when the set is short.
fn landmark_window(landmarks: &[Point2]) -> Result<&[Point2], MeshError> {
    if landmarks.len() < LANDMARK_COUNT {
        return Err(MeshError::InsufficientLandmarks {
            got: landmarks.len(),
        });
    }
    Ok(&landmarks[..LANDMARK_COUNT])
}
