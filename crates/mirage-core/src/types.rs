use serde::{Deserialize, Serialize};

/// Number of points in a landmark set (iBUG 68-point layout).
pub const LANDMARK_COUNT: usize = 68;

/// A screen-space landmark point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Screen-space rectangle containing a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Raw tracker output for one face, before an identifier is assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Landmarks in iBUG-68 order: jaw 0-16, brows 17-26, nose 27-35,
    /// eyes 36-47, mouth 48-67.
    pub landmarks: Vec<Point2>,
    #[serde(default)]
    pub score: f32,
}

/// A tracked face with a stable identifier.
///
/// The face does not own its mesh: meshes live in
/// [`MeshRegistry`](crate::registry::MeshRegistry) keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub id: String,
    pub landmarks: Vec<Point2>,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Face {
    pub fn new(id: impl Into<String>, landmarks: Vec<Point2>, bbox: BoundingBox) -> Self {
        Self {
            id: id.into(),
            landmarks,
            bbox,
        }
    }

    pub fn from_detection(id: impl Into<String>, detection: Detection) -> Self {
        Self::new(id, detection.landmarks, detection.bbox)
    }

    /// Whether this face carries enough landmarks to build a mesh.
    pub fn has_full_landmarks(&self) -> bool {
        self.landmarks.len() >= LANDMARK_COUNT
    }
}
