//! mirage-core: face mesh construction and the seams around it.
//!
//! Builds a triangulated 3D mesh per tracked face from its 68 landmarks,
//! keeps those meshes up to date frame by frame, and defines the tracker,
//! scene and swap-engine interfaces the session loop drives.

pub mod mesh;
pub mod normalizer;
pub mod registry;
pub mod scene;
pub mod session;
pub mod swap;
pub mod topology;
pub mod tracker;
pub mod types;

pub use mesh::{Material, Mesh, MeshHandle, MeshSnapshot};
pub use normalizer::MeshError;
pub use registry::{MeshRegistry, UpdateOutcome};
pub use scene::{Scene, SceneGraph};
pub use session::{Session, TickReport};
pub use swap::{PassthroughSwap, SwapEngine, SwapError, SwapOutcome, SwapParams, SwapSettings};
pub use tracker::{FaceTracker, IdentityMatcher, ReplayTracker, TrackedFrame, TrackerError};
pub use types::{BoundingBox, Detection, Face, Point2, LANDMARK_COUNT};
