//! Rendering context that face meshes are attached to.

use crate::mesh::{Mesh, MeshHandle};
use crate::registry::MeshRegistry;
use std::collections::BTreeSet;

/// The rendering side of a session. Meshes are owned by the registry;
/// a scene only tracks which of them are attached.
pub trait Scene {
    fn contains(&self, handle: MeshHandle) -> bool;
    fn add(&mut self, handle: MeshHandle, mesh: &Mesh);
    fn remove(&mut self, handle: MeshHandle);
}

/// In-process scene: the set of attached meshes plus upload bookkeeping.
#[derive(Debug, Default)]
pub struct SceneGraph {
    attached: BTreeSet<MeshHandle>,
    uploads: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = MeshHandle> + '_ {
        self.attached.iter().copied()
    }

    /// Total vertex-buffer uploads performed by [`sync`](Self::sync).
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Upload every attached mesh whose positions changed since the last sync.
    /// Returns the number of meshes uploaded this call.
    pub fn sync(&mut self, registry: &mut MeshRegistry) -> usize {
        let mut uploaded = 0;
        for (_, mesh) in registry.iter_mut() {
            if self.attached.contains(&mesh.handle()) && mesh.take_needs_upload() {
                uploaded += 1;
            }
        }
        self.uploads += uploaded as u64;
        uploaded
    }
}

impl Scene for SceneGraph {
    fn contains(&self, handle: MeshHandle) -> bool {
        self.attached.contains(&handle)
    }

    fn add(&mut self, handle: MeshHandle, mesh: &Mesh) {
        tracing::trace!(handle = handle.0, vertices = mesh.vertex_count(), "mesh attached");
        self.attached.insert(handle);
    }

    fn remove(&mut self, handle: MeshHandle) {
        if self.attached.remove(&handle) {
            tracing::trace!(handle = handle.0, "mesh detached");
        }
    }
}
