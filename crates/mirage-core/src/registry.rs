//! Mesh builder/updater: the one owner of every face mesh in a session.
//!
//! Meshes are keyed by face identifier, created on first sight, rewritten in
//! place on every later update, and destroyed only by an explicit remove.

use crate::mesh::{Mesh, MeshHandle};
use crate::normalizer::{self, MeshError};
use crate::scene::Scene;
use crate::types::Face;
use std::collections::HashMap;

/// What an [`MeshRegistry::update`] call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No mesh existed; one was built and attached to the scene.
    Created(MeshHandle),
    /// The existing mesh was rewritten in place.
    Updated(MeshHandle),
    /// Landmarks were unusable; any existing mesh keeps its last shape.
    Skipped(MeshError),
}

/// Face identifier → mesh mapping for one session.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    // Boxed so a mesh keeps its address while the map grows.
    meshes: HashMap<String, Box<Mesh>>,
    next_handle: u64,
}

impl MeshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the mesh for `face`, building it if this is the first sight.
    ///
    /// An existing mesh is returned untouched, even if `face` carries new
    /// landmarks. On [`MeshError::InsufficientLandmarks`] nothing is registered.
    pub fn create_or_fetch(&mut self, face: &Face) -> Result<&Mesh, MeshError> {
        if self.meshes.contains_key(&face.id) {
            return Ok(&*self.meshes[&face.id]);
        }

        let positions = normalizer::normalize(&face.landmarks, &face.bbox).map_err(|e| {
            tracing::warn!(face = %face.id, error = %e, "mesh creation skipped");
            e
        })?;

        let handle = self.allocate_handle();
        let mesh = Box::new(Mesh::new(handle, positions));
        tracing::debug!(face = %face.id, handle = handle.0, "mesh created");

        Ok(&**self.meshes.entry(face.id.clone()).or_insert(mesh))
    }

    /// Per-frame update for one tracked face.
    ///
    /// Unknown faces take the create path and are attached to `scene`.
    /// Known faces get their 68 positions overwritten in place followed by a
    /// normal recompute. Short landmark sets are logged and skipped.
    pub fn update<S: Scene + ?Sized>(&mut self, face: &Face, scene: &mut S) -> UpdateOutcome {
        if let Some(mesh) = self.meshes.get_mut(&face.id) {
            return match normalizer::normalize(&face.landmarks, &face.bbox) {
                Ok(positions) => {
                    mesh.set_positions(&positions);
                    UpdateOutcome::Updated(mesh.handle())
                }
                Err(e) => {
                    tracing::warn!(face = %face.id, error = %e, "mesh update skipped; keeping last shape");
                    UpdateOutcome::Skipped(e)
                }
            };
        }

        match self.create_or_fetch(face) {
            Ok(mesh) => {
                let handle = mesh.handle();
                if !scene.contains(handle) {
                    scene.add(handle, mesh);
                }
                UpdateOutcome::Created(handle)
            }
            Err(e) => UpdateOutcome::Skipped(e),
        }
    }

    /// Detach, dispose and unregister the mesh for `face_id`.
    ///
    /// Returns `false` (and does nothing) if no mesh is registered.
    pub fn remove<S: Scene + ?Sized>(&mut self, face_id: &str, scene: &mut S) -> bool {
        let Some(mesh) = self.meshes.remove(face_id) else {
            return false;
        };
        scene.remove(mesh.handle());
        tracing::debug!(face = face_id, handle = mesh.handle().0, "mesh removed");
        mesh.dispose();
        true
    }

    /// Remove every mesh whose face is not in `live`. Returns the removed ids.
    pub fn retain_tracked<'a, S, I>(&mut self, live: I, scene: &mut S) -> Vec<String>
    where
        S: Scene + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let live: std::collections::HashSet<&str> = live.into_iter().collect();
        let departed: Vec<String> = self
            .meshes
            .keys()
            .filter(|id| !live.contains(id.as_str()))
            .cloned()
            .collect();

        for id in &departed {
            self.remove(id, scene);
        }
        departed
    }

    /// Remove every mesh. Called at session end.
    pub fn clear<S: Scene + ?Sized>(&mut self, scene: &mut S) {
        let ids: Vec<String> = self.meshes.keys().cloned().collect();
        for id in &ids {
            self.remove(id, scene);
        }
    }

    pub fn get(&self, face_id: &str) -> Option<&Mesh> {
        self.meshes.get(face_id).map(|m| &**m)
    }

    pub fn contains(&self, face_id: &str) -> bool {
        self.meshes.contains_key(face_id)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Mesh)> {
        self.meshes.iter().map(|(id, m)| (id.as_str(), &**m))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Mesh)> {
        self.meshes.iter_mut().map(|(id, m)| (id.as_str(), &mut **m))
    }

    fn allocate_handle(&mut self) -> MeshHandle {
        self.next_handle += 1;
        MeshHandle(self.next_handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::tests::circle_landmarks;
    use crate::scene::SceneGraph;
    use crate::types::{BoundingBox, Point2, LANDMARK_COUNT};

    fn face(id: &str, radius: f32) -> Face {
        Face::new(
            id,
            circle_landmarks(100.0, 100.0, radius),
            BoundingBox { x: 50.0, y: 50.0, width: 200.0, height: 200.0 },
        )
    }

    fn short_face(id: &str) -> Face {
        Face::new(id, vec![Point2::new(1.0, 1.0); 10], BoundingBox::default())
    }

    #[test]
    fn test_create_rejects_short_landmarks() {
        let mut reg = MeshRegistry::new();
        let err = reg.create_or_fetch(&short_face("a")).unwrap_err();
        assert_eq!(err, MeshError::InsufficientLandmarks { got: 10 });
        assert!(reg.is_empty());
    }

    #[test]
    fn test_create_builds_68_vertices_for_long_input() {
        let mut reg = MeshRegistry::new();
        let mut f = face("a", 30.0);
        f.landmarks.extend(circle_landmarks(0.0, 0.0, 5.0));
        let mesh = reg.create_or_fetch(&f).unwrap();
        assert_eq!(mesh.vertex_count(), LANDMARK_COUNT);
        assert!(mesh.indices().iter().flatten().all(|&i| (i as usize) < LANDMARK_COUNT));
    }

    #[test]
    fn test_create_or_fetch_is_idempotent() {
        let mut reg = MeshRegistry::new();
        let first = reg.create_or_fetch(&face("a", 30.0)).unwrap() as *const Mesh;
        let first_positions = *reg.get("a").unwrap().positions();

        // Different landmarks, same id: nothing is recomputed.
        let second = reg.create_or_fetch(&face("a", 60.0)).unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(second.positions(), &first_positions);
        assert_eq!(second.revision(), 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_update_creates_and_attaches() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();

        let outcome = reg.update(&face("a", 30.0), &mut scene);
        let handle = reg.get("a").unwrap().handle();
        assert_eq!(outcome, UpdateOutcome::Created(handle));
        assert!(scene.contains(handle));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_update_rewrites_in_place() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);

        let before = reg.get("a").unwrap() as *const Mesh;
        let handle = reg.get("a").unwrap().handle();
        let old_positions = *reg.get("a").unwrap().positions();
        scene.sync(&mut reg);

        let outcome = reg.update(&face("a", 60.0), &mut scene);
        assert_eq!(outcome, UpdateOutcome::Updated(handle));

        let mesh = reg.get("a").unwrap();
        assert!(std::ptr::eq(before, mesh));
        assert_eq!(mesh.handle(), handle);
        assert_ne!(mesh.positions(), &old_positions);
        assert_eq!(mesh.revision(), 1);
        assert!(mesh.needs_upload());
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_update_normals_track_positions() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);

        // Same positions rebuilt from scratch must give the same normals
        // as the in-place rewrite.
        let mut moved = face("a", 45.0);
        for p in moved.landmarks.iter_mut().take(20) {
            p.y += 7.0;
        }
        reg.update(&moved, &mut scene);

        let mut fresh = MeshRegistry::new();
        let mut renamed = moved.clone();
        renamed.id = "b".into();
        let expected = *fresh.create_or_fetch(&renamed).unwrap().normals();

        assert_eq!(reg.get("a").unwrap().normals(), &expected);
    }

    #[test]
    fn test_update_with_short_landmarks_keeps_shape() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);
        let positions = *reg.get("a").unwrap().positions();

        let outcome = reg.update(&short_face("a"), &mut scene);
        assert_eq!(outcome, UpdateOutcome::Skipped(MeshError::InsufficientLandmarks { got: 10 }));

        let mesh = reg.get("a").unwrap();
        assert_eq!(mesh.positions(), &positions);
        assert_eq!(mesh.revision(), 0);
    }

    #[test]
    fn test_update_unknown_short_face_registers_nothing() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        let outcome = reg.update(&short_face("a"), &mut scene);
        assert!(matches!(outcome, UpdateOutcome::Skipped(_)));
        assert!(reg.is_empty());
        assert!(scene.is_empty());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        assert!(!reg.remove("ghost", &mut scene));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_remove_detaches_and_unregisters() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);
        let handle = reg.get("a").unwrap().handle();

        assert!(reg.remove("a", &mut scene));
        assert!(!reg.contains("a"));
        assert!(!scene.contains(handle));
    }

    #[test]
    fn test_recreate_after_remove_allocates_fresh_mesh() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        let old = reg.create_or_fetch(&face("a", 30.0)).unwrap().handle();
        reg.remove("a", &mut scene);

        let new = reg.create_or_fetch(&face("a", 30.0)).unwrap().handle();
        assert_ne!(old, new);
    }

    #[test]
    fn test_retain_tracked_removes_departed() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        for id in ["a", "b", "c"] {
            reg.update(&face(id, 30.0), &mut scene);
        }

        let mut removed = reg.retain_tracked(["b"], &mut scene);
        removed.sort();
        assert_eq!(removed, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_clear_empties_registry_and_scene() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);
        reg.update(&face("b", 30.0), &mut scene);

        reg.clear(&mut scene);
        assert!(reg.is_empty());
        assert!(scene.is_empty());
    }

    #[test]
    fn test_scene_sync_uploads_only_changed_meshes() {
        let mut reg = MeshRegistry::new();
        let mut scene = SceneGraph::new();
        reg.update(&face("a", 30.0), &mut scene);
        reg.update(&face("b", 30.0), &mut scene);

        assert_eq!(scene.sync(&mut reg), 2);
        assert_eq!(scene.sync(&mut reg), 0);

        reg.update(&face("a", 40.0), &mut scene);
        assert_eq!(scene.sync(&mut reg), 1);
        assert_eq!(scene.uploads(), 3);
    }
}
