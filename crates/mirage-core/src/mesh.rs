//! Renderable face mesh: 68 vertices over the shared triangle table.

use crate::normalizer::Positions;
use crate::topology::FACE_TRIANGLES;
use crate::types::LANDMARK_COUNT;
use serde::Serialize;

/// Allocation id of a mesh. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeshHandle(pub u64);

/// Surface appearance of a face mesh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Material {
    /// RGB packed as 0xRRGGBB.
    pub color: u32,
    pub opacity: f32,
    pub double_sided: bool,
    pub wireframe: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: 0x8888ff,
            opacity: 0.7,
            double_sided: true,
            wireframe: false,
        }
    }
}

/// Triangulated face surface.
///
/// Positions are only written through [`Mesh::set_positions`], which
/// recomputes normals before returning, so normals always match positions.
#[derive(Debug)]
pub struct Mesh {
    handle: MeshHandle,
    positions: Positions,
    normals: Positions,
    indices: &'static [[u16; 3]],
    material: Material,
    needs_upload: bool,
    revision: u64,
}

/// Owned, serializable copy of a mesh's buffers.
#[derive(Debug, Clone, Serialize)]
pub struct MeshSnapshot {
    pub handle: MeshHandle,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<[u16; 3]>,
    pub material: Material,
}

impl Mesh {
    pub(crate) fn new(handle: MeshHandle, positions: Positions) -> Self {
        let mut mesh = Self {
            handle,
            positions,
            normals: [[0.0; 3]; LANDMARK_COUNT],
            indices: &FACE_TRIANGLES,
            material: Material::default(),
            needs_upload: true,
            revision: 0,
        };
        mesh.compute_vertex_normals();
        mesh
    }

    pub fn handle(&self) -> MeshHandle {
        self.handle
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn normals(&self) -> &Positions {
        &self.normals
    }

    /// Triangle table, shared by every mesh.
    pub fn indices(&self) -> &'static [[u16; 3]] {
        self.indices
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of position writes since creation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether positions changed since the renderer last uploaded them.
    pub fn needs_upload(&self) -> bool {
        self.needs_upload
    }

    /// Clear the upload flag, returning its previous value.
    pub fn take_needs_upload(&mut self) -> bool {
        std::mem::replace(&mut self.needs_upload, false)
    }

    /// Overwrite all vertex positions in place and recompute normals.
    pub(crate) fn set_positions(&mut self, positions: &Positions) {
        self.positions.copy_from_slice(positions);
        self.compute_vertex_normals();
        self.needs_upload = true;
        self.revision += 1;
    }

    pub fn snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            handle: self.handle,
            positions: self.positions.to_vec(),
            normals: self.normals.to_vec(),
            indices: self.indices.to_vec(),
            material: self.material.clone(),
        }
    }

    /// Release geometry and material.
    pub(crate) fn dispose(self) {
        tracing::debug!(
            handle = self.handle.0,
            vertices = self.vertex_count(),
            triangles = self.triangle_count(),
            "disposed mesh geometry and material"
        );
    }

    /// Area-weighted smooth normals: each triangle's unnormalized face normal
    /// is accumulated at its three vertices, then every vertex normal is
    /// normalized. Vertices with a zero accumulated normal stay zero.
    fn compute_vertex_normals(&mut self) {
        let mut acc = [[0.0f32; 3]; LANDMARK_COUNT];

        for tri in self.indices {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let pa = self.positions[a];
            let pb = self.positions[b];
            let pc = self.positions[c];

            let e1 = sub(pb, pa);
            let e2 = sub(pc, pa);
            let n = cross(e1, e2);

            for v in [a, b, c] {
                for k in 0..3 {
                    acc[v][k] += n[k];
                }
            }
        }

        for (normal, sum) in self.normals.iter_mut().zip(acc.iter()) {
            let len = (sum[0] * sum[0] + sum[1] * sum[1] + sum[2] * sum[2]).sqrt();
            *normal = if len > 1e-10 {
                [sum[0] / len, sum[1] / len, sum[2] / len]
            } else {
                [0.0; 3]
            };
        }
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar_positions() -> Positions {
        // Sunflower spiral in the z = 0 plane: no three consecutive points collinear.
        let mut p = [[0.0f32; 3]; LANDMARK_COUNT];
        for (i, v) in p.iter_mut().enumerate() {
            let r = (i as f32 + 1.0).sqrt() * 0.1;
            let theta = i as f32 * 2.399_963;
            *v = [r * theta.cos(), r * theta.sin(), 0.0];
        }
        p
    }

    fn len(v: [f32; 3]) -> f32 {
        (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
    }

    #[test]
    fn test_new_mesh_shape() {
        let mesh = Mesh::new(MeshHandle(1), planar_positions());
        assert_eq!(mesh.vertex_count(), LANDMARK_COUNT);
        assert_eq!(mesh.triangle_count(), FACE_TRIANGLES.len());
        assert!(std::ptr::eq(mesh.indices(), &FACE_TRIANGLES[..]));
        assert!(mesh.needs_upload());
        assert_eq!(mesh.revision(), 0);
    }

    #[test]
    fn test_planar_normals_point_along_z() {
        let mesh = Mesh::new(MeshHandle(1), planar_positions());
        for n in mesh.normals() {
            if len(*n) == 0.0 {
                continue;
            }
            assert!(n[0].abs() < 1e-5 && n[1].abs() < 1e-5, "normal {n:?}");
            assert!((n[2].abs() - 1.0).abs() < 1e-5, "normal {n:?}");
        }
    }

    #[test]
    fn test_normals_are_unit_or_zero() {
        let mut positions = planar_positions();
        for (i, p) in positions.iter_mut().enumerate() {
            p[2] = (i as f32 * 0.7).sin() * 0.3;
        }
        let mesh = Mesh::new(MeshHandle(1), positions);
        for n in mesh.normals() {
            let l = len(*n);
            assert!(l == 0.0 || (l - 1.0).abs() < 1e-4, "len = {l}");
        }
    }

    #[test]
    fn test_set_positions_recomputes_normals() {
        let mut mesh = Mesh::new(MeshHandle(1), planar_positions());
        assert!(mesh.take_needs_upload());
        assert!(!mesh.needs_upload());

        // Rotate the plane so it faces +x: normals must follow.
        let mut rotated = planar_positions();
        for p in rotated.iter_mut() {
            *p = [0.0, p[1], p[0]];
        }
        mesh.set_positions(&rotated);

        assert!(mesh.needs_upload());
        assert_eq!(mesh.revision(), 1);
        assert_eq!(mesh.positions(), &rotated);
        for n in mesh.normals() {
            if len(*n) == 0.0 {
                continue;
            }
            assert!((n[0].abs() - 1.0).abs() < 1e-5, "normal {n:?}");
        }
    }

    #[test]
    fn test_snapshot_copies_buffers() {
        let mesh = Mesh::new(MeshHandle(9), planar_positions());
        let snap = mesh.snapshot();
        assert_eq!(snap.handle, MeshHandle(9));
        assert_eq!(snap.positions.len(), LANDMARK_COUNT);
        assert_eq!(snap.normals.len(), LANDMARK_COUNT);
        assert_eq!(snap.indices.len(), FACE_TRIANGLES.len());
        assert_eq!(snap.positions[5], mesh.positions()[5]);
    }

    #[test]
    fn test_default_material() {
        let m = Material::default();
        assert_eq!(m.color, 0x8888ff);
        assert!((m.opacity - 0.7).abs() < 1e-6);
        assert!(m.double_sided);
        assert!(!m.wireframe);
    }
}
