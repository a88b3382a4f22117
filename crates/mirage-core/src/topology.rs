//! Fixed triangulation of the 68-point landmark layout.
//!
//! One static table shared by reference by every mesh. Indices address the
//! iBUG-68 ordering, so the table is only valid for landmark sets in that order.

use serde::Serialize;

/// Triangles connecting the 68 landmarks into a face surface.
pub static FACE_TRIANGLES: [[u16; 3]; 51] = [
    // Jaw strip 0-16
    [0, 1, 2], [1, 2, 3], [2, 3, 4], [3, 4, 5], [4, 5, 6], [5, 6, 7],
    [6, 7, 8], [7, 8, 9], [8, 9, 10], [9, 10, 11], [10, 11, 12],
    [11, 12, 13], [12, 13, 14], [13, 14, 15], [14, 15, 16],
    // Left eyebrow 17-21
    [17, 18, 19], [18, 19, 20], [19, 20, 21],
    // Right eyebrow 22-26
    [22, 23, 24], [23, 24, 25], [24, 25, 26],
    // Nose bridge 27-30
    [27, 28, 29], [28, 29, 30],
    // Nose base 30-35
    [30, 31, 32], [31, 32, 33], [32, 33, 34], [33, 34, 35],
    // Left eye 36-41, apex 41
    [36, 37, 41], [37, 38, 41], [38, 39, 41], [39, 40, 41],
    // Right eye 42-47, apex 47
    [42, 43, 47], [43, 44, 47], [44, 45, 47], [45, 46, 47],
    // Outer lip 48-59, apex 59
    [48, 49, 59], [49, 50, 59], [50, 51, 59], [51, 52, 59],
    [52, 53, 59], [53, 54, 59], [54, 55, 59], [55, 56, 59],
    [56, 57, 59], [57, 58, 59],
    // Inner lip 60-67, apex 67
    [60, 61, 67], [61, 62, 67], [62, 63, 67], [63, 64, 67],
    [64, 65, 67], [65, 66, 67],
];

/// Facial region a run of triangles belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Jaw,
    LeftEyebrow,
    RightEyebrow,
    NoseBridge,
    NoseBase,
    LeftEye,
    RightEye,
    OuterLip,
    InnerLip,
}

/// Half-open triangle ranges into [`FACE_TRIANGLES`] per region.
const REGIONS: [(Region, usize, usize); 9] = [
    (Region::Jaw, 0, 15),
    (Region::LeftEyebrow, 15, 18),
    (Region::RightEyebrow, 18, 21),
    (Region::NoseBridge, 21, 23),
    (Region::NoseBase, 23, 27),
    (Region::LeftEye, 27, 31),
    (Region::RightEye, 31, 35),
    (Region::OuterLip, 35, 45),
    (Region::InnerLip, 45, 51),
];

/// Number of triangles in the table.
pub fn triangle_count() -> usize {
    FACE_TRIANGLES.len()
}

/// Triangles grouped by facial region, in table order.
pub fn regions() -> impl Iterator<Item = (Region, &'static [[u16; 3]])> {
    REGIONS
        .iter()
        .map(|&(region, start, end)| (region, &FACE_TRIANGLES[start..end]))
}

/// Flattened index buffer (three indices per triangle).
pub fn flat_indices() -> impl Iterator<Item = u16> {
    FACE_TRIANGLES.iter().flat_map(|tri| tri.iter().copied())
}
