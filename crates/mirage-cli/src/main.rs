use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mirage_core::{
    topology, Face, FaceTracker, IdentityMatcher, MeshRegistry, MeshSnapshot, PassthroughSwap,
    ReplayTracker, Session, SwapParams, TickReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mirage", about = "Mirage face mesh tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the mesh for one face and print it as JSON
    Mesh {
        /// Face JSON file: {"id", "landmarks": [{"x","y"}...], "box": {...}}
        path: PathBuf,
    },
    /// Replay a detection recording through a session and print the totals
    Replay {
        /// JSON-lines recording, one array of detections per line
        path: PathBuf,
        /// Face id to select once it is tracked (e.g. "face-1")
        #[arg(short, long)]
        select: Option<String>,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
        /// Swap quality, 0-100
        #[arg(short, long)]
        quality: Option<i32>,
    },
    /// Print the triangle table grouped by facial region
    Topology,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Mesh { path } => serde_json::to_string_pretty(&build_mesh(&path)?)?,
        Commands::Replay {
            path,
            select,
            max_frames,
            quality,
        } => {
            let mut params = SwapParams::default();
            if let Some(q) = quality {
                params.set_quality(q);
            }
            let summary = replay(&path, select.as_deref(), max_frames, params)?;
            serde_json::to_string_pretty(&summary)?
        }
        Commands::Topology => serde_json::to_string_pretty(&topology_summary())?,
    };

    println!("{output}");
    Ok(())
}

fn build_mesh(path: &Path) -> Result<MeshSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let face: Face = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a face record", path.display()))?;

    let mut registry = MeshRegistry::new();
    let mesh = registry.create_or_fetch(&face)?;
    tracing::info!(
        face = %face.id,
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "mesh built"
    );
    Ok(mesh.snapshot())
}

#[derive(Debug, Serialize)]
struct ReplaySummary {
    frames: u64,
    totals: TickReport,
    selected: Option<String>,
    meshes: usize,
    uploads: u64,
}

fn replay(
    path: &Path,
    select: Option<&str>,
    max_frames: Option<u64>,
    params: SwapParams,
) -> Result<ReplaySummary> {
    let mut tracker = ReplayTracker::open(path)?;
    tracker.init()?;

    let mut session = Session::new(
        IdentityMatcher::default(),
        Box::new(PassthroughSwap::new()),
        params,
    );
    let mut totals = TickReport::default();
    let mut pending = select.map(str::to_string);

    while !tracker.is_exhausted() {
        if max_frames.is_some_and(|max| session.frames() >= max) {
            break;
        }

        let report = session.tick(tracker.next_frame()?);
        totals.accumulate(&report);

        if let Some(id) = pending.as_deref() {
            if session.select(Some(id)) {
                pending = None;
            }
        }
    }

    if let Some(id) = pending {
        bail!("face {id} never appeared in {}", path.display());
    }

    let summary = ReplaySummary {
        frames: session.frames(),
        totals,
        selected: session.selected().map(str::to_string),
        meshes: session.registry().len(),
        uploads: session.scene().uploads(),
    };
    session.shutdown();
    Ok(summary)
}

#[derive(Debug, Serialize)]
struct RegionSummary {
    region: topology::Region,
    triangles: Vec<[u16; 3]>,
}

fn topology_summary() -> Vec<RegionSummary> {
    topology::regions()
        .map(|(region, tris)| RegionSummary {
            region,
            triangles: tris.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_core::{BoundingBox, Detection, Point2};

    fn landmarks(cx: f32, cy: f32) -> Vec<Point2> {
        (0..68)
            .map(|i| {
                let t = i as f32 / 68.0 * std::f32::consts::TAU;
                Point2::new(cx + 40.0 * t.cos(), cy + 40.0 * t.sin())
            })
            .collect()
    }

    fn det(x: f32) -> Detection {
        Detection {
            bbox: BoundingBox { x, y: 0.0, width: 120.0, height: 120.0 },
            landmarks: landmarks(x + 60.0, 60.0),
            score: 1.0,
        }
    }

    fn write_recording(name: &str, frames: &[Vec<Detection>]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("mirage-cli-{}-{name}.jsonl", std::process::id()));
        let body: Vec<String> = frames
            .iter()
            .map(|f| serde_json::to_string(f).unwrap())
            .collect();
        std::fs::write(&path, body.join("\n")).unwrap();
        path
    }

    #[test]
    fn test_build_mesh_from_file() {
        let face = Face::new("face-1", landmarks(60.0, 60.0), BoundingBox { x: 0.0, y: 0.0, width: 120.0, height: 120.0 });
        let path = std::env::temp_dir().join(format!("mirage-cli-{}-face.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string(&face).unwrap()).unwrap();

        let snap = build_mesh(&path).unwrap();
        assert_eq!(snap.positions.len(), 68);
        assert_eq!(snap.indices.len(), 51);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_build_mesh_rejects_short_face() {
        let face = Face::new("face-1", landmarks(60.0, 60.0)[..10].to_vec(), BoundingBox::default());
        let path = std::env::temp_dir().join(format!("mirage-cli-{}-short.json", std::process::id()));
        std::fs::write(&path, serde_json::to_string(&face).unwrap()).unwrap();

        let err = build_mesh(&path).unwrap_err();
        assert!(err.to_string().contains("insufficient landmarks"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_replay_counts() {
        let path = write_recording(
            "counts",
            &[
                vec![det(0.0), det(400.0)],
                vec![det(2.0), det(401.0)],
                vec![det(3.0)],
            ],
        );

        let summary = replay(&path, Some("face-1"), None, SwapParams::default()).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.totals.created, 2);
        assert_eq!(summary.totals.updated, 3);
        assert_eq!(summary.totals.removed, 1);
        // face-1 selected after frame 1; frame 2 swaps face-2 onto it.
        assert_eq!(summary.totals.swapped, 1);
        assert_eq!(summary.selected.as_deref(), Some("face-1"));
        assert_eq!(summary.meshes, 1);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_replay_max_frames() {
        let path = write_recording("max", &[vec![det(0.0)], vec![det(1.0)], vec![det(2.0)]]);
        let summary = replay(&path, None, Some(2), SwapParams::default()).unwrap();
        assert_eq!(summary.frames, 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_replay_unknown_selection_fails() {
        let path = write_recording("unknown", &[vec![det(0.0)]]);
        let err = replay(&path, Some("face-9"), None, SwapParams::default()).unwrap_err();
        assert!(err.to_string().contains("face-9"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_topology_summary_covers_table() {
        let summary = topology_summary();
        assert_eq!(summary.len(), 9);
        let total: usize = summary.iter().map(|r| r.triangles.len()).sum();
        assert_eq!(total, topology::triangle_count());
    }
}
