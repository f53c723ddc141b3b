#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod geom;
pub mod mesher;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

use geom::{PlaneOracle, Tolerance, UvPoint};
use mesher::{BoundaryLoop, LoopKind, MeshResult, MeshSession, MeshSettings, Patch, PatchStatus};

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start the rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Planar outline in the XY plane, holes optional.
#[derive(Debug, Deserialize)]
struct PlanarPolygonInput {
    outer: Vec<[f64; 2]>,
    #[serde(default)]
    holes: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Serialize)]
struct PlanarMeshOutput {
    status: String,
    positions: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    indices: Vec<u32>,
    residual_segments: usize,
    summary: String,
    warnings: Vec<String>,
}

fn status_label(status: &PatchStatus) -> String {
    match status {
        PatchStatus::Converged => "converged".to_string(),
        PatchStatus::Unconverged(reason) => format!("unconverged: {reason}"),
        PatchStatus::Cancelled => "cancelled".to_string(),
        PatchStatus::Rejected(err) => format!("rejected: {err}"),
        PatchStatus::Skipped => "skipped".to_string(),
    }
}

fn to_uv(points: &[[f64; 2]]) -> Vec<UvPoint> {
    points.iter().map(|&[u, v]| UvPoint::new(u, v)).collect()
}

fn mesh_planar(input: &PlanarPolygonInput, settings: MeshSettings) -> MeshResult<PlanarMeshOutput> {
    let mut patch = Patch::new("planar", Arc::new(PlaneOracle::xy()))
        .with_loop(BoundaryLoop::polygon(LoopKind::Outer, &to_uv(&input.outer))?);
    for hole in &input.holes {
        patch = patch.with_loop(BoundaryLoop::polygon(LoopKind::Inner, &to_uv(hole))?);
    }

    let mut session = MeshSession::new(settings)?;
    let shell = session.mesh_shell(std::slice::from_ref(&patch));
    let (indexed, welded) = shell.to_indexed_mesh(Tolerance::NODE);
    log::debug!("planar mesh: {} vertices, {welded} welded", indexed.vertex_count());

    let (status, residual_segments) = shell
        .patches
        .first()
        .map_or(("skipped".to_string(), 0), |p| (status_label(&p.status), p.residual_front.len()));

    Ok(PlanarMeshOutput {
        status,
        positions: indexed.positions,
        normals: indexed.normals,
        indices: indexed.indices,
        residual_segments,
        summary: shell.diagnostics.summary(),
        warnings: shell.diagnostics.warnings,
    })
}

/// Meshes a planar polygon with holes.
///
/// `input` is `{ outer: [[x, y], ...], holes?: [[[x, y], ...], ...] }`;
/// `settings` is a partial [`MeshSettings`] object or `undefined`.
#[wasm_bindgen]
pub fn mesh_planar_polygon(input: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
    let input: PlanarPolygonInput = serde_wasm_bindgen::from_value(input)
        .map_err(|err| JsError::new(&format!("invalid polygon input: {err}")))?;
    let settings: MeshSettings = if settings.is_undefined() || settings.is_null() {
        MeshSettings::default()
    } else {
        serde_wasm_bindgen::from_value(settings)
            .map_err(|err| JsError::new(&format!("invalid mesh settings: {err}")))?
    };

    let output = mesh_planar(&input, settings).map_err(|err| JsError::new(&err.to_string()))?;
    serde_wasm_bindgen::to_value(&output).map_err(|err| JsError::new(&err.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_areas(output: &PlanarMeshOutput) -> Vec<f64> {
        output
            .indices
            .chunks_exact(3)
            .map(|t| {
                let [a, b, c] = [t[0], t[1], t[2]].map(|i| output.positions[i as usize]);
                0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]))
            })
            .collect()
    }

    #[test]
    fn planar_l_shape_converges() {
        let input = PlanarPolygonInput {
            outer: vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [1.0, 2.0], [0.0, 2.0]],
            holes: Vec::new(),
        };
        let settings = MeshSettings::default().with_max_edge_length(f64::INFINITY);
        let output = mesh_planar(&input, settings).unwrap();
        assert_eq!(output.status, "converged");
        assert_eq!(output.residual_segments, 0);
        assert_eq!(output.positions.len(), 6);
        assert_eq!(output.indices.len(), 12);
        let areas = signed_areas(&output);
        assert!(areas.iter().all(|&a| a > 0.0));
        assert!((areas.iter().sum::<f64>() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn planar_hole_is_never_covered_by_inverted_triangles() {
        let input = PlanarPolygonInput {
            outer: vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]],
            holes: vec![vec![[1.5, 1.0], [2.5, 1.0], [2.0, 2.5]]],
        };
        let settings = MeshSettings::default().with_max_edge_length(0.5);
        let output = mesh_planar(&input, settings).unwrap();
        assert!(!output.status.starts_with("rejected"));
        assert_eq!(output.positions.len(), output.normals.len());
        assert!(signed_areas(&output).iter().all(|&a| a > 0.0));
        assert!(output.summary.starts_with("P:"));
    }

    #[test]
    fn degenerate_outline_is_an_error() {
        let input = PlanarPolygonInput {
            outer: vec![[0.0, 0.0], [1.0, 0.0]],
            holes: Vec::new(),
        };
        assert!(mesh_planar(&input, MeshSettings::default()).is_err());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        use serde::de::value::{Error, MapDeserializer};
        let entries = vec![("max_edge_length".to_string(), 0.5)];
        let de: MapDeserializer<'_, _, Error> = MapDeserializer::new(entries.into_iter());
        let settings = MeshSettings::deserialize(de).unwrap();
        assert!((settings.max_edge_length - 0.5).abs() < 1e-12);
        assert_eq!(settings.max_panel_count, MeshSettings::default().max_panel_count);
    }
}
