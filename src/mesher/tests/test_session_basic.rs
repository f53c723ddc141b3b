use std::sync::Arc;

use crate::geom::{CylinderSurface, ParametricOracle, PlaneOracle, Point3, Tolerance, UvPoint, Vec3};
use crate::mesher::{
    BoundaryLoop, CancelToken, CollectingObserver, LoopKind, MeshError, MeshObserver, MeshSession, MeshSettings,
    MeshSnapshot, Patch, PatchStatus, SnapshotPhase,
};

fn uv(u: f64, v: f64) -> UvPoint {
    UvPoint::new(u, v)
}

fn plane_polygon(name: &str, points: &[UvPoint]) -> Patch {
    Patch::new(name, Arc::new(PlaneOracle::xy()))
        .with_loop(BoundaryLoop::polygon(LoopKind::Outer, points).unwrap())
}

fn unit_square() -> Patch {
    plane_polygon("square", &[uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 1.0), uv(0.0, 1.0)])
}

fn hexagon() -> Patch {
    let points: Vec<UvPoint> = (0..6)
        .map(|k| {
            let a = std::f64::consts::TAU * f64::from(k) / 6.0;
            uv(a.cos(), a.sin())
        })
        .collect();
    plane_polygon("hexagon", &points)
}

fn coarse() -> MeshSettings {
    MeshSettings::default().with_max_edge_length(2.0)
}

#[test]
fn invalid_settings_are_refused() {
    let result = MeshSession::new(MeshSettings::default().with_max_edge_length(-1.0));
    assert!(matches!(result, Err(MeshError::InvalidSettings(_))));
}

#[test]
fn square_meshes_into_two_triangles() {
    let mut session = MeshSession::new(coarse()).unwrap();
    let mesh = session.mesh_patch(0, &unit_square());
    assert_eq!(mesh.status, PatchStatus::Converged);
    assert_eq!(mesh.triangles.len(), 2);
    assert!(mesh.residual_front.is_empty());
    assert_eq!(mesh.diagnostics.flip_count, 0);
    assert_eq!(mesh.diagnostics.delaunay_pass_count, 1);
    assert!(mesh.triangles.iter().all(|t| t.normal().z > 0.99));
}

#[test]
fn failing_patch_does_not_affect_siblings() {
    let orphan_hole = Patch::new("hole only", Arc::new(PlaneOracle::xy())).with_loop(
        BoundaryLoop::polygon(LoopKind::Inner, &[uv(0.0, 0.0), uv(1.0, 0.0), uv(0.0, 1.0)]).unwrap(),
    );
    let triangle = plane_polygon("triangle", &[uv(0.0, 0.0), uv(1.0, 0.0), uv(0.0, 1.0)]);
    let mut session = MeshSession::new(coarse()).unwrap();
    let shell = session.mesh_shell(&[unit_square(), orphan_hole, triangle]);

    assert_eq!(shell.patches.len(), 3);
    assert_eq!(shell.patches[0].status, PatchStatus::Converged);
    assert!(matches!(
        shell.patches[1].status,
        PatchStatus::Rejected(MeshError::MalformedBoundary(_))
    ));
    assert_eq!(shell.patches[2].status, PatchStatus::Converged);
    assert_eq!(shell.triangle_count(), 3);
    assert_eq!(shell.diagnostics.patch_count, 3);
    assert_eq!(shell.diagnostics.converged_patch_count, 2);
    assert!(shell.diagnostics.has_warnings());
    assert!(!shell.is_converged());
}

#[test]
fn trace_patch_meshes_only_one_index() {
    let settings = MeshSettings {
        trace_patch: Some(1),
        ..coarse()
    };
    let mut session = MeshSession::new(settings).unwrap();
    let shell = session.mesh_shell(&[unit_square(), hexagon(), unit_square()]);
    assert_eq!(shell.patches[0].status, PatchStatus::Skipped);
    assert_eq!(shell.patches[1].status, PatchStatus::Converged);
    assert_eq!(shell.patches[2].status, PatchStatus::Skipped);
    assert_eq!(shell.triangle_count(), 6);
    assert!(shell.is_converged());
}

#[test]
fn mirror_doubles_the_triangles() {
    let settings = MeshSettings {
        mirror_xz: true,
        ..coarse()
    };
    let mut session = MeshSession::new(settings).unwrap();
    let mesh = session.mesh_patch(0, &unit_square());
    assert_eq!(mesh.triangles.len(), 4);
    assert!(
        mesh.triangles[2..]
            .iter()
            .all(|t| t.vertices().iter().all(|v| v.position.y <= 0.0))
    );
}

#[test]
fn reversed_patch_faces_the_other_way() {
    let mut session = MeshSession::new(coarse()).unwrap();
    let mesh = session.mesh_patch(0, &unit_square().with_reversed(true));
    assert_eq!(mesh.triangles.len(), 2);
    assert!(mesh.triangles.iter().all(|t| t.normal().z < -0.99));
    assert!(
        mesh.triangles
            .iter()
            .all(|t| t.vertices().iter().all(|v| v.normal == -Vec3::Z))
    );
}

#[test]
fn observer_sees_advancing_then_delaunay_snapshots() {
    let mut observer = CollectingObserver::default();
    let mut session = MeshSession::new(coarse()).unwrap().with_observer(&mut observer);
    let shell = session.mesh_shell(&[unit_square()]);
    assert!(shell.is_converged());
    drop(session);

    assert_eq!(
        observer.frames,
        vec![
            (SnapshotPhase::Advancing, 1, 3, 1),
            (SnapshotPhase::Advancing, 2, 0, 2),
            (SnapshotPhase::Delaunay, 1, 0, 2),
        ]
    );
}

struct CancelOnFirstSnapshot(CancelToken);

impl MeshObserver for CancelOnFirstSnapshot {
    fn on_snapshot(&mut self, _snapshot: &MeshSnapshot<'_>) {
        self.0.cancel();
    }
}

#[test]
fn cancellation_skips_remaining_patches() {
    let token = CancelToken::new();
    let mut observer = CancelOnFirstSnapshot(token.clone());
    let mut session = MeshSession::new(MeshSettings::default())
        .unwrap()
        .with_cancel_token(token)
        .with_observer(&mut observer);
    let shell = session.mesh_shell(&[hexagon(), unit_square()]);

    assert!(shell.cancelled);
    assert_eq!(shell.patches[0].status, PatchStatus::Cancelled);
    assert_eq!(shell.patches[0].diagnostics.iteration_count, 1);
    assert_eq!(shell.patches[0].diagnostics.delaunay_pass_count, 0);
    assert_eq!(shell.patches[1].status, PatchStatus::Skipped);
    assert!(shell.patches[1].triangles.is_empty());
}

#[test]
fn cancelled_token_skips_every_patch() {
    let mut session = MeshSession::new(coarse()).unwrap();
    session.cancel_token().cancel();
    let shell = session.mesh_shell(&[unit_square(), hexagon()]);
    assert!(shell.cancelled);
    assert!(shell.patches.iter().all(|p| p.status == PatchStatus::Skipped));
}

#[test]
fn hexagon_exports_a_welded_fan() {
    let settings = MeshSettings::default().with_max_edge_length(f64::INFINITY);
    let mut session = MeshSession::new(settings).unwrap();
    let shell = session.mesh_shell(&[hexagon()]);
    let (mesh, welded) = shell.to_indexed_mesh(Tolerance::NODE);

    assert!(mesh.validate().is_ok());
    assert_eq!(mesh.vertex_count(), 7);
    assert_eq!(mesh.triangle_count(), 6);
    assert_eq!(welded, 18 - 7);
    assert_eq!(mesh.boundary_edge_count(), 6);
}

#[test]
fn cylinder_patch_stays_on_the_surface() {
    let cylinder = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0).unwrap();
    let patch = Patch::new("quarter", Arc::new(ParametricOracle::new(cylinder)))
        .with_loop(
            BoundaryLoop::polygon(
                LoopKind::Outer,
                &[uv(0.0, 0.0), uv(0.25, 0.0), uv(0.25, 1.0), uv(0.0, 1.0)],
            )
            .unwrap(),
        );
    let settings = MeshSettings::default().with_max_edge_length(0.4);
    let mut session = MeshSession::new(settings).unwrap();
    let mesh = session.mesh_patch(0, &patch);

    assert!(!matches!(mesh.status, PatchStatus::Rejected(_)));
    assert!(mesh.diagnostics.boundary_node_count > 0);
    assert!(!mesh.triangles.is_empty());
    for tri in &mesh.triangles {
        for v in tri.vertices() {
            let r = v.position.x.hypot(v.position.y);
            assert!((r - 1.0).abs() < 1e-3, "radius {r}");
        }
    }
}
