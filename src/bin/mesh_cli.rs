#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("mesh_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use afmesh_engine::geom::{
        CylinderSurface, FourPointSurface, ParametricOracle, PlaneOracle, Point3, SphereSurface, Tolerance, UvBounds,
        UvPoint, Vec3,
    };
    use afmesh_engine::mesher::{
        BoundaryCurve, BoundaryLoop, CollectingObserver, Distribution, EdgeSplit, IndexedMesh, LoopKind, MeshSession,
        MeshSettings, Patch, PatchStatus, ShellMesh,
    };

    const USAGE: &str = r"mesh_cli (afmesh-engine)

USAGE:
  mesh_cli list
  mesh_cli run <scenario|all> [options]

OPTIONS (run):
  --obj <path>          Write the welded mesh as OBJ (single scenario only)
  --max-edge <length>   Override the scenario's maximum edge length
  --no-delaunay         Skip the edge-flip pass
  --mirror              Append the XZ mirror image
  --trace               Print one line per meshing snapshot
  --overwrite           Overwrite an existing OBJ file
  -h, --help            Show this help
";

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{:<18} {}", scenario.name(), scenario.description());
        }
    }

    #[derive(Debug, Clone, Default)]
    struct RunOptions {
        max_edge: Option<f64>,
        no_delaunay: bool,
        mirror: bool,
        trace: bool,
    }

    impl RunOptions {
        fn apply(&self, mut settings: MeshSettings) -> MeshSettings {
            if let Some(length) = self.max_edge {
                settings.max_edge_length = length;
            }
            if self.no_delaunay {
                settings.delaunay_enabled = false;
            }
            if self.mirror {
                settings.mirror_xz = true;
            }
            settings
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut obj_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut options = RunOptions::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--max-edge" => {
                    let raw = args.value("--max-edge")?;
                    let length = raw
                        .parse::<f64>()
                        .map_err(|e| format!("invalid --max-edge `{raw}`: {e}"))?;
                    options.max_edge = Some(length);
                }
                "--no-delaunay" => options.no_delaunay = true,
                "--mirror" => options.mirror = true,
                "--trace" => options.trace = true,
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let scenarios: Vec<Scenario> = if scenario_name == "all" {
            if obj_path.is_some() {
                return Err("--obj needs a single scenario".to_string());
            }
            Scenario::ALL.to_vec()
        } else {
            vec![Scenario::from_name(&scenario_name).ok_or_else(|| unknown_scenario(&scenario_name))?]
        };

        for scenario in scenarios {
            let (shell, mesh) = run_scenario(scenario, &options)?;
            report(scenario.name(), &shell, &mesh);
            if let Some(path) = obj_path.as_deref() {
                write_obj_file(path, &mesh, scenario.name(), overwrite)?;
                eprintln!("wrote {}", path.display());
            }
        }
        Ok(())
    }

    fn report(name: &str, shell: &ShellMesh, mesh: &IndexedMesh) {
        println!("{name}");
        for patch in &shell.patches {
            println!(
                "  patch {} '{}': {} triangles, {} residual segments, {}",
                patch.index,
                patch.name,
                patch.triangles.len(),
                patch.residual_front.len(),
                status_label(&patch.status)
            );
        }
        println!(
            "  mesh: {} vertices, {} triangles, {} boundary edges",
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.boundary_edge_count()
        );
        println!("  {}", shell.diagnostics);
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = format!("unknown scenario `{name}`\n\navailable scenarios:\n");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn write_obj_file(path: &Path, mesh: &IndexedMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;

        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);
        let io = |e: std::io::Error| format!("write {}: {e}", path.display());

        writeln!(w, "# afmesh-engine mesh_cli").map_err(io)?;
        writeln!(w, "o {name}").map_err(io)?;
        for p in &mesh.positions {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(io)?;
        }
        for n in &mesh.normals {
            writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(io)?;
        }
        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}").map_err(io)?;
        }
        w.flush().map_err(io)
    }

    fn status_label(status: &PatchStatus) -> String {
        match status {
            PatchStatus::Converged => "converged".to_string(),
            PatchStatus::Unconverged(reason) => format!("unconverged ({reason})"),
            PatchStatus::Cancelled => "cancelled".to_string(),
            PatchStatus::Rejected(err) => format!("rejected ({err})"),
            PatchStatus::Skipped => "skipped".to_string(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scenarios
    // ─────────────────────────────────────────────────────────────────────

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        Square,
        Hexagon,
        Annulus,
        CylinderQuarter,
        SphereCap,
        SailFourSided,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::Square,
            Scenario::Hexagon,
            Scenario::Annulus,
            Scenario::CylinderQuarter,
            Scenario::SphereCap,
            Scenario::SailFourSided,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::Square => "square",
                Scenario::Hexagon => "hexagon",
                Scenario::Annulus => "annulus",
                Scenario::CylinderQuarter => "cylinder_quarter",
                Scenario::SphereCap => "sphere_cap",
                Scenario::SailFourSided => "sail_four_sided",
            }
        }

        fn description(self) -> &'static str {
            match self {
                Scenario::Square => "unit square in the XY plane",
                Scenario::Hexagon => "regular hexagon, unbounded edge length",
                Scenario::Annulus => "square plate with a square hole",
                Scenario::CylinderQuarter => "quarter turn of a unit cylinder",
                Scenario::SphereCap => "polar cap of a unit sphere",
                Scenario::SailFourSided => "twisted bilinear sail with cosine spacing",
            }
        }

        fn from_name(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }

        fn settings(self) -> MeshSettings {
            match self {
                Scenario::Square => MeshSettings::default(),
                Scenario::Hexagon => MeshSettings::default().with_max_edge_length(f64::INFINITY),
                Scenario::Annulus => MeshSettings::default().with_max_edge_length(0.5),
                Scenario::CylinderQuarter | Scenario::SphereCap => {
                    MeshSettings::default().with_max_edge_length(0.3)
                }
                Scenario::SailFourSided => MeshSettings::default().with_max_edge_length(0.2),
            }
        }

        fn patches(self) -> Result<Vec<Patch>, String> {
            let uv = UvPoint::new;
            let patch = match self {
                Scenario::Square => Patch::new("square", Arc::new(PlaneOracle::xy())).with_loop(
                    BoundaryLoop::polygon(
                        LoopKind::Outer,
                        &[uv(0.0, 0.0), uv(1.0, 0.0), uv(1.0, 1.0), uv(0.0, 1.0)],
                    )
                    .map_err(|e| e.to_string())?,
                ),
                Scenario::Hexagon => {
                    let points: Vec<UvPoint> = (0..6)
                        .map(|k| {
                            let a = std::f64::consts::TAU * f64::from(k) / 6.0;
                            uv(a.cos(), a.sin())
                        })
                        .collect();
                    Patch::new("hexagon", Arc::new(PlaneOracle::xy())).with_loop(
                        BoundaryLoop::polygon(LoopKind::Outer, &points).map_err(|e| e.to_string())?,
                    )
                }
                Scenario::Annulus => Patch::new("annulus", Arc::new(PlaneOracle::xy()))
                    .with_loop(
                        BoundaryLoop::polygon(
                            LoopKind::Outer,
                            &[uv(-2.0, -2.0), uv(2.0, -2.0), uv(2.0, 2.0), uv(-2.0, 2.0)],
                        )
                        .map_err(|e| e.to_string())?,
                    )
                    .with_loop(
                        BoundaryLoop::polygon(
                            LoopKind::Inner,
                            &[uv(-0.5, -0.5), uv(0.5, -0.5), uv(0.5, 0.5), uv(-0.5, 0.5)],
                        )
                        .map_err(|e| e.to_string())?
                        .splittable(true),
                    ),
                Scenario::CylinderQuarter => {
                    let cylinder = CylinderSurface::from_base_axis_xaxis(Point3::ORIGIN, Vec3::Z, Vec3::X, 1.0)?;
                    Patch::new("cylinder_quarter", Arc::new(ParametricOracle::new(cylinder))).with_loop(
                        BoundaryLoop::polygon(
                            LoopKind::Outer,
                            &[uv(0.0, 0.0), uv(0.25, 0.0), uv(0.25, 1.0), uv(0.0, 1.0)],
                        )
                        .map_err(|e| e.to_string())?,
                    )
                }
                Scenario::SphereCap => {
                    let sphere = SphereSurface::new(Point3::ORIGIN, 1.0)?;
                    let ring: Vec<UvPoint> = (0..=16).map(|k| uv(f64::from(k) / 16.0, 0.8)).collect();
                    let curve = BoundaryCurve::polyline(ring).map_err(|e| e.to_string())?;
                    Patch::new("sphere_cap", Arc::new(ParametricOracle::new(sphere)))
                        .with_loop(BoundaryLoop::outer(vec![curve]))
                }
                Scenario::SailFourSided => {
                    let sail = FourPointSurface::new(
                        Point3::new(0.0, 0.0, 0.0),
                        Point3::new(2.0, 0.0, 0.0),
                        Point3::new(0.2, 0.0, 3.0),
                        Point3::new(1.2, 0.6, 2.8),
                    );
                    let oracle = Arc::new(ParametricOracle::new(sail));
                    let bounds = UvBounds::new(uv(0.0, 0.0), uv(1.0, 1.0));
                    let boundary = BoundaryLoop::four_sided(
                        bounds,
                        [
                            EdgeSplit::new(10, Distribution::Cosine),
                            EdgeSplit::new(14, Distribution::Tanh),
                            EdgeSplit::new(6, Distribution::Cosine),
                            EdgeSplit::new(14, Distribution::Tanh),
                        ],
                        oracle.as_ref(),
                    );
                    Patch::new("sail", oracle).with_loop(boundary)
                }
            };
            Ok(vec![patch])
        }
    }

    fn run_scenario(scenario: Scenario, options: &RunOptions) -> Result<(ShellMesh, IndexedMesh), String> {
        let settings = options.apply(scenario.settings());
        let patches = scenario.patches()?;

        let mut observer = CollectingObserver::default();
        let shell = {
            let session = MeshSession::new(settings).map_err(|e| e.to_string())?;
            let mut session = if options.trace {
                session.with_observer(&mut observer)
            } else {
                session
            };
            session.mesh_shell(&patches)
        };
        for (phase, step, front, triangles) in &observer.frames {
            println!("{phase:?} step={step} front={front} triangles={triangles}");
        }

        let (mesh, _welded) = shell.to_indexed_mesh(Tolerance::NODE);
        Ok((shell, mesh))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
