//! Triangle soup to indexed mesh with vertex welding.

use std::collections::HashMap;

use serde::Serialize;

use crate::geom::{Point3, Tolerance, Vec3};

use super::elements::Triangle;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexedMesh {
    pub positions: Vec<[f64; 3]>,
    /// Per-vertex normals, averaged over the welded nodes.
    pub normals: Vec<[f64; 3]>,
    /// Three indices per triangle, wound like the source triangles.
    pub indices: Vec<u32>,
}

type CellKey = (i64, i64, i64);

fn quantize(value: f64, inv: f64) -> i64 {
    (value * inv)
        .floor()
        .clamp(i64::MIN as f64, i64::MAX as f64) as i64
}

fn cell_key(p: Point3, inv: f64) -> Option<CellKey> {
    p.is_finite()
        .then(|| (quantize(p.x, inv), quantize(p.y, inv), quantize(p.z, inv)))
}

impl IndexedMesh {
    /// Builds the mesh, merging nodes closer than `tol`. Null triangles are
    /// skipped. Returns the mesh and the number of welded nodes.
    #[must_use]
    pub fn from_triangles(triangles: &[Triangle], tol: Tolerance) -> (Self, usize) {
        let weld = tol.eps.is_finite() && tol.eps > 0.0;
        let inv = if weld { 1.0 / tol.eps } else { 0.0 };

        let mut buckets: HashMap<CellKey, Vec<u32>> = HashMap::new();
        let mut points: Vec<Point3> = Vec::new();
        let mut normal_sums: Vec<Vec3> = Vec::new();
        let mut indices = Vec::with_capacity(triangles.len() * 3);
        let mut welded = 0;

        for tri in triangles.iter().filter(|t| !t.is_null()) {
            for node in tri.vertices() {
                let key = if weld { cell_key(node.position, inv) } else { None };
                let found = key.and_then(|key| {
                    neighbour_cells(key)
                        .filter_map(|cell| buckets.get(&cell))
                        .flatten()
                        .copied()
                        .find(|&i| points[i as usize].distance_to(node.position) <= tol.eps)
                });

                let index = if let Some(i) = found {
                    welded += 1;
                    normal_sums[i as usize] = normal_sums[i as usize] + node.normal;
                    i
                } else {
                    let i = u32::try_from(points.len()).unwrap_or(u32::MAX);
                    points.push(node.position);
                    normal_sums.push(node.normal);
                    if let Some(key) = key {
                        buckets.entry(key).or_default().push(i);
                    }
                    i
                };
                indices.push(index);
            }
        }

        let mesh = Self {
            positions: points.iter().map(|p| p.to_array()).collect(),
            normals: normal_sums
                .into_iter()
                .map(|n| n.normalized().unwrap_or(Vec3::ZERO).to_array())
                .collect(),
            indices,
        };
        (mesh, welded)
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Undirected edges used by exactly one triangle.
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        let mut uses: HashMap<(u32, u32), usize> = HashMap::new();
        for tri in self.indices.chunks_exact(3) {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                *uses.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        uses.values().filter(|&&n| n == 1).count()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!("index count {} is not a multiple of 3", self.indices.len()));
        }
        if self.normals.len() != self.positions.len() {
            return Err("normal and position counts differ".to_string());
        }
        if let Some(bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(format!("index {bad} out of range"));
        }
        Ok(())
    }
}

fn neighbour_cells(key: CellKey) -> impl Iterator<Item = CellKey> {
    (-1i64..=1).flat_map(move |dx| {
        (-1i64..=1).flat_map(move |dy| (-1i64..=1).map(move |dz| (key.0 + dx, key.1 + dy, key.2 + dz)))
    })
}
