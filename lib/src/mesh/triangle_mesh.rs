//! Indexed triangle mesh.
//!
//! Meshes are stored in millimetres. Triangles are wound counter-clockwise
//! when seen from outside, so the normals point out of the solid.

use crate::geometry::{BoundingBox3F, Point3F, Transform3D};
use crate::{CoordF, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single triangle defined by three vertex indices.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [u32; 3],
}

impl Triangle {
    #[inline]
    pub const fn new(v0: u32, v1: u32, v2: u32) -> Self {
        Self {
            indices: [v0, v1, v2],
        }
    }

    /// Check if this triangle is degenerate (has duplicate vertices).
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.indices[0] == self.indices[1]
            || self.indices[1] == self.indices[2]
            || self.indices[2] == self.indices[0]
    }

    /// Rotation-invariant key; two triangles over the same corners in the
    /// same cyclic order share a key.
    fn canonical(&self) -> [u32; 3] {
        let [a, b, c] = self.indices;
        if a <= b && a <= c {
            [a, b, c]
        } else if b <= a && b <= c {
            [b, c, a]
        } else {
            [c, a, b]
        }
    }
}

impl fmt::Debug for Triangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Triangle({}, {}, {})",
            self.indices[0], self.indices[1], self.indices[2]
        )
    }
}

impl From<[u32; 3]> for Triangle {
    #[inline]
    fn from(indices: [u32; 3]) -> Self {
        Self { indices }
    }
}

/// A 3D triangle mesh represented as an indexed triangle set.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Point3F>,
    indices: Vec<Triangle>,
}

impl TriangleMesh {
    #[inline]
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(triangle_count),
        }
    }

    pub fn from_parts(vertices: Vec<Point3F>, indices: Vec<Triangle>) -> Self {
        Self { vertices, indices }
    }

    #[inline]
    pub fn vertices(&self) -> &[Point3F] {
        &self.vertices
    }

    #[inline]
    pub fn indices(&self) -> &[Triangle] {
        &self.indices
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Add a vertex and return its index.
    pub fn add_vertex(&mut self, v: Point3F) -> u32 {
        let idx = self.vertices.len() as u32;
        self.vertices.push(v);
        idx
    }

    pub fn add_triangle(&mut self, tri: Triangle) {
        self.indices.push(tri);
    }

    pub fn add_triangle_indices(&mut self, v0: u32, v1: u32, v2: u32) {
        self.indices.push(Triangle::new(v0, v1, v2));
    }

    #[inline]
    pub fn vertex(&self, idx: u32) -> Point3F {
        self.vertices[idx as usize]
    }

    #[inline]
    pub fn triangle_vertices(&self, tri_idx: usize) -> [Point3F; 3] {
        let tri = &self.indices[tri_idx];
        [
            self.vertices[tri.indices[0] as usize],
            self.vertices[tri.indices[1] as usize],
            self.vertices[tri.indices[2] as usize],
        ]
    }

    #[inline]
    pub fn triangle_indices(&self, tri_idx: usize) -> [u32; 3] {
        self.indices[tri_idx].indices
    }

    /// Bounding box of the vertices referenced by triangles.
    pub fn bounding_box(&self) -> BoundingBox3F {
        let mut bb = BoundingBox3F::new();
        for tri in &self.indices {
            for &idx in &tri.indices {
                bb.merge_point(self.vertices[idx as usize]);
            }
        }
        bb
    }

    pub fn triangle_normal(&self, tri_idx: usize) -> Point3F {
        let [v0, v1, v2] = self.triangle_vertices(tri_idx);
        (v1 - v0).cross(&(v2 - v0)).normalize()
    }

    /// Signed volume; positive for a closed mesh with outward normals.
    pub fn signed_volume(&self) -> CoordF {
        self.indices
            .iter()
            .map(|tri| {
                let v0 = self.vertices[tri.indices[0] as usize];
                let v1 = self.vertices[tri.indices[1] as usize];
                let v2 = self.vertices[tri.indices[2] as usize];
                v0.dot(&v1.cross(&v2)) / 6.0
            })
            .sum()
    }

    #[inline]
    pub fn volume(&self) -> CoordF {
        self.signed_volume().abs()
    }

    pub fn translate(&mut self, v: Point3F) {
        for vertex in &mut self.vertices {
            *vertex = *vertex + v;
        }
    }

    /// Transform in place. A reflecting transform also flips the winding so
    /// the normals keep pointing outwards.
    pub fn transform(&mut self, t: &Transform3D) {
        for vertex in &mut self.vertices {
            *vertex = t.apply(*vertex);
        }
        if t.has_reflection() {
            self.flip_normals();
        }
    }

    pub fn transformed(&self, t: &Transform3D) -> Self {
        let mut mesh = self.clone();
        mesh.transform(t);
        mesh
    }

    /// Append another mesh; vertices are not shared between the two.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|t| {
            Triangle::new(
                t.indices[0] + offset,
                t.indices[1] + offset,
                t.indices[2] + offset,
            )
        }));
    }

    /// Reverse the winding of every triangle.
    pub fn flip_normals(&mut self) {
        for tri in &mut self.indices {
            tri.indices.swap(0, 2);
        }
    }

    pub fn remove_degenerate_triangles(&mut self) {
        self.indices.retain(|tri| !tri.is_degenerate());
    }

    /// Merge vertices with bit-identical coordinates. Returns the number of
    /// vertices removed.
    pub fn merge_vertices(&mut self) -> usize {
        let before = self.vertices.len();
        let mut lookup: HashMap<[u64; 3], u32> = HashMap::with_capacity(before);
        let mut remap: Vec<u32> = Vec::with_capacity(before);
        let mut vertices: Vec<Point3F> = Vec::with_capacity(before);

        for v in &self.vertices {
            // Adding 0.0 folds -0.0 onto 0.0.
            let key = [
                (v.x + 0.0).to_bits(),
                (v.y + 0.0).to_bits(),
                (v.z + 0.0).to_bits(),
            ];
            let idx = *lookup.entry(key).or_insert_with(|| {
                vertices.push(*v);
                (vertices.len() - 1) as u32
            });
            remap.push(idx);
        }

        for tri in &mut self.indices {
            for idx in &mut tri.indices {
                *idx = remap[*idx as usize];
            }
        }
        self.vertices = vertices;
        before - self.vertices.len()
    }

    /// Drop vertices that no triangle references.
    pub fn compact_vertices(&mut self) {
        let mut used = vec![false; self.vertices.len()];
        for tri in &self.indices {
            for &idx in &tri.indices {
                used[idx as usize] = true;
            }
        }

        let mut new_indices: Vec<u32> = vec![0; self.vertices.len()];
        let mut new_vertices: Vec<Point3F> = Vec::new();
        for (i, &is_used) in used.iter().enumerate() {
            if is_used {
                new_indices[i] = new_vertices.len() as u32;
                new_vertices.push(self.vertices[i]);
            }
        }

        for tri in &mut self.indices {
            for idx in &mut tri.indices {
                *idx = new_indices[*idx as usize];
            }
        }
        self.vertices = new_vertices;
    }

    /// Collapse edges not longer than `max_error`, then drop the degenerate
    /// and duplicate triangles this leaves behind. Shape is preserved up to
    /// `max_error`.
    pub fn simplify_lossless(&mut self, max_error: CoordF) {
        self.merge_vertices();

        let max_error_sq = max_error * max_error;
        let mut parent: Vec<u32> = (0..self.vertices.len() as u32).collect();
        for tri in &self.indices {
            for k in 0..3 {
                let a = find_root(&mut parent, tri.indices[k]);
                let b = find_root(&mut parent, tri.indices[(k + 1) % 3]);
                if a != b
                    && self.vertices[a as usize].distance_squared(&self.vertices[b as usize])
                        <= max_error_sq
                {
                    let (keep, drop) = if a < b { (a, b) } else { (b, a) };
                    parent[drop as usize] = keep;
                }
            }
        }

        for tri in &mut self.indices {
            for idx in &mut tri.indices {
                *idx = find_root(&mut parent, *idx);
            }
        }
        self.remove_degenerate_triangles();

        let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(self.indices.len());
        self.indices.retain(|tri| seen.insert(tri.canonical()));
        self.compact_vertices();
    }

    /// Connected components, connectivity through shared vertex indices.
    pub fn split(&self) -> Vec<TriangleMesh> {
        if self.is_empty() {
            return Vec::new();
        }
        let (component_of, count) = self.components();
        if count == 1 {
            return vec![self.clone()];
        }

        let mut parts: Vec<TriangleMesh> = vec![TriangleMesh::new(); count];
        let mut remaps: Vec<HashMap<u32, u32>> = vec![HashMap::new(); count];
        for (tri, &comp) in self.indices.iter().zip(component_of.iter()) {
            let part = &mut parts[comp];
            let remap = &mut remaps[comp];
            let mut new_tri = [0u32; 3];
            for (k, &idx) in tri.indices.iter().enumerate() {
                new_tri[k] = *remap
                    .entry(idx)
                    .or_insert_with(|| part.add_vertex(self.vertices[idx as usize]));
            }
            part.add_triangle(Triangle::from(new_tri));
        }
        parts
    }

    pub fn is_splittable(&self) -> bool {
        !self.is_empty() && self.components().1 > 1
    }

    /// Component id per triangle plus the number of components.
    fn components(&self) -> (Vec<usize>, usize) {
        let mut parent: Vec<u32> = (0..self.vertices.len() as u32).collect();
        for tri in &self.indices {
            let a = find_root(&mut parent, tri.indices[0]);
            for &idx in &tri.indices[1..] {
                let b = find_root(&mut parent, idx);
                if a != b {
                    parent[b as usize] = a;
                }
            }
        }

        let mut ids: HashMap<u32, usize> = HashMap::new();
        let component_of = self
            .indices
            .iter()
            .map(|tri| {
                let root = find_root(&mut parent, tri.indices[0]);
                let next = ids.len();
                *ids.entry(root).or_insert(next)
            })
            .collect();
        (component_of, ids.len())
    }

    pub fn validate(&self) -> Result<()> {
        let vertex_count = self.vertices.len() as u32;
        for (i, tri) in self.indices.iter().enumerate() {
            for &idx in &tri.indices {
                if idx >= vertex_count {
                    return Err(Error::Mesh(format!(
                        "Triangle {} has invalid vertex index {} (only {} vertices)",
                        i, idx, vertex_count
                    )));
                }
            }
        }
        Ok(())
    }

    /// Cube of edge `size` centered at the origin.
    pub fn cube(size: CoordF) -> Self {
        let half = size / 2.0;
        Self::cuboid(
            Point3F::new(-half, -half, -half),
            Point3F::new(half, half, half),
        )
    }

    /// Axis-aligned box between two corners.
    pub fn cuboid(min: Point3F, max: Point3F) -> Self {
        let vertices = vec![
            // Bottom face
            Point3F::new(min.x, min.y, min.z),
            Point3F::new(max.x, min.y, min.z),
            Point3F::new(max.x, max.y, min.z),
            Point3F::new(min.x, max.y, min.z),
            // Top face
            Point3F::new(min.x, min.y, max.z),
            Point3F::new(max.x, min.y, max.z),
            Point3F::new(max.x, max.y, max.z),
            Point3F::new(min.x, max.y, max.z),
        ];

        let indices = vec![
            // Bottom
            Triangle::new(0, 2, 1),
            Triangle::new(0, 3, 2),
            // Top
            Triangle::new(4, 5, 6),
            Triangle::new(4, 6, 7),
            // Front
            Triangle::new(0, 1, 5),
            Triangle::new(0, 5, 4),
            // Back
            Triangle::new(2, 3, 7),
            Triangle::new(2, 7, 6),
            // Left
            Triangle::new(0, 4, 7),
            Triangle::new(0, 7, 3),
            // Right
            Triangle::new(1, 2, 6),
            Triangle::new(1, 6, 5),
        ];

        Self::from_parts(vertices, indices)
    }

    /// Closed cylinder standing on the XY plane at the origin, axis +Z.
    pub fn cylinder(radius: CoordF, height: CoordF, steps: usize) -> Self {
        let steps = steps.max(3);
        let mut mesh = Self::with_capacity(2 * steps + 2, 4 * steps);

        let bottom_center = mesh.add_vertex(Point3F::new(0.0, 0.0, 0.0));
        let top_center = mesh.add_vertex(Point3F::new(0.0, 0.0, height));
        let first = mesh.vertex_count() as u32;
        for i in 0..steps {
            let angle = 2.0 * std::f64::consts::PI * i as CoordF / steps as CoordF;
            let (sin_a, cos_a) = angle.sin_cos();
            mesh.add_vertex(Point3F::new(radius * cos_a, radius * sin_a, 0.0));
            mesh.add_vertex(Point3F::new(radius * cos_a, radius * sin_a, height));
        }

        for i in 0..steps as u32 {
            let j = (i + 1) % steps as u32;
            let (b_i, t_i) = (first + 2 * i, first + 2 * i + 1);
            let (b_j, t_j) = (first + 2 * j, first + 2 * j + 1);
            mesh.add_triangle_indices(bottom_center, b_j, b_i);
            mesh.add_triangle_indices(top_center, t_i, t_j);
            mesh.add_triangle_indices(b_i, b_j, t_j);
            mesh.add_triangle_indices(b_i, t_j, t_i);
        }
        mesh
    }
}

fn find_root(parent: &mut [u32], mut idx: u32) -> u32 {
    while parent[idx as usize] != idx {
        let grand = parent[parent[idx as usize] as usize];
        parent[idx as usize] = grand;
        idx = grand;
    }
    idx
}

impl fmt::Debug for TriangleMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangleMesh({} vertices, {} triangles)",
            self.vertices.len(),
            self.indices.len()
        )
    }
}

impl fmt::Display for TriangleMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TriangleMesh: {} vertices, {} triangles",
            self.vertices.len(),
            self.indices.len()
        )?;
        if !self.is_empty() {
            write!(f, ", bounds: {}", self.bounding_box())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unwelded_cube(size: CoordF) -> TriangleMesh {
        // Every triangle gets its own three vertices, like a freshly loaded STL.
        let cube = TriangleMesh::cube(size);
        let mut mesh = TriangleMesh::new();
        for i in 0..cube.triangle_count() {
            let [a, b, c] = cube.triangle_vertices(i);
            let ia = mesh.add_vertex(a);
            let ib = mesh.add_vertex(b);
            let ic = mesh.add_vertex(c);
            mesh.add_triangle_indices(ia, ib, ic);
        }
        mesh
    }

    #[test]
    fn test_triangle_degenerate() {
        assert!(!Triangle::new(0, 1, 2).is_degenerate());
        assert!(Triangle::new(0, 0, 2).is_degenerate());
        assert!(Triangle::new(0, 1, 0).is_degenerate());
    }

    #[test]
    fn test_mesh_cube() {
        let mesh = TriangleMesh::cube(10.0);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);

        let bb = mesh.bounding_box();
        assert!((bb.min.x - (-5.0)).abs() < 1e-10);
        assert!((bb.max.x - 5.0).abs() < 1e-10);
        assert!((mesh.signed_volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_volume_and_orientation() {
        let mesh = TriangleMesh::cylinder(1.0, 2.0, 64);
        assert_eq!(mesh.triangle_count(), 4 * 64);
        let expected = std::f64::consts::PI * 2.0;
        let vol = mesh.signed_volume();
        assert!(vol > 0.0);
        assert!((vol - expected).abs() / expected < 0.01);
    }

    #[test]
    fn test_transform_with_reflection_keeps_orientation() {
        let mesh = TriangleMesh::cube(2.0);
        let mirrored = mesh.transformed(&Transform3D::scaling(-1.0, 1.0, 1.0));
        assert!(mirrored.signed_volume() > 0.0);
    }

    #[test]
    fn test_merge_vertices() {
        let mut mesh = unwelded_cube(10.0);
        assert_eq!(mesh.vertex_count(), 36);
        let removed = mesh.merge_vertices();
        assert_eq!(removed, 28);
        assert_eq!(mesh.vertex_count(), 8);
        assert!((mesh.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_split_two_cubes() {
        let mut mesh = TriangleMesh::cube(2.0);
        let mut other = TriangleMesh::cube(2.0);
        other.translate(Point3F::new(10.0, 0.0, 0.0));
        mesh.merge(&other);

        assert!(mesh.is_splittable());
        let parts = mesh.split();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].triangle_count(), 12);
        assert_eq!(parts[1].vertex_count(), 8);
        assert!(!parts[0].is_splittable());
    }

    #[test]
    fn test_simplify_lossless_removes_duplicates() {
        let mut mesh = TriangleMesh::cube(10.0);
        // Duplicate a triangle and add a sliver vertex right next to a corner.
        mesh.add_triangle_indices(0, 2, 1);
        let near = mesh.add_vertex(Point3F::new(-5.0, -5.0, -5.0 + 1e-9));
        mesh.add_triangle_indices(0, near, 1);

        mesh.simplify_lossless(2.0 * f32::EPSILON as f64);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.vertex_count(), 8);
        assert!((mesh.volume() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_validate() {
        let mut mesh = TriangleMesh::cube(1.0);
        assert!(mesh.validate().is_ok());
        mesh.add_triangle_indices(0, 1, 100);
        assert!(mesh.validate().is_err());
    }
}
