//! Mesh Slicer - Triangle-plane intersection algorithm.
//!
//! 1. For each triangle, determine which slicing planes intersect it
//! 2. Compute intersection line segments for each plane-triangle intersection
//! 3. Stitch line segments into closed loops
//! 4. Turn the loops into expolygons according to the [`SlicingMode`]
//! 5. Optionally close small gaps with a morphological closing
//!
//! Triangles are distributed over the rayon pool for step 1, layers for
//! steps 3 to 5.

use super::{MeshSlicingParams, SlicingMode};
use crate::clipper::{closing_ex, union_polygons};
use crate::geometry::{ExPolygons, Point, Polygon};
use crate::mesh::TriangleMesh;
use crate::{scale, Coord, CoordF, Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;

const PLANE_EPS: CoordF = 1e-10;

/// Represents an intersection point on a slicing plane.
#[derive(Clone, Debug)]
struct IntersectionPoint {
    pos: Point,
    /// Vertex ID if this point lies on a mesh vertex, -1 otherwise
    point_id: i32,
    /// Edge ID if this point lies on a mesh edge, -1 otherwise
    edge_id: i32,
}

impl IntersectionPoint {
    fn on_vertex(v: &[CoordF; 3], id: i32) -> Self {
        Self {
            pos: Point::new(scale(v[0]), scale(v[1])),
            point_id: id,
            edge_id: -1,
        }
    }

    fn on_edge(x: CoordF, y: CoordF, edge_id: i32) -> Self {
        Self {
            pos: Point::new(scale(x), scale(y)),
            point_id: -1,
            edge_id,
        }
    }
}

/// Represents an intersection line segment on a slicing plane.
#[derive(Clone, Debug)]
struct IntersectionLine {
    a: Point,
    b: Point,
    /// Vertex IDs of the end points (-1 if on an edge)
    a_id: i32,
    b_id: i32,
    /// Edge IDs of the end points (-1 if on a vertex)
    edge_a_id: i32,
    edge_b_id: i32,
    used: bool,
}

impl IntersectionLine {
    fn from_vertices(a: &[CoordF; 3], b: &[CoordF; 3], a_id: i32, b_id: i32) -> Self {
        Self {
            a: Point::new(scale(a[0]), scale(a[1])),
            b: Point::new(scale(b[0]), scale(b[1])),
            a_id,
            b_id,
            edge_a_id: -1,
            edge_b_id: -1,
            used: false,
        }
    }
}

/// Slice a single triangle against a horizontal plane.
///
/// Lines are oriented so that the solid lies to their left, which makes the
/// outer loops of a correctly oriented mesh counter-clockwise.
fn slice_facet(
    slice_z: CoordF,
    vertices: &[[CoordF; 3]; 3],
    indices: &[u32; 3],
    edge_ids: &[i32; 3],
    idx_vertex_lowest: usize,
) -> Option<IntersectionLine> {
    let on_plane = |z: CoordF| (z - slice_z).abs() < PLANE_EPS;
    let mut points: Vec<IntersectionPoint> = Vec::with_capacity(3);
    let mut point_on_layer: Option<usize> = None;

    for j in 0..3 {
        let k = (idx_vertex_lowest + j) % 3;
        let l = (k + 1) % 3;
        let edge_id = edge_ids[k];
        let a_id = indices[k] as i32;
        let b_id = indices[l] as i32;
        let a = &vertices[k];
        let b = &vertices[l];
        let c = &vertices[(k + 2) % 3];

        // Edge lying in the plane. Only the triangle whose third vertex is
        // below contributes it, so each such edge is emitted once.
        if on_plane(a[2]) && on_plane(b[2]) {
            if c[2] < slice_z {
                let line = IntersectionLine::from_vertices(b, a, b_id, a_id);
                if line.a != line.b {
                    return Some(line);
                }
            }
            return None;
        }

        let mut push_vertex = |v: &[CoordF; 3], id: i32, points: &mut Vec<IntersectionPoint>| {
            let seen = point_on_layer
                .map(|idx| points[idx].point_id == id)
                .unwrap_or(false);
            if !seen {
                point_on_layer = Some(points.len());
                points.push(IntersectionPoint::on_vertex(v, id));
            }
        };

        if on_plane(a[2]) {
            push_vertex(a, a_id, &mut points);
        } else if on_plane(b[2]) {
            push_vertex(b, b_id, &mut points);
        } else if (a[2] < slice_z && b[2] > slice_z) || (b[2] < slice_z && a[2] > slice_z) {
            // Sort edge endpoints so both triangles sharing the edge compute
            // the bit-identical intersection point.
            let (sa, sb, sa_id, sb_id) = if a_id > b_id {
                (b, a, b_id, a_id)
            } else {
                (a, b, a_id, b_id)
            };
            let t = (slice_z - sb[2]) / (sa[2] - sb[2]);
            if t <= 0.0 {
                push_vertex(sa, sa_id, &mut points);
            } else if t >= 1.0 {
                push_vertex(sb, sb_id, &mut points);
            } else {
                let x = sb[0] + (sa[0] - sb[0]) * t;
                let y = sb[1] + (sa[1] - sb[1]) * t;
                points.push(IntersectionPoint::on_edge(x, y, edge_id));
            }
        }
    }

    if points.len() != 2 {
        return None;
    }
    let line = IntersectionLine {
        a: points[1].pos,
        b: points[0].pos,
        a_id: points[1].point_id,
        b_id: points[0].point_id,
        edge_a_id: points[1].edge_id,
        edge_b_id: points[0].edge_id,
        used: false,
    };
    (line.a != line.b).then_some(line)
}

/// Each unique undirected edge gets an ID shared by both adjacent triangles.
fn build_edge_ids(mesh: &TriangleMesh) -> Vec<[i32; 3]> {
    let mut edge_map: HashMap<(u32, u32), i32> = HashMap::new();
    let mut result = Vec::with_capacity(mesh.triangle_count());

    for tri_idx in 0..mesh.triangle_count() {
        let indices = mesh.triangle_indices(tri_idx);
        let mut edge_ids = [0i32; 3];
        for i in 0..3 {
            let v0 = indices[i];
            let v1 = indices[(i + 1) % 3];
            let key = if v0 < v1 { (v0, v1) } else { (v1, v0) };
            let next = edge_map.len() as i32;
            edge_ids[i] = *edge_map.entry(key).or_insert(next);
        }
        result.push(edge_ids);
    }

    result
}

/// Intersection lines of every triangle with every plane, bucketed by layer.
fn slice_mesh_to_lines(mesh: &TriangleMesh, zs: &[CoordF]) -> Vec<Vec<IntersectionLine>> {
    if mesh.is_empty() || zs.is_empty() {
        return vec![Vec::new(); zs.len()];
    }

    let edge_ids = build_edge_ids(mesh);
    let empty = || vec![Vec::new(); zs.len()];

    (0..mesh.triangle_count())
        .into_par_iter()
        .fold(empty, |mut lines, tri_idx| {
            let verts = mesh.triangle_vertices(tri_idx);
            let vertices: [[CoordF; 3]; 3] = [
                [verts[0].x, verts[0].y, verts[0].z],
                [verts[1].x, verts[1].y, verts[1].z],
                [verts[2].x, verts[2].y, verts[2].z],
            ];
            let min_z = vertices[0][2].min(vertices[1][2]).min(vertices[2][2]);
            let max_z = vertices[0][2].max(vertices[1][2]).max(vertices[2][2]);

            // Horizontal triangles bound no volume at their own height.
            if max_z - min_z < PLANE_EPS {
                return lines;
            }

            let idx_vertex_lowest = if vertices[1][2] == min_z {
                1
            } else if vertices[2][2] == min_z {
                2
            } else {
                0
            };

            let first_layer = zs.partition_point(|&z| z < min_z);
            let last_layer = zs.partition_point(|&z| z <= max_z);
            let indices = mesh.triangle_indices(tri_idx);
            for (layer_idx, &slice_z) in zs.iter().enumerate().take(last_layer).skip(first_layer)
            {
                if let Some(line) = slice_facet(
                    slice_z,
                    &vertices,
                    &indices,
                    &edge_ids[tri_idx],
                    idx_vertex_lowest,
                ) {
                    lines[layer_idx].push(line);
                }
            }
            lines
        })
        .reduce(empty, |mut a, b| {
            for (dst, src) in a.iter_mut().zip(b) {
                dst.extend(src);
            }
            a
        })
}

/// Stitch line segments into closed loops by matching endpoints.
fn chain_lines_to_polygons(lines: &mut [IntersectionLine]) -> Vec<Polygon> {
    if lines.is_empty() {
        return Vec::new();
    }

    let mut by_a_point: HashMap<i32, Vec<usize>> = HashMap::new();
    let mut by_a_edge: HashMap<i32, Vec<usize>> = HashMap::new();
    let mut by_a_coord: HashMap<(Coord, Coord), Vec<usize>> = HashMap::new();
    for (idx, line) in lines.iter().enumerate() {
        if line.a_id >= 0 {
            by_a_point.entry(line.a_id).or_default().push(idx);
        }
        if line.edge_a_id >= 0 {
            by_a_edge.entry(line.edge_a_id).or_default().push(idx);
        }
        by_a_coord.entry((line.a.x, line.a.y)).or_default().push(idx);
    }

    let first_unused = |candidates: Option<&Vec<usize>>, lines: &[IntersectionLine]| {
        candidates.and_then(|c| c.iter().copied().find(|&idx| !lines[idx].used))
    };

    let mut polygons: Vec<Polygon> = Vec::new();
    for start_idx in 0..lines.len() {
        if lines[start_idx].used {
            continue;
        }

        let mut points: Vec<Point> = Vec::new();
        let mut current_idx = start_idx;
        lines[current_idx].used = true;
        let mut closed = false;

        loop {
            let current = &lines[current_idx];
            points.push(current.a);
            let (b, b_id, edge_b_id) = (current.b, current.b_id, current.edge_b_id);

            // The start line is already marked used; closing the loop is
            // detected by matching its start point directly.
            let start = &lines[start_idx];
            if points.len() > 1
                && ((b_id >= 0 && b_id == start.a_id)
                    || (edge_b_id >= 0 && edge_b_id == start.edge_a_id)
                    || b == start.a)
            {
                closed = true;
                break;
            }

            let mut next_idx = None;
            if b_id >= 0 {
                next_idx = first_unused(by_a_point.get(&b_id), lines);
            }
            if next_idx.is_none() && edge_b_id >= 0 {
                next_idx = first_unused(by_a_edge.get(&edge_b_id), lines);
            }
            if next_idx.is_none() {
                next_idx = first_unused(by_a_coord.get(&(b.x, b.y)), lines);
            }
            if next_idx.is_none() {
                // Looser coordinate matching, ~10 nanometers.
                let tolerance: Coord = 10;
                next_idx = lines.iter().position(|line| {
                    !line.used
                        && (line.a.x - b.x).abs() <= tolerance
                        && (line.a.y - b.y).abs() <= tolerance
                });
            }

            match next_idx {
                Some(idx) => {
                    current_idx = idx;
                    lines[current_idx].used = true;
                }
                None => break,
            }
        }

        // Open chains come from non-manifold input; keep them if they still
        // enclose something, the fill rule sorts them out.
        if points.len() >= 3 {
            if !closed {
                log::trace!("Unclosed slice loop with {} points", points.len());
            }
            polygons.push(Polygon::from_points(points));
        }
    }

    polygons
}

/// Turn raw loops into expolygons according to the slicing mode.
fn make_expolygons(mut loops: Vec<Polygon>, mode: SlicingMode) -> ExPolygons {
    loops.retain(|p| p.signed_area() != 0.0);
    if loops.is_empty() {
        return Vec::new();
    }

    match mode {
        SlicingMode::Regular => union_polygons(&loops),
        SlicingMode::EvenOdd => {
            // Orientation by nesting depth: even depth is solid.
            let depths: Vec<usize> = loops
                .iter()
                .enumerate()
                .map(|(i, poly)| {
                    let probe = poly[0];
                    loops
                        .iter()
                        .enumerate()
                        .filter(|(j, other)| *j != i && other.contains_point(&probe))
                        .count()
                })
                .collect();
            for (poly, depth) in loops.iter_mut().zip(depths) {
                if depth % 2 == 0 {
                    poly.make_counter_clockwise();
                } else {
                    poly.make_clockwise();
                }
            }
            union_polygons(&loops)
        }
        SlicingMode::Positive | SlicingMode::PositiveLargestContour => {
            for poly in &mut loops {
                poly.make_counter_clockwise();
            }
            let mut result = union_polygons(&loops);
            for ex in &mut result {
                ex.holes.clear();
            }
            if mode == SlicingMode::PositiveLargestContour {
                let largest = result
                    .into_iter()
                    .max_by(|a, b| a.area().total_cmp(&b.area()));
                return largest.into_iter().collect();
            }
            result
        }
    }
}

/// Slice a mesh at multiple Z heights, returning ExPolygons for each height.
///
/// `cancel` is polled once per layer; a positive answer aborts with
/// [`Error::Cancelled`] and nothing is returned.
pub fn slice_mesh(
    mesh: &TriangleMesh,
    zs: &[CoordF],
    params: &MeshSlicingParams,
    cancel: &(dyn Fn() -> bool + Sync),
) -> Result<Vec<ExPolygons>> {
    let mut all_lines = slice_mesh_to_lines(mesh, zs);

    all_lines
        .par_iter_mut()
        .map(|lines| {
            if cancel() {
                return Err(Error::Cancelled);
            }
            let loops = chain_lines_to_polygons(lines);
            let layer = make_expolygons(loops, params.mode);
            Ok(closing_ex(&layer, params.closing_radius))
        })
        .collect()
}

/// Slice a mesh at a single Z height.
pub fn slice_mesh_at_z(mesh: &TriangleMesh, z: CoordF, params: &MeshSlicingParams) -> ExPolygons {
    slice_mesh(mesh, &[z], params, &|| false)
        .ok()
        .and_then(|mut layers| layers.pop())
        .unwrap_or_default()
}
