//! STL loading and saving.
//!
//! Loaded meshes are welded (`merge_vertices`) so that connectivity-based
//! operations such as splitting into shells work on them directly.

use super::{Triangle, TriangleMesh};
use crate::geometry::Point3F;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Load a triangle mesh from an ASCII or binary STL file.
pub fn load_stl<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
    let mut bytes = Vec::new();
    File::open(path.as_ref())?.read_to_end(&mut bytes)?;
    let mut mesh = parse_stl(&bytes)?;
    mesh.merge_vertices();
    log::debug!(
        "Loaded {}: {} triangles, {} vertices",
        path.as_ref().display(),
        mesh.triangle_count(),
        mesh.vertex_count()
    );
    Ok(mesh)
}

/// Parse STL data held in memory, without welding.
pub fn parse_stl(bytes: &[u8]) -> Result<TriangleMesh> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else {
        parse_ascii(BufReader::new(bytes))
    }
}

/// A binary file's size is fully determined by the facet count in its
/// header; ASCII files merely tend to start with "solid".
fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ]) as usize;
    let sized_right = bytes.len() == HEADER_LEN + 4 + count * FACET_LEN;
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    sized_right || !bytes[start..].starts_with(b"solid")
}

fn parse_ascii<R: BufRead>(reader: R) -> Result<TriangleMesh> {
    let mut mesh = TriangleMesh::new();
    let mut facet: Vec<Point3F> = Vec::with_capacity(3);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("vertex") => {
                let mut coord = || -> Result<f64> {
                    parts
                        .next()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| Error::Mesh(format!("Invalid vertex on line {}", line_no + 1)))
                };
                let (x, y, z) = (coord()?, coord()?, coord()?);
                facet.push(Point3F::new(x, y, z));
            }
            Some("endfacet") => {
                if facet.len() == 3 {
                    let base = mesh.vertex_count() as u32;
                    for v in facet.drain(..) {
                        mesh.add_vertex(v);
                    }
                    mesh.add_triangle(Triangle::new(base, base + 1, base + 2));
                }
                facet.clear();
            }
            _ => {}
        }
    }

    if mesh.is_empty() {
        return Err(Error::Mesh("No triangles found in STL file".into()));
    }
    Ok(mesh)
}

fn parse_binary(bytes: &[u8]) -> Result<TriangleMesh> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(Error::Mesh("STL file is truncated".into()));
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ]) as usize;
    let body = &bytes[HEADER_LEN + 4..];
    if body.len() < count * FACET_LEN {
        return Err(Error::Mesh(format!(
            "STL file declares {} facets but holds only {}",
            count,
            body.len() / FACET_LEN
        )));
    }

    let mut mesh = TriangleMesh::with_capacity(count * 3, count);
    for facet in body.chunks_exact(FACET_LEN).take(count) {
        // Normal (bytes 0-11) is recomputed from the winding; skip it.
        let base = mesh.vertex_count() as u32;
        mesh.add_vertex(read_vertex(&facet[12..24]));
        mesh.add_vertex(read_vertex(&facet[24..36]));
        mesh.add_vertex(read_vertex(&facet[36..48]));
        mesh.add_triangle(Triangle::new(base, base + 1, base + 2));
    }

    if mesh.is_empty() {
        return Err(Error::Mesh("No triangles found in STL file".into()));
    }
    Ok(mesh)
}

fn read_vertex(data: &[u8]) -> Point3F {
    let f = |i: usize| f32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]) as f64;
    Point3F::new(f(0), f(4), f(8))
}

/// Save a mesh as binary STL (used to export preview and support meshes).
pub fn save_stl<P: AsRef<Path>>(path: P, mesh: &TriangleMesh) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    let mut header = [0u8; HEADER_LEN];
    let tag = b"sla-slicer binary STL";
    header[..tag.len()].copy_from_slice(tag);
    writer.write_all(&header)?;
    writer.write_all(&(mesh.triangle_count() as u32).to_le_bytes())?;

    for i in 0..mesh.triangle_count() {
        let normal = mesh.triangle_normal(i);
        let [v0, v1, v2] = mesh.triangle_vertices(i);
        for p in [normal, v0, v1, v2] {
            for c in [p.x, p.y, p.z] {
                writer.write_all(&(c as f32).to_le_bytes())?;
            }
        }
        writer.write_all(&[0u8, 0u8])?;
    }

    writer.flush()?;
    Ok(())
}

/// Save a mesh as ASCII STL.
pub fn save_stl_ascii<P: AsRef<Path>>(path: P, mesh: &TriangleMesh) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);

    writeln!(writer, "solid mesh")?;
    for i in 0..mesh.triangle_count() {
        let n = mesh.triangle_normal(i);
        writeln!(writer, "  facet normal {} {} {}", n.x, n.y, n.z)?;
        writeln!(writer, "    outer loop")?;
        for v in mesh.triangle_vertices(i) {
            writeln!(writer, "      vertex {} {} {}", v.x, v.y, v.z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid mesh")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_ascii_stl() {
        let stl_content = r#"solid test
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 1 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid test"#;

        let mesh = parse_stl(stl_content.as_bytes()).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 6);
    }

    #[test]
    fn test_parse_ascii_bad_vertex() {
        let stl = "solid t\nfacet normal 0 0 1\nouter loop\nvertex 0 x 0\n";
        assert!(matches!(parse_stl(stl.as_bytes()), Err(Error::Mesh(_))));
    }

    #[test]
    fn test_load_welds_binary_cube() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        save_stl(&path, &TriangleMesh::cube(10.0)).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.triangle_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
        assert!((loaded.volume() - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_load_ascii_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cube_ascii.stl");
        save_stl_ascii(&path, &TriangleMesh::cube(4.0)).unwrap();

        let loaded = load_stl(&path).unwrap();
        assert_eq!(loaded.triangle_count(), 12);
        assert!(!loaded.is_splittable());
    }
}
