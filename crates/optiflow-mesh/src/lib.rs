#![forbid(unsafe_code)]

//! Face-indexed geometry parsing and vertex deduplication.
//!
//! This crate is **contract-only**: no GL handles. It turns a `v`/`vt`/`vn`/`f`
//! geometry description into an interleaved vertex buffer where every distinct
//! (position, uv, normal) triple appears once, plus an index buffer with one
//! entry per face corner.
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

use std::collections::HashMap;
use std::path::Path;

use optiflow_core::EngineError;

/// Floats per interleaved vertex: position(3) + uv(2) + normal(3).
pub const FLOATS_PER_VERTEX: usize = 8;

/// Builtin full-screen quad (two counter-clockwise triangles over [-1, 1]²).
pub const QUAD_OBJ: &str = include_str!("../assets/quad_uv.obj");

/// One face corner, 0-based indices into the source arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Corner {
    pub position: u32,
    pub uv: u32,
    pub normal: u32,
}

impl Corner {
    fn key(self) -> [u32; 3] {
        [self.position, self.uv, self.normal]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    /// 1-based line of the `f` record.
    pub line: usize,
    pub corners: Vec<Corner>,
}

/// Parsed geometry with all indices validated against the source arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Geometry {
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    normals: Vec<[f32; 3]>,
    faces: Vec<Face>,
}

/// Deduplicated GPU-ready buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl IndexedMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / FLOATS_PER_VERTEX
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Interleaved tuple for vertex `slot`.
    pub fn vertex(&self, slot: usize) -> &[f32] {
        &self.vertices[slot * FLOATS_PER_VERTEX..(slot + 1) * FLOATS_PER_VERTEX]
    }
}

impl Geometry {
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn corner_count(&self) -> usize {
        self.faces.iter().map(|f| f.corners.len()).sum()
    }

    /// Builds the deduplicated vertex/index buffers.
    ///
    /// Slots are assigned in first-seen corner order, so the output depends only
    /// on the input and is bit-identical across runs.
    pub fn index(&self) -> IndexedMesh {
        let corners = self.corner_count();
        let mut slots: HashMap<[u32; 3], u32> = HashMap::with_capacity(corners);
        let mut vertices = Vec::with_capacity(corners * FLOATS_PER_VERTEX);
        let mut indices = Vec::with_capacity(corners);

        for corner in self.faces.iter().flat_map(|f| f.corners.iter().copied()) {
            let slot = *slots.entry(corner.key()).or_insert_with(|| {
                let slot = (vertices.len() / FLOATS_PER_VERTEX) as u32;
                // Indices were range-checked at parse time.
                vertices.extend_from_slice(&self.positions[corner.position as usize]);
                vertices.extend_from_slice(&self.uvs[corner.uv as usize]);
                vertices.extend_from_slice(&self.normals[corner.normal as usize]);
                slot
            });
            indices.push(slot);
        }

        tracing::debug!(
            corners,
            unique = vertices.len() / FLOATS_PER_VERTEX,
            "indexed geometry"
        );

        IndexedMesh { vertices, indices }
    }
}

fn parse_floats<const N: usize>(
    line: usize,
    tag: &str,
    fields: &[&str],
) -> Result<[f32; N], EngineError> {
    if fields.len() != N {
        return Err(EngineError::format(
            line,
            format!("`{tag}` expects {N} values, found {}", fields.len()),
        ));
    }
    let mut out = [0.0f32; N];
    for (slot, field) in out.iter_mut().zip(fields) {
        *slot = field.parse::<f32>().map_err(|_| {
            EngineError::format(line, format!("`{tag}` field `{field}` is not a number"))
        })?;
    }
    Ok(out)
}

fn parse_index(line: usize, field: &str, what: &str) -> Result<u32, EngineError> {
    let one_based: u32 = field.parse().map_err(|_| {
        EngineError::format(line, format!("{what} index `{field}` is not a positive integer"))
    })?;
    one_based
        .checked_sub(1)
        .ok_or_else(|| EngineError::format(line, format!("{what} index must be 1-based, got 0")))
}

fn parse_corner(line: usize, token: &str) -> Result<Corner, EngineError> {
    let parts: Vec<&str> = token.split('/').collect();
    if parts.len() != 3 {
        return Err(EngineError::format(
            line,
            format!("face corner `{token}` must be `pos/uv/normal`"),
        ));
    }
    Ok(Corner {
        position: parse_index(line, parts[0], "position")?,
        uv: parse_index(line, parts[1], "uv")?,
        normal: parse_index(line, parts[2], "normal")?,
    })
}

/// Parses a geometry description.
///
/// Index ranges are checked once the whole text is read, so faces may
/// reference records that appear later in the file.
pub fn parse_geometry(text: &str) -> Result<Geometry, EngineError> {
    let mut geo = Geometry::default();

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let mut tokens = raw.split_whitespace();
        let Some(tag) = tokens.next() else {
            continue;
        };
        let fields: Vec<&str> = tokens.collect();

        match tag {
            "v" => geo.positions.push(parse_floats::<3>(line, tag, &fields)?),
            "vt" => geo.uvs.push(parse_floats::<2>(line, tag, &fields)?),
            "vn" => geo.normals.push(parse_floats::<3>(line, tag, &fields)?),
            "f" => {
                let corners = fields
                    .iter()
                    .map(|t| parse_corner(line, t))
                    .collect::<Result<Vec<_>, _>>()?;
                geo.faces.push(Face { line, corners });
            }
            _ => {}
        }
    }

    geo.check_ranges()?;
    Ok(geo)
}

/// Reads and parses a geometry file.
pub fn load_geometry(path: impl AsRef<Path>) -> Result<Geometry, EngineError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_geometry(&text)
}

/// The builtin quad, already indexed.
pub fn quad() -> Result<IndexedMesh, EngineError> {
    Ok(parse_geometry(QUAD_OBJ)?.index())
}

impl Geometry {
    fn check_ranges(&self) -> Result<(), EngineError> {
        let limits = [
            ("position", self.positions.len()),
            ("uv", self.uvs.len()),
            ("normal", self.normals.len()),
        ];
        for face in &self.faces {
            for c in &face.corners {
                for ((what, len), idx) in limits.iter().zip(c.key()) {
                    if idx as usize >= *len {
                        return Err(EngineError::format(
                            face.line,
                            format!("{what} index {} out of range (have {len})", idx + 1),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
