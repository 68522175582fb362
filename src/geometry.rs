//! CPU-side geometry and the mesh file parsers.
//!
//! [`GeometryData`] is the validated form every mesh passes through before it is
//! uploaded: flat position triples, flat normal triples, optional texture
//! coordinate pairs and 16-bit triangle indices.
//!
//! # Supported Formats
//!
//! | Format | Parser | Notes |
//! |--------|--------|-------|
//! | Wavefront OBJ | [`parse_obj`] | Triangulated, single index; normals computed when absent |
//! | JSON | [`parse_json`] | `vertices`, optional `vertexNormals` or `normals`, optional `textures`, `indices` |

use glam::Vec3;
use serde::Deserialize;

/// Largest vertex count addressable with 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize;

/// Errors that can occur when building geometry.
#[derive(Debug)]
pub enum MeshError {
    /// The OBJ text could not be parsed.
    Obj(tobj::LoadError),
    /// The JSON descriptor could not be parsed.
    Json(serde_json::Error),
    /// The position array is not made of whole xyz triples.
    MalformedVertices(usize),
    /// A per-vertex attribute does not match the vertex count.
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An index refers past the last vertex.
    IndexOutOfRange { index: u32, vertex_count: usize },
    /// The mesh has more vertices than 16-bit indices can address.
    TooManyVertices(usize),
}

impl std::fmt::Display for MeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshError::Obj(e) => write!(f, "OBJ parse error: {}", e),
            MeshError::Json(e) => write!(f, "JSON parse error: {}", e),
            MeshError::MalformedVertices(len) => {
                write!(f, "vertex array length {} is not a multiple of 3", len)
            }
            MeshError::AttributeLength {
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "{} array has {} components, expected {}",
                attribute, actual, expected
            ),
            MeshError::IndexOutOfRange {
                index,
                vertex_count,
            } => write!(
                f,
                "index {} out of range for {} vertices",
                index, vertex_count
            ),
            MeshError::TooManyVertices(count) => write!(
                f,
                "mesh has {} vertices, at most {} fit 16-bit indices",
                count, MAX_VERTICES
            ),
        }
    }
}

impl std::error::Error for MeshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeshError::Obj(e) => Some(e),
            MeshError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tobj::LoadError> for MeshError {
    fn from(e: tobj::LoadError) -> Self {
        MeshError::Obj(e)
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(e: serde_json::Error) -> Self {
        MeshError::Json(e)
    }
}

/// Validated geometry ready for upload.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryData {
    vertices: Vec<f32>,
    normals: Vec<f32>,
    textures: Option<Vec<f32>>,
    indices: Vec<u16>,
}

impl GeometryData {
    /// Validates raw arrays and narrows the indices to 16 bits.
    pub fn new(
        vertices: Vec<f32>,
        normals: Vec<f32>,
        textures: Option<Vec<f32>>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        if vertices.len() % 3 != 0 {
            return Err(MeshError::MalformedVertices(vertices.len()));
        }

        let vertex_count = vertices.len() / 3;
        if vertex_count > MAX_VERTICES {
            return Err(MeshError::TooManyVertices(vertex_count));
        }

        if normals.len() != vertices.len() {
            return Err(MeshError::AttributeLength {
                attribute: "normals",
                expected: vertices.len(),
                actual: normals.len(),
            });
        }

        if let Some(textures) = &textures {
            if textures.len() != vertex_count * 2 {
                return Err(MeshError::AttributeLength {
                    attribute: "textures",
                    expected: vertex_count * 2,
                    actual: textures.len(),
                });
            }
        }

        let indices = indices
            .into_iter()
            .map(|index| {
                if (index as usize) < vertex_count {
                    Ok(index as u16)
                } else {
                    Err(MeshError::IndexOutOfRange {
                        index,
                        vertex_count,
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vertices,
            normals,
            textures,
            indices,
        })
    }

    /// Builds geometry from positions and indices, computing smooth normals.
    pub fn with_computed_normals(
        vertices: Vec<f32>,
        textures: Option<Vec<f32>>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let normals = vec![0.0; vertices.len()];
        let mut geometry = Self::new(vertices, normals, textures, indices)?;
        geometry.recalculate_normals();
        Ok(geometry)
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn textures(&self) -> Option<&[f32]> {
        self.textures.as_deref()
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Recalculates vertex normals from face geometry.
    ///
    /// Each vertex gets the normalized sum of the (area weighted) normals of
    /// the triangles that share it.
    pub fn recalculate_normals(&mut self) {
        let position = |i: usize| Vec3::from_slice(&self.vertices[i * 3..i * 3 + 3]);
        let mut accumulated = vec![Vec3::ZERO; self.vertex_count()];

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let face_normal = (position(i1) - position(i0)).cross(position(i2) - position(i0));
            for i in [i0, i1, i2] {
                accumulated[i] += face_normal;
            }
        }

        self.normals = accumulated
            .into_iter()
            .flat_map(|n| n.normalize_or_zero().to_array())
            .collect();
    }
}

/// Parses Wavefront OBJ text.
///
/// All models in the file are merged into one geometry. Material libraries are
/// not followed. Normals are computed when any model lacks them, and missing
/// texture coordinates are dropped for the whole mesh.
pub fn parse_obj(text: &str) -> Result<GeometryData, MeshError> {
    let mut reader = std::io::BufReader::new(text.as_bytes());
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &tobj::GPU_LOAD_OPTIONS, |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;

    let has_normals = models.iter().all(|m| !m.mesh.normals.is_empty());
    let has_textures = models.iter().all(|m| !m.mesh.texcoords.is_empty());

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut textures = Vec::new();
    let mut indices = Vec::new();

    for model in &models {
        let mesh = &model.mesh;
        log::debug!(
            "OBJ model '{}': {} vertices, {} indices",
            model.name,
            mesh.positions.len() / 3,
            mesh.indices.len()
        );

        let base = (vertices.len() / 3) as u32;
        vertices.extend_from_slice(&mesh.positions);
        if has_normals {
            normals.extend_from_slice(&mesh.normals);
        }
        if has_textures {
            textures.extend_from_slice(&mesh.texcoords);
        }
        indices.extend(mesh.indices.iter().map(|i| base + i));
    }

    let textures = has_textures.then_some(textures);
    if has_normals {
        GeometryData::new(vertices, normals, textures, indices)
    } else {
        GeometryData::with_computed_normals(vertices, textures, indices)
    }
}

#[derive(Deserialize)]
struct JsonGeometry {
    vertices: Vec<f32>,
    #[serde(default)]
    normals: Option<Vec<f32>>,
    #[serde(default, rename = "vertexNormals")]
    vertex_normals: Option<Vec<f32>>,
    #[serde(default)]
    textures: Option<Vec<f32>>,
    indices: Vec<u32>,
}

/// Parses a JSON geometry descriptor.
///
/// `vertexNormals` wins over `normals` when both are present. Normals are
/// computed from the faces when neither is.
pub fn parse_json(text: &str) -> Result<GeometryData, MeshError> {
    let raw: JsonGeometry = serde_json::from_str(text)?;
    match raw.vertex_normals.or(raw.normals) {
        Some(normals) => GeometryData::new(raw.vertices, normals, raw.textures, raw.indices),
        None => GeometryData::with_computed_normals(raw.vertices, raw.textures, raw.indices),
    }
}

/// A large textured quad placed far behind the scene.
pub fn background_quad() -> GeometryData {
    let (half_w, half_h, depth) = (60.0, 50.0, -100.0);
    GeometryData {
        vertices: vec![
            -half_w, half_h, depth, //
            half_w, half_h, depth, //
            -half_w, -half_h, depth, //
            half_w, -half_h, depth,
        ],
        normals: [0.0, 0.0, 1.0].repeat(4),
        textures: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
        indices: vec![0, 2, 3, 0, 3, 1],
    }
}

/// A cube spanning -1..1 on every axis, four vertices per face.
pub fn cube() -> GeometryData {
    #[rustfmt::skip]
    let vertices = vec![
        // front
        -1.0, -1.0, 1.0,   1.0, -1.0, 1.0,   1.0, 1.0, 1.0,   -1.0, 1.0, 1.0,
        // back
        -1.0, -1.0, -1.0,  -1.0, 1.0, -1.0,  1.0, 1.0, -1.0,  1.0, -1.0, -1.0,
        // top
        -1.0, 1.0, -1.0,   -1.0, 1.0, 1.0,   1.0, 1.0, 1.0,   1.0, 1.0, -1.0,
        // bottom
        -1.0, -1.0, -1.0,  1.0, -1.0, -1.0,  1.0, -1.0, 1.0,  -1.0, -1.0, 1.0,
        // right
        1.0, -1.0, -1.0,   1.0, 1.0, -1.0,   1.0, 1.0, 1.0,   1.0, -1.0, 1.0,
        // left
        -1.0, -1.0, -1.0,  -1.0, -1.0, 1.0,  -1.0, 1.0, 1.0,  -1.0, 1.0, -1.0,
    ];

    let face_normals = [
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
    ];
    let normals = face_normals
        .iter()
        .flat_map(|n| n.repeat(4))
        .collect::<Vec<f32>>();

    let textures = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0].repeat(6);

    let indices = (0..6u16)
        .flat_map(|face| {
            let b = face * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect();

    GeometryData {
        vertices,
        normals,
        textures: Some(textures),
        indices,
    }
}

/// A square-based pyramid with flat shaded faces.
pub fn pyramid() -> GeometryData {
    #[rustfmt::skip]
    let vertices = vec![
        // front
        0.0, 1.0, 0.0,   -1.0, -1.0, 1.0,   1.0, -1.0, 1.0,
        // right
        0.0, 1.0, 0.0,   1.0, -1.0, 1.0,    1.0, -1.0, -1.0,
        // back
        0.0, 1.0, 0.0,   1.0, -1.0, -1.0,   -1.0, -1.0, -1.0,
        // left
        0.0, 1.0, 0.0,   -1.0, -1.0, -1.0,  -1.0, -1.0, 1.0,
        // base
        -1.0, -1.0, 1.0, -1.0, -1.0, -1.0,  1.0, -1.0, 1.0,   1.0, -1.0, -1.0,
    ];

    #[rustfmt::skip]
    let textures = vec![
        0.5, 0.0, 0.0, 1.0, 1.0, 1.0,
        0.5, 0.0, 0.0, 1.0, 1.0, 1.0,
        0.5, 0.0, 0.0, 1.0, 1.0, 1.0,
        0.5, 0.0, 0.0, 1.0, 1.0, 1.0,
        0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0,
    ];

    let mut geometry = GeometryData {
        normals: vec![0.0; vertices.len()],
        vertices,
        textures: Some(textures),
        indices: vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 13, 15, 14],
    };
    geometry.recalculate_normals();
    geometry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<f32>, Vec<f32>) {
        (
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
        )
    }

    #[test]
    fn accepts_consistent_arrays() {
        let (vertices, normals) = triangle();
        let geometry =
            GeometryData::new(vertices, normals, Some(vec![0.0; 6]), vec![0, 1, 2]).unwrap();
        assert_eq!(geometry.vertex_count(), 3);
        assert_eq!(geometry.indices(), &[0, 1, 2]);
    }

    #[test]
    fn rejects_index_past_last_vertex() {
        let (vertices, normals) = triangle();
        let err = GeometryData::new(vertices, normals, None, vec![0, 1, 3]).unwrap_err();
        assert!(matches!(
            err,
            MeshError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        ));
    }

    #[test]
    fn rejects_mismatched_normals() {
        let (vertices, _) = triangle();
        let err = GeometryData::new(vertices, vec![0.0; 6], None, vec![0, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            MeshError::AttributeLength {
                attribute: "normals",
                ..
            }
        ));
    }

    #[test]
    fn vertex_count_boundary() {
        let at_limit = vec![0.0; MAX_VERTICES * 3];
        assert!(GeometryData::new(at_limit.clone(), at_limit, None, vec![65534]).is_ok());

        let over = vec![0.0; 65536 * 3];
        let err = GeometryData::new(over.clone(), over, None, vec![0]).unwrap_err();
        assert!(matches!(err, MeshError::TooManyVertices(65536)));
    }

    #[test]
    fn recalculated_normals_face_outward() {
        let (vertices, _) = triangle();
        let geometry = GeometryData::with_computed_normals(vertices, None, vec![0, 1, 2]).unwrap();
        for n in geometry.normals().chunks(3) {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn json_accepts_either_normals_key() {
        let plain = r#"{"vertices":[0,0,0,1,0,0,0,1,0],"normals":[0,0,1,0,0,1,0,0,1],"indices":[0,1,2]}"#;
        let aliased = r#"{"vertices":[0,0,0,1,0,0,0,1,0],"vertexNormals":[0,0,1,0,0,1,0,0,1],
            "textures":[0,0,1,0,0,1],"indices":[0,1,2]}"#;

        let a = parse_json(plain).unwrap();
        assert!(a.textures().is_none());
        let b = parse_json(aliased).unwrap();
        assert_eq!(a.normals(), b.normals());
        assert_eq!(b.textures().unwrap().len(), 6);
    }

    #[test]
    fn json_prefers_vertex_normals_when_both_keys_are_present() {
        let text = r#"{"vertices":[0,0,0,1,0,0,0,1,0],
            "normals":[1,0,0,1,0,0,1,0,0],
            "vertexNormals":[0,0,1,0,0,1,0,0,1],
            "indices":[0,1,2]}"#;

        let geometry = parse_json(text).unwrap();
        assert_eq!(geometry.normals(), &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn json_without_normals_computes_them() {
        let text = r#"{"vertices":[0,0,0,1,0,0,0,1,0],"indices":[0,1,2]}"#;
        let geometry = parse_json(text).unwrap();
        for n in geometry.normals().chunks(3) {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn json_without_indices_is_an_error() {
        let err = parse_json(r#"{"vertices":[],"normals":[]}"#).unwrap_err();
        assert!(matches!(err, MeshError::Json(_)));
    }

    #[test]
    fn obj_quad_is_triangulated() {
        let text = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";
        let geometry = parse_obj(text).unwrap();
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.indices().len(), 6);
        assert_eq!(geometry.textures().unwrap().len(), 8);
        // No vn lines: normals are computed, facing +Z.
        for n in geometry.normals().chunks(3) {
            assert!((n[2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn obj_models_are_merged() {
        let text = "\
o first
v 0 0 0
v 1 0 0
v 0 1 0
f 1 2 3
o second
v 0 0 1
v 1 0 1
v 0 1 1
f 4 5 6
";
        let geometry = parse_obj(text).unwrap();
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.indices(), &[0, 1, 2, 3, 4, 5]);
        assert!(geometry.textures().is_none());
    }

    #[test]
    fn builtins_are_consistent() {
        for geometry in [background_quad(), cube(), pyramid()] {
            let count = geometry.vertex_count();
            assert_eq!(geometry.normals().len(), count * 3);
            assert_eq!(geometry.textures().unwrap().len(), count * 2);
            assert!(geometry.indices().iter().all(|&i| (i as usize) < count));
        }
        assert_eq!(cube().indices().len(), 36);
        assert_eq!(pyramid().vertex_count(), 16);
    }

    #[test]
    fn pyramid_base_faces_down() {
        let pyramid = pyramid();
        let base_normal = &pyramid.normals()[12 * 3..13 * 3];
        assert!((base_normal[1] + 1.0).abs() < 1e-5);
    }
}
