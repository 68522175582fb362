//! GPU-resident meshes.
//!
//! A [`Mesh`] owns one buffer per vertex attribute plus an index buffer. It is
//! immutable after upload and shared as `Rc<Mesh>` by every scene element that
//! draws it.

use crate::geometry::{self, GeometryData};
use crate::graphics::{BufferId, BufferKind, Graphics};

/// Vertex input location of positions in every program.
pub const POSITION_LOCATION: u32 = 0;
/// Vertex input location of normals in every program.
pub const NORMAL_LOCATION: u32 = 1;
/// Vertex input location of texture coordinates in every program.
pub const TEX_COORD_LOCATION: u32 = 2;

/// GPU-resident mesh geometry.
///
/// All four buffers always exist: geometry without texture coordinates gets a
/// zero-filled coordinate buffer so any material can draw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mesh {
    pub(crate) positions: BufferId,
    pub(crate) normals: BufferId,
    pub(crate) tex_coords: BufferId,
    pub(crate) indices: BufferId,
    pub(crate) vertex_count: u32,
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Uploads validated geometry.
    pub fn upload(gfx: &mut dyn Graphics, geometry: &GeometryData, label: &str) -> Self {
        let positions = gfx.create_buffer(
            BufferKind::Vertex,
            bytemuck::cast_slice(geometry.vertices()),
            &format!("{} positions", label),
        );
        let normals = gfx.create_buffer(
            BufferKind::Vertex,
            bytemuck::cast_slice(geometry.normals()),
            &format!("{} normals", label),
        );

        let zeros;
        let coords = match geometry.textures() {
            Some(coords) => coords,
            None => {
                zeros = vec![0.0f32; geometry.vertex_count() * 2];
                &zeros[..]
            }
        };
        let tex_coords = gfx.create_buffer(
            BufferKind::Vertex,
            bytemuck::cast_slice(coords),
            &format!("{} tex coords", label),
        );

        let indices = gfx.create_buffer(
            BufferKind::Index,
            bytemuck::cast_slice(geometry.indices()),
            &format!("{} indices", label),
        );

        log::debug!(
            "uploaded mesh '{}' ({} vertices, {} indices)",
            label,
            geometry.vertex_count(),
            geometry.indices().len()
        );

        Self {
            positions,
            normals,
            tex_coords,
            indices,
            vertex_count: geometry.vertex_count() as u32,
            index_count: geometry.indices().len() as u32,
        }
    }

    /// The background quad: 120×100 units at depth -100.
    pub fn background_quad(gfx: &mut dyn Graphics) -> Self {
        Self::upload(gfx, &geometry::background_quad(), "background")
    }

    /// A cube spanning -1..1 on every axis.
    pub fn cube(gfx: &mut dyn Graphics) -> Self {
        Self::upload(gfx, &geometry::cube(), "cube")
    }

    /// A square-based pyramid of height 2.
    pub fn pyramid(gfx: &mut dyn Graphics) -> Self {
        Self::upload(gfx, &geometry::pyramid(), "pyramid")
    }

    /// Buffer bound to the given vertex input location, if any.
    pub fn attribute(&self, location: u32) -> Option<BufferId> {
        match location {
            POSITION_LOCATION => Some(self.positions),
            NORMAL_LOCATION => Some(self.normals),
            TEX_COORD_LOCATION => Some(self.tex_coords),
            _ => None,
        }
    }

    pub fn index_buffer(&self) -> BufferId {
        self.indices
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices drawn for this mesh.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::testing::{Call, Recorder};

    #[test]
    fn upload_creates_four_buffers() {
        let mut gfx = Recorder::new();
        let mesh = Mesh::cube(&mut gfx);

        assert_eq!(gfx.buffers.len(), 4);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
        assert_eq!(gfx.floats(mesh.positions).len(), 72);
        assert_eq!(gfx.indices(mesh.indices)[..6], [0, 1, 2, 0, 2, 3]);
        assert!(matches!(
            gfx.calls.last(),
            Some(Call::CreateBuffer {
                kind: BufferKind::Index,
                len: 72
            })
        ));
    }

    #[test]
    fn missing_tex_coords_are_zero_filled() {
        let geometry = GeometryData::with_computed_normals(
            vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            None,
            vec![0, 1, 2],
        )
        .unwrap();

        let mut gfx = Recorder::new();
        let mesh = Mesh::upload(&mut gfx, &geometry, "tri");
        assert_eq!(gfx.floats(mesh.tex_coords), vec![0.0; 6]);
    }

    #[test]
    fn attributes_by_location() {
        let mut gfx = Recorder::new();
        let mesh = Mesh::background_quad(&mut gfx);
        assert_eq!(mesh.attribute(POSITION_LOCATION), Some(mesh.positions));
        assert_eq!(mesh.attribute(TEX_COORD_LOCATION), Some(mesh.tex_coords));
        assert_eq!(mesh.attribute(7), None);
        assert_eq!(mesh.index_count(), 6);
    }
}
