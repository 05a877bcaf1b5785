//! Procedural meshes
//!
//! Small built-in shapes used by the demo driver and the tests so a scene can
//! be assembled without the OBJ ingestion collaborator.

use crate::gpu::Vertex;

use super::MeshData;

impl MeshData {
    /// Axis-aligned cube centered at the origin, 8 shared vertices and 12
    /// triangles. Right-handed, Y-up.
    pub fn cube(half_extent: f32) -> Self {
        let h = half_extent;
        let vertices = vec![
            // Front face
            Vertex::new([-h, -h, h], [0.0, 0.0, 1.0]),
            Vertex::new([h, -h, h], [0.0, 0.0, 1.0]),
            Vertex::new([h, h, h], [0.0, 0.0, 1.0]),
            Vertex::new([-h, h, h], [0.0, 0.0, 1.0]),
            // Back face
            Vertex::new([-h, -h, -h], [0.0, 0.0, -1.0]),
            Vertex::new([-h, h, -h], [0.0, 0.0, -1.0]),
            Vertex::new([h, h, -h], [0.0, 0.0, -1.0]),
            Vertex::new([h, -h, -h], [0.0, 0.0, -1.0]),
        ];

        let indices = vec![
            // Front
            0, 1, 2, 2, 3, 0,
            // Back
            4, 5, 6, 6, 7, 4,
            // Left
            4, 0, 3, 3, 5, 4,
            // Right
            1, 7, 6, 6, 2, 1,
            // Top
            3, 2, 6, 6, 5, 3,
            // Bottom
            4, 7, 1, 1, 0, 4,
        ];

        Self::new(vertices, indices)
    }

    /// Ground plane on XZ at y = 0 facing +Y
    pub fn plane(half_extent: f32) -> Self {
        let h = half_extent;
        let up = [0.0, 1.0, 0.0];
        let mut vertices = vec![
            Vertex::new([-h, 0.0, -h], up),
            Vertex::new([h, 0.0, -h], up),
            Vertex::new([h, 0.0, h], up),
            Vertex::new([-h, 0.0, h], up),
        ];
        for (vertex, uv) in vertices
            .iter_mut()
            .zip([[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
        {
            vertex.tex_coord = uv;
        }

        Self::new(vertices, vec![0, 2, 1, 2, 0, 3])
    }

    /// Single triangle in the XY plane
    pub fn triangle() -> Self {
        let normal = [0.0, 0.0, 1.0];
        Self::new(
            vec![
                Vertex::new([0.0, 0.0, 0.0], normal),
                Vertex::new([1.0, 0.0, 0.0], normal),
                Vertex::new([0.0, 1.0, 0.0], normal),
            ],
            vec![0, 1, 2],
        )
    }
}
