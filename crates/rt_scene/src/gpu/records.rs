//! Host-side layouts of data the shaders read
//!
//! All records are `#[repr(C)]` and `Pod` so they can be uploaded with
//! `bytemuck::cast_slice` without copies. Field order matches the GLSL
//! declarations used by the raster and ray-tracing shaders.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Vertex color
    pub color: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex with position and normal only
    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            color: [1.0, 1.0, 1.0],
            tex_coord: [0.0, 0.0],
        }
    }

    /// Stride of one vertex in bytes
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Wavefront-style material
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialData {
    /// Ambient color
    pub ambient: [f32; 3],
    /// Diffuse color
    pub diffuse: [f32; 3],
    /// Specular color
    pub specular: [f32; 3],
    /// Transmittance
    pub transmittance: [f32; 3],
    /// Emission
    pub emission: [f32; 3],
    /// Specular exponent
    pub shininess: f32,
    /// Index of refraction
    pub ior: f32,
    /// Opacity, 1 is opaque
    pub dissolve: f32,
    /// Illumination model
    pub illum: i32,
    /// Texture index, -1 for none
    pub texture_id: i32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            ambient: [0.1, 0.1, 0.1],
            diffuse: [0.7, 0.7, 0.7],
            specular: [1.0, 1.0, 1.0],
            transmittance: [0.0, 0.0, 0.0],
            emission: [0.0, 0.0, 0.0],
            shininess: 0.0,
            ior: 1.0,
            dissolve: 1.0,
            illum: 0,
            texture_id: -1,
        }
    }
}

/// Per-instance description, indexed by the TLAS instance index
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct ObjDesc {
    /// Device address of the vertex buffer
    pub vertex_address: u64,
    /// Device address of the index buffer
    pub index_address: u64,
    /// Device address of the material buffer
    pub material_address: u64,
    /// Device address of the per-triangle material index buffer
    pub material_index_address: u64,
    /// Offset of the model's first texture in the scene texture array
    pub texture_offset: i32,
    /// Explicit padding to 8-byte alignment
    pub _padding: u32,
}

/// Per-instance world matrix for the raster path, column-major
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    /// Column-major 4x4 matrix
    pub matrix: [f32; 16],
}

impl From<&Mat4> for InstanceTransform {
    fn from(matrix: &Mat4) -> Self {
        let mut out = [0.0; 16];
        out.copy_from_slice(matrix.as_slice());
        Self { matrix: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4Ext, Vec3};

    #[test]
    fn test_record_sizes_match_shader_layouts() {
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        assert_eq!(std::mem::size_of::<MaterialData>(), 80);
        assert_eq!(std::mem::size_of::<ObjDesc>(), 40);
        assert_eq!(std::mem::size_of::<InstanceTransform>(), 64);
    }

    #[test]
    fn test_instance_transform_is_column_major() {
        let m = Mat4::translation(&Vec3::new(4.0, 5.0, 6.0));
        let record = InstanceTransform::from(&m);

        assert_eq!(&record.matrix[12..15], &[4.0, 5.0, 6.0]);
        assert_eq!(record.matrix[15], 1.0);
    }
}
