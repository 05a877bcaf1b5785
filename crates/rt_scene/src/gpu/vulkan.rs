//! Vulkan record conversion
//!
//! Translates the backend-neutral build inputs into the `ash` structures a
//! `VK_KHR_acceleration_structure` implementation submits. Nothing here
//! touches a device; the functions only fill plain structs.

use ash::vk;

use crate::scene::{BlasInput, TlasInstance, TlasInstanceList};

use super::{BufferUsage, BuildFlags};

/// Buffer usage flags for `vkCreateBuffer`
pub fn buffer_usage_flags(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::SHADER_DEVICE_ADDRESS) {
        flags |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
    }
    if usage.contains(BufferUsage::ACCELERATION_STRUCTURE_BUILD_INPUT) {
        flags |= vk::BufferUsageFlags::ACCELERATION_STRUCTURE_BUILD_INPUT_READ_ONLY_KHR;
    }
    flags
}

/// Build flags for `vkCmdBuildAccelerationStructuresKHR`
pub fn build_flags(flags: BuildFlags) -> vk::BuildAccelerationStructureFlagsKHR {
    let mut out = vk::BuildAccelerationStructureFlagsKHR::empty();
    if flags.contains(BuildFlags::PREFER_FAST_TRACE) {
        out |= vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE;
    }
    if flags.contains(BuildFlags::PREFER_FAST_BUILD) {
        out |= vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_BUILD;
    }
    if flags.contains(BuildFlags::ALLOW_UPDATE) {
        out |= vk::BuildAccelerationStructureFlagsKHR::ALLOW_UPDATE;
    }
    out
}

/// Triangle geometry and build range of one BLAS
///
/// Vertex positions are read as `R32G32B32_SFLOAT` from the start of each
/// vertex; indices are `u32`.
pub fn blas_geometry(
    input: &BlasInput,
) -> (vk::AccelerationStructureGeometryKHR, vk::AccelerationStructureBuildRangeInfoKHR) {
    let triangles = vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
        .vertex_format(vk::Format::R32G32B32_SFLOAT)
        .vertex_data(vk::DeviceOrHostAddressConstKHR {
            device_address: input.vertex_address,
        })
        .vertex_stride(input.vertex_stride)
        .max_vertex(input.max_vertex)
        .index_type(vk::IndexType::UINT32)
        .index_data(vk::DeviceOrHostAddressConstKHR {
            device_address: input.index_address,
        })
        .build();

    let geometry_flags = if input.opaque {
        vk::GeometryFlagsKHR::OPAQUE
    } else {
        vk::GeometryFlagsKHR::empty()
    };

    let geometry = vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(vk::GeometryTypeKHR::TRIANGLES)
        .geometry(vk::AccelerationStructureGeometryDataKHR { triangles })
        .flags(geometry_flags)
        .build();

    let range = vk::AccelerationStructureBuildRangeInfoKHR::builder()
        .primitive_count(input.primitive_count)
        .primitive_offset(0)
        .first_vertex(0)
        .transform_offset(0)
        .build();

    (geometry, range)
}

/// Instance record as laid out in the TLAS instance buffer
pub fn tlas_instance_record(instance: &TlasInstance) -> vk::AccelerationStructureInstanceKHR {
    let flags = if instance.cull_disable {
        vk::GeometryInstanceFlagsKHR::TRIANGLE_FACING_CULL_DISABLE
    } else {
        vk::GeometryInstanceFlagsKHR::empty()
    };

    vk::AccelerationStructureInstanceKHR {
        transform: vk::TransformMatrixKHR {
            matrix: instance.row_major_transform(),
        },
        instance_custom_index_and_mask: vk::Packed24_8::new(
            instance.instance_index,
            instance.mask,
        ),
        instance_shader_binding_table_record_offset_and_flags: vk::Packed24_8::new(
            instance.hit_group_offset,
            flags.as_raw() as u8,
        ),
        acceleration_structure_reference: vk::AccelerationStructureReferenceKHR {
            device_handle: instance.blas.device_address,
        },
    }
}

/// Instance buffer contents for a whole list, in list order
pub fn tlas_instance_records(list: &TlasInstanceList) -> Vec<vk::AccelerationStructureInstanceKHR> {
    list.iter().map(tlas_instance_record).collect()
}
