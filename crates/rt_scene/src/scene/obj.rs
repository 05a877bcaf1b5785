//! Wavefront OBJ ingestion
//!
//! Parsing is delegated to `tobj`; this module only flattens its output into
//! one [`MeshData`] per file.

use std::path::Path;

use crate::error::{SceneError, SceneResult};
use crate::gpu::{MaterialData, Vertex};

use super::model::MeshData;
use super::model_registry::name_from_path;

/// Load every shape of an OBJ file as a single mesh
///
/// Shapes are concatenated in file order. Triangles without a material use
/// material 0, which is a default material when the file has none.
pub fn load_obj(path: &str) -> SceneResult<MeshData> {
    let name = name_from_path(path);
    let invalid = |reason: String| SceneError::InvalidMesh {
        name: name.clone(),
        reason,
    };

    let (models, materials) = tobj::load_obj(Path::new(path), &tobj::GPU_LOAD_OPTIONS)
        .map_err(|e| invalid(format!("failed to parse {path}: {e}")))?;

    let materials: Vec<MaterialData> = match materials {
        Ok(materials) if !materials.is_empty() => materials.iter().map(convert_material).collect(),
        Ok(_) => vec![MaterialData::default()],
        Err(e) => {
            log::warn!("Material library for '{}' not loaded: {}", path, e);
            vec![MaterialData::default()]
        }
    };

    let mut mesh = MeshData {
        materials,
        ..MeshData::default()
    };

    for model in &models {
        let shape = &model.mesh;
        let base = mesh.vertices.len() as u32;

        for i in 0..shape.positions.len() / 3 {
            let mut vertex = Vertex::new(
                [shape.positions[i * 3], shape.positions[i * 3 + 1], shape.positions[i * 3 + 2]],
                [
                    shape.normals.get(i * 3).copied().unwrap_or(0.0),
                    shape.normals.get(i * 3 + 1).copied().unwrap_or(1.0),
                    shape.normals.get(i * 3 + 2).copied().unwrap_or(0.0),
                ],
            );
            if let (Some(&u), Some(&v)) = (shape.texcoords.get(i * 2), shape.texcoords.get(i * 2 + 1)) {
                vertex.tex_coord = [u, 1.0 - v];
            }
            mesh.vertices.push(vertex);
        }

        mesh.indices.extend(shape.indices.iter().map(|&index| base + index));

        let material = shape.material_id.map_or(0, |id| id as i32);
        mesh.material_indices
            .extend(std::iter::repeat(material).take(shape.indices.len() / 3));
    }

    log::debug!(
        "Loaded '{}': {} shapes, {} vertices, {} triangles",
        path,
        models.len(),
        mesh.vertices.len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

fn convert_material(material: &tobj::Material) -> MaterialData {
    let defaults = MaterialData::default();
    MaterialData {
        ambient: material.ambient.unwrap_or(defaults.ambient),
        diffuse: material.diffuse.unwrap_or(defaults.diffuse),
        specular: material.specular.unwrap_or(defaults.specular),
        shininess: material.shininess.unwrap_or(defaults.shininess),
        ior: material.optical_density.unwrap_or(defaults.ior),
        dissolve: material.dissolve.unwrap_or(defaults.dissolve),
        illum: material.illumination_model.map_or(defaults.illum, i32::from),
        ..defaults
    }
}
