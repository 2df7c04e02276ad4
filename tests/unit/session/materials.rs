use std::path::PathBuf;

use super::*;
use crate::foundation::core::Rgb;
use crate::host::graph::NodeKind;
use crate::host::sim::SimHost;
use crate::host::{DocumentStore, ImageStore, SceneStore, ShaderGraphStore};
use crate::scene::project::Project;
use crate::scene::settings::TextureType;
use crate::scene::texture_set::{MeshEntry, TextureEntry};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("texbake-unit")
        .join("materials")
        .join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn texture(texture_type: TextureType) -> TextureEntry {
    let mut t = TextureEntry::of_type(texture_type);
    t.settings.size = 64;
    t
}

/// Host with a texture set over `meshes` whose images already exist in the document.
fn fixture(name: &str, mode: BakeMode, meshes: &[&str]) -> (SimHost, StableId) {
    let out = scratch_dir(name);
    let mut set = TextureSet::new("crate");
    set.mode = mode;
    set.meshes = meshes.iter().map(|m| MeshEntry::new(*m)).collect();
    set.textures = vec![texture(TextureType::Diffuse), texture(TextureType::Roughness)];
    set.create_materials.enabled = true;
    let id = set.id.clone();

    let mut host = SimHost::new(Project {
        output_directory: out.clone(),
        texture_sets: vec![set.clone()],
        ..Project::default()
    });
    let old = host
        .add_principled_material("Old", Rgb::new(0.5, 0.5, 0.5))
        .unwrap();
    for mesh in meshes {
        let obj = host.add_object(mesh);
        host.assign_material(obj, 0, Some(old)).unwrap();
        let suffix = (mode == BakeMode::PerObject).then_some(*mesh);
        for t in &set.textures {
            let (name, path) =
                image_name_and_path(&t.settings, &set.display_name, suffix, &out).unwrap();
            let image = host.create_image(&name, 64, 64, false).unwrap();
            host.set_image_filepath(image, &path).unwrap();
        }
    }
    (host, id)
}

fn slot_images(host: &SimHost, material: MaterialId) -> Vec<(String, Option<String>)> {
    host.material_nodes(material)
        .unwrap()
        .into_iter()
        .filter(|n| n.kind == NodeKind::ImageTexture)
        .map(|n| {
            let image = n.image.map(|i| host.image_info(i).unwrap().name);
            (n.name, image)
        })
        .collect()
}

#[test]
fn single_mode_creates_one_material_from_the_sample() {
    let (mut host, id) = fixture("single", BakeMode::Single, &["A", "B"]);
    let created = create_materials(&mut host, &id).unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(host.material_name(created[0]).unwrap(), "crate_baked");
    assert!(host.material_by_name(SAMPLE_MATERIAL).is_some());

    let slots = slot_images(&host, created[0]);
    assert!(slots.contains(&(
        "texture_albedo".to_string(),
        Some("crate_64_diffuse.png".to_string())
    )));
    assert!(slots.contains(&(
        "texture_roughness".to_string(),
        Some("crate_64_roughness.png".to_string())
    )));
    assert!(slots.contains(&("texture_normal".to_string(), None)));

    for mesh in ["A", "B"] {
        let obj = host.object_by_name(mesh).unwrap();
        assert_eq!(host.object_materials(obj).unwrap(), created);
    }
}

#[test]
fn rebaking_recreates_the_material() {
    let (mut host, id) = fixture("recreate", BakeMode::Single, &["A"]);
    let first = create_materials(&mut host, &id).unwrap();
    let second = create_materials(&mut host, &id).unwrap();
    assert_ne!(first, second);
    assert_eq!(host.material_name(second[0]).unwrap(), "crate_baked");
    assert!(host.material_name(first[0]).is_err());
}

#[test]
fn per_object_mode_names_materials_after_meshes() {
    let (mut host, id) = fixture("per-object", BakeMode::PerObject, &["A", "B"]);
    host.project_mut().utils.material_creation.name_prefix = "M_".to_string();
    let created = create_materials(&mut host, &id).unwrap();
    let names: Vec<String> = created
        .iter()
        .map(|m| host.material_name(*m).unwrap())
        .collect();
    assert_eq!(names, vec!["M_A_crate_baked", "M_B_crate_baked"]);

    let b = host.object_by_name("B").unwrap();
    assert_eq!(host.object_materials(b).unwrap(), vec![created[1]]);
    let slots = slot_images(&host, created[1]);
    assert!(slots.contains(&(
        "texture_albedo".to_string(),
        Some("crate_64_diffuse_B.png".to_string())
    )));
}

#[test]
fn existing_materials_can_be_reused() {
    let (mut host, id) = fixture("reuse", BakeMode::Single, &["A"]);
    let old = host.material_by_name("Old").unwrap();
    let slot = host.add_node(old, NodeKind::ImageTexture, "texture_albedo").unwrap();
    let policy = &mut host.project_mut().texture_sets[0].create_materials;
    policy.reuse_existing = true;

    let created = create_materials(&mut host, &id).unwrap();
    assert!(created.is_empty());
    assert!(host.material_by_name("crate_baked").is_none());
    let node = host
        .material_nodes(old)
        .unwrap()
        .into_iter()
        .find(|n| n.id == slot)
        .unwrap();
    let image = host.image_info(node.image.unwrap()).unwrap();
    assert_eq!(image.name, "crate_64_diffuse.png");
}

#[test]
fn template_material_is_copied() {
    let (mut host, id) = fixture("template", BakeMode::Single, &["A"]);
    let template = host.create_material("Template").unwrap();
    host.add_node(template, NodeKind::ImageTexture, "texture_roughness.001")
        .unwrap();
    host.project_mut().texture_sets[0].create_materials.template = Some("Template".into());

    let created = create_materials(&mut host, &id).unwrap();
    assert_eq!(
        slot_images(&host, created[0]),
        vec![(
            "texture_roughness.001".to_string(),
            Some("crate_64_roughness.png".to_string())
        )]
    );
    assert!(host.material_by_name(SAMPLE_MATERIAL).is_none());

    host.project_mut().texture_sets[0].create_materials.template = Some("Gone".into());
    let err = create_materials(&mut host, &id).unwrap_err();
    assert!(matches!(err, BakeError::Validation(_)));
}

#[test]
fn missing_images_are_a_hard_error() {
    let (mut host, id) = fixture("missing", BakeMode::Single, &["A"]);
    let image = host.image_by_name("crate_64_roughness.png").unwrap();
    host.remove_image(image).unwrap();

    let err = create_materials(&mut host, &id).unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("crate_64_roughness.png"));
    assert!(host.material_by_name("crate_baked").is_none());
}

#[test]
fn images_on_disk_are_loaded() {
    let (mut host, id) = fixture("disk", BakeMode::Single, &["A"]);
    let image = host.image_by_name("crate_64_roughness.png").unwrap();
    host.save_image(image).unwrap();
    host.remove_image(image).unwrap();

    let created = create_materials(&mut host, &id).unwrap();
    assert_eq!(created.len(), 1);
    assert!(host.image_by_name("crate_64_roughness.png").is_some());
}

#[test]
fn object_colors_follow_the_palette() {
    let mut host = SimHost::new(Project::default());
    let objects: Vec<ObjectId> = ["A", "B", "C"].iter().map(|n| host.add_object(n)).collect();
    randomize_object_colors(&mut host, &objects).unwrap();
    let palette = generate_color_set(3);
    for (obj, color) in objects.iter().zip(palette) {
        assert_eq!(host.object_color(*obj).unwrap(), color);
    }
}
