use super::*;

#[test]
fn new_entries_start_cancelled_and_enabled() {
    let t = TextureEntry::of_type(TextureType::Ao);
    assert!(t.enabled);
    assert_eq!(t.state, BakeState::Cancelled);
    assert_eq!(t.last_bake_time, NO_BAKE_TIME);
    let m = MeshEntry::new("Crate_low");
    assert!(m.enabled);
    assert_eq!(m.state, BakeState::Cancelled);
}

#[test]
fn enabled_filters_keep_order() {
    let mut set = TextureSet::new("crate");
    set.meshes = vec![
        MeshEntry::new("a"),
        MeshEntry::new("b"),
        MeshEntry::new("c"),
    ];
    set.meshes[1].enabled = false;
    let names: Vec<_> = set.enabled_meshes().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn lookup_by_stable_id_survives_rename() {
    let mut set = TextureSet::new("crate");
    let tex = TextureEntry::of_type(TextureType::Diffuse);
    let id = tex.id.clone();
    set.textures.push(tex);
    set.display_name = "barrel".to_string();
    assert!(set.texture(&id).is_some());
    set.texture_mut(&id).unwrap().state = BakeState::Queued;
    assert_eq!(set.textures[0].state, BakeState::Queued);
}

#[test]
fn mark_meshes_ignores_unknown_names() {
    let mut set = TextureSet::new("crate");
    set.meshes.push(MeshEntry::new("a"));
    set.mark_meshes(["a", "ghost"], BakeState::Finished);
    assert_eq!(set.meshes[0].state, BakeState::Finished);
}

#[test]
fn minimal_json_gets_ids_and_defaults() {
    let set: TextureSet = serde_json::from_str(
        r#"{"display_name":"crate","textures":[{"settings":{"type":"diffuse"}}],"meshes":[{"name":"m"}]}"#,
    )
    .unwrap();
    assert_eq!(set.mode, BakeMode::Single);
    assert!(!set.id.as_str().is_empty());
    assert!(set.textures[0].enabled);
    assert!(set.create_materials.assign_to_objects);
    assert!(set.create_materials.template.is_none());
}
