use super::*;

#[test]
fn defaults_match_project_defaults() {
    let s = BakeSettings::default();
    assert_eq!(s.texture_type, TextureType::EmitColor);
    assert_eq!(s.size, 512);
    assert_eq!(s.sampling, 1);
    assert_eq!(s.samples, 24);
    assert_eq!(s.margin, 4);
    assert_eq!(s.margin_type, MarginType::Extend);
    assert!(s.match_active_by_suffix);
    assert!(!s.use_selected_to_active);
    s.validate().unwrap();
}

#[test]
fn only_renderer_maps_use_their_own_pass() {
    let own_pass: Vec<_> = TextureType::ALL
        .into_iter()
        .filter(|t| t.info().pass != RenderPass::Emit)
        .collect();
    assert_eq!(
        own_pass,
        vec![
            TextureType::Diffuse,
            TextureType::Roughness,
            TextureType::Normal
        ]
    );
    assert_eq!(TextureType::Normal.info().pass, RenderPass::Normal);
    assert!(TextureType::Normal.info().is_float);
    assert_eq!(TextureType::Aorm.info().pass, RenderPass::Emit);
}

#[test]
fn colorspaces_follow_signal_kind() {
    assert_eq!(TextureType::EmitColor.info().colorspace, Colorspace::Srgb);
    assert_eq!(TextureType::MaterialId.info().colorspace, Colorspace::Srgb);
    assert_eq!(TextureType::Ao.info().colorspace, Colorspace::NonColor);
    assert_eq!(TextureType::Normal.info().colorspace, Colorspace::NonColor);
    assert_eq!(Colorspace::NonColor.as_str(), "Non-Color");
}

#[test]
fn texture_type_parses_keys_and_rejects_unknown() {
    for t in TextureType::ALL {
        assert_eq!(t.key().parse::<TextureType>().unwrap(), t);
    }
    assert_eq!(" AORM ".parse::<TextureType>().unwrap(), TextureType::Aorm);
    let err = "shadow".parse::<TextureType>().unwrap_err();
    assert!(err.to_string().contains("unknown texture type"));
}

#[test]
fn texture_type_serde_uses_keys() {
    let json = serde_json::to_string(&TextureType::UtilsGridUv).unwrap();
    assert_eq!(json, "\"utils_grid_uv\"");
    assert!(serde_json::from_str::<TextureType>("\"bogus\"").is_err());
}

#[test]
fn base_name_expands_template() {
    let mut s = BakeSettings::with_type(TextureType::Diffuse);
    assert_eq!(s.base_name("crate").unwrap(), "crate_512_diffuse");
    s.name_template = "T_{set_name}_{type_full}".to_string();
    assert_eq!(s.base_name("crate").unwrap(), "T_crate_diffuse");
}

#[test]
fn bad_templates_are_rejected() {
    let mut s = BakeSettings::default();
    s.name_template = "{set_name}_{colour}".to_string();
    assert!(s.validate().is_err());
    s.name_template = "{set_name".to_string();
    assert!(s.base_name("x").is_err());
    s.name_template = String::new();
    assert!(s.base_name("x").is_err());
}

#[test]
fn sizes_and_sampling_are_validated() {
    let mut s = BakeSettings::default();
    s.size = 500;
    assert!(s.validate().is_err());
    s.size = 1024;
    s.sampling = 3;
    assert!(s.validate().is_err());
    s.sampling = 4;
    s.validate().unwrap();
    assert_eq!(s.real_size(), 4096);
    assert_eq!(s.real_margin(), 16);
}

#[test]
fn high_to_low_needs_both_flags() {
    let mut s = BakeSettings::default();
    assert!(!s.bake_high_to_low());
    s.use_selected_to_active = true;
    assert!(s.bake_high_to_low());
    s.match_active_by_suffix = false;
    assert!(!s.bake_high_to_low());
}

#[test]
fn partial_json_fills_defaults() {
    let s: BakeSettings = serde_json::from_str(r#"{"type":"ao","size":1024}"#).unwrap();
    assert_eq!(s.texture_type, TextureType::Ao);
    assert_eq!(s.size, 1024);
    assert_eq!(s.samples, 24);
    assert_eq!(s.name_template, DEFAULT_NAME_TEMPLATE);
}
