use super::*;

#[test]
fn bake_state_defaults_to_cancelled() {
    assert_eq!(BakeState::default(), BakeState::Cancelled);
}

#[test]
fn bake_state_serializes_snake_case() {
    let s = serde_json::to_string(&BakeState::Queued).unwrap();
    assert_eq!(s, "\"queued\"");
    let back: BakeState = serde_json::from_str("\"finished\"").unwrap();
    assert_eq!(back, BakeState::Finished);
}

#[test]
fn generated_ids_are_uuid_shaped_and_distinct() {
    let a = StableId::generate();
    let b = StableId::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), 36);
    assert_eq!(a.as_str().as_bytes()[14], b'4');
    assert_eq!(a.as_str().matches('-').count(), 4);
}

#[test]
fn empty_ids_are_rejected() {
    assert!(StableId::new("  ").is_err());
    assert_eq!(StableId::new("abc").unwrap().as_str(), "abc");
}

#[test]
fn hsv_primaries() {
    let red = Rgb::from_hsv(0.0, 1.0, 1.0);
    assert_eq!(red, Rgb::new(1.0, 0.0, 0.0));
    let grey = Rgb::from_hsv(0.3, 0.0, 0.5);
    assert_eq!(grey, Rgb::new(0.5, 0.5, 0.5));
}

#[test]
fn color_set_is_distinct() {
    let colors = generate_color_set(6);
    assert_eq!(colors.len(), 6);
    for (i, a) in colors.iter().enumerate() {
        for b in colors.iter().skip(i + 1) {
            assert_ne!(a, b);
        }
    }
    assert!(generate_color_set(0).is_empty());
}

#[test]
fn elapsed_is_minutes_and_seconds() {
    assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
    assert_eq!(format_elapsed(Duration::from_secs(75)), "01:15");
    assert_eq!(format_elapsed(Duration::from_secs(3725)), "62:05");
}
