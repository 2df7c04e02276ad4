use std::path::{Path, PathBuf};

use super::*;
use crate::bake::manager::{SCRATCH_COLLECTION, SCRATCH_SCENE};
use crate::foundation::core::Rgb;
use crate::host::sim::SimHost;
use crate::host::{DocumentStore, RenderJobs, SceneStore, ShaderGraphStore};
use crate::scene::project::Project;
use crate::scene::settings::TextureType;
use crate::scene::texture_set::{MeshEntry, TextureEntry};
use crate::session::driver::drive;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join("texbake-unit")
        .join("orchestrator")
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

struct Fixture {
    host: SimHost,
    ctx: OrchestratorContext,
    out: PathBuf,
}

fn fixture(name: &str, mode: BakeMode, meshes: &[&str], textures: &[TextureType]) -> Fixture {
    let out = scratch_dir(name);
    let mut set = TextureSet::new("crate");
    set.mode = mode;
    set.meshes = meshes.iter().map(|m| MeshEntry::new(*m)).collect();
    set.textures = textures.iter().map(|t| texture(*t)).collect();

    let mut host = SimHost::new(Project {
        output_directory: out.clone(),
        texture_sets: vec![set],
        ..Project::default()
    });
    let mat = host
        .add_principled_material("Mat", Rgb::new(0.8, 0.4, 0.2))
        .unwrap();
    for name in meshes {
        let obj = host.add_object(name);
        host.assign_material(obj, 0, Some(mat)).unwrap();
    }
    Fixture {
        host,
        ctx: OrchestratorContext::default(),
        out,
    }
}

fn set(f: &Fixture) -> &TextureSet {
    &f.host.project().texture_sets[0]
}

fn texture_states(f: &Fixture) -> Vec<BakeState> {
    set(f).textures.iter().map(|t| t.state).collect()
}

fn mesh_states(f: &Fixture) -> Vec<BakeState> {
    set(f).meshes.iter().map(|m| m.state).collect()
}

fn run(f: &mut Fixture, orchestrator: &mut BakeOrchestrator) -> BakeResult<TickStatus> {
    drive(&mut f.host, &f.ctx, orchestrator, Some(500))
}

fn assert_released(f: &Fixture) {
    assert!(!f.ctx.orchestrator.is_running());
    assert!(!f.ctx.manager.is_running());
    assert!(!f.ctx.tick.is_locked());
    assert!(f.ctx.events.borrow().is_empty());
    assert!(f.ctx.ledger.borrow().is_empty());
    assert!(!f.host.is_job_running());
    assert!(f.host.scene_by_name(SCRATCH_SCENE).is_none());
    assert!(f.host.collection_by_name(SCRATCH_COLLECTION).is_none());
    assert!(f.host.collection_names().is_empty());
}

#[test]
fn single_mode_accumulates_groups_into_one_image_per_texture() {
    let mut f = fixture(
        "single",
        BakeMode::Single,
        &["A", "B", "C"],
        &[TextureType::Diffuse, TextureType::EmitColor],
    );
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(texture_states(&f), vec![BakeState::Queued; 2]);

    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);
    assert_eq!(o.jobs_started(), 6);
    let clears: Vec<bool> = f.host.bakes().iter().map(|b| b.use_clear).collect();
    assert_eq!(clears, vec![true, false, false, true, false, false]);
    let images: Vec<&str> = f.host.bakes().iter().map(|b| b.image.as_str()).collect();
    assert_eq!(
        images,
        vec![
            "crate_64_diffuse.png",
            "crate_64_diffuse.png",
            "crate_64_diffuse.png",
            "crate_64_color.png",
            "crate_64_color.png",
            "crate_64_color.png",
        ]
    );

    assert_eq!(texture_states(&f), vec![BakeState::Finished; 2]);
    assert_eq!(mesh_states(&f), vec![BakeState::Finished; 3]);
    assert!(set(&f).textures.iter().all(|t| t.last_bake_time == "00:00"));
    assert!(f.out.join("crate").join("crate_64_diffuse.png").is_file());
    assert!(f.out.join("crate").join("crate_64_color.png").is_file());
    assert_released(&f);
    assert_eq!(o.outcome(), Some(TickStatus::Finished));
}

#[test]
fn per_object_mode_bakes_one_image_per_mesh() {
    let mut f = fixture(
        "per-object",
        BakeMode::PerObject,
        &["A", "B"],
        &[TextureType::Diffuse],
    );
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);

    let bakes = f.host.bakes();
    assert_eq!(bakes.len(), 2);
    assert!(bakes.iter().all(|b| b.use_clear));
    assert_eq!(bakes[0].image, "crate_64_diffuse_A.png");
    assert_eq!(bakes[1].image, "crate_64_diffuse_B.png");
    assert!(f.out.join("crate").join("crate_64_diffuse_B.png").is_file());
    assert_released(&f);
}

#[test]
fn escape_cancels_the_run_and_everything_still_queued() {
    let mut f = fixture(
        "escape",
        BakeMode::Single,
        &["A", "B"],
        &[TextureType::EmitColor, TextureType::Diffuse],
    );
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(
        o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap(),
        TickStatus::Running
    );
    assert!(f.host.is_job_running());
    assert_eq!(mesh_states(&f), vec![BakeState::Running, BakeState::Queued]);
    assert_eq!(
        o.tick(&mut f.host, &f.ctx, LoopEvent::Other).unwrap(),
        TickStatus::Running
    );

    assert_eq!(
        o.tick(&mut f.host, &f.ctx, LoopEvent::Escape).unwrap(),
        TickStatus::Cancelled
    );
    assert_eq!(texture_states(&f), vec![BakeState::Cancelled; 2]);
    assert_eq!(mesh_states(&f), vec![BakeState::Cancelled; 2]);
    assert_released(&f);
    let mat = f.host.material_by_name("Mat").unwrap();
    assert!(
        f.host
            .material_nodes(mat)
            .unwrap()
            .iter()
            .all(|n| !n.name.starts_with(crate::material::editor::NODE_PREFIX))
    );

    assert_eq!(
        o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap(),
        TickStatus::Cancelled
    );
    o.cancel(&mut f.host, &f.ctx);
}

#[test]
fn finished_groups_keep_their_state_on_cancel() {
    let mut f = fixture(
        "partial",
        BakeMode::Single,
        &["A", "B"],
        &[TextureType::Diffuse],
    );
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    while f.host.bakes().len() < 2 {
        o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap();
    }
    o.cancel(&mut f.host, &f.ctx);
    assert_eq!(mesh_states(&f), vec![BakeState::Finished, BakeState::Cancelled]);
    assert_eq!(texture_states(&f), vec![BakeState::Cancelled]);
    assert_eq!(o.outcome(), Some(TickStatus::Cancelled));
    assert_released(&f);
}

#[test]
fn start_is_rejected_while_something_is_running() {
    let mut f = fixture("busy", BakeMode::Single, &["A"], &[TextureType::Diffuse]);
    let mut first = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap_err();
    assert!(err.is_precondition());
    first.cancel(&mut f.host, &f.ctx);

    f.ctx.manager.acquire().unwrap();
    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap_err();
    assert!(err.is_precondition());
    f.ctx.manager.release();
    assert!(BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).is_ok());
}

#[test]
fn nothing_to_bake_fails_without_touching_states() {
    let mut f = fixture("empty", BakeMode::Single, &["A"], &[TextureType::Diffuse]);
    let set = &mut f.host.project_mut().texture_sets[0];
    set.textures[0].enabled = false;
    set.textures[0].state = BakeState::Finished;

    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("no enabled textures"));
    assert_eq!(texture_states(&f), vec![BakeState::Finished]);
    assert!(!f.ctx.orchestrator.is_running());

    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "nope", None).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn single_texture_may_be_baked_on_its_own() {
    let mut f = fixture(
        "one-texture",
        BakeMode::Single,
        &["A"],
        &[TextureType::Diffuse, TextureType::Normal],
    );
    let normal = set(&f).textures[1].id.clone();
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", Some(&normal)).unwrap();
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);
    assert_eq!(f.host.bakes().len(), 1);
    assert_eq!(f.host.bakes()[0].image, "crate_64_normalgl.png");
    assert_eq!(
        texture_states(&f),
        vec![BakeState::Cancelled, BakeState::Finished]
    );

    let missing = StableId::new("missing").unwrap();
    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", Some(&missing)).unwrap_err();
    assert!(err.is_precondition());
}

fn high_to_low(f: &mut Fixture) {
    for t in &mut f.host.project_mut().texture_sets[0].textures {
        t.settings.use_selected_to_active = true;
    }
}

#[test]
fn missing_high_poly_is_fatal_per_object_only() {
    let meshes = ["Foo_low", "Foo_high", "Bar_low"];
    let mut f = fixture("per-object-high", BakeMode::PerObject, &meshes, &[TextureType::Diffuse]);
    high_to_low(&mut f);
    let err = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("Bar_low"));
    assert!(!f.ctx.orchestrator.is_running());

    let mut f = fixture("single-high", BakeMode::Single, &meshes, &[TextureType::Diffuse]);
    high_to_low(&mut f);
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);
    let bakes = f.host.bakes();
    assert_eq!(bakes.len(), 2);
    assert_eq!(bakes[0].active, "Foo_low");
    assert_eq!(bakes[0].selected, vec!["Foo_low", "Foo_high"]);
    assert_eq!(bakes[1].selected, vec!["Bar_low"]);
}

#[test]
fn debug_pause_holds_between_groups() {
    let mut f = fixture("pause", BakeMode::Single, &["A", "B"], &[TextureType::Diffuse]);
    f.host.project_mut().utils.debug_pause = true;
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    for _ in 0..5 {
        assert_eq!(
            o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap(),
            TickStatus::Running
        );
    }
    assert!(f.host.bakes().is_empty());

    f.host.project_mut().utils.debug_pause_continue = true;
    o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap();
    assert_eq!(f.host.bakes().len(), 1);
    assert!(!f.host.project().utils.debug_pause_continue);

    for _ in 0..20 {
        o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap();
    }
    assert_eq!(f.host.bakes().len(), 1);
    assert_eq!(mesh_states(&f), vec![BakeState::Finished, BakeState::Queued]);

    f.host.project_mut().utils.debug_pause = false;
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);
    assert_eq!(f.host.bakes().len(), 2);
}

#[test]
fn failed_job_cancels_the_run() {
    let mut f = fixture(
        "failure",
        BakeMode::Single,
        &["A"],
        &[TextureType::Diffuse, TextureType::Ao],
    );
    f.host.faults_mut().silent_failure = true;
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    let err = run(&mut f, &mut o).unwrap_err();
    assert!(matches!(err, BakeError::Host(_)));
    assert_eq!(texture_states(&f), vec![BakeState::Cancelled; 2]);
    assert_eq!(mesh_states(&f), vec![BakeState::Cancelled]);
    assert_eq!(o.outcome(), Some(TickStatus::Cancelled));
    assert_released(&f);
}

#[test]
fn host_cancel_stops_the_run() {
    let mut f = fixture("host-cancel", BakeMode::Single, &["A"], &[TextureType::Diffuse]);
    f.host.faults_mut().external_cancel = true;
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Cancelled);
    assert_eq!(texture_states(&f), vec![BakeState::Cancelled]);
    assert_released(&f);
}

#[test]
fn materials_are_created_when_the_run_finishes() {
    let mut f = fixture(
        "materials",
        BakeMode::Single,
        &["A", "B"],
        &[TextureType::Diffuse, TextureType::Normal],
    );
    f.host.project_mut().texture_sets[0].create_materials.enabled = true;
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(run(&mut f, &mut o).unwrap(), TickStatus::Finished);

    let baked = f.host.material_by_name("crate_baked").unwrap();
    for name in ["A", "B"] {
        let obj = f.host.object_by_name(name).unwrap();
        assert_eq!(f.host.object_materials(obj).unwrap(), vec![baked]);
    }
    assert_released(&f);
}

#[test]
fn missing_template_keeps_the_finished_outcome() {
    let mut f = fixture("template-missing", BakeMode::Single, &["A"], &[TextureType::Diffuse]);
    let policy = &mut f.host.project_mut().texture_sets[0].create_materials;
    policy.enabled = true;
    policy.template = Some("Nope".to_string());
    let mut o = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();

    let err = run(&mut f, &mut o).unwrap_err();
    assert!(matches!(err, BakeError::Validation(_)));
    assert_eq!(o.outcome(), Some(TickStatus::Finished));
    assert_eq!(texture_states(&f), vec![BakeState::Finished]);
    assert_eq!(mesh_states(&f), vec![BakeState::Finished]);
    assert_eq!(
        o.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap(),
        TickStatus::Finished
    );
    assert_released(&f);
}

#[test]
fn rerun_after_escape_is_not_cancelled_by_the_old_job() {
    let mut f = fixture("rerun", BakeMode::Single, &["A"], &[TextureType::Diffuse]);
    let mut first = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(
        first.tick(&mut f.host, &f.ctx, LoopEvent::Timer).unwrap(),
        TickStatus::Running
    );
    assert_eq!(
        first.tick(&mut f.host, &f.ctx, LoopEvent::Escape).unwrap(),
        TickStatus::Cancelled
    );

    let mut second = BakeOrchestrator::start(&mut f.host, &f.ctx, "crate", None).unwrap();
    assert_eq!(run(&mut f, &mut second).unwrap(), TickStatus::Finished);
    assert_eq!(texture_states(&f), vec![BakeState::Finished]);
    assert!(f.out.join("crate").join("crate_64_diffuse.png").is_file());
    assert_released(&f);
}
