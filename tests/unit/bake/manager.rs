use super::*;
use crate::foundation::core::Rgb;
use crate::host::ids::ObjectId;
use crate::host::sim::SimHost;
use crate::host::{ImageStore, RenderJobs, SceneStore, ShaderGraphStore};
use crate::material::editor::NODE_PREFIX;
use crate::scene::project::Project;
use crate::scene::settings::TextureType;

struct Fixture {
    host: SimHost,
    ctx: OrchestratorContext,
    cube: ObjectId,
    mat: MaterialId,
    image: ImageId,
}

fn fixture() -> Fixture {
    let mut host = SimHost::new(Project::default());
    let mat = host
        .add_principled_material("Mat", Rgb::new(0.3, 0.3, 0.3))
        .unwrap();
    let cube = host.add_object("Cube");
    host.assign_material(cube, 0, Some(mat)).unwrap();
    let image = host.create_image("target.png", 64, 64, false).unwrap();
    Fixture {
        host,
        ctx: OrchestratorContext::default(),
        cube,
        mat,
        image,
    }
}

fn manager(f: &Fixture, texture_type: TextureType, keep_scene: bool) -> BakeManager {
    let objects = BakeObjects::new(f.cube, vec![f.cube]).unwrap();
    let mut settings = BakeSettings::with_type(texture_type);
    settings.samples = 8;
    BakeManager::new(objects, settings, f.image, true, keep_scene)
}

fn tagged(host: &SimHost, mat: MaterialId) -> usize {
    host.material_nodes(mat)
        .unwrap()
        .iter()
        .filter(|n| n.name.starts_with(NODE_PREFIX))
        .count()
}

fn run_to_completion(m: &mut BakeManager, f: &mut Fixture) {
    for _ in 0..20 {
        f.ctx.pump_events(&mut f.host);
        m.on_modal(&mut f.host, &f.ctx);
        if !m.is_running() {
            return;
        }
    }
    panic!("render job never finished");
}

#[test]
fn execute_isolates_objects_and_cleanup_restores_everything() {
    let mut f = fixture();
    let original_scene = f.host.active_scene();
    let original_render = f.host.render_settings();
    let mut m = manager(&f, TextureType::EmitColor, true);

    m.on_execute(&mut f.host, &f.ctx).unwrap();
    assert!(m.is_running());
    assert!(f.ctx.manager.is_running());
    assert!(f.host.is_job_running());
    assert_eq!(f.host.scene_by_name(SCRATCH_SCENE), Some(f.host.active_scene()));
    let coll = f.host.collection_by_name(SCRATCH_COLLECTION).unwrap();
    assert_eq!(f.host.collection_objects(coll).unwrap(), vec![f.cube]);
    assert_eq!(f.host.active_object(), Some(f.cube));
    let render = f.host.render_settings();
    assert_eq!(render.engine, "cycles");
    assert_eq!(render.samples, 8);
    assert!(render.lock_interface);
    assert!(tagged(&f.host, f.mat) > 0);

    run_to_completion(&mut m, &mut f);
    assert!(!f.ctx.manager.is_running());
    assert_eq!(f.host.active_scene(), original_scene);
    assert_eq!(f.host.render_settings(), original_render);
    assert!(f.host.collection_by_name(SCRATCH_COLLECTION).is_none());
    assert!(f.host.scene_by_name(SCRATCH_SCENE).is_some());
    assert_eq!(tagged(&f.host, f.mat), 0);
    assert!(f.ctx.ledger.borrow().is_empty());
    assert!(f.host.image_info(f.image).unwrap().is_dirty);
}

#[test]
fn scratch_scene_goes_away_unless_kept() {
    let mut f = fixture();
    let mut m = manager(&f, TextureType::Diffuse, false);
    m.on_execute(&mut f.host, &f.ctx).unwrap();
    run_to_completion(&mut m, &mut f);
    assert!(f.host.scene_by_name(SCRATCH_SCENE).is_none());
    assert_eq!(f.host.scene_names(), vec!["Scene".to_string()]);
}

#[test]
fn second_manager_is_rejected_without_side_effects() {
    let mut f = fixture();
    let mut first = manager(&f, TextureType::Diffuse, true);
    first.on_execute(&mut f.host, &f.ctx).unwrap();
    let bakes = f.host.bakes().len();

    let mut second = manager(&f, TextureType::Diffuse, true);
    let err = second.on_execute(&mut f.host, &f.ctx).unwrap_err();
    assert!(err.is_precondition());
    assert!(!second.is_running());
    assert!(f.ctx.manager.is_running());
    assert_eq!(f.host.bakes().len(), bakes);

    first.cancel(&mut f.host, &f.ctx);
    assert!(!f.ctx.manager.is_running());
}

#[test]
fn refused_start_is_cleaned_up_and_reported() {
    let mut f = fixture();
    f.host.faults_mut().refuse_start = true;
    let original_scene = f.host.active_scene();
    let mut m = manager(&f, TextureType::Aorm, true);

    let err = m.on_execute(&mut f.host, &f.ctx).unwrap_err();
    assert!(matches!(err, BakeError::Host(_)));
    assert!(!m.is_running());
    assert!(!f.ctx.manager.is_running());
    assert_eq!(f.host.active_scene(), original_scene);
    assert_eq!(tagged(&f.host, f.mat), 0);
    assert!(f.host.collection_by_name(SCRATCH_COLLECTION).is_none());
}

#[test]
fn setup_failure_is_cleaned_up_and_propagated() {
    let mut f = fixture();
    let glow = f
        .host
        .add_material_with_shader("Glow", crate::host::graph::NodeKind::Other("emission".into()))
        .unwrap();
    f.host.assign_material(f.cube, 1, Some(glow)).unwrap();
    let mut m = manager(&f, TextureType::EmitColor, true);

    let err = m.on_execute(&mut f.host, &f.ctx).unwrap_err();
    assert!(matches!(err, BakeError::Graph(_)));
    assert!(!f.ctx.manager.is_running());
    assert!(!f.host.is_job_running());
    assert_eq!(tagged(&f.host, f.mat), 0);
    assert!(f.ctx.ledger.borrow().is_empty());
}

#[test]
fn cancel_stops_the_render_job() {
    let mut f = fixture();
    let mut m = manager(&f, TextureType::Ao, true);
    m.on_execute(&mut f.host, &f.ctx).unwrap();
    m.cancel(&mut f.host, &f.ctx);
    assert!(!f.host.is_job_running());
    assert!(!f.ctx.manager.is_running());
    assert_eq!(tagged(&f.host, f.mat), 0);
    m.cancel(&mut f.host, &f.ctx);
}

#[test]
fn native_passes_leave_material_graphs_alone() {
    let mut f = fixture();
    let glow = f
        .host
        .add_material_with_shader("Glow", crate::host::graph::NodeKind::Other("emission".into()))
        .unwrap();
    f.host.assign_material(f.cube, 1, Some(glow)).unwrap();
    let before = f.host.material_nodes(f.mat).unwrap();
    let mut m = manager(&f, TextureType::Normal, true);

    m.on_execute(&mut f.host, &f.ctx).unwrap();
    assert!(f.host.is_job_running());
    assert_eq!(f.host.material_nodes(f.mat).unwrap(), before);
    assert!(f.ctx.ledger.borrow().is_empty());

    run_to_completion(&mut m, &mut f);
    assert_eq!(f.host.material_nodes(f.mat).unwrap(), before);
    assert!(!f.ctx.manager.is_running());
}
