use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use texbake::host::DocumentStore as _;
use texbake::{
    BakeOrchestrator, OrchestratorContext, Project, SimHost, SimSceneDesc, StableId, drive,
    mesh_groups,
};

#[derive(Parser, Debug)]
#[command(name = "texbake", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bake texture sets of a project against a simulated scene.
    Bake(BakeArgs),
    /// Print the low/high mesh groups for a list of names.
    Match(MatchArgs),
    /// Load and validate a project.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
struct BakeArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,

    /// Texture set id or display name. All sets when omitted.
    #[arg(long)]
    set: Option<String>,

    /// Bake only this texture id.
    #[arg(long, requires = "set")]
    texture: Option<String>,

    /// Scene description JSON. Without it every listed mesh gets a default material.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Give up after this many ticks per texture set.
    #[arg(long)]
    ticks: Option<u64>,

    /// Where to write the updated project. Defaults to overwriting `--project`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct MatchArgs {
    /// Comma separated mesh names.
    #[arg(long, value_delimiter = ',', required = true)]
    names: Vec<String>,

    /// Fail when a low mesh has no high counterpart.
    #[arg(long, default_value_t = false)]
    require_high: bool,
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Project JSON.
    #[arg(long)]
    project: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Bake(args) => cmd_bake(args),
        Command::Match(args) => cmd_match(args),
        Command::Validate(args) => cmd_validate(args),
    }
}

fn load_project(path: &Path) -> anyhow::Result<Project> {
    let project = Project::from_path(path)
        .with_context(|| format!("load project '{}'", path.display()))?;
    project
        .validate()
        .with_context(|| format!("validate project '{}'", path.display()))?;
    Ok(project)
}

fn cmd_bake(args: BakeArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let stored_output = project.output_directory.clone();
    let base = args
        .project
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut working = project;
    if working.output_directory.is_relative() {
        working.output_directory = base.join(&working.output_directory);
    }
    let desc = match &args.scene {
        Some(path) => {
            let f = File::open(path)
                .with_context(|| format!("open scene description '{}'", path.display()))?;
            serde_json::from_reader(BufReader::new(f))
                .with_context(|| format!("parse scene description '{}'", path.display()))?
        }
        None => default_scene(&working)?,
    };

    let keys: Vec<String> = match &args.set {
        Some(key) => vec![key.clone()],
        None => working
            .texture_sets
            .iter()
            .map(|s| s.id.as_str().to_string())
            .collect(),
    };
    let texture = args.texture.map(StableId::new).transpose()?;

    let mut host = SimHost::from_description(working, &desc).context("build scene")?;
    let ctx = OrchestratorContext::default();
    let mut result = Ok(());
    for key in &keys {
        let outcome = BakeOrchestrator::start(&mut host, &ctx, key, texture.as_ref())
            .and_then(|mut run| drive(&mut host, &ctx, &mut run, args.ticks));
        match outcome {
            Ok(status) => println!("{key}: {status:?}"),
            Err(e) => {
                result = Err(anyhow::Error::new(e).context(format!("bake texture set {key:?}")));
                break;
            }
        }
    }

    let mut updated = host.project().clone();
    updated.output_directory = stored_output;
    let out = args.out.as_deref().unwrap_or(&args.project);
    updated
        .save(out)
        .with_context(|| format!("write project '{}'", out.display()))?;
    result
}

/// One shared principled material on every mesh the project mentions.
fn default_scene(project: &Project) -> anyhow::Result<SimSceneDesc> {
    let mut names: Vec<&str> = Vec::new();
    for set in &project.texture_sets {
        for mesh in &set.meshes {
            if !names.contains(&mesh.name.as_str()) {
                names.push(&mesh.name);
            }
        }
    }
    let objects: Vec<serde_json::Value> = names
        .iter()
        .map(|n| serde_json::json!({ "name": n, "materials": ["Default"] }))
        .collect();
    let desc = serde_json::json!({
        "materials": [{ "name": "Default" }],
        "objects": objects,
    });
    serde_json::from_value(desc).context("build default scene description")
}

fn cmd_match(args: MatchArgs) -> anyhow::Result<()> {
    let groups = mesh_groups(&args.names, true, args.require_high)?;
    for g in groups {
        println!("{}: {}", g.active, g.selected.join(", "));
    }
    Ok(())
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let project = load_project(&args.project)?;
    let textures: usize = project.texture_sets.iter().map(|s| s.textures.len()).sum();
    println!(
        "ok: {} texture set(s), {textures} texture(s)",
        project.texture_sets.len()
    );
    Ok(())
}
