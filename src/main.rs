use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use coverkit::store::FileStore;
use coverkit::{
    EditorConfig, ElementId, Editor, Rect, ResourceCategory, TextRole, TextStyle, Viewport,
};

#[derive(Parser)]
#[command(name = "coverkit", about = "Compose and export layered cover images")]
struct Cli {
    #[arg(help = "Directory holding the resource and template records", long, default_value = ".coverkit")]
    store: PathBuf,

    #[arg(help = "Editor configuration (JSON)", long)]
    config: Option<PathBuf>,

    #[arg(help = "Register a font as FAMILY=PATH (repeatable)", long = "font", value_parser = parse_font)]
    fonts: Vec<(String, PathBuf)>,

    #[arg(help = "Viewport size the scene rects refer to, as WIDTHxHEIGHT", long, default_value = "800x450", value_parser = parse_viewport)]
    viewport: Viewport,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Manage uploaded images", subcommand)]
    Resource(ResourceCommand),

    #[command(about = "Manage saved templates", subcommand)]
    Template(TemplateCommand),

    #[command(about = "Render a scene file or a stored template to PNG")]
    Render {
        #[arg(long, conflicts_with = "template", required_unless_present = "template")]
        scene: Option<PathBuf>,
        #[arg(long)]
        template: Option<u64>,
        #[arg(short, long, default_value = "cover.png")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum ResourceCommand {
    #[command(about = "Import an image file")]
    Add {
        category: ResourceCategory,
        name: String,
        file: PathBuf,
    },
    #[command(about = "List stored resources")]
    List { category: Option<ResourceCategory> },
}

#[derive(Subcommand)]
enum TemplateCommand {
    #[command(about = "List stored templates, oldest first")]
    List,
    #[command(about = "Save a scene file as a template")]
    Save { name: String, scene: PathBuf },
    #[command(about = "Delete a template by id")]
    Delete { id: u64 },
}

fn parse_font(s: &str) -> Result<(String, PathBuf), String> {
    let (family, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY=PATH, got '{s}'"))?;
    if family.trim().is_empty() {
        return Err("font family is empty".into());
    }
    Ok((family.trim().to_string(), PathBuf::from(path)))
}

fn parse_viewport(s: &str) -> Result<Viewport, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if !(w > 0.0 && h > 0.0) {
        return Err("viewport must have a positive size".into());
    }
    Ok(Viewport::new(w, h))
}

/// An image placed in a scene file
#[derive(Deserialize)]
struct SceneImage {
    resource: u64,
    rect: Option<Rect>,
}

#[derive(Deserialize)]
struct SceneText {
    text: String,
    #[serde(default)]
    style: Option<TextStyle>,
    rect: Option<Rect>,
}

/// A composition described by resource ids, as JSON
#[derive(Deserialize, Default)]
#[serde(default)]
struct Scene {
    background: Option<u64>,
    character: Option<SceneImage>,
    icons: Vec<Option<SceneImage>>,
    title: Option<SceneText>,
    subtitle: Option<SceneText>,
}

fn apply_scene(editor: &mut Editor, scene: &Scene) -> anyhow::Result<()> {
    editor.clear();
    editor.set_background(scene.background)?;

    if let Some(c) = &scene.character {
        if let Some(rect) = c.rect {
            editor.set_rect(ElementId::Character, rect)?;
        }
        editor.set_character(Some(c.resource))?;
    }

    let (min, _) = editor.layers().icon_bounds();
    editor.set_icon_count(scene.icons.len().max(min))?;
    for (i, icon) in scene.icons.iter().enumerate() {
        let Some(icon) = icon else { continue };
        if let Some(rect) = icon.rect {
            editor.set_rect(ElementId::Icon(i), rect)?;
        }
        editor.set_icon(i, Some(icon.resource))?;
    }

    for (role, text) in [(TextRole::Title, &scene.title), (TextRole::Subtitle, &scene.subtitle)] {
        let Some(text) = text else { continue };
        if let Some(rect) = text.rect {
            editor.set_rect(ElementId::Text(role), rect)?;
        }
        let style = text.style.clone().unwrap_or_else(|| TextStyle::for_role(role));
        editor.set_text(role, &text.text, style)?;
    }
    Ok(())
}

fn load_scene(path: &PathBuf) -> anyhow::Result<Scene> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing scene {}", path.display()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<EditorConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EditorConfig::default(),
    };
    let font_timeout = Duration::from_millis(config.font_load_timeout_ms);

    let store = FileStore::open(&cli.store)?;
    let mut editor = Editor::new(config, cli.viewport, store)?;
    for (family, path) in &cli.fonts {
        editor
            .fonts()
            .load_file(family, path, font_timeout)
            .await
            .with_context(|| format!("loading font '{family}'"))?;
    }

    match cli.command {
        Commands::Resource(ResourceCommand::Add { category, name, file }) => {
            let r = editor.import_resource(category, &name, &file).await?;
            println!("{}\t{}\t{}", r.id, category, r.name);
        }
        Commands::Resource(ResourceCommand::List { category }) => {
            let categories = match category {
                Some(c) => vec![c],
                None => ResourceCategory::ALL.to_vec(),
            };
            for c in categories {
                for r in editor.resources().list(c) {
                    println!("{}\t{}\t{}\t{} bytes", r.id, c, r.name, r.image.len());
                }
            }
        }
        Commands::Template(TemplateCommand::List) => {
            for t in editor.templates() {
                println!("{}\t{}", t.id, t.name);
            }
        }
        Commands::Template(TemplateCommand::Save { name, scene }) => {
            let scene = load_scene(&scene)?;
            apply_scene(&mut editor, &scene)?;
            let t = editor.save_template(&name).await?;
            println!("{}\t{}", t.id, t.name);
        }
        Commands::Template(TemplateCommand::Delete { id }) => {
            if !editor.delete_template(id)? {
                bail!("no template with id {id}");
            }
        }
        Commands::Render {
            scene,
            template,
            output,
        } => {
            match (scene, template) {
                (Some(path), _) => apply_scene(&mut editor, &load_scene(&path)?)?,
                (None, Some(id)) => {
                    let report = editor.load_template(id).await?;
                    if !report.skipped.is_empty() {
                        eprintln!("skipped unresolved elements: {:?}", report.skipped);
                    }
                }
                (None, None) => return Err(anyhow!("either --scene or --template is required")),
            }
            let written = editor.export_to(&output).await?;
            let target = editor.config().target_size();
            println!(
                "{}\t{}x{}\t{} bytes",
                output.display(),
                target.width,
                target.height,
                written
            );
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("coverkit: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("coverkit: {e:#}");
        std::process::exit(1);
    }
}
