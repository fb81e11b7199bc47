use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use playground_core::{traits::ProjectStore, validate::CollisionPolicy, CoreError};
use playground_preview::render_document;
use playground_server::Server;
use playground_storage_ephemeral::EphemeralStorage;
use playground_storage_local::LocalStorage;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ROOT: &str = "./saved_projects";
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[derive(Clone, Debug, ValueEnum, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum Backend {
    Local,
    Ephemeral,
}

#[derive(Parser, Debug)]
#[command(name = "playground", version, about = "Code playground save/load service")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the save/load API over HTTP.
    Serve(ServeArgs),
    /// Print saved projects, newest first.
    List(StoreArgs),
    /// Write a saved project's preview document.
    Render(RenderArgs),
    /// Delete a saved project.
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Store root; defaults to ./saved_projects.
    #[arg(long)]
    root: Option<String>,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long, value_enum)]
    backend: Option<Backend>,
    /// Listen address; defaults to 127.0.0.1:3000.
    #[arg(long)]
    addr: Option<String>,
    /// `overwrite` (default) or `reject` saves whose storage key belongs to
    /// a differently named project.
    #[arg(long = "collision-policy", value_name = "POLICY")]
    collision_policy: Option<CollisionPolicy>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Display name of the project.
    name: String,
    /// Output file; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    #[command(flatten)]
    store: StoreArgs,
    name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreSection {
    root: Option<String>,
    collision_policy: Option<CollisionPolicy>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct ServeSection {
    backend: Option<Backend>,
    addr: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct AppConfig {
    #[serde(default)]
    store: Option<StoreSection>,
    #[serde(default)]
    serve: Option<ServeSection>,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve(args) => serve(args, &cfg).await?,
        Commands::List(args) => list_cmd(args, &cfg)?,
        Commands::Render(args) => render_cmd(args, &cfg)?,
        Commands::Delete(args) => delete_cmd(args, &cfg)?,
    }
    Ok(())
}

async fn serve(args: ServeArgs, cfg: &AppConfig) -> Result<()> {
    let serve_cfg = cfg.serve.clone().unwrap_or_default();
    let backend = args
        .backend
        .or(serve_cfg.backend)
        .unwrap_or(Backend::Local);
    let addr = args
        .addr
        .or(serve_cfg.addr)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let policy = args
        .collision_policy
        .or_else(|| cfg.store.as_ref().and_then(|s| s.collision_policy))
        .unwrap_or_default();
    info!(backend = ?backend, %policy, "starting server");
    match backend {
        Backend::Local => {
            let storage = open_local(&args.store, cfg, policy)?;
            info!(root = %storage.root().display(), "project files will be saved here");
            Server::new(storage).run_http(&addr).await?;
        }
        Backend::Ephemeral => {
            Server::new(EphemeralStorage::with_policy(policy))
                .run_http(&addr)
                .await?;
        }
    }
    Ok(())
}

fn list_cmd(args: StoreArgs, cfg: &AppConfig) -> Result<()> {
    let storage = open_local(&args, cfg, CollisionPolicy::default())?;
    let projects = storage
        .list()
        .map_err(|e| eyre!("error listing projects: {}", e))?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if projects.is_empty() {
        writeln!(out, "No saved projects found")?;
    }
    for project in projects {
        writeln!(
            out,
            "{}\t{}",
            playground_core::format_timestamp(project.last_modified),
            project.name
        )?;
    }
    Ok(())
}

fn render_cmd(args: RenderArgs, cfg: &AppConfig) -> Result<()> {
    let storage = open_local(&args.store, cfg, CollisionPolicy::default())?;
    let source = storage.load(&args.name).map_err(|e| match CoreError::from(e) {
        CoreError::NotFound(_) => eyre!("project \"{}\" not found", args.name),
        other => eyre!("error loading project: {}", other),
    })?;
    let document = render_document(&source);
    match &args.out {
        Some(path) => {
            fs::write(path, &document)?;
            info!(project = %args.name, out = %path.display(), "preview written");
        }
        None => io::stdout().lock().write_all(document.as_bytes())?,
    }
    Ok(())
}

fn delete_cmd(args: DeleteArgs, cfg: &AppConfig) -> Result<()> {
    let storage = open_local(&args.store, cfg, CollisionPolicy::default())?;
    storage
        .delete(&args.name)
        .map_err(|e| eyre!("error deleting project: {}", e))?;
    println!("{}", playground_proto::deleted_message(&args.name));
    Ok(())
}

/// The store root must exist before anything is served; failing here stops
/// the process.
fn open_local(args: &StoreArgs, cfg: &AppConfig, policy: CollisionPolicy) -> Result<LocalStorage> {
    let raw = args
        .root
        .clone()
        .or_else(|| cfg.store.as_ref().and_then(|s| s.root.clone()))
        .unwrap_or_else(|| DEFAULT_ROOT.to_string());
    let root = expand_path(&raw);
    LocalStorage::with_policy(&root, policy)
        .map_err(|e| eyre!("cannot initialize project store at {}: {}", root.display(), e))
}

fn load_config(path: Option<&str>) -> Result<AppConfig> {
    let mut builder = config::Config::builder()
        .add_source(config::Environment::with_prefix("PLAYGROUND").separator("__"));

    if let Some(raw) = path {
        let expanded = expand_path(raw);
        if !expanded.exists() {
            tracing::warn!(
                path = expanded.display().to_string(),
                "config file not found; continuing with defaults and env overrides"
            );
        }
        builder = builder.add_source(config::File::from(expanded).required(false));
    }

    let cfg = builder
        .build()
        .map_err(|e| eyre!("config load error: {}", e))?;
    cfg.try_deserialize()
        .map_err(|e| eyre!("config parse error: {}", e))
}

fn expand_path(input: &str) -> PathBuf {
    if input == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from(input));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        return home_dir()
            .map(|mut base| {
                base.push(rest);
                base
            })
            .unwrap_or_else(|| PathBuf::from(rest));
    }
    PathBuf::from(input)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("USERPROFILE").map(PathBuf::from))
}
