use anyhow::{Context, Result};
use canvas_engine::{
    BookmarkChanges, BookmarkStore, EngineConfig, FileStore, ProjectionEngine,
};
use canvas_protocol::{Category, Language, ProjectionState, Settings, Theme, ViewMode};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

mod render;
mod settings_file;

const STATS_RECENT_LIMIT: usize = 5;

#[derive(Parser)]
#[command(name = "bookmark-canvas")]
#[command(about = "Browse bookmark trees grouped by folder, domain or recency", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the grouped projection of a bookmark file
    Show(ShowArgs),

    /// Totals and the most recently added bookmarks
    Stats(StatsArgs),

    /// Bookmarks whose title or url contain every term
    Search(SearchArgs),

    /// Add a bookmark
    Add(AddArgs),

    /// Rename a node or change a bookmark's url
    Edit(EditArgs),

    /// Remove a bookmark or an empty folder
    Remove(RemoveArgs),

    /// Keep printing the projection as the file changes
    Watch(WatchArgs),

    /// Print settings, persisting any given changes
    Settings(SettingsArgs),
}

#[derive(Args)]
struct ProjectionArgs {
    /// folder | domain | recent | all
    #[arg(long)]
    category: Option<Category>,

    /// Free-text filter over title, url and domain
    #[arg(long, default_value = "")]
    query: String,

    /// grid | list (defaults to the saved view)
    #[arg(long)]
    view: Option<ViewMode>,

    /// zh | en (defaults to the saved language)
    #[arg(long)]
    language: Option<Language>,
}

#[derive(Args)]
struct ShowArgs {
    /// Bookmark file (getTree JSON or a Chromium `Bookmarks` file)
    tree: PathBuf,

    #[command(flatten)]
    projection: ProjectionArgs,

    /// Print the groups as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    tree: PathBuf,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SearchArgs {
    tree: PathBuf,

    query: String,

    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct AddArgs {
    /// Bookmark file; created with an empty layout when missing
    tree: PathBuf,

    #[arg(long)]
    title: String,

    #[arg(long)]
    url: String,

    /// Parent folder id (defaults to the bookmarks bar)
    #[arg(long)]
    parent: Option<String>,
}

#[derive(Args)]
struct EditArgs {
    tree: PathBuf,

    id: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    url: Option<String>,
}

#[derive(Args)]
struct RemoveArgs {
    tree: PathBuf,

    id: String,
}

#[derive(Args)]
struct WatchArgs {
    tree: PathBuf,

    #[command(flatten)]
    projection: ProjectionArgs,

    /// Quiet period before a burst of edits triggers one reload
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,
}

#[derive(Args)]
struct SettingsArgs {
    #[arg(long)]
    theme: Option<Theme>,

    #[arg(long)]
    view: Option<ViewMode>,

    #[arg(long)]
    language: Option<Language>,

    #[arg(long)]
    auto_refresh: Option<bool>,

    #[arg(long)]
    show_favicons: Option<bool>,

    #[arg(long)]
    auto_system_theme: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON consumers.
    let json_output = match &cli.command {
        Commands::Show(args) => args.json,
        Commands::Stats(args) => args.json,
        Commands::Search(args) => args.json,
        _ => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let settings_path = settings_file::resolve_path(cli.config.as_deref())?;
    let settings = settings_file::load(&settings_path);

    match cli.command {
        Commands::Show(args) => run_show(args, &settings).await?,
        Commands::Stats(args) => run_stats(args, &settings).await?,
        Commands::Search(args) => run_search(args).await?,
        Commands::Add(args) => run_add(args).await?,
        Commands::Edit(args) => run_edit(args).await?,
        Commands::Remove(args) => run_remove(args).await?,
        Commands::Watch(args) => run_watch(args, &settings).await?,
        Commands::Settings(args) => run_settings(args, settings, &settings_path)?,
    }

    Ok(())
}

fn initial_state(args: &ProjectionArgs, settings: &Settings) -> ProjectionState {
    ProjectionState::default()
        .with_category(args.category.unwrap_or_default())
        .with_query(args.query.clone())
        .with_view(args.view.unwrap_or(settings.view_mode))
}

fn engine_for(
    store: Arc<dyn BookmarkStore>,
    language: Language,
    state: ProjectionState,
) -> Arc<ProjectionEngine> {
    let config = EngineConfig::default()
        .with_language(language)
        .with_auto_refresh(false);
    ProjectionEngine::new(store, config, state)
}

fn open_existing(path: &Path) -> Result<FileStore> {
    if !path.exists() {
        anyhow::bail!("Bookmark file not found: {}", path.display());
    }
    Ok(FileStore::open(path))
}

async fn run_show(args: ShowArgs, settings: &Settings) -> Result<()> {
    let store = Arc::new(open_existing(&args.tree)?);
    let state = initial_state(&args.projection, settings);
    let language = args.projection.language.unwrap_or(settings.language);
    let engine = engine_for(store, language, state);

    let projection = engine
        .refresh_from_source()
        .await
        .with_context(|| format!("Failed to load {}", args.tree.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*projection)?);
    } else {
        print!(
            "{}",
            render::projection(&projection, engine.view(), settings.show_favicons)
        );
    }
    Ok(())
}

async fn run_stats(args: StatsArgs, settings: &Settings) -> Result<()> {
    let store = Arc::new(open_existing(&args.tree)?);
    let engine = engine_for(store, settings.language, ProjectionState::default());
    engine
        .refresh_from_source()
        .await
        .with_context(|| format!("Failed to load {}", args.tree.display()))?;

    let stats = engine.stats();
    let recent = engine.recent(STATS_RECENT_LIMIT);
    if args.json {
        let body = json!({ "stats": stats, "recent": recent });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print!("{}", render::stats(&stats, &recent));
    }
    Ok(())
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let store = open_existing(&args.tree)?;
    let hits = store.search(&args.query).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        println!("No bookmarks match.");
    } else {
        print!("{}", render::nodes(&hits));
    }
    Ok(())
}

async fn run_add(args: AddArgs) -> Result<()> {
    let store = FileStore::open_or_init(&args.tree).await?;
    let node = store
        .create(args.parent.as_deref(), &args.title, &args.url)
        .await?;
    info!("Added {} to {}", node.id(), args.tree.display());
    println!("{}", node.id());
    Ok(())
}

async fn run_edit(args: EditArgs) -> Result<()> {
    let changes = BookmarkChanges {
        title: args.title,
        url: args.url,
    };
    if changes.is_empty() {
        anyhow::bail!("Nothing to change: pass --title and/or --url");
    }
    let store = open_existing(&args.tree)?;
    let node = store.update(&args.id, changes).await?;
    info!("Updated {}", node.id());
    Ok(())
}

async fn run_remove(args: RemoveArgs) -> Result<()> {
    let store = open_existing(&args.tree)?;
    store.remove(&args.id).await?;
    info!("Removed {}", args.id);
    Ok(())
}

async fn run_watch(args: WatchArgs, settings: &Settings) -> Result<()> {
    let store = Arc::new(open_existing(&args.tree)?);
    let state = initial_state(&args.projection, settings);
    let language = args.projection.language.unwrap_or(settings.language);
    let config = EngineConfig::default()
        .with_language(language)
        .with_debounce(Duration::from_millis(args.debounce_ms))
        .with_auto_refresh(settings.auto_refresh);

    if settings.auto_refresh {
        store.watch()?;
    } else {
        warn!("Auto refresh is disabled in settings; printing a single projection");
    }

    let engine = ProjectionEngine::start(
        Arc::clone(&store) as Arc<dyn BookmarkStore>,
        config,
        state,
    );
    let mut updates = engine.subscribe();
    let projection = engine.refresh_from_source().await?;
    print!(
        "{}",
        render::projection(&projection, engine.view(), settings.show_favicons)
    );
    if !settings.auto_refresh {
        return Ok(());
    }
    // The first push is the load we just printed.
    let _ = updates.try_recv();

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(projection) => {
                    println!();
                    print!(
                        "{}",
                        render::projection(&projection, engine.view(), settings.show_favicons)
                    );
                }
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {skipped} stale projections"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    engine.teardown();
    store.unwatch();
    Ok(())
}

fn run_settings(args: SettingsArgs, mut settings: Settings, path: &Path) -> Result<()> {
    let mut changed = false;
    if let Some(theme) = args.theme {
        settings.theme = theme;
        changed = true;
    }
    if let Some(view) = args.view {
        settings.view_mode = view;
        changed = true;
    }
    if let Some(language) = args.language {
        settings.language = language;
        changed = true;
    }
    if let Some(enabled) = args.auto_refresh {
        settings.auto_refresh = enabled;
        changed = true;
    }
    if let Some(enabled) = args.show_favicons {
        settings.show_favicons = enabled;
        changed = true;
    }
    if let Some(enabled) = args.auto_system_theme {
        settings.auto_system_theme = enabled;
        changed = true;
    }

    if changed {
        settings_file::save(path, &settings)?;
        info!("Saved settings to {}", path.display());
    }
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}
