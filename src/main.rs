mod app;
mod backend;
mod board;
mod config;
mod coordinator;
mod drag;
mod input;
mod tags;
mod ui;

use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use backend::{BackendError, HttpBackend, LeadBackend, MemoryBackend};
use board::partition::partition;
use board::store::LeadStore;
use board::{ColumnId, LeadFilters, LeadId, PipelineId};
use config::{Config, ConfigError};
use coordinator::{MoveCoordinator, MoveRejected, StaleReference, Submitted};
use drag::MoveIntent;

#[derive(Parser)]
#[command(name = "leadboard", about = "A terminal Kanban board for CRM lead pipelines")]
struct Cli {
    /// Use an in-memory demo pipeline instead of the lead service
    #[arg(long, global = true)]
    demo: bool,

    /// Config file (default: $XDG_CONFIG_HOME/leadboard/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pipeline to show
    #[arg(long, global = true, value_name = "ID")]
    pipeline: Option<String>,

    /// Base URL of the lead service
    #[arg(long, global = true, env = "LEADBOARD_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token for the lead service
    #[arg(long, global = true, env = "LEADBOARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List leads grouped by column
    Leads {
        /// Only this column
        #[arg(short, long)]
        column: Option<String>,
    },
    /// Move a lead to another column
    Move {
        /// Lead ID
        lead_id: String,
        /// Target column ID
        column: String,
    },
    /// List all tags
    Tags,
    /// List the active columns of the pipeline
    Columns,
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Install color_eyre for unexpected panics/errors (developer bugs).
    let _ = color_eyre::install();
    let cli = Cli::parse();

    let result = match &cli.command {
        Some(Command::InitConfig { force }) => cmd_init_config(cli.config.as_deref(), *force),
        command => match settings(&cli) {
            Ok(config) => run_command(&cli, command.as_ref(), config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        print_user_error(&e);
        std::process::exit(1);
    }
}

async fn run_command(cli: &Cli, command: Option<&Command>, config: Config) -> color_eyre::Result<()> {
    let Some(command) = command else {
        return cmd_tui(cli, config).await;
    };
    init_stderr_logging();
    let backend = connect(cli, &config)?;
    let pipeline_id = PipelineId::new(config.board.pipeline_id.clone());
    match command {
        Command::Leads { column } => cmd_leads(backend.as_ref(), &pipeline_id, column.as_deref()).await,
        Command::Move { lead_id, column } => cmd_move(backend.as_ref(), &pipeline_id, lead_id, column).await,
        Command::Tags => cmd_tags(backend.as_ref()).await,
        Command::Columns => cmd_columns(backend.as_ref(), &pipeline_id).await,
        Command::InitConfig { force } => cmd_init_config(cli.config.as_deref(), *force),
    }
}

/// Config file, then environment and flags on top.
fn settings(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = config::load(cli.config.as_deref())?;
    if let Some(ref url) = cli.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(ref token) = cli.token {
        config.backend.token = Some(token.clone());
    }
    if let Some(ref pipeline) = cli.pipeline {
        config.board.pipeline_id = pipeline.clone();
    }
    config.validate()?;
    Ok(config)
}

fn connect(cli: &Cli, config: &Config) -> color_eyre::Result<Arc<dyn LeadBackend>> {
    if cli.demo {
        return Ok(Arc::new(MemoryBackend::demo()));
    }
    let backend = HttpBackend::new(&config.backend.base_url, config.backend.token.clone(), config.backend.timeout())
        .wrap_err("could not set up the HTTP client")?;
    Ok(Arc::new(backend))
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env("LEADBOARD_LOG").unwrap_or_else(|_| default.into())
}

/// Log to a daily file; the terminal belongs to the board.
fn init_file_logging() -> color_eyre::Result<WorkerGuard> {
    let dir = config::log_dir();
    std::fs::create_dir_all(&dir).wrap_err_with(|| format!("cannot create log directory {}", dir.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "leadboard.log"));
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(guard)
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(env_filter("warn"))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print a user-friendly error message, with actionable hints for known error types.
fn print_user_error(error: &color_eyre::Report) {
    if let Some(config_err) = error.downcast_ref::<ConfigError>() {
        match config_err {
            ConfigError::NotFound(path) => {
                eprintln!("error: config file not found: {}", path.display());
                eprintln!("  Run `leadboard init-config` to create one.");
            }
            ConfigError::TomlDe { path, source } => {
                eprintln!("error: config file {} has invalid TOML.", path.display());
                eprintln!("  {source}");
            }
            ConfigError::Invalid { key, reason } => {
                eprintln!("error: invalid setting `{key}`.");
                eprintln!("  {reason}");
            }
            ConfigError::NoConfigDir => {
                eprintln!("error: no config directory on this platform.");
                eprintln!("  Pass --config PATH.");
            }
            ConfigError::TomlSer(e) => {
                eprintln!("error: failed to write config.");
                eprintln!("  {e}");
            }
            ConfigError::Io(e) => {
                eprintln!("error: could not read or write the config file.");
                eprintln!("  {e}");
            }
        }
        return;
    }

    if let Some(rejected) = error.downcast_ref::<MoveRejected>() {
        eprintln!("error: {rejected}");
        eprintln!("  The lead was left in its previous column.");
        return;
    }

    if let Some(backend_err) = error.downcast_ref::<BackendError>() {
        match backend_err {
            BackendError::Transport(msg) => {
                eprintln!("error: could not reach the lead service.");
                eprintln!("  {msg}");
                eprintln!("  Check backend.base_url, or try --demo.");
            }
            BackendError::Status { status: 401 | 403, .. } => {
                eprintln!("error: the lead service refused the credentials.");
                eprintln!("  Set backend.token or LEADBOARD_TOKEN.");
            }
            e if e.is_not_found() => {
                eprintln!("error: {error:#}");
                eprintln!("  It may have been deleted. Run `leadboard leads` to see the current board.");
            }
            _ => eprintln!("error: {error:#}"),
        }
        return;
    }

    // For eyre!() / bail!() messages, print the full error chain.
    eprintln!("error: {e:#}", e = error);
}

async fn cmd_tui(cli: &Cli, config: Config) -> color_eyre::Result<()> {
    let _guard = init_file_logging()?;
    let backend = connect(cli, &config)?;
    let pipeline_id = PipelineId::new(config.board.pipeline_id.clone());
    tracing::info!(pipeline = %pipeline_id, demo = cli.demo, "starting board");
    let (app, events) = app::App::new(backend, pipeline_id, &config.board);

    let mut terminal = ratatui::init();
    if let Err(e) = crossterm::execute!(stdout(), EnableMouseCapture) {
        ratatui::restore();
        return Err(e).wrap_err("cannot enable mouse capture");
    }
    let result = app::run(&mut terminal, app, events, config.board.refresh_interval()).await;
    let _ = crossterm::execute!(stdout(), DisableMouseCapture);
    ratatui::restore();
    result
}

/// Load the active columns and all leads of a pipeline.
async fn load_store(backend: &dyn LeadBackend, pipeline_id: &PipelineId) -> color_eyre::Result<LeadStore> {
    let mut store = LeadStore::new(pipeline_id.clone());
    let columns = backend
        .list_active_columns(pipeline_id)
        .await
        .wrap_err("could not load columns")?;
    store.set_columns(columns);
    let generation = store.begin_load();
    let leads = backend
        .list_leads(pipeline_id, &LeadFilters::default())
        .await
        .wrap_err("could not load leads")?;
    store.hydrate(generation, leads);
    Ok(store)
}

async fn cmd_leads(backend: &dyn LeadBackend, pipeline_id: &PipelineId, column: Option<&str>) -> color_eyre::Result<()> {
    let store = load_store(backend, pipeline_id).await?;
    if let Some(col) = column {
        if store.column(&ColumnId::from(col)).is_none() {
            bail!("Column '{col}' not found in pipeline {pipeline_id}");
        }
    }
    let tags = backend.list_tags().await.unwrap_or_default();

    let part = partition(store.leads(), store.columns(), store.filters());
    for col in part.columns() {
        if column.is_some_and(|c| c != col.column.id.as_str()) {
            continue;
        }
        println!("\n{} ({})", col.column.name, col.leads.len());
        println!("{}", "─".repeat(40));
        for lead in &col.leads {
            let company = lead.company.as_deref().map(|c| format!("  {c}")).unwrap_or_default();
            let names: Vec<&str> = lead
                .tags
                .iter()
                .map(|id| tags.iter().find(|t| &t.id == id).map_or(id.as_str(), |t| t.name.as_str()))
                .collect();
            let tag_list = if names.is_empty() {
                String::new()
            } else {
                format!(" [{}]", names.join(", "))
            };
            println!("  {:<6} {}{}{}", lead.id, lead.name, company, tag_list);
        }
    }
    println!();
    Ok(())
}

/// Move one lead through the same optimistic path the board uses.
async fn cmd_move(backend: &dyn LeadBackend, pipeline_id: &PipelineId, lead_id: &str, column: &str) -> color_eyre::Result<()> {
    let mut store = load_store(backend, pipeline_id).await?;
    let lead_id = LeadId::from(lead_id);
    let target = ColumnId::from(column);
    let from = store
        .get(&lead_id)
        .map(|l| l.column_id.clone())
        .ok_or_else(|| eyre!("Lead '{lead_id}' not found in pipeline {pipeline_id}"))?;

    let mut coordinator = MoveCoordinator::new();
    match coordinator.submit(MoveIntent::new(lead_id.clone(), from, target), &mut store) {
        Submitted::Issued(cmd) => {
            let result = backend.update_lead_column(&cmd.lead_id, &cmd.to_column_id).await;
            let settled = coordinator.settle(&cmd.lead_id, result, &mut store);
            if let Some(rejected) = settled.rejected {
                return Err(rejected.into());
            }
            let lead_name = store.get(&lead_id).map_or(lead_id.as_str(), |l| l.name.as_str());
            let column_name = store.column(&cmd.to_column_id).map_or(column, |c| c.name.as_str());
            println!("Moved {lead_name} to {column_name}");
        }
        Submitted::Dropped(StaleReference::AlreadyThere(..)) => println!("Lead is already in '{column}'"),
        Submitted::Dropped(StaleReference::Column(_)) => {
            bail!("Column '{column}' is not an active column of pipeline {pipeline_id}")
        }
        Submitted::Dropped(stale) => return Err(stale.into()),
        Submitted::Queued => bail!("a move for {lead_id} is already pending"),
    }
    Ok(())
}

async fn cmd_tags(backend: &dyn LeadBackend) -> color_eyre::Result<()> {
    let tags = backend.list_tags().await.wrap_err("could not load tags")?;
    if tags.is_empty() {
        println!("No tags defined.");
        return Ok(());
    }
    println!("\nTags:");
    println!("{}", "─".repeat(30));
    for tag in &tags {
        let color = tag.color.as_deref().unwrap_or("");
        println!("  {:<20} {:<16} {}", tag.name, tag.id, color);
    }
    println!();
    Ok(())
}

async fn cmd_columns(backend: &dyn LeadBackend, pipeline_id: &PipelineId) -> color_eyre::Result<()> {
    let pipelines = backend.list_pipelines().await.wrap_err("could not load pipelines")?;
    let Some(pipeline) = pipelines.iter().find(|p| &p.id == pipeline_id) else {
        let known: Vec<&str> = pipelines.iter().map(|p| p.id.as_str()).collect();
        bail!("Pipeline '{pipeline_id}' not found (known: {})", known.join(", "));
    };
    let mut store = LeadStore::new(pipeline_id.clone());
    store.set_columns(backend.list_active_columns(pipeline_id).await.wrap_err("could not load columns")?);

    println!("\n{} ({})", pipeline.name, pipeline.id);
    println!("{}", "─".repeat(30));
    for col in store.columns() {
        println!("  {:<3} {:<20} {}", col.sort_order, col.name, col.id);
    }
    println!();
    Ok(())
}

fn cmd_init_config(path: Option<&Path>, force: bool) -> color_eyre::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::default_config_path().ok_or(ConfigError::NoConfigDir)?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config::write_default(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
