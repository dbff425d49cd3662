//! LilGuy CLI - Command-Line Host for the Companion
//!
//! Opens the durable store for an origin, runs one action against it and
//! flushes before exiting. `demo` mounts the main panel and the widget as two
//! headless surfaces so the relay and render loops can be watched in the log.
//!
//! # Usage
//!
//! ```bash
//! # Current state as JSON
//! lilguy status
//!
//! # Interactions and cosmetics
//! lilguy pet
//! lilguy stage devil
//! lilguy color pink
//! lilguy rename "Sir Wiggles"
//!
//! # Goals
//! lilguy goal add "Finish the report"
//! lilguy goal progress 3f2a 80
//! lilguy goal complete 3f2a
//!
//! # Count ten productive seconds
//! lilguy track productive --seconds 10
//!
//! # Two surfaces for five seconds, with relay logging
//! RUST_LOG=lilguy_core=debug lilguy demo --seconds 5
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use lilguy_core::keys::{GoalsKey, LocalhostSecondsKey, ProductiveSecondsKey, WeeklyAverageKey};
use lilguy_core::{
    load_config_from_path, ActionSink, ConfigOverrides, Context, Cosmetics, CreatureColor,
    CreatureState, FileBackend, FsSpriteLoader, Goal, GoalService, GoalTracker, Host,
    HttpGoalService, Interactions, LilGuyConfig, OfflineGoalService, RecordingCanvas, RelayHub,
    RemoteCall, RemoteOutcome, SiteCategory, SiteTracker, Stage, Surface, SurfaceKind,
    SurfaceOptions,
};

/// LilGuy - a virtual pet that lives in your browser chrome
#[derive(Parser, Debug)]
#[command(name = "lilguy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "LILGUY_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding per-origin state
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Origin whose state to open
    #[arg(long, value_name = "NAME")]
    origin: Option<String>,

    /// Directory containing assets/sprites/...
    #[arg(long, value_name = "DIR")]
    asset_root: Option<PathBuf>,

    /// Goal service base URL
    #[arg(long, value_name = "URL")]
    remote_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "LILGUY_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the creature, counters and goals as JSON
    Status,
    /// Pet the creature (+1)
    Pet,
    /// Take the creature for a walk (+1)
    Walk,
    /// Change the evolution stage
    Stage {
        /// egg, normal, angel or devil
        stage: Stage,
    },
    /// Change the color
    Color {
        /// green, blue, black or pink
        color: CreatureColor,
    },
    /// Rename the creature; a blank name restores the default
    Rename {
        /// New name
        name: String,
    },
    /// Manage goals
    Goal {
        #[command(subcommand)]
        action: GoalCommand,
    },
    /// Count time on a tracked site category
    Track {
        /// productive or localhost
        category: SiteCategory,
        /// Seconds to count before exiting
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
    /// Mount both surfaces headless and watch them sync
    Demo {
        /// Seconds to run before exiting
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[derive(Subcommand, Debug)]
enum GoalCommand {
    /// Add a goal (+3)
    Add {
        /// Goal title
        title: String,
    },
    /// List goals
    List,
    /// Mark a goal complete (+10)
    Complete {
        /// Goal id or unique id prefix
        id: String,
    },
    /// Reopen a completed goal (-3)
    Reopen {
        /// Goal id or unique id prefix
        id: String,
    },
    /// Set a goal's progress percentage
    Progress {
        /// Goal id or unique id prefix
        id: String,
        /// New progress (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        progress: u8,
    },
    /// Delete a goal (-10)
    Remove {
        /// Goal id or unique id prefix
        id: String,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("lilguy_cli={level},lilguy_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &Args) -> Result<LilGuyConfig> {
    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::default();
    if let Some(dir) = &args.data_dir {
        overrides = overrides.with_data_dir(dir.clone());
    }
    if let Some(origin) = &args.origin {
        overrides = overrides.with_origin(origin.clone());
    }
    if let Some(root) = &args.asset_root {
        overrides = overrides.with_asset_root(root.clone());
    }
    if let Some(url) = &args.remote_url {
        overrides = overrides.with_remote_url(url.clone());
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(source = %config.source(), "Configuration resolved");
    Ok(config)
}

fn goal_service(config: &LilGuyConfig) -> Result<Arc<dyn GoalService>> {
    match &config.remote.base_url {
        Some(url) => {
            let service = HttpGoalService::new(url.clone(), config.remote.timeout)
                .context("Failed to build goal service client")?;
            Ok(Arc::new(service))
        }
        None => Ok(Arc::new(OfflineGoalService)),
    }
}

/// Find a goal by exact id or unique prefix
fn find_goal(goals: &GoalTracker, id: &str) -> Result<Goal> {
    let list = goals.goals();
    if let Some(goal) = list.iter().find(|g| g.id == id) {
        return Ok(goal.clone());
    }
    let mut matches = list.into_iter().filter(|g| g.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(goal), None) => Ok(goal),
        (Some(_), Some(_)) => anyhow::bail!("Goal id prefix '{id}' is ambiguous"),
        (None, _) => anyhow::bail!("No goal matches '{id}'"),
    }
}

async fn report(call: RemoteCall) {
    let goal = call.goal_id().to_string();
    match call.wait().await {
        RemoteOutcome::Applied | RemoteOutcome::Superseded => {}
        RemoteOutcome::Failed(reason) => {
            warn!(goal = %goal, reason = %reason, "Goal was saved locally but not remotely");
        }
    }
}

fn print_goal(goal: &Goal) {
    let mark = if goal.completed { "x" } else { " " };
    println!("[{mark}] {} {:>3}%  {}", goal.id, goal.progress, goal.title);
}

fn print_status(context: &Context) -> Result<()> {
    let store = context.store();
    let status = serde_json::json!({
        "creature": CreatureState::hydrate(store),
        "productive_seconds": store.read::<ProductiveSecondsKey>(),
        "localhost_seconds": store.read::<LocalhostSecondsKey>(),
        "weekly_average": store.read::<WeeklyAverageKey>(),
        "goals": store.read::<GoalsKey>(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&status).context("Failed to format status")?
    );
    Ok(())
}

async fn run_goal(action: GoalCommand, goals: &GoalTracker) -> Result<()> {
    let call = match action {
        GoalCommand::Add { title } => {
            let (goal, call) = goals.create(&title);
            print_goal(&goal);
            call
        }
        GoalCommand::List => {
            for goal in goals.goals() {
                print_goal(&goal);
            }
            return Ok(());
        }
        GoalCommand::Complete { id } => goals.set_completed(&find_goal(goals, &id)?.id, true)?,
        GoalCommand::Reopen { id } => goals.set_completed(&find_goal(goals, &id)?.id, false)?,
        GoalCommand::Progress { id, progress } => {
            goals.set_progress(&find_goal(goals, &id)?.id, progress)?
        }
        GoalCommand::Remove { id } => goals.remove(&find_goal(goals, &id)?.id)?,
    };
    report(call).await;
    Ok(())
}

async fn run_track(context: &Context, config: &LilGuyConfig, category: SiteCategory, seconds: u64) -> Result<()> {
    let tracker = SiteTracker::new(ActionSink::new(context.clone()), category, &config.tracker);
    let timer = tracker.clone().spawn()?;
    info!(category = %category, seconds = seconds, "Tracking site time");

    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }
    timer.stop().await;
    println!("{category}: {} s", tracker.seconds());
    Ok(())
}

async fn run_demo(host: &Host, config: &LilGuyConfig, seconds: u64) -> Result<()> {
    let loader = Arc::new(FsSpriteLoader::new(config.animation.asset_root.clone()));
    let main = host.open_context("main-panel");
    let widget = host.open_context("widget");

    let main_surface = Surface::mount(
        &main,
        SurfaceKind::MainPanel,
        SurfaceOptions {
            colocated: true,
            ..SurfaceOptions::default()
        },
        Box::new(RecordingCanvas::new()),
        loader.clone(),
        config,
    );
    let widget_surface = Surface::mount(
        &widget,
        SurfaceKind::Widget,
        SurfaceOptions::default(),
        Box::new(RecordingCanvas::new()),
        loader,
        config,
    );

    let buttons = Interactions::new(ActionSink::new(main.clone()));
    let mut second = tokio::time::interval(Duration::from_secs(1));
    second.tick().await;

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    let mut step = 0u64;
    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = second.tick() => {
                step += 1;
                if step % 2 == 0 {
                    buttons.walk();
                } else {
                    buttons.pet();
                }
                for view in [main_surface.view(), widget_surface.view()] {
                    println!(
                        "{:<10} {} anim={} frame={} health={} sheet={:?}",
                        view.kind.as_str(),
                        view.context,
                        view.creature.animation,
                        view.frame,
                        view.creature.health,
                        view.slot,
                    );
                }
            }
        }
    }

    widget_surface.unmount().await;
    main_surface.unmount().await;
    Ok(())
}

async fn run(args: Args, config: &LilGuyConfig, host: &Host) -> Result<()> {
    let context = host.open_context("cli");
    let sink = ActionSink::new(context.clone());

    match args.command {
        Command::Status => print_status(&context)?,
        Command::Pet => println!("health: {}", Interactions::new(sink).pet()),
        Command::Walk => println!("health: {}", Interactions::new(sink).walk()),
        Command::Stage { stage } => Cosmetics::new(sink).set_stage(stage),
        Command::Color { color } => Cosmetics::new(sink).set_color(color),
        Command::Rename { name } => println!("{}", Cosmetics::new(sink).set_name(&name)),
        Command::Goal { action } => {
            let goals = GoalTracker::new(sink, goal_service(config)?);
            run_goal(action, &goals).await?;
        }
        Command::Track { category, seconds } => run_track(&context, config, category, seconds).await?,
        Command::Demo { seconds } => run_demo(host, config, seconds).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = resolve_config(&args)?;
    let path = config
        .store
        .state_path()
        .context("Could not determine a data directory; pass --data-dir")?;

    let backend = Arc::new(
        FileBackend::open(&path)
            .await
            .with_context(|| format!("Failed to open state at {}", path.display()))?,
    );
    let host = Host::new(backend.clone(), RelayHub::new(config.store.relay_capacity));
    let flusher = backend.spawn_flusher();

    let result = run(args, &config, &host).await;

    // Waits behind any flush the flusher has in flight
    let saved = backend
        .flush()
        .await
        .with_context(|| format!("Failed to save state to {}", path.display()));
    flusher.stop().await;
    saved?;
    result
}
