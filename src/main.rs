use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use taskline::core::ExecutionPlan;
use taskline::{pipeline, tlog, tlog_debug, tlog_error, Context, Pipeline, Result, Tasks};

/// Taskline - build and serve a bundled front end
#[derive(Parser, Debug)]
#[command(name = "taskline")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    NODE_ENV          Execution mode passed to the bundler (default: development)\n    TASKLINE_DEBUG=1  Enable debug logging (alternative to --debug)"
)]
pub struct Cli {
    /// Project root containing taskline.toml and package.json
    #[arg(short = 'r', long, default_value = ".")]
    pub root: PathBuf,

    /// Execution mode, overrides NODE_ENV
    #[arg(short = 'm', long)]
    pub mode: Option<String>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Production build: clean, prepare data, bundle (the default)
    #[command(name = "default", alias = "build")]
    Build,

    /// Development server: prepare data, then watch and serve
    Serve,

    /// Remove the output directory and bundler cache
    Clean,

    /// Print the task tree of every pipeline
    Tasks,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    taskline::log::init(cli.debug, cli.log_file.clone());

    if let Err(e) = run(cli).await {
        tlog_error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = Arc::new(Context::load(&cli.root, cli.mode)?);
    tlog_debug!(
        "Project root={} mode={} version={:?}",
        ctx.root.display(),
        ctx.env.mode,
        ctx.env.app_version
    );

    let selected = match cli.command.unwrap_or(Command::Build) {
        Command::Build => Pipeline::Default,
        Command::Serve => Pipeline::Serve,
        Command::Clean => Pipeline::Clean,
        Command::Tasks => return print_tasks(ctx),
    };

    let cancel = CancellationToken::new();
    if stops_on_interrupt(selected) {
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tlog!("Interrupted, stopping");
                on_signal.cancel();
            }
        });
    }

    tlog!("Using {}", ctx.root.display());
    pipeline::run(ctx, selected, cancel).await
}

/// Only serve runs until cancelled. Other pipelines keep the default
/// Ctrl-C behaviour, which terminates the process.
fn stops_on_interrupt(selected: Pipeline) -> bool {
    selected == Pipeline::Serve
}

fn print_tasks(ctx: Arc<Context>) -> Result<()> {
    let tasks = Tasks::new(ctx);
    for entry in Pipeline::all() {
        let graph = tasks.graph(entry, CancellationToken::new())?;
        let stages = ExecutionPlan::from_node(&graph).stages()?;
        println!("{}", entry.name());
        print!("{}", graph.describe());
        for (i, stage) in stages.iter().enumerate() {
            println!("  stage {}: {}", i + 1, stage.join(", "));
        }
        println!();
    }
    Ok(())
}
