//! `promoreel` CLI - render hotel promo content and send it for approval

mod cmd;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use promoreel::PipelineError;

#[derive(Parser)]
#[command(name = "promoreel")]
#[command(about = "Automated hotel promo reels: store -> copy -> overlay -> approval")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/promoreel/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce one video or carousel and send it for approval
    Run {
        /// Fix the random source for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Print the run result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run once a day at a fixed local time
    Schedule {
        /// Local time of day, HH:MM
        #[arg(long, default_value = promoreel::schedule::DEFAULT_TIME)]
        at: String,
    },

    /// Show how an overlay text would be laid out (no services needed)
    Plan {
        /// Overlay text
        text: String,

        /// Frame width in pixels
        #[arg(long, default_value = "1080")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "1920")]
        height: u32,

        /// Random seed for color and position
        #[arg(long)]
        seed: Option<u64>,

        /// Style file (JSON or TOML) instead of the config's [style]
        #[arg(long)]
        style: Option<PathBuf>,

        /// Named font size from the style table
        #[arg(long, default_value = "medium")]
        size: String,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration and check for ffmpeg / ffprobe
    Check,

    /// Fetch approve / reject answers from Telegram
    Decisions {
        /// Print decisions as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    promoreel::logging::init_console(cli.verbose);

    let config = cli.config.as_deref();
    let outcome = match cli.command {
        Commands::Run { seed, json } => cmd::run::cmd_run(config, seed, json, cli.verbose).await,
        Commands::Schedule { at } => cmd::schedule::cmd_schedule(config, &at, cli.verbose).await,
        Commands::Plan {
            text,
            width,
            height,
            seed,
            style,
            size,
            json,
        } => cmd::plan::cmd_plan(
            config,
            &text,
            width,
            height,
            seed,
            style.as_deref(),
            &size,
            json,
        ),
        Commands::Check => cmd::check::cmd_check(config).await,
        Commands::Decisions { json } => cmd::decisions::cmd_decisions(config, json).await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<PipelineError>() {
                Some(pipeline) => eprintln!("error[{}]: {pipeline}", pipeline.kind()),
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
