//! docscaled: the docscale entry binary.
//!
//! Each `scale-up` / `scale-down` run is one invocation: load the
//! configuration, wire the collaborators, run the procedure, exit. Runs
//! against the standalone redb store, which also backs the `seed`,
//! `settle`, and `status` tooling.
//!
//! # Usage
//!
//! ```text
//! docscaled init --cluster orders-db > docscale.toml
//! docscaled --config docscale.toml seed --fixture cluster.json
//! docscaled --config docscale.toml scale-up --event alarm.json
//! docscaled --config docscale.toml scale-down
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use docscale_autoscale::Procedure;
use tracing_subscriber::EnvFilter;

mod invoke;
mod standalone;

#[derive(Parser)]
#[command(name = "docscaled", about = "docscale: read-replica autoscaler", version)]
struct Cli {
    /// Path to docscale.toml. Without it, options are read from the environment.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the standalone state store.
    #[arg(long, global = true, default_value = "/var/lib/docscale")]
    data_dir: PathBuf,

    /// Exit with an error when an invocation ends in a fault.
    #[arg(long, global = true)]
    strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scale-up procedure once.
    ScaleUp {
        /// JSON event file, or "-" for stdin. Omit for a manual invocation.
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Run the scale-down procedure once.
    ScaleDown {
        /// JSON event file, or "-" for stdin.
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Load a JSON fixture into the state store.
    Seed {
        #[arg(long)]
        fixture: PathBuf,
    },
    /// Complete pending instance creations and deletions.
    Settle,
    /// Print the configured cluster as seen by the state store.
    Status,
    /// Print a starter docscale.toml.
    Init {
        #[arg(long, default_value = "my-cluster")]
        cluster: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,docscale=debug,docscaled=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::ScaleUp { event } => {
            invoke::run(
                Procedure::ScaleUp,
                cli.config.as_deref(),
                &cli.data_dir,
                cli.strict,
                event.as_deref(),
            )
            .await
        }
        Command::ScaleDown { event } => {
            invoke::run(
                Procedure::ScaleDown,
                cli.config.as_deref(),
                &cli.data_dir,
                cli.strict,
                event.as_deref(),
            )
            .await
        }
        Command::Seed { fixture } => standalone::seed(&cli.data_dir, &fixture),
        Command::Settle => {
            let ctx = invoke::Context::load(cli.config.as_deref(), &cli.data_dir, cli.strict)?;
            standalone::settle(&ctx)
        }
        Command::Status => {
            let ctx = invoke::Context::load(cli.config.as_deref(), &cli.data_dir, cli.strict)?;
            standalone::status(&ctx)
        }
        Command::Init { cluster } => standalone::init(&cluster),
    }
}
