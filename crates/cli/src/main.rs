use crate::{
    cluster::ClusterFile,
    commands::{Commands, TargetArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use engine_config::{error::SettingsError, settings::load::LoadSettings};
use engine_core::connectors::memory::MemoryCluster;
use engine_runtime::{execution::executor, schema::resolver};
use std::{fs::File, io::BufReader, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cluster;
mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "bulkload", version = "0.1.0", about = "Partitioned parallel CSV loader")]
struct Cli {
    #[arg(long, short, global = true, help = "Log at debug level unless RUST_LOG is set")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli.command, &shutdown).await {
        Ok(code) => code,
        Err(err) => {
            error!(%err, "bulkload failed");
            ExitCode::Failure
        }
    };
    std::process::exit(code.as_i32());
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(command: Commands, shutdown: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    match command {
        Commands::Load {
            target,
            input,
            config,
            batch_size,
            max_errors,
            report_every,
            delimiter,
            header,
            rejected_rows,
            output,
        } => {
            let mut settings = match &config {
                Some(path) => LoadSettings::from_file(path)?,
                None => LoadSettings::default(),
            };
            if let Some(load_target) = target.load_target() {
                settings = settings.with_target(load_target);
            }
            if let Some(batch_size) = batch_size {
                settings = settings.with_batch_size(batch_size);
            }
            if let Some(max_errors) = max_errors {
                settings = settings.with_max_errors(max_errors);
            }
            if let Some(report_every) = report_every {
                settings = settings.with_report_every(report_every);
            }
            if let Some(path) = rejected_rows {
                settings = settings.with_rejected_rows_path(path);
            }
            if let Some(delimiter) = delimiter {
                settings.csv.delimiter = delimiter;
            }
            settings.csv.header |= header;
            let settings = settings.validate()?;

            let cluster = start_cluster(&target)?;
            info!(input = %input.display(), "Reading input");
            let reader = BufReader::new(File::open(&input)?);

            let summary = executor::run(
                cluster.clone(),
                cluster,
                settings,
                reader,
                shutdown.stop_token(),
            )
            .await?;

            match output {
                Some(path) => output::write_json(&summary, &path).await?,
                None => output::print_summary(&summary),
            }

            Ok(if shutdown.is_interrupted() {
                ExitCode::Interrupted
            } else if summary.is_success() {
                ExitCode::Success
            } else {
                ExitCode::Failure
            })
        }
        Commands::Schema { target } => {
            let load_target = target
                .load_target()
                .ok_or(CliError::Settings(SettingsError::MissingTarget))?;
            let cluster = start_cluster(&target)?;
            let descriptor = resolver::resolve(cluster.as_ref(), &load_target).await?;
            output::print_json(&descriptor)?;
            Ok(ExitCode::Success)
        }
    }
}

fn start_cluster(target: &TargetArgs) -> Result<Arc<MemoryCluster>, CliError> {
    let cluster = ClusterFile::from_file(&target.cluster)?.build()?;
    Ok(Arc::new(cluster))
}
