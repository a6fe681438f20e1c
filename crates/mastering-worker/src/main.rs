use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mastering_worker::controller::{
    HostCommandImporter, JobController, NoopImporter, ProjectImporter, WorkerConfig,
};
use mastering_worker::error::WorkerResult;
use mastering_worker::extstate::{ExtState, FileExtState};
use mastering_worker::job;

/// Non-blocking launcher/poller for the Matchering mastering CLI.
///
/// The host GUI writes the job request to the shared state directory before
/// invoking this worker and polls the `Status` key for progress. Completion
/// is always signalled through the status channel, never the exit code.
#[derive(Debug, Parser)]
#[command(name = "mastering-worker")]
struct Args {
    /// Directory holding the host's shared state files.
    #[arg(long, env = "MASTERING_STATE_DIR")]
    state_dir: PathBuf,

    /// Active project directory the output folder is created under.
    #[arg(long, env = "MASTERING_PROJECT_DIR")]
    project_dir: PathBuf,

    /// Interpreter the mastering CLI runs under.
    #[arg(long, default_value = "python3")]
    interpreter: PathBuf,

    /// Path to the mastering CLI entry point.
    #[arg(long)]
    tool: PathBuf,

    /// Command run to import the finished master into the project;
    /// `{path}` is replaced with the produced file.
    #[arg(long)]
    import_command: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if let Err(error) = run(args).await {
        // Failures are already published to the status channel where
        // possible; the exit code is not part of the host contract.
        tracing::error!("worker stopped: {error}");
    }
}

async fn run(args: Args) -> WorkerResult<()> {
    let store: Arc<dyn ExtState> = Arc::new(FileExtState::new(args.state_dir.clone()));
    let importer: Arc<dyn ProjectImporter> = match &args.import_command {
        Some(template) => Arc::new(HostCommandImporter::from_template(template)?),
        None => Arc::new(NoopImporter),
    };

    let config = WorkerConfig {
        interpreter: args.interpreter,
        tool: args.tool,
        ..WorkerConfig::default()
    };
    let mut controller = JobController::new(config, store.clone(), importer);

    let request = job::load_request(store.as_ref()).await?;
    controller.submit(&args.project_dir, &request).await?;
    controller.run().await
}
