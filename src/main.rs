use anyhow::Context;
use clap::{Parser, ValueEnum};
use gcp_deploy::app::{self, Collaborators, Operation, RunOptions};
use gcp_deploy::error::{DeployError, EXIT_FATAL};
use gcp_deploy::gcp::auth::GcpCredentials;
use gcp_deploy::gcp::client::GcpClient;
use gcp_deploy::gcp::operation::WaitSettings;
use gcp_deploy::healthcheck::{HttpProbe, DEFAULT_PROBE_TIMEOUT};
use gcp_deploy::ingress::GkeIngress;
use gcp_deploy::metadata::Metadata;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Blue-green deployment of managed instance groups to GCP
#[derive(Parser, Debug)]
#[command(name = "gcp-deploy", about, long_about = None, disable_version_flag = true)]
struct Args {
    /// Path to the deployment metadata YAML file
    #[arg(long)]
    metadata: PathBuf,

    /// Path to the service account key file
    #[arg(long)]
    gcp_token: PathBuf,

    /// Operation to run
    #[arg(long, value_enum)]
    operation: Operation,

    /// Service name
    #[arg(long)]
    service: Option<String>,

    /// Release version
    #[arg(long)]
    version: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Also append logs to the log file in the user config directory
    #[arg(long)]
    log_file: bool,

    /// Seconds between two operation or group status polls
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    operation_poll_interval: u64,

    /// Seconds a new instance group has to become stable
    #[arg(long, default_value_t = 900)]
    stabilization_timeout: u64,

    /// Seconds a single operation may run before failing the deploy
    #[arg(long)]
    operation_timeout: Option<u64>,

    /// Directory the deploy result file is written to
    #[arg(long, default_value = ".")]
    artifact_dir: PathBuf,

    /// Seconds each healthcheck request may take
    #[arg(
        long,
        default_value_t = DEFAULT_PROBE_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    healthcheck_timeout: u64,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    to_file: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gcp_deploy={}", tracing_level.as_str().to_lowercase())));

    if !to_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    }

    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(non_blocking.with_max_level(tracing_level)))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gcp-deploy").join("gcp-deploy.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gcp-deploy").join("gcp-deploy.log");
    }
    PathBuf::from("gcp-deploy.log")
}

async fn execute(args: &Args) -> gcp_deploy::Result<()> {
    let metadata = Metadata::load(&args.metadata)?;
    let credentials = GcpCredentials::from_key_file(&args.gcp_token)?;
    let client = GcpClient::new(Arc::new(credentials), metadata.project(), metadata.region())?;

    let routing = GkeIngress::new(client.clone(), metadata.gke_cluster.clone());
    let probe = HttpProbe::new(Duration::from_secs(args.healthcheck_timeout))?;

    let options = RunOptions {
        service: args.service.clone(),
        version: args.version.clone(),
        wait: WaitSettings {
            poll_interval: Duration::from_secs(args.operation_poll_interval),
            stabilization_timeout: Duration::from_secs(args.stabilization_timeout),
            operation_timeout: args.operation_timeout.map(Duration::from_secs),
        },
        artifact_dir: args.artifact_dir.clone(),
    };

    tracing::info!(
        "Start blue-green deployment operation {:?} of service {} version {} to GCP project {}",
        args.operation,
        args.service.as_deref().unwrap_or("-"),
        args.version.as_deref().unwrap_or("-"),
        metadata.project()
    );

    app::run(
        args.operation,
        &metadata,
        Collaborators {
            compute: &client,
            routing: &routing,
            probe: &probe,
        },
        &options,
    )
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level, args.log_file) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Logging setup failed: {err:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match execute(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{}", err);
            if let DeployError::OperationFailed { operation, .. } = &err {
                tracing::error!("Failed operation: {}", operation);
            }
            ExitCode::from(err.exit_code())
        }
    }
}
