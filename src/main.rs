use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usersync::{
    api::{shutdown_signal, ApiServer, ApiState},
    config::{Config, ConfigLoader, LogFormat, LoggingConfig},
    error::Result,
    models::SyncDirection,
    sync::SyncService,
};

#[derive(Parser)]
#[command(
    name = "usersync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bidirectional user synchronization between two systems",
    long_about = None
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "USERSYNC_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "USERSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both sync directions on their schedule and serve the API
    Run {
        /// Dry run mode (validate configuration without starting)
        #[arg(long)]
        dry_run: bool,
    },
    /// Run a single direction once and exit
    RunOnce {
        /// a_to_b or b_to_a
        #[arg(short, long)]
        direction: SyncDirection,
    },
    /// Validate configuration
    Validate,
    /// Generate sample configuration
    GenerateSample,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::GenerateSample) => {
            println!("{}", ConfigLoader::generate_sample());
            return Ok(());
        }
        Some(Commands::Version) => {
            print_version_info();
            return Ok(());
        }
        _ => {}
    }

    // Config drives the log format, so it is loaded before tracing starts
    let loaded = load_config(cli.config.as_deref());
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let level = cli.log_level.clone().unwrap_or(logging.level.clone());
    init_tracing(&level, &logging);

    info!("usersync v{}", env!("CARGO_PKG_VERSION"));
    let config = loaded.map_err(|e| {
        error!("Configuration is invalid: {}", e);
        e
    })?;
    describe_config(&config);

    match cli.command {
        Some(Commands::Validate) => {
            info!("Configuration is valid");
            Ok(())
        }
        Some(Commands::Run { dry_run: true }) => {
            info!("Dry run completed successfully");
            Ok(())
        }
        Some(Commands::RunOnce { direction }) => run_once(config, direction).await,
        _ => run_service(config).await,
    }
}

fn init_tracing(log_level: &str, logging: &LoggingConfig) {
    use tracing_subscriber::fmt::time::ChronoLocal;

    let filter = format!("usersync={},info", log_level);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    match logging.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_timer(timer)
                .with_current_span(false);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty().with_timer(timer);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_timer(timer)
                .with_ansi(true)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(CustomFormatter);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        }
    }
}

// Custom formatter for the log output
struct CustomFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};

        let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());
        timer.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        match *level {
            tracing::Level::ERROR => write!(writer, "\x1b[31mERROR\x1b[0m")?,
            tracing::Level::WARN => write!(writer, "\x1b[33m WARN\x1b[0m")?,
            tracing::Level::INFO => write!(writer, " INFO")?,
            tracing::Level::DEBUG => write!(writer, "\x1b[36mDEBUG\x1b[0m")?,
            tracing::Level::TRACE => write!(writer, "\x1b[35mTRACE\x1b[0m")?,
        }
        write!(writer, " ")?;

        // Thread name, last 8 characters
        let current_thread = std::thread::current();
        let name = current_thread.name().unwrap_or("unnamed");
        let truncated_name = if name.len() > 8 {
            &name[name.len() - 8..]
        } else {
            name
        };
        write!(writer, "[{:8}] ", truncated_name)?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

fn describe_config(config: &Config) {
    info!("  Application: {}", config.app.name);
    info!("  System A: {}", config.system_a.name);
    info!("  System B: {}", config.system_b.name);
    info!(
        "  Page size: {}, poll interval: {}ms, batch timeout: {}ms",
        config.sync.page_size, config.sync.poll_interval_ms, config.sync.batch_timeout_ms
    );
}

async fn run_once(config: Config, direction: SyncDirection) -> Result<()> {
    let service = SyncService::from_config(&config).await?;
    let report = service.orchestrator().run_once(direction).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    info!("Starting usersync service");

    let service = SyncService::from_config(&config).await?;
    let scheduler = service.scheduler();

    let health = service.orchestrator().health().await;
    if !health.is_healthy() {
        warn!("Starting with unhealthy components: {:?}", health);
    }

    if config.app.auto_start {
        scheduler.start_all().await;
    } else {
        info!("Auto-start disabled; start directions through the API");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let api_handle = if config.api.enabled {
        let server = ApiServer::new(config.api.clone(), ApiState::new(scheduler.clone()));
        let mut api_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let signal = async move {
                let _ = api_shutdown.wait_for(|stop| *stop).await;
            };
            if let Err(e) = server.start(signal).await {
                error!("API server failed: {}", e);
                warn!("Service will continue without API server");
            }
        }))
    } else {
        info!("API server is disabled");
        None
    };

    info!("Service started successfully");
    info!("Press Ctrl+C to stop");

    let mut stop = shutdown_rx;
    let _ = stop.wait_for(|stop| *stop).await;

    info!("Stopping service...");
    scheduler.shutdown().await;

    if let Some(handle) = api_handle {
        if let Err(e) = handle.await {
            warn!("API task ended abnormally: {}", e);
        }
    }

    info!("Service stopped");
    Ok(())
}

fn print_version_info() {
    println!("usersync v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Bidirectional, watermark-based user synchronization between two systems");
}
