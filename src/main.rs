//! E2 Node Telemetry Simulator
//!
//! Generates one synthetic measurement record per period and posts it to
//! every configured target concurrently.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         E2 Simulator                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Scheduler   │───▶│  Generator   │───▶│   Delivery   │──▶ xApps
//! │  │   (tick)     │    │  (record)    │    │  (fan-out)   │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │         │                                        │               │
//! │         └──────────── IterationReport ◀──────────┘               │
//! │                 logs │ /metrics │ /readyz                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use e2sim::adapters::{
    CompositeReportSink, HttpTransport, LoggingReportSink, PrometheusReportSink, ReadinessSink,
};
use e2sim::config::{ResolvedConfig, SimulatorConfig};
use e2sim::error::{Error, Result};
use e2sim::{DeliveryEngine, IterationScheduler, MeasurementGenerator, SchedulerConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// E2 Node Simulator - synthetic RAN telemetry for near-RT RIC xApps
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(long, env = "E2SIM_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between iteration starts (overrides the file)
    #[arg(long, env = "E2SIM_PERIOD_SECONDS")]
    period_seconds: Option<f64>,

    /// Seconds before the first iteration (overrides the file)
    #[arg(long, env = "E2SIM_INITIAL_DELAY_SECONDS")]
    initial_delay_seconds: Option<f64>,

    /// Simulated cell identifier (overrides the file)
    #[arg(long, env = "E2SIM_CELL_ID")]
    cell_id: Option<u64>,

    /// Seed for reproducible measurements (overrides the file)
    #[arg(long, env = "E2SIM_SEED")]
    seed: Option<u64>,

    /// Stop after this many iterations (overrides the file)
    #[arg(long, env = "E2SIM_MAX_ITERATIONS")]
    max_iterations: Option<u64>,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9090")]
    metrics_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Load the file (if any) and apply command-line overrides.
    fn load_config(&self) -> Result<ResolvedConfig> {
        let mut config = match &self.config {
            Some(path) => SimulatorConfig::from_file(path)?,
            None => SimulatorConfig::default(),
        };

        if let Some(period) = self.period_seconds {
            config.period_seconds = period;
        }
        if let Some(delay) = self.initial_delay_seconds {
            config.initial_delay_seconds = Some(delay);
        }
        if let Some(cell_id) = self.cell_id {
            config.cell_id = cell_id;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.max_iterations.is_some() {
            config.max_iterations = self.max_iterations;
        }

        config.resolve()
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_config() => {
            error!("Refusing to start: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Simulator failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;

    info!("Starting E2 node simulator v{}", env!("CARGO_PKG_VERSION"));
    info!("  Period: {:?}", config.period);
    info!("  Initial delay: {:?}", config.initial_delay);
    info!("  Cell ID: {}", config.cell_id);
    match config.seed {
        Some(seed) => info!("  Sampling: deterministic (seed {})", seed),
        None => info!("  Sampling: random"),
    }
    if let Some(max) = config.max_iterations {
        info!("  Max iterations: {}", max);
    }
    info!("  Targets ({}):", config.registry.len());
    for target in config.registry.iter() {
        info!("    {}", target);
    }

    // Observability
    let metrics_registry = prometheus::Registry::new();
    let readiness = Arc::new(ReadinessSink::new());
    let logging = match args.log_level.to_lowercase().as_str() {
        "trace" | "debug" => LoggingReportSink::with_json_dump(),
        _ => LoggingReportSink::new(),
    };
    let sink = CompositeReportSink::new()
        .with_sink(Arc::new(logging))
        .with_sink(Arc::new(PrometheusReportSink::new(&metrics_registry)?))
        .with_sink(readiness.clone());

    // Delivery
    let transport = HttpTransport::new()?;
    let generator = match config.seed {
        Some(seed) => MeasurementGenerator::with_seed(config.cell_id, seed),
        None => MeasurementGenerator::new(config.cell_id),
    };

    let scheduler = IterationScheduler::new(
        SchedulerConfig::from(&config),
        generator,
        DeliveryEngine::new(Arc::new(transport)),
        Arc::new(config.registry),
        Arc::new(sink),
    );

    let cancel = CancellationToken::new();

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, readiness, health_cancel).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_registry, metrics_cancel).await
        {
            error!("Metrics server error: {}", e);
        }
    });

    // Stop on SIGINT/SIGTERM
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, finishing current iteration");
        signal_cancel.cancel();
    });

    let summary = scheduler.run(cancel.clone()).await;
    cancel.cancel();

    info!(
        run_id = %summary.run_id,
        iterations = summary.iterations,
        last_sequence_number = ?summary.last_sequence_number,
        "Simulator shutdown complete"
    );
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "hyper_util=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Shutdown
// =============================================================================

async fn shutdown_signal() {
    tokio::select! {
        _ = ctrl_c() => {},
        _ = terminate() => {},
    }
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            warn!(?err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

// =============================================================================
// HTTP Servers
// =============================================================================

mod http_util {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::{Response, StatusCode};

    pub type Body = Full<Bytes>;

    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Body> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        response
    }

    pub fn not_found() -> Response<Body> {
        text(StatusCode::NOT_FOUND, "not found")
    }
}

async fn serve<F, Fut>(name: &str, addr: &str, cancel: CancellationToken, handler: F) -> Result<()>
where
    F: Fn(hyper::Request<hyper::body::Incoming>) -> Fut + Clone + Send + 'static,
    Fut: std::future::Future<
            Output = std::result::Result<
                hyper::Response<http_util::Body>,
                std::convert::Infallible,
            >,
        > + Send
        + 'static,
{
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::config(format!("Invalid {} server address: {}", name, e)))?;

    let listener = TcpListener::bind(addr).await?;

    info!("{} server listening on {}", name, addr);

    loop {
        let (stream, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };

        let io = TokioIo::new(stream);
        let handler = handler.clone();
        let name = name.to_string();

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(handler))
                .await
            {
                error!("{} server connection error: {}", name, e);
            }
        });
    }
}

async fn run_health_server(
    addr: &str,
    readiness: Arc<ReadinessSink>,
    cancel: CancellationToken,
) -> Result<()> {
    use hyper::StatusCode;

    serve("Health", addr, cancel, move |req| {
        let readiness = readiness.clone();
        async move {
            let response = match req.uri().path() {
                "/healthz" | "/livez" => http_util::text(StatusCode::OK, "ok"),
                "/readyz" if readiness.is_ready() => http_util::text(StatusCode::OK, "ok"),
                "/readyz" => http_util::text(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "waiting for first iteration",
                ),
                _ => http_util::not_found(),
            };
            Ok(response)
        }
    })
    .await
}

async fn run_metrics_server(
    addr: &str,
    registry: prometheus::Registry,
    cancel: CancellationToken,
) -> Result<()> {
    use http_body_util::Full;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::{Response, StatusCode};
    use prometheus::{Encoder, TextEncoder};

    serve("Metrics", addr, cancel, move |req| {
        let registry = registry.clone();
        async move {
            let response = match req.uri().path() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();
                    match encoder.encode(&registry.gather(), &mut buffer) {
                        Ok(()) => {
                            let mut response = Response::new(Full::new(buffer.into()));
                            response.headers_mut().insert(
                                CONTENT_TYPE,
                                HeaderValue::from_static(prometheus::TEXT_FORMAT),
                            );
                            response
                        }
                        Err(e) => http_util::text(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            format!("failed to encode metrics: {}", e),
                        ),
                    }
                }
                _ => http_util::not_found(),
            };
            Ok(response)
        }
    })
    .await
}
