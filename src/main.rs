use clap::Parser;
use dotenvy::dotenv;
use file_manager_gateway::config::GatewayConfig;
use file_manager_gateway::infrastructure::storage;
use file_manager_gateway::services::gateway::GatewayService;
use file_manager_gateway::services::staging::StagingArea;
use file_manager_gateway::services::worker::StagingSweeper;
use file_manager_gateway::{AppState, create_app};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the staging directory is checked for orphaned uploads.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port for the HTTP server (overrides PORT_FILE_MANAGER)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & logging
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "file_manager_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting File Manager Gateway...");

    // 2. Configuration, fail fast before anything binds
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            return Err(e.into());
        }
    };
    let port = args.port.unwrap_or(config.port);
    info!(
        "🛡️  Gateway Config: Bucket={}, Region={}, Staging={}, Max Size={}MB",
        config.bucket,
        config.region,
        config.staging_dir.display(),
        config.max_file_size / 1024 / 1024
    );

    // 3. Infrastructure
    let store = storage::setup_storage(&config).await;
    let staging = Arc::new(StagingArea::new(
        config.staging_dir.clone(),
        config.max_file_size,
    ));
    staging.ensure_dir().await?;

    // 4. Recover from a previous crash: staged files cannot be in flight yet
    match staging.sweep_orphans(Duration::ZERO).await {
        Ok(0) => {}
        Ok(removed) => info!("🧹 Removed {} staged files left by a previous run", removed),
        Err(e) => error!("❌ Startup staging sweep failed: {}", e),
    }

    // 5. Background sweeper
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = StagingSweeper::new(
        staging.clone(),
        config.staging_cleanup_age(),
        SWEEP_INTERVAL,
        shutdown_rx,
    );
    let sweeper_handle = tokio::spawn(sweeper.run());

    // 6. API
    let gateway = Arc::new(GatewayService::new(store, staging));
    let state = AppState {
        gateway,
        config: config.clone(),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::new(args.host, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ File Manager Gateway listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("🛑 Shutting down...");
    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    info!("👋 Gateway exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
