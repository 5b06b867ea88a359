use core_config::tracing::{init_tracing, install_color_eyre};
use sql_gateway::config::Config;
use sql_gateway::state::{AppState, GatewayConnector};
use sql_gateway::api;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    // Initialize tracing with ErrorLayer for span trace capture
    init_tracing(&config.environment);

    let connector = GatewayConnector::postgres(config.cluster.as_ref());

    // With cluster settings in the environment, open the session up
    // front. A failure is not fatal: /connect can establish it later.
    if let Some(cluster) = &config.cluster {
        match connector.connect_from_config(cluster).await {
            Ok(Some(endpoint)) => info!("startup session established via {}", endpoint),
            Ok(None) => info!("startup session established"),
            Err(e) => warn!("startup connect failed: {}", e),
        }
    }

    let state = AppState {
        connector: connector.clone(),
    };
    let app = api::routes(state).layer(TraceLayer::new_for_http());

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("sql gateway listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    connector.shutdown().await;
    info!("sql gateway shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install ctrl-c handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
