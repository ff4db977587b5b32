//! Consulting portal server

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cp_api::AppState;
use cp_auth::{AuthConfig, Authenticator, JwtService};
use cp_core::config::AppConfig;
use cp_db::{Database, DatabaseConfig, PgStore};
use cp_notifications::LogNotifier;
use cp_services::Portal;

mod health;

use health::{HealthChecker, HealthConfig};

const DEFAULT_FILTER: &str = "info,cp_server=debug,cp_api=debug,cp_services=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(config.json_logs());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting consulting portal"
    );

    let db = Database::connect(&DatabaseConfig::from(&config.database))
        .await
        .context("connecting to database")?;
    if config.database.run_migrations {
        db.migrate().await.context("running migrations")?;
    }

    let portal = Portal::new(
        Arc::new(PgStore::from_database(&db)),
        Arc::new(LogNotifier::new(config.notifications.enabled)),
    );
    let state = AppState::new(portal, Authenticator::new(auth_config(&config)));
    let health = Arc::new(HealthChecker::new(HealthConfig::default()).with_database(db.clone()));

    let app = build_router(state, health);

    let addr = config.server_addr();
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true),
            )
            .init();
    }
}

fn auth_config(config: &AppConfig) -> AuthConfig {
    let jwt = JwtService::new(config.auth.jwt_secret.as_bytes()).with_issuer(config.auth.jwt_issuer.as_str());
    let auth = AuthConfig::jwt(jwt);
    if config.auth.trust_gateway_headers {
        info!("Trusting identity headers from the upstream gateway");
        auth.with_gateway_headers()
    } else {
        auth
    }
}

fn build_router(state: AppState, health: Arc<HealthChecker>) -> Router {
    let health_routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(cp_api::router().with_state(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
