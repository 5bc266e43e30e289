mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use larder_api::state::AppStateInner;
use larder_db::Database;
use larder_types::models::Role;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "larder=debug,larder_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;
    for email in &config.admin_emails {
        if db.set_role_by_email(email, Role::Admin)? {
            info!("Granted admin role to {}", email);
        } else {
            warn!("LARDER_ADMIN_EMAILS lists {}, but no such user is registered", email);
        }
    }

    let state = AppStateInner::new(db, config.jwt_secret, config.token_ttl);

    let app = larder_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Larder server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
