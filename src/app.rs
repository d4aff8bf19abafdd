/*
 * Responsibility
 * - Config loading → dependency construction → Router assembly
 * - Middleware wiring (auth layers, security headers, HTTP layers, panic recovery)
 * - Serve with axum::serve() until SIGINT/SIGTERM, then drain within the shutdown timeout
 */
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    middleware::{self, OidcMiddleware, SessionMiddleware},
};

pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    info!(addr = %config.addr, env = ?config.app_env, "starting");

    let http = reqwest::Client::builder()
        .timeout(config.http_client_timeout)
        .build()
        .context("building http client")?;

    let oidc = match (&config.oidc, config.middleware_config()) {
        (Some(settings), Some(mw_config)) => Some(
            OidcMiddleware::discover(&http, &settings.issuer, mw_config)
                .await
                .with_context(|| format!("discovering OIDC provider {}", settings.issuer))?,
        ),
        _ => None,
    };

    let sessions = match &config.session_store_url {
        Some(url) => Some(
            SessionMiddleware::new(http.clone(), url, config.session_middleware_config())
                .with_context(|| format!("configuring session store {url}"))?,
        ),
        None => None,
    };

    let app = build_router(oidc, sessions, config.request_timeout);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    serve(listener, app, config.shutdown_timeout).await
}

pub fn build_router(
    oidc: Option<OidcMiddleware>,
    sessions: Option<SessionMiddleware>,
    request_timeout: Duration,
) -> Router {
    let router = Router::new().nest("/api/v1", api::v1::routes(oidc, sessions));
    let router = middleware::security_headers::apply(router);
    let router = middleware::http::apply(router, request_timeout);
    middleware::http::recoverer(router, middleware::http::internal_error)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown_timeout: Duration,
) -> Result<()> {
    let drain = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let drain = drain.clone();
            async move { drain.notified().await }
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return Ok(res?),
        () = shutdown_signal() => {}
    }

    drain.notify_one();
    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(res) => res?,
        Err(_) => warn!(?shutdown_timeout, "in-flight requests did not finish in time"),
    }

    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
