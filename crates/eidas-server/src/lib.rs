//! # eidas-server
//!
//! HTTP front end of the eIDAS ProxyService.
//!
//! - `POST /ServiceProvider`, `GET /ServiceProvider` - connector requests
//! - `GET /health` - health check
//!
//! ## Usage
//!
//! ```ignore
//! use eidas_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! Server::new(config)?.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use router::create_router;
pub use state::AppState;

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

/// The eIDAS node server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Creates a server, loading credentials and metadata.
    ///
    /// # Errors
    ///
    /// Fails if a configured file cannot be read or parsed.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let state = AppState::from_config(&config)?;
        Ok(Self { config, state })
    }

    /// Runs the server until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.bind_address()).await?;
        tracing::info!(
            address = %listener.local_addr()?,
            country = %self.config.node.country_code,
            "server listening"
        );
        serve(listener, create_router(self.state), shutdown_signal()).await?;
        tracing::info!("server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Creates the router without starting the server.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Serves `app` on `listener`, exposing peer addresses to the handlers.
///
/// # Errors
///
/// Fails if the listener fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
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
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
