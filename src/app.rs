use crate::config::Config;
use crate::proxy::{BannerInjector, HttpTransport, ProxyEngine};
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Slack between the engine's deadline and the router's own timeout, so the
/// engine reports the timeout as an upstream error first.
const HANDLER_TIMEOUT_HEADROOM: Duration = Duration::from_secs(5);

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Create a new App instance from loaded configuration
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let transport = HttpTransport::new(
            &config.user_agent,
            config.request_timeout,
            config.redirect_mode,
            config.max_redirects,
        )
        .context("Failed to create upstream HTTP client")?;

        let proxy_config = config.proxy_config();
        info!(
            origin = proxy_config.origin_prefix.as_str(),
            blocked_origins = ?proxy_config.blocked_origins,
            path_prefix = proxy_config.proxy_path_prefix.as_str(),
            redirect_mode = ?config.redirect_mode,
            max_redirects = config.max_redirects,
            request_timeout = fmt_duration(config.request_timeout),
            deadline = fmt_duration(config.upstream_deadline()),
            "proxy configured"
        );

        let mut engine = ProxyEngine::new(proxy_config, Arc::new(transport))
            .with_max_redirects(config.max_redirects)
            .with_deadline(config.upstream_deadline());
        if let Some(banner) = config.banner() {
            info!(bytes = banner.len(), "banner injection enabled");
            engine = engine.with_hook(Arc::new(BannerInjector::new(banner)));
        }

        Ok(App {
            app_state: AppState::new(engine),
            config,
        })
    }

    /// Serve until a shutdown signal arrives, then drain within `shutdown_timeout`
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = %e, %addr, "failed to bind listener");
                return ExitCode::FAILURE;
            }
        };
        info!(%addr, "listening");

        let handler_timeout = self
            .config
            .upstream_deadline()
            .saturating_add(HANDLER_TIMEOUT_HEADROOM);
        let router = create_router(self.app_state, handler_timeout);
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
        });

        tokio::select! {
            result = &mut server => {
                // Server stopped on its own, without a signal
                return match result {
                    Ok(Ok(())) => ExitCode::SUCCESS,
                    Ok(Err(e)) => {
                        error!(error = %e, "server error");
                        ExitCode::FAILURE
                    }
                    Err(e) => {
                        error!(error = %e, "server task panicked");
                        ExitCode::FAILURE
                    }
                };
            }
            _ = shutdown_signal() => {}
        }

        info!(
            timeout = fmt_duration(self.config.shutdown_timeout),
            "shutdown signal received, draining connections"
        );
        let _ = shutdown_tx.send(());

        match tokio::time::timeout(self.config.shutdown_timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!("shutdown complete");
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = %e, "server error during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = %e, "server task panicked during shutdown");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!("graceful shutdown timed out, exiting with open connections");
                ExitCode::FAILURE
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
