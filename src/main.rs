// Main entry point for the pet club service

use petclub::api::create_router;
use petclub::bootstrap::{build_app_state, seed_admin, Backends};
use petclub::config::Config;
use petclub::core::crypto::Argon2Comparator;

use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load and validate configuration first (before any logging)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing subscriber with config values
    init_tracing(&config);

    info!("Starting pet club service");
    info!(
        bind_address = %config.bind_address,
        port = config.port,
        cache_backend = ?config.cache_backend,
        token_registry = ?config.token_registry,
        "Configuration loaded"
    );

    // 3. Connect cache, store and notifier
    let backends = Backends::connect(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialize backends");
        e
    })?;

    // 4. Build application state
    let addr = format!("{}:{}", config.bind_address, config.port);
    let app_state = build_app_state(config, backends);

    // 5. Seed the administrator account if configured
    match app_state.config.admin_seed {
        Some(ref seed) => {
            seed_admin(&app_state, &Argon2Comparator::new(), seed)
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to seed admin user");
                    e
                })?;
        }
        None => warn!("ADMIN_* variables not set, skipping admin seeding"),
    }

    let router = create_router(&app_state).with_state(app_state);

    info!("Router created");

    // 6. Start HTTP server
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind to address");
        e
    })?;

    info!(addr = %addr, "Server listening on {}", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
///
/// `RUST_LOG` takes precedence over `LOG_LEVEL`.
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
