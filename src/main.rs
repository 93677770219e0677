//! Indicator IP core register server
//!
//! Maps one or more indicator IP cores from /dev/mem and serves their
//! register regions and LED field over HTTP.
//!
//! ## Build-time Configuration
//! - `INDICATOR_PORT`: HTTP server port (default: 8083)
//! - `INDICATOR_BASE_ADDR`: IP core base address in hex (default: 0x40000000)
//!
//! ## Runtime Configuration
//! - `PORT`: Override server port at runtime
//! - `INDICATOR_ADDRS`: Comma separated base addresses, one device each
//! - `INDICATOR_MEM`: Memory device to map (default: /dev/mem)
//! - `INDICATOR_SIMULATE`: `1` to back devices with memory instead of hardware

use std::net::SocketAddr;
use std::sync::Arc;

use indicator_server::api;
use indicator_server::bus::{RegisterBus, SimBus};
use indicator_server::config::{Config, DEFAULT_BASE_ADDR, DEFAULT_PORT};
use indicator_server::device::{Device, DeviceTable};
use indicator_server::devmem::DevMem;
use indicator_server::regmap::INDICATOR_MAP;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indicator_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    tracing::info!("Indicator server starting...");
    tracing::info!("Build defaults: port={}, base_addr={}", DEFAULT_PORT, DEFAULT_BASE_ADDR);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.simulate {
        tracing::warn!("Simulation mode: registers are backed by memory, not hardware");
    }

    let devices = Arc::new(DeviceTable::new());
    for &base_addr in &config.base_addrs {
        match attach(&config, base_addr) {
            Ok(device) => {
                tracing::info!("Attached {}", device.name());
                devices.attach(device);
            }
            Err(e) => {
                tracing::error!("Failed to initialize device at 0x{:08X}: {}", base_addr, e);
                tracing::error!(
                    "Make sure you have permission to access {} (run as root)",
                    config.mem_path.display()
                );
                std::process::exit(1);
            }
        }
    }

    let app = api::app(devices.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Detach on the signal itself: waiting activity requests are released
    // with 503 instead of holding up the graceful shutdown.
    let shutdown = {
        let devices = devices.clone();
        async move {
            shutdown_signal().await;
            devices.detach_all();
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    devices.detach_all();
    tracing::info!("Server shutdown complete");
}

/// Map the register block at `base_addr` and bring up its device.
fn attach(config: &Config, base_addr: usize) -> indicator_server::Result<Arc<Device>> {
    let size = INDICATOR_MAP.span();
    let bus: Arc<dyn RegisterBus> = if config.simulate {
        Arc::new(SimBus::new(size))
    } else {
        Arc::new(DevMem::open(&config.mem_path, base_addr, size)?)
    };
    Device::probe_indicator(base_addr, bus)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
