//! ==============================================================================
//! main.rs - farm host entry point
//! ==============================================================================
//!
//! purpose:
//!     runs the ingestion hub, the acquisition monitor, or both, depending on
//!     `cluster.role` in host.toml.
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    farm host (this file)                     │
//!     │  ┌──────────────────────┐      ┌──────────────────────────┐  │
//!     │  │ hub (port 3000)      │      │ monitor                  │  │
//!     │  │  POST sensor-data    │ <──  │  endpoint ladder, retry  │  │
//!     │  │  GET current/history │      │  timer + manual refresh  │  │
//!     │  └──────────┬───────────┘      └────────────┬─────────────┘  │
//!     │        ReadingStore                   MonitorHandle          │
//!     └─────────────┼───────────────────────────────┼────────────────┘
//!                   ▲ push                          │ pull
//!             ┌─────┴──────┐                 ┌──────┴──────┐
//!             │ esp32 node │                 │ device/hub  │
//!             └────────────┘                 └─────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use farm_host::acquire::{Acquirer, HttpSource};
use farm_host::config::{ConfigOrigin, HostConfig};
use farm_host::domain::ConnectionState;
use farm_host::server::{self, ServerState};
use farm_host::store::ReadingStore;
use farm_host::supervisor::{self, MonitorHandle};

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let (config, origin) = HostConfig::load_or_default();

    // step 2: logging, RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("farm host {} starting", env!("CARGO_PKG_VERSION"));
    match &origin {
        ConfigOrigin::File(path) => info!("config loaded from {}", path.display()),
        ConfigOrigin::Defaults { problems } => {
            for problem in problems {
                warn!("config: {}", problem);
            }
            warn!("no usable config file found, using defaults");
        }
    }
    config.print_summary();
    config.validate()?;

    let role = config.cluster.role;

    // step 3: hub in background; a bind failure aborts startup
    let hub = if role.runs_hub() {
        let state = ServerState {
            store: ReadingStore::new(config.server.history_capacity),
            show_sensor_data: config.logging.show_sensor_data,
        };
        let listener = server::bind(config.server.socket_addr()?).await?;
        Some(tokio::spawn(server::run_server(state, listener)))
    } else {
        None
    };

    // step 4: monitor loop
    if role.runs_monitor() {
        let acquirer = Acquirer::new(HttpSource::default(), config.client.retry_policy());
        let handle = supervisor::spawn(
            acquirer,
            config.client.refresh_settings(),
            config.client.history_capacity,
        );
        report_until_shutdown(handle, config.logging.show_sensor_data).await;
    } else if let Some(hub) = hub {
        // hub is the whole process: its failure is ours
        tokio::select! {
            served = hub => {
                served??;
                warn!("hub server stopped");
            }
            signal = tokio::signal::ctrl_c() => signal?,
        }
    }

    info!("shutting down");
    Ok(())
}

/// log every completed cycle until ctrl-c
async fn report_until_shutdown(handle: MonitorHandle, show_sensor_data: bool) {
    let mut updates = handle.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("monitor stopped");
                    return;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.connection == ConnectionState::Connecting {
                    continue;
                }
                let source = snapshot.endpoint.as_deref().unwrap_or("synthetic");
                if show_sensor_data {
                    info!(
                        "[{:?}] temp {:.1}°C | humidity {:.1}% | soil {:.1}% ({}, {} in history)",
                        snapshot.connection,
                        snapshot.current.temperature,
                        snapshot.current.humidity,
                        snapshot.current.soil_moisture,
                        source,
                        snapshot.history.len(),
                    );
                } else {
                    info!("[{:?}] cycle complete ({})", snapshot.connection, source);
                }
            }
            _ = tokio::signal::ctrl_c() => return,
        }
    }
}
