//! ==============================================================================
//! supervisor.rs - single-slot acquisition scheduler for the monitor
//! ==============================================================================
//!
//! purpose:
//!     owns the acquirer and the client-side history, and decides WHEN a cycle
//!     runs: once at startup, then `interval` after the previous cycle
//!     finished, plus on manual refresh.
//!
//! single slot:
//!     exactly one task runs cycles, so two cycles can never overlap. a manual
//!     refresh that lands while a cycle is running is queued and answered with
//!     THAT cycle's result. one that lands while idle starts a cycle at once,
//!     and the periodic timer is re-armed from its completion.
//!
//! ```text
//! ┌──────────┐  refresh()   ┌───────────────────────────┐
//! │  handle  │ ───────────> │ supervisor task           │
//! │ (clone)  │ <─────────── │  wait -> cycle -> publish │
//! └──────────┘   snapshot   └───────────────────────────┘
//! ```
//!
//! relationships:
//!     - used by: main.rs (monitor role)
//!     - uses: acquire.rs (Acquirer), history.rs, domain.rs
//!
//! ==============================================================================

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::acquire::{Acquirer, ReadingSource};
use crate::domain::{Acquisition, ConnectionState, Reading};
use crate::history::History;

// ==============================================================================
// settings
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshSettings {
    interval: Duration,
    min: Duration,
    max: Duration,
    pub auto_refresh: bool,
}

impl RefreshSettings {
    /// `interval` is clamped into `[min, max]`
    pub fn new(interval: Duration, min: Duration, max: Duration, auto_refresh: bool) -> Self {
        let mut settings = Self { interval: min, min, max: max.max(min), auto_refresh };
        settings.set_interval(interval);
        settings
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// returns the interval actually applied
    pub fn set_interval(&mut self, interval: Duration) -> Duration {
        self.interval = interval.clamp(self.min, self.max);
        self.interval
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Duration::from_secs(5), Duration::from_secs(60), true)
    }
}

// ==============================================================================
// snapshot - what consumers see
// ==============================================================================

/// read-only view refreshed after every cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub current: Reading,
    pub history: History,
    pub connection: ConnectionState,
    pub last_update: Option<DateTime<Utc>>,
    /// false when `current` is placeholder data
    pub live: bool,
    /// endpoint that served `current`, if any
    pub endpoint: Option<String>,
}

impl Snapshot {
    fn initial(history_capacity: usize) -> Self {
        Self {
            current: Reading::zeroed(Utc::now()),
            history: History::new(history_capacity),
            connection: ConnectionState::Connecting,
            last_update: None,
            live: false,
            endpoint: None,
        }
    }
}

// ==============================================================================
// handle
// ==============================================================================

#[derive(Debug, thiserror::Error)]
#[error("acquisition supervisor has stopped")]
pub struct SupervisorClosed;

enum Command {
    Refresh(oneshot::Sender<Acquisition>),
    SetInterval(Duration),
    SetAutoRefresh(bool),
}

/// clone-able handle to a running supervisor
///
/// the supervisor task stops once every handle is dropped.
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Snapshot>,
}

impl MonitorHandle {
    /// ask for a cycle and wait for its result
    ///
    /// joins the in-flight cycle if there is one.
    pub async fn refresh(&self) -> Result<Acquisition, SupervisorClosed> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Refresh(tx)).await.map_err(|_| SupervisorClosed)?;
        rx.await.map_err(|_| SupervisorClosed)
    }

    pub async fn set_interval(&self, interval: Duration) -> Result<(), SupervisorClosed> {
        self.commands.send(Command::SetInterval(interval)).await.map_err(|_| SupervisorClosed)
    }

    pub async fn set_auto_refresh(&self, enabled: bool) -> Result<(), SupervisorClosed> {
        self.commands.send(Command::SetAutoRefresh(enabled)).await.map_err(|_| SupervisorClosed)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }
}

// ==============================================================================
// task
// ==============================================================================

pub fn spawn<S>(acquirer: Acquirer<S>, settings: RefreshSettings, history_capacity: usize) -> MonitorHandle
where
    S: ReadingSource + 'static,
{
    let (commands, rx) = mpsc::channel(16);
    let (snapshot_tx, snapshot) = watch::channel(Snapshot::initial(history_capacity));

    let supervisor = Supervisor {
        acquirer,
        settings,
        history: History::new(history_capacity),
        snapshot: snapshot_tx,
        commands: rx,
    };
    tokio::spawn(supervisor.run());

    MonitorHandle { commands, snapshot }
}

struct Supervisor<S> {
    acquirer: Acquirer<S>,
    settings: RefreshSettings,
    history: History,
    snapshot: watch::Sender<Snapshot>,
    commands: mpsc::Receiver<Command>,
}

impl<S: ReadingSource> Supervisor<S> {
    async fn run(mut self) {
        let mut waiters: Vec<oneshot::Sender<Acquisition>> = Vec::new();

        loop {
            let outcome = self.cycle().await;

            // refreshes requested mid-cycle join it
            while let Ok(command) = self.commands.try_recv() {
                self.apply(command, &mut waiters);
            }
            for waiter in waiters.drain(..) {
                let _ = waiter.send(outcome.clone());
            }

            let finished = Instant::now();
            loop {
                let deadline = finished + self.settings.interval();
                let auto = self.settings.auto_refresh;
                let timer = async move {
                    if auto {
                        sleep_until(deadline).await
                    } else {
                        std::future::pending::<()>().await
                    }
                };

                tokio::select! {
                    _ = timer => break,
                    command = self.commands.recv() => match command {
                        None => {
                            debug!("all monitor handles dropped, stopping");
                            return;
                        }
                        Some(command) => {
                            if self.apply(command, &mut waiters) {
                                break;
                            }
                        }
                    },
                }
            }
        }
    }

    /// returns true when the command asks for a cycle
    fn apply(&mut self, command: Command, waiters: &mut Vec<oneshot::Sender<Acquisition>>) -> bool {
        match command {
            Command::Refresh(waiter) => {
                waiters.push(waiter);
                true
            }
            Command::SetInterval(interval) => {
                let applied = self.settings.set_interval(interval);
                info!("refresh interval set to {}s", applied.as_secs());
                false
            }
            Command::SetAutoRefresh(enabled) => {
                self.settings.auto_refresh = enabled;
                info!("auto refresh {}", if enabled { "enabled" } else { "disabled" });
                false
            }
        }
    }

    async fn cycle(&mut self) -> Acquisition {
        self.snapshot.send_modify(|s| s.connection = ConnectionState::Connecting);

        let outcome = self.acquirer.acquire().await;
        let reading = *outcome.reading();
        self.history.push(reading);

        let endpoint = match &outcome {
            Acquisition::Live { endpoint, .. } => Some(endpoint.clone()),
            Acquisition::Synthetic { .. } => None,
        };
        self.snapshot.send_replace(Snapshot {
            current: reading,
            history: self.history.clone(),
            connection: outcome.connection_state(),
            last_update: Some(Utc::now()),
            live: outcome.is_live(),
            endpoint,
        });
        outcome
    }
}
