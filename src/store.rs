//! ==============================================================================
//! store.rs - the hub's in-memory reading store
//! ==============================================================================
//!
//! purpose:
//!     holds the current reading and a bounded trailing history for the
//!     ingestion server. constructed once at startup and handed to the router;
//!     `ingest`, `current` and `history` are the only way in or out.
//!
//! locking:
//!     current and history live behind ONE rwlock so that an ingest updates
//!     both in a single critical section. readers never observe a current
//!     reading that is missing from history.
//!
//! relationships:
//!     - used by: server.rs (axum state)
//!     - uses: domain.rs (SensorPayload coercion), history.rs
//!
//! ==============================================================================

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::{Reading, SensorPayload};
use crate::error::IngestError;
use crate::history::History;

#[derive(Debug)]
struct StoreInner {
    current: Reading,
    history: History,
}

/// clone-able handle to the shared store
#[derive(Debug, Clone)]
pub struct ReadingStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl ReadingStore {
    pub fn new(history_capacity: usize) -> Self {
        let inner = StoreInner {
            current: Reading::zeroed(Utc::now()),
            history: History::new(history_capacity),
        };
        Self { inner: Arc::new(RwLock::new(inner)) }
    }

    /// validate and store a pushed payload
    ///
    /// a rejected payload leaves current and history untouched.
    pub async fn ingest(&self, payload: &SensorPayload) -> Result<Reading, IngestError> {
        let measurements = payload.measurements()?;

        let mut inner = self.inner.write().await;
        let reading = measurements.at(Utc::now());
        inner.current = reading;
        inner.history.push(reading);
        Ok(reading)
    }

    pub async fn current(&self) -> Reading {
        self.inner.read().await.current
    }

    /// oldest first
    pub async fn history(&self) -> History {
        self.inner.read().await.history.clone()
    }
}

impl Default for ReadingStore {
    fn default() -> Self {
        Self::new(crate::history::DEFAULT_CAPACITY)
    }
}
