//! ==============================================================================
//! acquire.rs - multi-endpoint reading acquisition with retry and fallback
//! ==============================================================================
//!
//! purpose:
//!     pulls one current reading from an ordered endpoint list. each endpoint
//!     gets a fixed number of attempts with a pause between them; each attempt
//!     is bounded by a timeout. the first good reading wins. if every endpoint
//!     is exhausted the cycle still completes, with a synthetic reading.
//!
//! ladder (endpoints A, B; 3 attempts; delay d):
//!
//! ```text
//! A#1 -d- A#2 -d- A#3   B#1 -d- B#2 -d- B#3   -> synthetic
//!  ^ any success returns immediately
//! ```
//!
//! no delay follows the last attempt of an endpoint. attempts are strictly
//! sequential; a timeout abandons only the attempt it bounds.
//!
//! relationships:
//!     - used by: supervisor.rs (one call per cycle)
//!     - uses: domain.rs (Reading, SensorPayload, Acquisition)
//!     - seam: ReadingSource (HttpSource in production, scripted mocks in tests)
//!
//! ==============================================================================

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{Acquisition, Measurements, Reading, SensorPayload};
use crate::error::FetchError;

/// something that can be asked for a reading at an endpoint
pub trait ReadingSource: Send + Sync {
    fn fetch(&self, endpoint: &str) -> impl Future<Output = Result<Reading, FetchError>> + Send;
}

// ==============================================================================
// http source
// ==============================================================================

/// pulls readings over http with reqwest
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl ReadingSource for HttpSource {
    fn fetch(&self, endpoint: &str) -> impl Future<Output = Result<Reading, FetchError>> + Send {
        let request = self.client.get(endpoint);
        async move {
            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body: Value = response
                .json()
                .await
                .map_err(|e| FetchError::Malformed(e.to_string()))?;
            parse_reading(body, Utc::now())
        }
    }
}

/// turn an endpoint's json body into a reading
///
/// device endpoints send bare values; a hub's current-data also carries its
/// own timestamp, which is kept. otherwise `received_at` is used.
pub fn parse_reading(body: Value, received_at: DateTime<Utc>) -> Result<Reading, FetchError> {
    let payload: SensorPayload =
        serde_json::from_value(body).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let measurements = payload
        .measurements()
        .map_err(|e| FetchError::Malformed(e.to_string()))?;
    Ok(measurements.at(payload.timestamp().unwrap_or(received_at)))
}

// ==============================================================================
// synthetic fallback
// ==============================================================================

/// plausible placeholder values: temp [25,30), humidity [60,70), soil [70,80)
pub fn synthetic_reading<R: Rng + ?Sized>(rng: &mut R, timestamp: DateTime<Utc>) -> Reading {
    Measurements {
        temperature: rng.gen_range(25.0..30.0),
        humidity: rng.gen_range(60.0..70.0),
        soil_moisture: rng.gen_range(70.0..80.0),
    }
    .at(timestamp)
}

// ==============================================================================
// acquirer
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// tried in order
    pub endpoints: Vec<String>,
    /// bound on a single attempt
    pub timeout: Duration,
    /// attempts per endpoint
    pub attempts: u32,
    /// pause between attempts on the same endpoint
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            timeout: Duration::from_secs(2),
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

pub struct Acquirer<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: ReadingSource> Acquirer<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// run the ladder once. never fails.
    pub async fn acquire(&self) -> Acquisition {
        let mut attempts = 0u32;

        for endpoint in &self.policy.endpoints {
            for attempt in 1..=self.policy.attempts {
                attempts += 1;
                match self.attempt(endpoint).await {
                    Ok(reading) => {
                        info!(endpoint = %endpoint, attempt, "reading acquired");
                        return Acquisition::Live {
                            endpoint: endpoint.clone(),
                            reading,
                            attempts,
                        };
                    }
                    Err(e) => {
                        debug!(endpoint = %endpoint, attempt, "attempt failed: {}", e);
                    }
                }
                if attempt < self.policy.attempts {
                    tokio::time::sleep(self.policy.delay).await;
                }
            }
            warn!(endpoint = %endpoint, "endpoint exhausted after {} attempts", self.policy.attempts);
        }

        warn!("all endpoints unreachable, using synthetic reading");
        let reading = synthetic_reading(&mut rand::thread_rng(), Utc::now());
        Acquisition::Synthetic { reading, attempts }
    }

    async fn attempt(&self, endpoint: &str) -> Result<Reading, FetchError> {
        match tokio::time::timeout(self.policy.timeout, self.source.fetch(endpoint)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.policy.timeout.as_millis())),
        }
    }
}
