//! Health check utilities

use crate::observability::{HealthCheck, HealthStatus};
use delta_core::{DeltaError, Result, SourceContext};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct SourceState {
    last_ok: Instant,
    error: Option<String>,
}

/// Source reachability as reported by the change event consumer.
///
/// Healthy while the consumer keeps reporting, degraded after half of
/// `timeout` without a report, unhealthy after `timeout` or on a reported error.
pub struct SourceHealth {
    name: String,
    state: RwLock<SourceState>,
    timeout: Duration,
}

impl SourceHealth {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(SourceState {
                last_ok: Instant::now(),
                error: None,
            }),
            timeout,
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().ok().and_then(|state| state.error.clone())
    }
}

impl SourceContext for SourceHealth {
    fn set_ok(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| DeltaError::InternalError("source health lock poisoned".into()))?;
        state.last_ok = Instant::now();
        state.error = None;
        Ok(())
    }

    fn set_error(&self, reason: &str) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| DeltaError::InternalError("source health lock poisoned".into()))?;
        state.error = Some(reason.to_string());
        Ok(())
    }
}

impl HealthCheck for SourceHealth {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self) -> HealthStatus {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(_) => {
                return HealthStatus::Unhealthy {
                    reason: "source health lock poisoned".to_string(),
                }
            }
        };

        if let Some(reason) = &state.error {
            return HealthStatus::Unhealthy {
                reason: reason.clone(),
            };
        }

        let elapsed = state.last_ok.elapsed();
        if elapsed > self.timeout {
            HealthStatus::Unhealthy {
                reason: format!("No activity for {:?}", elapsed),
            }
        } else if elapsed > self.timeout / 2 {
            HealthStatus::Degraded {
                reason: format!("Low activity, last seen {:?} ago", elapsed),
            }
        } else {
            HealthStatus::Healthy
        }
    }
}
