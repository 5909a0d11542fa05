//! Engine health tracking
//!
//! Guarded tick steps report failures into a rolling counter; the counter
//! drives the three-tier status. Degradation never stops the decision loop,
//! it only changes what the engine reports about itself.

use serde::{Deserialize, Serialize};

/// Errors at or above this count mark the engine degraded.
pub const DEGRADED_ERROR_THRESHOLD: u32 = 5;
/// Errors at or above this count mark the engine unhealthy.
pub const UNHEALTHY_ERROR_THRESHOLD: u32 = 10;

/// Three-tier health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Rolling error counter for one engine instance.
#[derive(Debug, Default)]
pub struct EngineHealth {
    error_count: u32,
}

impl EngineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one step failure and return the status it leaves us in.
    pub fn record_error(&mut self) -> HealthStatus {
        self.error_count = self.error_count.saturating_add(1);
        self.status()
    }

    pub fn status(&self) -> HealthStatus {
        if self.error_count >= UNHEALTHY_ERROR_THRESHOLD {
            HealthStatus::Unhealthy
        } else if self.error_count >= DEGRADED_ERROR_THRESHOLD {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_tier_transitions() {
        let mut health = EngineHealth::new();
        assert_eq!(health.status(), HealthStatus::Healthy);

        for _ in 0..4 {
            health.record_error();
        }
        assert_eq!(health.status(), HealthStatus::Healthy);

        assert_eq!(health.record_error(), HealthStatus::Degraded);

        for _ in 0..4 {
            health.record_error();
        }
        assert_eq!(health.status(), HealthStatus::Unhealthy);
        assert_eq!(health.error_count(), 10);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }
}
