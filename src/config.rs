//! Aggregation settings shared by the trip and event passes.

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

pub const DEFAULT_PERIOD_SECONDS: u32 = 3600;
pub const DEFAULT_CYCLE_LENGTH: u32 = 168;
pub const DEFAULT_GPS_PRECISION: usize = 3;
pub const DEFAULT_PRIVACY_LEVEL: u32 = 5;

/// Temporal grid, spatial precision and privacy parameter for one run.
///
/// The defaults bucket by hour of the week at roughly 100m resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub period_seconds: u32,
    pub cycle_length: u32,
    /// Decimal digits kept from each coordinate when forming zones.
    pub gps_precision: usize,
    pub privacy_level: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            period_seconds: DEFAULT_PERIOD_SECONDS,
            cycle_length: DEFAULT_CYCLE_LENGTH,
            gps_precision: DEFAULT_GPS_PRECISION,
            privacy_level: DEFAULT_PRIVACY_LEVEL,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.period_seconds == 0 {
            return Err(MetricsError::InvalidConfig(
                "period_seconds must be positive".into(),
            ));
        }
        if self.cycle_length == 0 {
            return Err(MetricsError::InvalidConfig(
                "cycle_length must be positive".into(),
            ));
        }
        if self.gps_precision > 15 {
            return Err(MetricsError::InvalidConfig(format!(
                "gps_precision {} exceeds 15 decimal digits",
                self.gps_precision
            )));
        }
        if self.privacy_level == 0 {
            return Err(MetricsError::InvalidPrivacyLevel(self.privacy_level));
        }
        Ok(())
    }
}
