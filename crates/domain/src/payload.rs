//! Climate payload: the set of attributes sent to a device.
//!
//! Every field is optional so the same type describes both a slot's full
//! default configuration and a partial per-device override.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const MIN_TEMPERATURE: f64 = -50.0;
const MAX_TEMPERATURE: f64 = 50.0;
const MIN_HUMIDITY: f64 = 0.0;
const MAX_HUMIDITY: f64 = 100.0;

/// Attributes a climate device can be configured with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClimatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_temp_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_temp_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hvac_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swing_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_heat: Option<bool>,
}

impl ClimatePayload {
    /// Payload setting only a target temperature.
    #[must_use]
    pub fn temperature(value: f64) -> Self {
        Self {
            temperature: Some(value),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_hvac_mode(mut self, mode: impl Into<String>) -> Self {
        self.hvac_mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn with_preset_mode(mut self, mode: impl Into<String>) -> Self {
        self.preset_mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.target_temp_low = Some(low);
        self.target_temp_high = Some(high);
        self
    }

    /// `true` when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Shallow merge: every field set on `overlay` replaces the one on `self`.
    #[must_use]
    pub fn merged_with(&self, overlay: &Self) -> Self {
        Self {
            temperature: overlay.temperature.or(self.temperature),
            target_temp_high: overlay.target_temp_high.or(self.target_temp_high),
            target_temp_low: overlay.target_temp_low.or(self.target_temp_low),
            hvac_mode: overlay.hvac_mode.clone().or_else(|| self.hvac_mode.clone()),
            preset_mode: overlay
                .preset_mode
                .clone()
                .or_else(|| self.preset_mode.clone()),
            fan_mode: overlay.fan_mode.clone().or_else(|| self.fan_mode.clone()),
            swing_mode: overlay
                .swing_mode
                .clone()
                .or_else(|| self.swing_mode.clone()),
            humidity: overlay.humidity.or(self.humidity),
            aux_heat: overlay.aux_heat.or(self.aux_heat),
        }
    }

    /// Full validation for a slot's default payload.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when:
    /// - no field is set ([`ValidationError::EmptyPayload`])
    /// - a numeric field is out of range ([`ValidationError::OutOfRange`])
    /// - `temperature` is combined with a range ([`ValidationError::ConflictingTemperatureFields`])
    /// - the range is incomplete or inverted ([`ValidationError::InvalidTemperatureRange`])
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        self.validate_ranges()?;
        let has_range = self.target_temp_low.is_some() || self.target_temp_high.is_some();
        if self.temperature.is_some() && has_range {
            return Err(ValidationError::ConflictingTemperatureFields);
        }
        let range_ok = match (self.target_temp_low, self.target_temp_high) {
            (Some(low), Some(high)) => low <= high,
            (None, None) => true,
            _ => false,
        };
        if range_ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidTemperatureRange)
        }
    }

    /// Range checks only, for partial overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for the first offending field.
    pub fn validate_ranges(&self) -> Result<(), ValidationError> {
        let temperatures = [
            ("temperature", self.temperature),
            ("target_temp_low", self.target_temp_low),
            ("target_temp_high", self.target_temp_high),
        ];
        for (field, value) in temperatures {
            if let Some(value) = value {
                check_range(field, value, MIN_TEMPERATURE, MAX_TEMPERATURE)?;
            }
        }
        if let Some(value) = self.humidity {
            check_range("humidity", value, MIN_HUMIDITY, MAX_HUMIDITY)?;
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}
