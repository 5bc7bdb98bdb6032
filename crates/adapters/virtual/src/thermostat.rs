//! Simulated thermostats.
//!
//! A payload is translated into the ordered list of climate service calls a
//! real device would receive: the temperature range wins over a single
//! temperature, then HVAC mode, preset, fan, swing, humidity and auxiliary
//! heat. Each call is applied to the device state and recorded.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::{Value, json};

use climacal_app::ports::DeviceController;
use climacal_domain::error::ClimateError;
use climacal_domain::id::DeviceId;
use climacal_domain::payload::ClimatePayload;

use crate::error::VirtualDeviceError;

/// A single climate service call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
    pub service: &'static str,
    pub data: Value,
}

impl ServiceCall {
    fn new(service: &'static str, data: Value) -> Self {
        Self { service, data }
    }
}

/// Translate `payload` into service calls, in application order.
#[must_use]
pub fn service_calls(payload: &ClimatePayload) -> Vec<ServiceCall> {
    let mut calls = Vec::new();
    if let (Some(low), Some(high)) = (payload.target_temp_low, payload.target_temp_high) {
        calls.push(ServiceCall::new(
            "set_temperature",
            json!({ "target_temp_low": low, "target_temp_high": high }),
        ));
    } else if let Some(temperature) = payload.temperature {
        calls.push(ServiceCall::new(
            "set_temperature",
            json!({ "temperature": temperature }),
        ));
    }
    if let Some(mode) = &payload.hvac_mode {
        calls.push(ServiceCall::new("set_hvac_mode", json!({ "hvac_mode": mode })));
    }
    if let Some(mode) = &payload.preset_mode {
        calls.push(ServiceCall::new(
            "set_preset_mode",
            json!({ "preset_mode": mode }),
        ));
    }
    if let Some(mode) = &payload.fan_mode {
        calls.push(ServiceCall::new("set_fan_mode", json!({ "fan_mode": mode })));
    }
    if let Some(mode) = &payload.swing_mode {
        calls.push(ServiceCall::new(
            "set_swing_mode",
            json!({ "swing_mode": mode }),
        ));
    }
    if let Some(humidity) = payload.humidity {
        calls.push(ServiceCall::new("set_humidity", json!({ "humidity": humidity })));
    }
    if let Some(aux_heat) = payload.aux_heat {
        calls.push(ServiceCall::new("set_aux_heat", json!({ "aux_heat": aux_heat })));
    }
    calls
}

#[derive(Debug, Default)]
struct Thermostat {
    state: ClimatePayload,
    history: Vec<ServiceCall>,
}

impl Thermostat {
    fn apply(&mut self, payload: &ClimatePayload) {
        if payload.target_temp_low.is_some() && payload.target_temp_high.is_some() {
            self.state.target_temp_low = payload.target_temp_low;
            self.state.target_temp_high = payload.target_temp_high;
            self.state.temperature = None;
        } else if payload.temperature.is_some() {
            self.state.temperature = payload.temperature;
            self.state.target_temp_low = None;
            self.state.target_temp_high = None;
        }
        let attributes = ClimatePayload {
            hvac_mode: payload.hvac_mode.clone(),
            preset_mode: payload.preset_mode.clone(),
            fan_mode: payload.fan_mode.clone(),
            swing_mode: payload.swing_mode.clone(),
            humidity: payload.humidity,
            aux_heat: payload.aux_heat,
            ..ClimatePayload::default()
        };
        self.state = self.state.merged_with(&attributes);
        self.history.extend(service_calls(payload));
    }
}

/// A fixed set of simulated climate devices.
pub struct VirtualThermostats {
    devices: HashMap<DeviceId, Mutex<Thermostat>>,
    failing: Mutex<BTreeSet<DeviceId>>,
    latency: Duration,
}

impl VirtualThermostats {
    #[must_use]
    pub fn new(devices: impl IntoIterator<Item = DeviceId>) -> Self {
        Self {
            devices: devices
                .into_iter()
                .map(|id| (id, Mutex::new(Thermostat::default())))
                .collect(),
            failing: Mutex::new(BTreeSet::new()),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency`, like a device round-trip.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make `device_id` reject (or accept again) every configuration.
    pub fn set_failing(&self, device_id: &DeviceId, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(device_id.clone());
        } else {
            set.remove(device_id);
        }
    }

    /// Current attributes of a device.
    #[must_use]
    pub fn state(&self, device_id: &DeviceId) -> Option<ClimatePayload> {
        self.devices
            .get(device_id)
            .map(|device| lock(device).state.clone())
    }

    /// Every service call a device received, oldest first.
    #[must_use]
    pub fn history(&self, device_id: &DeviceId) -> Vec<ServiceCall> {
        self.devices
            .get(device_id)
            .map(|device| lock(device).history.clone())
            .unwrap_or_default()
    }

    fn configure(
        &self,
        device_id: &DeviceId,
        payload: &ClimatePayload,
    ) -> Result<(), VirtualDeviceError> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| VirtualDeviceError::UnknownDevice(device_id.clone()))?;
        if lock(&self.failing).contains(device_id) {
            return Err(VirtualDeviceError::Unavailable(device_id.clone()));
        }
        lock(device).apply(payload);
        tracing::debug!(device = %device_id, ?payload, "virtual thermostat configured");
        Ok(())
    }
}

impl DeviceController for VirtualThermostats {
    async fn send_configuration(
        &self,
        device_id: &DeviceId,
        payload: &ClimatePayload,
    ) -> Result<(), ClimateError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.configure(device_id, payload)?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
