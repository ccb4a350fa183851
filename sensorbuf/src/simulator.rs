//! Deterministic multi-device sample producer.
//!
//! Each device emits one sample per step: three resistance channels swinging
//! around a per-device baseline and a 3-axis acceleration dominated by gravity
//! on `z`. Timestamps are derived from the step counter, so every run produces
//! the same stream.

use crate::app_config::SimulationConfig;
use sensorbuf_common::sample::{Sample, SourceId};
use sensorbuf_store::{BufferCoordinator, PushOutcome};
use std::f64::consts::TAU;

const BASELINE_OHMS: f64 = 1000.0;
const SWING_OHMS: f64 = 50.0;
const SIGNAL_HZ: f64 = 0.5;
const GRAVITY: f64 = 9.81;

/// One simulated device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    id: SourceId,
    phase: f64,
    baseline: f64,
}

impl SimulatedDevice {
    /// Device number `index`; its phase and baseline are offset by it.
    pub fn new(index: usize) -> Self {
        Self {
            id: SourceId::from(format!("device-{index:02}")),
            phase: index as f64 * 0.7,
            baseline: BASELINE_OHMS + index as f64 * 10.0,
        }
    }

    /// Source key of this device.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sample taken at `timestamp` (ms).
    pub fn sample_at(&self, timestamp: i64) -> Sample {
        let t = timestamp as f64 / 1000.0;
        let angle = TAU * SIGNAL_HZ * t + self.phase;

        let resistance = [0.0, 1.0, 2.0].map(|k| self.baseline + SWING_OHMS * (angle + k).sin());
        let acceleration = [0.1 * angle.sin(), 0.1 * angle.cos(), GRAVITY + 0.05 * (2.0 * angle).sin()];

        Sample::from_groups(self.id.clone(), timestamp, resistance, acceleration)
    }
}

/// Counts from one or more production steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProduceReport {
    /// Samples written into a free slot
    pub stored: u64,
    /// Samples written over the oldest retained one
    pub overwrote: u64,
    /// Samples refused as out of order
    pub rejected: u64,
}

impl ProduceReport {
    fn record(&mut self, outcome: PushOutcome) {
        match outcome {
            PushOutcome::Stored => self.stored += 1,
            PushOutcome::Overwrote => self.overwrote += 1,
            PushOutcome::RejectedOutOfOrder => self.rejected += 1,
        }
    }

    /// Accumulate another report.
    pub fn merge(&mut self, other: ProduceReport) {
        self.stored += other.stored;
        self.overwrote += other.overwrote;
        self.rejected += other.rejected;
    }

    /// Samples handed to the coordinator.
    pub fn total(&self) -> u64 {
        self.stored + self.overwrote + self.rejected
    }
}

/// Steps every device once per call and appends the samples.
#[derive(Debug)]
pub struct Simulator {
    devices: Vec<SimulatedDevice>,
    period_ms: f64,
    step: u64,
}

impl Simulator {
    /// Build from a validated [`SimulationConfig`].
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            devices: (0..config.sources).map(SimulatedDevice::new).collect(),
            period_ms: config.sample_period_ms(),
            step: 0,
        }
    }

    /// Simulated devices.
    pub fn devices(&self) -> &[SimulatedDevice] {
        &self.devices
    }

    /// Steps taken so far.
    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Timestamp (ms) of the next step.
    pub fn next_timestamp(&self) -> i64 {
        (self.step as f64 * self.period_ms).round() as i64
    }

    /// Append one sample per device and advance the step counter.
    pub fn produce(&mut self, coordinator: &BufferCoordinator) -> ProduceReport {
        let timestamp = self.next_timestamp();
        let mut report = ProduceReport::default();

        for device in &self.devices {
            report.record(coordinator.append(device.id(), device.sample_at(timestamp)));
        }

        self.step += 1;
        report
    }
}
