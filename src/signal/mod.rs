//! Synthetic sensor signals for exercising the store and history API.
//!
//! Each [`SignalGenerator`] is bound to one sensor profile and keeps its
//! own step counter and random-walk state. Every produced value carries
//! gaussian noise and is clamped to the sensor's physical range.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use log::warn;
use rand::Rng;
use serde::Serialize;

use crate::errors::{KvError, Result};

/// Static description of a sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorConfig {
    pub name: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub baseline: f64,
    pub noise: f64,
    pub description: &'static str,
}

impl SensorConfig {
    fn span(&self) -> f64 {
        self.max - self.min
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

pub const SENSORS: &[SensorConfig] = &[
    SensorConfig {
        name: "temperature",
        unit: "°C",
        min: -40.0,
        max: 85.0,
        baseline: 22.0,
        noise: 0.5,
        description: "Temperature sensor",
    },
    SensorConfig {
        name: "humidity",
        unit: "%",
        min: 0.0,
        max: 100.0,
        baseline: 45.0,
        noise: 2.0,
        description: "Relative humidity",
    },
    SensorConfig {
        name: "pressure",
        unit: "hPa",
        min: 950.0,
        max: 1050.0,
        baseline: 1013.25,
        noise: 5.0,
        description: "Atmospheric pressure",
    },
    SensorConfig {
        name: "cpu",
        unit: "%",
        min: 0.0,
        max: 100.0,
        baseline: 35.0,
        noise: 5.0,
        description: "CPU utilization",
    },
    SensorConfig {
        name: "memory",
        unit: "%",
        min: 0.0,
        max: 100.0,
        baseline: 60.0,
        noise: 3.0,
        description: "Memory usage",
    },
    SensorConfig {
        name: "voltage",
        unit: "V",
        min: 0.0,
        max: 12.0,
        baseline: 5.0,
        noise: 0.1,
        description: "Voltage reading",
    },
    SensorConfig {
        name: "light",
        unit: "lux",
        min: 0.0,
        max: 100_000.0,
        baseline: 500.0,
        noise: 50.0,
        description: "Light intensity",
    },
    SensorConfig {
        name: "co2",
        unit: "ppm",
        min: 300.0,
        max: 5000.0,
        baseline: 450.0,
        noise: 20.0,
        description: "CO2 concentration",
    },
    SensorConfig {
        name: "vibration",
        unit: "g",
        min: 0.0,
        max: 10.0,
        baseline: 0.1,
        noise: 0.05,
        description: "Vibration intensity",
    },
    SensorConfig {
        name: "power",
        unit: "W",
        min: 0.0,
        max: 5000.0,
        baseline: 250.0,
        noise: 50.0,
        description: "Power consumption",
    },
];

/// Short names accepted wherever a sensor name is expected.
pub const ALIASES: &[(&str, &str)] = &[
    ("temp", "temperature"),
    ("hum", "humidity"),
    ("press", "pressure"),
    ("mem", "memory"),
    ("volt", "voltage"),
    ("vib", "vibration"),
    ("pwr", "power"),
];

/// Look up a sensor by name or alias (case-insensitive).
pub fn sensor(name: &str) -> Result<&'static SensorConfig> {
    let name = name.trim().to_lowercase();
    let resolved = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, full)| *full)
        .unwrap_or(name.as_str());

    SENSORS.iter().find(|s| s.name == resolved).ok_or_else(|| {
        let names: Vec<&str> = SENSORS.iter().map(|s| s.name).collect();
        KvError::InvalidRequest(format!(
            "Unknown sensor type '{}' (available: {})",
            name.as_str(),
            names.join(", ")
        ))
    })
}

/// Waveform produced by a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Sine,
    RandomWalk,
    Step,
    Sawtooth,
    Noise,
    Spike,
    Decay,
}

impl SignalKind {
    pub const ALL: [SignalKind; 7] = [
        SignalKind::Sine,
        SignalKind::RandomWalk,
        SignalKind::Step,
        SignalKind::Sawtooth,
        SignalKind::Noise,
        SignalKind::Spike,
        SignalKind::Decay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Sine => "sine",
            SignalKind::RandomWalk => "random-walk",
            SignalKind::Step => "step",
            SignalKind::Sawtooth => "sawtooth",
            SignalKind::Noise => "noise",
            SignalKind::Spike => "spike",
            SignalKind::Decay => "decay",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = KvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "sine" => Ok(SignalKind::Sine),
            "random-walk" => Ok(SignalKind::RandomWalk),
            "step" => Ok(SignalKind::Step),
            "sawtooth" => Ok(SignalKind::Sawtooth),
            "noise" => Ok(SignalKind::Noise),
            "spike" => Ok(SignalKind::Spike),
            "decay" | "exponential-decay" => Ok(SignalKind::Decay),
            other => Err(KvError::InvalidRequest(format!(
                "Unknown signal '{other}'"
            ))),
        }
    }
}

/// Per-sensor overrides parsed from `name:amp=..:freq=..:offset=..`.
///
/// Only the sine waveform uses them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignalParams {
    pub amplitude: Option<f64>,
    pub frequency: Option<f64>,
    pub offset: Option<f64>,
}

impl SignalParams {
    pub fn is_empty(&self) -> bool {
        self.amplitude.is_none() && self.frequency.is_none() && self.offset.is_none()
    }
}

/// A sensor selected on the command line, with its overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub config: &'static SensorConfig,
    pub params: SignalParams,
}

impl FromStr for SensorSpec {
    type Err = KvError;

    fn from_str(spec: &str) -> Result<Self> {
        let mut parts = spec.split(':');
        let config = sensor(parts.next().unwrap_or_default())?;
        let mut params = SignalParams::default();

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let Ok(value) = value.trim().parse::<f64>() else {
                warn!("invalid value '{value}' for '{key}', skipping");
                continue;
            };
            match key.trim() {
                "amp" | "amplitude" => params.amplitude = Some(value),
                "freq" | "frequency" => params.frequency = Some(value),
                "offset" => params.offset = Some(value),
                other => warn!("unknown sensor parameter '{other}', skipping"),
            }
        }

        Ok(SensorSpec { config, params })
    }
}

/// Parse a comma-separated list of sensor specs.
pub fn parse_sensor_list(list: &str) -> Result<Vec<SensorSpec>> {
    let specs = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(SensorSpec::from_str)
        .collect::<Result<Vec<_>>>()?;

    if specs.is_empty() {
        return Err(KvError::InvalidRequest("No sensors given".into()));
    }
    Ok(specs)
}

const SINE_FREQUENCY: f64 = 0.1;
const STEP_INTERVAL: u64 = 20;
const SAWTOOTH_PERIOD: u64 = 50;
const SPIKE_PROBABILITY: f64 = 0.05;
const DECAY_RATE: f64 = 0.95;

pub struct SignalGenerator {
    config: &'static SensorConfig,
    noise_level: f64,
    step: u64,
    walk: f64,
}

impl SignalGenerator {
    pub fn new(config: &'static SensorConfig) -> Self {
        Self {
            config,
            noise_level: config.noise,
            step: 0,
            walk: config.baseline,
        }
    }

    pub fn config(&self) -> &'static SensorConfig {
        self.config
    }

    /// Scale the gaussian noise; `0.0` makes deterministic waveforms produce exact values.
    pub fn with_noise(mut self, noise_level: f64) -> Self {
        self.noise_level = noise_level;
        self
    }

    pub fn reset(&mut self) {
        self.step = 0;
        self.walk = self.config.baseline;
    }

    /// Produce the next sample.
    pub fn next_value<R: Rng + ?Sized>(
        &mut self,
        kind: SignalKind,
        params: &SignalParams,
        rng: &mut R,
    ) -> f64 {
        let cfg = self.config;
        let t = self.step as f64;

        let value = match kind {
            SignalKind::Sine => {
                let amplitude = params.amplitude.unwrap_or(cfg.span() * 0.2);
                let frequency = params.frequency.unwrap_or(SINE_FREQUENCY);
                let baseline = params.offset.unwrap_or(cfg.baseline);
                baseline + amplitude * (2.0 * PI * frequency * t).sin()
            }
            SignalKind::RandomWalk => {
                let step_size = cfg.noise * 2.0;
                if step_size > 0.0 {
                    self.walk += rng.random_range(-step_size..=step_size);
                }
                self.walk = cfg.clamp(self.walk);
                self.walk
            }
            SignalKind::Step => {
                let amplitude = cfg.span() * 0.3;
                let sign = if (self.step / STEP_INTERVAL) % 2 == 0 { 1.0 } else { -1.0 };
                cfg.baseline + amplitude * sign
            }
            SignalKind::Sawtooth => {
                let amplitude = cfg.span() * 0.4;
                let phase = (self.step % SAWTOOTH_PERIOD) as f64 / SAWTOOTH_PERIOD as f64;
                cfg.baseline + amplitude * (2.0 * phase - 1.0)
            }
            // Uniform over the whole range, no extra noise.
            SignalKind::Noise => return rng.random_range(cfg.min..=cfg.max),
            SignalKind::Spike => {
                if rng.random::<f64>() < SPIKE_PROBABILITY {
                    cfg.baseline + (cfg.max - cfg.baseline) * 0.8
                } else {
                    cfg.baseline
                }
            }
            SignalKind::Decay => {
                cfg.baseline + (cfg.max - cfg.baseline) * DECAY_RATE.powf(t)
            }
        };

        if kind != SignalKind::RandomWalk {
            self.step += 1;
        }
        self.add_noise(value, rng)
    }

    fn add_noise<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let noisy = if self.noise_level > 0.0 {
            value + gaussian(rng) * self.noise_level
        } else {
            value
        };
        self.config.clamp(noisy)
    }
}

/// Standard normal sample (Box–Muller).
fn gaussian<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Heat-index approximation from temperature (°C) and humidity (%).
pub fn heat_index(temperature: f64, humidity: f64) -> f64 {
    temperature + 0.5 * (humidity / 100.0) * (temperature - 14.0)
}

/// Round to two decimals, as stored in payloads.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
