// Panel reading domain model
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Electrical quantity measured per phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Voltage,
    Current,
    Power,
    Energy,
    Frequency,
    PowerFactor,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Voltage => "voltage",
            Metric::Current => "current",
            Metric::Power => "power",
            Metric::Energy => "energy",
            Metric::Frequency => "frequency",
            Metric::PowerFactor => "powerFactor",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voltage" => Ok(Metric::Voltage),
            "current" => Ok(Metric::Current),
            "power" => Ok(Metric::Power),
            "energy" => Ok(Metric::Energy),
            "frequency" => Ok(Metric::Frequency),
            "powerfactor" | "power_factor" => Ok(Metric::PowerFactor),
            _ => Err(s.to_string()),
        }
    }
}

/// One of the three AC phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Phase {
    R,
    S,
    T,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::R => "R",
            Phase::S => "S",
            Phase::T => "T",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "R" => Ok(Phase::R),
            "S" => Ok(Phase::S),
            "T" => Ok(Phase::T),
            _ => Err(s.to_string()),
        }
    }
}

/// A single observation from one panel
#[derive(Debug, Clone)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub panel_id: String,
    values: HashMap<(Metric, Phase), f64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, panel_id: String) -> Self {
        Self {
            timestamp,
            panel_id,
            values: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_value(mut self, metric: Metric, phase: Phase, value: f64) -> Self {
        self.values.insert((metric, phase), value);
        self
    }

    pub fn set_value(&mut self, metric: Metric, phase: Phase, value: f64) {
        self.values.insert((metric, phase), value);
    }

    pub fn value(&self, metric: Metric, phase: Phase) -> Option<f64> {
        self.values.get(&(metric, phase)).copied()
    }

    /// Map a store column such as `voltage_r` or `power_factor_t` to its metric and phase
    pub fn parse_column(column: &str) -> Option<(Metric, Phase)> {
        let (prefix, phase) = column.rsplit_once('_')?;
        let phase = phase.parse::<Phase>().ok()?;
        let metric = prefix.parse::<Metric>().ok()?;
        Some((metric, phase))
    }

    pub fn to_view(&self) -> ReadingView {
        let mut values: Vec<ReadingValue> = self
            .values
            .iter()
            .map(|((metric, phase), value)| ReadingValue {
                metric: *metric,
                phase: *phase,
                value: *value,
            })
            .collect();
        values.sort_by_key(|v| (v.metric, v.phase));

        ReadingView {
            timestamp: self.timestamp,
            panel: self.panel_id.clone(),
            values,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadingValue {
    pub metric: Metric,
    pub phase: Phase,
    pub value: f64,
}

/// JSON shape of a reading for the panel listing
#[derive(Debug, Clone, Serialize)]
pub struct ReadingView {
    pub timestamp: DateTime<Utc>,
    pub panel: String,
    pub values: Vec<ReadingValue>,
}
