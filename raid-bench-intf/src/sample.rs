// Copyright (c) Facebook, Inc. and its affiliates.
use serde::{Deserialize, Serialize};

/// Per-device metric names, also used as series key suffixes.
pub const SAMPLE_METRICS: &[&str] = &[
    "iops_read",
    "iops_write",
    "bw_read",
    "bw_write",
    "lat_read",
    "lat_write",
];

/// Benchmark phase as announced by the run controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "PD")]
    Pd,
    #[serde(rename = "VD")]
    Vd,
    #[serde(rename = "NONE")]
    None,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::None
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Stage::Init => "INIT",
                Stage::Pd => "PD",
                Stage::Vd => "VD",
                Stage::None => "NONE",
            }
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    PhysicalDrive,
    VirtualDrive,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Started,
    Completed,
    Failed,
}

/// One per-device measurement for a polling tick. IOPS are in IO/s,
/// bandwidth in MB/s and latency in msecs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sample {
    pub device: String,
    #[serde(alias = "timestampLabel", alias = "timestamp")]
    pub timestamp_label: String,
    pub iops_read: f64,
    pub iops_write: f64,
    pub bw_read: f64,
    pub bw_write: f64,
    pub lat_read: f64,
    pub lat_write: f64,
    /// Unix time of the measurement if the producer knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<f64>,
}

impl Sample {
    pub fn new(device: &str, metrics: [f64; 6]) -> Self {
        Self {
            device: device.into(),
            timestamp_label: "".into(),
            iops_read: metrics[0],
            iops_write: metrics[1],
            bw_read: metrics[2],
            bw_write: metrics[3],
            lat_read: metrics[4],
            lat_write: metrics[5],
            at: None,
        }
    }

    /// `(name, value)` pairs in `SAMPLE_METRICS` order.
    pub fn metrics(&self) -> [(&'static str, f64); 6] {
        [
            (SAMPLE_METRICS[0], self.iops_read),
            (SAMPLE_METRICS[1], self.iops_write),
            (SAMPLE_METRICS[2], self.bw_read),
            (SAMPLE_METRICS[3], self.bw_write),
            (SAMPLE_METRICS[4], self.lat_read),
            (SAMPLE_METRICS[5], self.lat_write),
        ]
    }

    pub fn is_valid(&self) -> bool {
        self.device.len() > 0 && self.metrics().iter().all(|(_, v)| v.is_finite())
    }
}

/// Messages pushed by the benchmark runner, one json object per line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TelemetryEvent {
    Sample(Sample),
    Status {
        status: RunStatus,
        #[serde(default)]
        message: String,
    },
    Stage {
        stage: Stage,
        #[serde(default)]
        label: Option<String>,
    },
}
