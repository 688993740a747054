// Copyright (c) Facebook, Inc. and its affiliates.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ParseError;

/// Descriptive columns of stored result tables. Never charted.
pub const METADATA_COLUMNS: &[&str] = &[
    "filename",
    "Workload",
    "Type",
    "Model",
    "Ben_type",
    "RAID_status",
    "RAID_type",
    "stage",
    "SSD",
    "controller",
    "fio-version",
];

/// Numeric result columns which can be compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    #[serde(rename = "IOPS(K)")]
    IopsK,
    #[serde(rename = "Bandwidth (GB/s)")]
    BandwidthGB,
    #[serde(rename = "Bandwidth (GiB/s)")]
    BandwidthGiB,
    #[serde(rename = "Latency (us)")]
    LatencyUs,
    #[serde(rename = "Read Latency (us)")]
    ReadLatencyUs,
    #[serde(rename = "Write Latency (us)")]
    WriteLatencyUs,
    #[serde(rename = "Latency_stdev (us)")]
    LatencyStdevUs,
    #[serde(rename = "System CPU")]
    SystemCpu,
    #[serde(rename = "User CPU")]
    UserCpu,
    #[serde(rename = "Idle CPU")]
    IdleCpu,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::IopsK,
        Metric::BandwidthGB,
        Metric::BandwidthGiB,
        Metric::LatencyUs,
        Metric::ReadLatencyUs,
        Metric::WriteLatencyUs,
        Metric::LatencyStdevUs,
        Metric::SystemCpu,
        Metric::UserCpu,
        Metric::IdleCpu,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Metric::IopsK => "IOPS(K)",
            Metric::BandwidthGB => "Bandwidth (GB/s)",
            Metric::BandwidthGiB => "Bandwidth (GiB/s)",
            Metric::LatencyUs => "Latency (us)",
            Metric::ReadLatencyUs => "Read Latency (us)",
            Metric::WriteLatencyUs => "Write Latency (us)",
            Metric::LatencyStdevUs => "Latency_stdev (us)",
            Metric::SystemCpu => "System CPU",
            Metric::UserCpu => "User CPU",
            Metric::IdleCpu => "Idle CPU",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.iter().cloned().find(|m| m.column() == column)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.column())
    }
}

/// One stored benchmark measurement.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultRow {
    #[serde(rename = "Workload")]
    pub workload: String,
    #[serde(rename = "RAID_type")]
    pub raid_type: String,
    #[serde(rename = "RAID_status")]
    pub raid_status: String,
    pub stage: String,
    pub metrics: BTreeMap<Metric, f64>,
    pub extra: BTreeMap<String, String>,
}

fn is_ignored_column(column: &str) -> bool {
    METADATA_COLUMNS.contains(&column)
        || column.ends_with("th")
        || column.contains("PD_count")
        || column.contains("Unnamed")
}

impl ResultRow {
    pub fn new(workload: &str, raid_type: &str, raid_status: &str, stage: &str) -> Self {
        Self {
            workload: workload.into(),
            raid_type: raid_type.into(),
            raid_status: raid_status.into(),
            stage: stage.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        self.metrics.insert(metric, value);
        self
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).cloned()
    }

    /// Builds a row from a table record keyed by column name.
    pub fn from_columns<'a, I>(columns: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row = ResultRow::default();

        for (column, value) in columns {
            let value = value.trim();
            match column {
                "Workload" => row.workload = value.into(),
                "RAID_type" => row.raid_type = value.into(),
                "RAID_status" => row.raid_status = value.into(),
                "stage" => row.stage = value.into(),
                _ => match Metric::from_column(column) {
                    Some(metric) => {
                        if value.len() == 0 {
                            continue;
                        }
                        match value.parse::<f64>() {
                            Ok(v) if v.is_finite() => {
                                row.metrics.insert(metric, v);
                            }
                            _ => {
                                return Err(ParseError::BadColumn {
                                    column: column.into(),
                                    value: value.into(),
                                })
                            }
                        }
                    }
                    None => {
                        if !is_ignored_column(column)
                            && value.parse::<f64>().map(|v| v.is_finite()).unwrap_or(false)
                        {
                            debug!("result: Untracked numeric column {:?}", column);
                        }
                        row.extra.insert(column.into(), value.into());
                    }
                },
            }
        }
        Ok(row)
    }
}
