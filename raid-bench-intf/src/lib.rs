// Copyright (c) Facebook, Inc. and its affiliates.
pub mod args;
pub mod card;
pub mod conf;
pub mod error;
pub mod raid;
pub mod result;
pub mod sample;

pub use args::{Args, CalcArgs, CompareArgs, Mode};
pub use card::{CardProfile, CardProfiles, RaidLimits};
pub use conf::{BenchConf, ClassifierConfig};
pub use error::ParseError;
pub use raid::{FormulaVersion, RaidType, RAID_ALIASES, RAID_LABELS};
pub use result::{Metric, ResultRow, METADATA_COLUMNS};
pub use sample::{DeviceClass, RunStatus, Sample, Stage, TelemetryEvent, SAMPLE_METRICS};

lazy_static::lazy_static! {
    pub static ref VERSION: &'static str = env!("CARGO_PKG_VERSION");
}

/// Number of merged points kept in the live window.
pub const WINDOW_CAPACITY: usize = 60;

/// Stored `Workload`/`RAID_type` value marking single drive reference runs.
pub const SINGLE_TEST: &str = "SingleTest";
/// Synthetic workload label the UI uses for `SINGLE_TEST` runs.
pub const BASELINE_LABEL: &str = "Baseline";

pub const STATUS_NORMAL: &str = "Normal";
pub const STATUS_REBUILD: &str = "Rebuild";

/// Name prefixes of GRAID virtual drives.
pub const VD_PREFIXES: &[&str] = &["gdg", "gvo"];
