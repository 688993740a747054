// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaidType {
    #[serde(rename = "RAID0")]
    Raid0,
    #[serde(rename = "RAID1")]
    Raid1,
    #[serde(rename = "RAID5")]
    Raid5,
    #[serde(rename = "RAID6")]
    Raid6,
    #[serde(rename = "RAID10")]
    Raid10,
}

/// Labels shown by the calculator, in display order.
pub const RAID_LABELS: &[&str] = &[
    "RAID0",
    "RAID1",
    "RAID5",
    "RAID6",
    "RAID10",
    "SR-CRAID",
    "SingleTest",
];

/// Non-RAID labels which are modeled with a RAID type's formula and caps.
pub const RAID_ALIASES: &[(&str, RaidType)] = &[
    ("SR-CRAID", RaidType::Raid5),
    ("SingleTest", RaidType::Raid0),
];

impl RaidType {
    pub const ALL: [RaidType; 5] = [
        RaidType::Raid0,
        RaidType::Raid1,
        RaidType::Raid5,
        RaidType::Raid6,
        RaidType::Raid10,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RaidType::Raid0 => "RAID0",
            RaidType::Raid1 => "RAID1",
            RaidType::Raid5 => "RAID5",
            RaidType::Raid6 => "RAID6",
            RaidType::Raid10 => "RAID10",
        }
    }

    /// Resolves a calculator label, following `RAID_ALIASES`.
    pub fn resolve(label: &str) -> Result<Self> {
        for (alias, rt) in RAID_ALIASES.iter() {
            if alias.eq_ignore_ascii_case(label.trim()) {
                return Ok(*rt);
            }
        }
        label.parse()
    }

    pub fn is_parity(&self) -> bool {
        match self {
            RaidType::Raid5 | RaidType::Raid6 => true,
            _ => false,
        }
    }

    /// Smallest array the type can be built from.
    pub fn min_drives(&self) -> usize {
        match self {
            RaidType::Raid0 => 1,
            RaidType::Raid1 | RaidType::Raid10 => 2,
            RaidType::Raid5 => 3,
            RaidType::Raid6 => 4,
        }
    }

    pub fn needs_even_drives(&self) -> bool {
        match self {
            RaidType::Raid1 | RaidType::Raid10 => true,
            _ => false,
        }
    }
}

impl fmt::Display for RaidType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RaidType {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        for rt in RaidType::ALL.iter() {
            if rt.name().eq_ignore_ascii_case(input.trim()) {
                return Ok(*rt);
            }
        }
        bail!("unknown RAID type {:?}", input);
    }
}

/// Generation of the write IOPS formula used for parity RAID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulaVersion {
    #[serde(rename = "1.7", alias = "1.7.x")]
    V1_7,
    #[serde(rename = "2.0")]
    V2_0,
}

impl Default for FormulaVersion {
    fn default() -> Self {
        FormulaVersion::V1_7
    }
}

impl fmt::Display for FormulaVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormulaVersion::V1_7 => write!(f, "1.7"),
            FormulaVersion::V2_0 => write!(f, "2.0"),
        }
    }
}

impl FromStr for FormulaVersion {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim() {
            "1.7" | "1.7.x" => Ok(FormulaVersion::V1_7),
            "2.0" | "2" => Ok(FormulaVersion::V2_0),
            v => bail!("unknown formula version {:?}, expected 1.7 or 2.0", v),
        }
    }
}
