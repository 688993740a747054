// Copyright (c) Facebook, Inc. and its affiliates.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::RaidType;
use rb_util::*;

const CONF_DOC: &str = "\
//
// graid-bench configuration
//
//  NVME_INFO: NVMe model description used in reports
//  NVME_LIST: NVMe namespaces under test, e.g. [\"nvme0n1\", \"nvme1n1\"]
//  RAID_CTRLR: RAID controller model
//  VD_NAME: Name of the virtual drive created for VD tests
//  RAID_TYPE: RAID types to test, RAID0, RAID1, RAID5, RAID6 or RAID10
//  TS_LS, STA_LS, JOB_LS, QD_LS, BS_LS, WP_LS, pd_jobs: Test matrix lists
//  PD_RUNTIME: Seconds per physical drive job, at least 10
//  VD_RUNTIME: Seconds per virtual drive job, at least 10
//  QUICK_TEST: Run the reduced test matrix
//  LOG_COMPACT: Keep only summary logs
//  SCAN: Scan for NVMe devices before starting
//  RUN_PD: Test physical drives
//  RUN_VD: Test virtual drives
//  RUN_PD_ALL: Test every NVMe namespace instead of NVME_LIST
//
// List fields also accept a comma separated string. Unknown keys are kept.
//
";

fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => vec![],
        Value::String(s) => parse_list(&s),
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                v => Some(v.to_string()),
            })
            .filter(|s| s.len() > 0)
            .collect(),
        v => vec![v.to_string()],
    })
}

fn dfl_runtime() -> u64 {
    180
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConf {
    #[serde(rename = "NVME_INFO")]
    pub nvme_info: String,
    #[serde(rename = "NVME_LIST", deserialize_with = "deserialize_list")]
    pub nvme_list: Vec<String>,
    #[serde(rename = "RAID_CTRLR")]
    pub raid_ctrlr: String,
    #[serde(rename = "VD_NAME")]
    pub vd_name: String,
    #[serde(rename = "RAID_TYPE", deserialize_with = "deserialize_list")]
    pub raid_type: Vec<String>,
    #[serde(rename = "TS_LS", deserialize_with = "deserialize_list")]
    pub ts_ls: Vec<String>,
    #[serde(rename = "STA_LS", deserialize_with = "deserialize_list")]
    pub sta_ls: Vec<String>,
    #[serde(rename = "JOB_LS", deserialize_with = "deserialize_list")]
    pub job_ls: Vec<String>,
    #[serde(rename = "QD_LS", deserialize_with = "deserialize_list")]
    pub qd_ls: Vec<String>,
    #[serde(rename = "BS_LS", deserialize_with = "deserialize_list")]
    pub bs_ls: Vec<String>,
    #[serde(rename = "WP_LS", deserialize_with = "deserialize_list")]
    pub wp_ls: Vec<String>,
    #[serde(deserialize_with = "deserialize_list")]
    pub pd_jobs: Vec<String>,
    #[serde(rename = "PD_RUNTIME", default = "dfl_runtime")]
    pub pd_runtime: u64,
    #[serde(rename = "VD_RUNTIME", default = "dfl_runtime")]
    pub vd_runtime: u64,
    #[serde(rename = "QUICK_TEST")]
    pub quick_test: bool,
    #[serde(rename = "LOG_COMPACT")]
    pub log_compact: bool,
    #[serde(rename = "SCAN")]
    pub scan: bool,
    #[serde(rename = "RUN_PD")]
    pub run_pd: bool,
    #[serde(rename = "RUN_VD")]
    pub run_vd: bool,
    #[serde(rename = "RUN_PD_ALL")]
    pub run_pd_all: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for BenchConf {
    fn default() -> Self {
        Self {
            nvme_info: "".into(),
            nvme_list: vec![],
            raid_ctrlr: "".into(),
            vd_name: "".into(),
            raid_type: vec![],
            ts_ls: vec![],
            sta_ls: vec![],
            job_ls: vec![],
            qd_ls: vec![],
            bs_ls: vec![],
            wp_ls: vec![],
            pd_jobs: vec![],
            pd_runtime: dfl_runtime(),
            vd_runtime: dfl_runtime(),
            quick_test: false,
            log_compact: false,
            scan: false,
            run_pd: false,
            run_vd: false,
            run_pd_all: false,
            extra: BTreeMap::new(),
        }
    }
}

impl JsonLoad for BenchConf {}

impl JsonSave for BenchConf {
    fn preamble() -> Option<String> {
        Some(CONF_DOC.to_string())
    }
}

/// Inputs of the device classifier.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub vd_name: String,
    pub nvme_allow_list: Vec<String>,
    pub run_pd: bool,
    pub run_vd: bool,
}

impl BenchConf {
    /// Returns every problem which would make the run fail or meaningless.
    pub fn validate(&self) -> Vec<String> {
        let mut errs = vec![];
        let nr_nvmes = self.nvme_list.len();
        let has = |name: &str| self.raid_type.iter().any(|rt| rt == name);

        if has("RAID5") && nr_nvmes < RaidType::Raid5.min_drives() {
            errs.push(format!(
                "RAID5 requires at least {} NVMe devices",
                RaidType::Raid5.min_drives()
            ));
        }
        if has("RAID6") && nr_nvmes < RaidType::Raid6.min_drives() {
            errs.push(format!(
                "RAID6 requires at least {} NVMe devices",
                RaidType::Raid6.min_drives()
            ));
        }
        if (has("RAID1") || has("RAID10")) && nr_nvmes % 2 != 0 {
            errs.push(format!(
                "RAID1 and RAID10 require an even number of NVMe devices, currently {}",
                nr_nvmes
            ));
        }
        if nr_nvmes == 0 {
            errs.push("At least one NVMe device is required".into());
        }

        let invalid: Vec<&str> = self
            .raid_type
            .iter()
            .filter(|rt| !RaidType::ALL.iter().any(|valid| valid.name() == rt.as_str()))
            .map(|rt| rt.as_str())
            .collect();
        if invalid.len() > 0 {
            errs.push(format!("Invalid RAID types: {}", invalid.join(", ")));
        }

        if self.pd_runtime < 10 || self.vd_runtime < 10 {
            errs.push("Runtime should be at least 10 seconds".into());
        }
        errs
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            vd_name: self.vd_name.clone(),
            nvme_allow_list: match self.run_pd_all {
                true => vec![],
                false => self
                    .nvme_list
                    .iter()
                    .map(|dev| {
                        let dev = dev.trim();
                        dev.strip_prefix("/dev/").unwrap_or(dev).to_string()
                    })
                    .collect(),
            },
            run_pd: self.run_pd,
            run_vd: self.run_vd,
        }
    }
}
