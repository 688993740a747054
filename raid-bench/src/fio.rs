// Copyright (c) Facebook, Inc. and its affiliates.
//! Drive metrics extraction from `fio --output-format=json` logs.
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::perf::PdMetrics;
use raid_bench_intf::ParseError;

pub const JOB_4K_READ: &str = "4k_random_read";
pub const JOB_4K_WRITE: &str = "4k_random_write";
pub const JOB_4K_MIXED: &str = "4k_random_50read_50write";
pub const JOB_64K_READ: &str = "64k_random_read";
pub const JOB_64K_WRITE: &str = "64k_random_write";
pub const JOB_BASELINE: &str = "nvme";

/// Metrics found in a single drive log. Bandwidth in MB/s.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PdFioMetrics {
    pub read_iops: Option<f64>,
    pub write_iops: Option<f64>,
    pub mixed_iops: Option<f64>,
    pub read_bw: Option<f64>,
    pub write_bw: Option<f64>,
}

impl PdFioMetrics {
    /// Overrides the fields of `pd` which were found in the log.
    pub fn apply_to(&self, pd: &mut PdMetrics) {
        for (src, dst) in &mut [
            (self.read_iops, &mut pd.read_iops),
            (self.write_iops, &mut pd.write_iops),
            (self.mixed_iops, &mut pd.mixed_iops),
            (self.read_bw, &mut pd.read_bw),
            (self.write_bw, &mut pd.write_bw),
        ] {
            if let Some(v) = src {
                **dst = *v;
            }
        }
    }
}

fn jobs(input: &str) -> Result<Vec<Value>, ParseError> {
    let mut doc: Value = serde_json::from_str(input)?;
    match doc.get_mut("jobs").map(|jobs| jobs.take()) {
        Some(Value::Array(jobs)) => Ok(jobs),
        _ => Err(ParseError::Missing("jobs".into())),
    }
}

fn jobname(job: &Value) -> &str {
    job.get("jobname").and_then(|v| v.as_str()).unwrap_or("")
}

/// `name` occurs in `jobname` and is not the tail of a longer block size,
/// so that "4k_random_read" doesn't pick up "64k_random_read".
fn job_matches(jobname: &str, name: &str) -> bool {
    jobname.match_indices(name).any(|(idx, _)| {
        jobname[..idx]
            .chars()
            .last()
            .map(|c| !c.is_ascii_digit())
            .unwrap_or(true)
    })
}

fn find_job<'a>(jobs: &'a [Value], name: &str) -> Option<&'a Value> {
    jobs.iter().find(|job| job_matches(jobname(job), name))
}

fn job_field(job: &Value, dir: &str, field: &str) -> Result<f64, ParseError> {
    let path = format!("{}.{}", dir, field);
    let v = job
        .get(dir)
        .and_then(|d| d.get(field))
        .ok_or_else(|| ParseError::Missing(format!("{} of job {:?}", &path, jobname(job))))?;
    match v.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(ParseError::NotNumeric {
            job: jobname(job).into(),
            field: path,
            value: v.to_string(),
        }),
    }
}

pub fn parse_pd_fio(input: &str) -> Result<PdFioMetrics, ParseError> {
    let jobs = jobs(input)?;
    let mut res = PdFioMetrics::default();

    for (name, dir, field, div, dst) in &mut [
        (JOB_4K_READ, "read", "iops", 1.0, &mut res.read_iops),
        (JOB_4K_WRITE, "write", "iops", 1.0, &mut res.write_iops),
        (JOB_4K_MIXED, "write", "iops", 1.0, &mut res.mixed_iops),
        (JOB_64K_READ, "read", "bw", 1000.0, &mut res.read_bw),
        (JOB_64K_WRITE, "write", "bw", 1000.0, &mut res.write_bw),
    ] {
        if let Some(job) = find_job(&jobs, name) {
            let v = job_field(job, dir, field)? / *div;
            debug!("fio: {} {}.{} = {}", jobname(job), dir, field, v);
            **dst = Some(v);
        }
    }

    if res == PdFioMetrics::default() {
        return Err(ParseError::NoMatchingJob(
            [JOB_4K_READ, JOB_4K_WRITE, JOB_4K_MIXED, JOB_64K_READ, JOB_64K_WRITE]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ));
    }
    Ok(res)
}

/// Platform baseline IOPS, the random read IOPS of the first NVMe job.
pub fn parse_baseline_fio(input: &str) -> Result<f64, ParseError> {
    let jobs = jobs(input)?;
    match jobs.iter().find(|job| jobname(job).contains(JOB_BASELINE)) {
        Some(job) => job_field(job, "read", "iops"),
        None => Err(ParseError::NoMatchingJob(vec![JOB_BASELINE.into()])),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_baseline_fio, parse_pd_fio, PdFioMetrics};
    use crate::perf::PdMetrics;
    use raid_bench_intf::ParseError;

    const PD_LOG: &str = r#"{
        "fio version": "fio-3.35",
        "jobs": [
            { "jobname": "nvme0n1_64k_random_read", "read": { "iops": 80000, "bw": 5120000 },
              "write": { "iops": 0, "bw": 0 } },
            { "jobname": "nvme0n1_4k_random_read", "read": { "iops": 1100000.5, "bw": 4400000 },
              "write": { "iops": 0, "bw": 0 } },
            { "jobname": "nvme0n1_4k_random_50read_50write", "read": { "iops": 210000, "bw": 840000 },
              "write": { "iops": 205000, "bw": 820000 } },
            { "jobname": "nvme0n1_64k_random_write", "read": { "iops": 0, "bw": 0 },
              "write": { "iops": 31000, "bw": 2048000 } }
        ]
    }"#;

    #[test]
    fn test_pd_fio() {
        let _ = ::env_logger::try_init();
        let res = parse_pd_fio(PD_LOG).unwrap();
        assert_eq!(
            res,
            PdFioMetrics {
                read_iops: Some(1100000.5),
                write_iops: None,
                mixed_iops: Some(205000.0),
                read_bw: Some(5120.0),
                write_bw: Some(2048.0),
            }
        );

        let mut pd = PdMetrics {
            write_iops: 600_000.0,
            ..Default::default()
        };
        res.apply_to(&mut pd);
        assert_eq!(pd.read_iops, 1100000.5);
        assert_eq!(pd.write_iops, 600_000.0);
        assert_eq!(pd.read_bw, 5120.0);
    }

    #[test]
    fn test_pd_fio_errors() {
        assert!(matches!(parse_pd_fio("{ not json"), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_pd_fio(r#"{"fio version": "3"}"#),
            Err(ParseError::Missing(_))
        ));
        assert!(matches!(
            parse_pd_fio(r#"{"jobs": [{"jobname": "seq_write"}]}"#),
            Err(ParseError::NoMatchingJob(_))
        ));
        match parse_pd_fio(r#"{"jobs": [{"jobname": "4k_random_write", "write": {"iops": "fast"}}]}"#)
        {
            Err(ParseError::NotNumeric { job, field, .. }) => {
                assert_eq!(job, "4k_random_write");
                assert_eq!(field, "write.iops");
            }
            res => panic!("unexpected {:?}", res),
        }
    }

    #[test]
    fn test_baseline_fio() {
        let log = r#"{"jobs": [
            {"jobname": "prep", "read": {"iops": 1}},
            {"jobname": "all_nvme_4k_read", "read": {"iops": 19500000}}
        ]}"#;
        assert_eq!(parse_baseline_fio(log).unwrap(), 19_500_000.0);
        assert!(matches!(
            parse_baseline_fio(r#"{"jobs": [{"jobname": "nvme", "write": {"iops": 3}}]}"#),
            Err(ParseError::Missing(_))
        ));
        assert!(matches!(
            parse_baseline_fio(r#"{"jobs": []}"#),
            Err(ParseError::NoMatchingJob(_))
        ));
    }
}
