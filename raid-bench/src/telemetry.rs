// Copyright (c) Facebook, Inc. and its affiliates.
use chrono::{Local, TimeZone};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::classify::{classify, device_name};
use raid_bench_intf::{
    ClassifierConfig, DeviceClass, RunStatus, Sample, Stage, TelemetryEvent, WINDOW_CAPACITY,
};
use rb_util::*;

/// One row of the live chart. Keys are `{device}_{metric}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp_label: String,
    pub values: BTreeMap<String, f64>,
    #[serde(skip)]
    bucket: Option<u64>,
}

impl SeriesPoint {
    pub fn has_device(&self, dev: &str) -> bool {
        let pfx = format!("{}_", dev);
        self.values.keys().any(|k| k.starts_with(&pfx))
    }

    pub fn get(&self, dev: &str, metric: &str) -> Option<f64> {
        self.values.get(&format!("{}_{}", dev, metric)).cloned()
    }

    fn merge(&mut self, dev: &str, sample: &Sample) {
        for (metric, val) in sample.metrics().iter() {
            self.values
                .entry(format!("{}_{}", dev, metric))
                .or_insert(*val);
        }
    }
}

/// Totals over the devices present in the newest point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub iops_read: f64,
    pub iops_write: f64,
    pub bw_read: f64,
    pub bw_write: f64,
    pub lat_read: f64,
    pub lat_write: f64,
    pub nr_devices: usize,
}

impl SummaryMetrics {
    pub fn format(&self) -> String {
        format!(
            "devs={} read={} {} lat={} write={} {} lat={}",
            self.nr_devices,
            format_scaled_iops(self.iops_read),
            format_scaled_throughput(self.bw_read),
            format_latency(self.lat_read),
            format_scaled_iops(self.iops_write),
            format_scaled_throughput(self.bw_write),
            format_latency(self.lat_write),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Merge into the newest point unless it already has the device.
    Absence,
    /// Merge by `floor(at / quantum)` of the sample timestamp.
    Bucket { quantum: f64 },
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::Absence
    }
}

/// Live window of merged per-device samples for a single benchmark run.
pub struct Aggregator {
    cfg: ClassifierConfig,
    policy: MergePolicy,
    stage: Stage,
    stage_label: Option<String>,
    window: VecDeque<SeriesPoint>,
    devices: BTreeSet<String>,
    running: bool,
}

fn bucket_label(bucket: u64, quantum: f64) -> String {
    let at = (bucket as f64 * quantum) as i64;
    match Local.timestamp_opt(at, 0).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => time_label(),
    }
}

impl Aggregator {
    pub fn new(cfg: ClassifierConfig, policy: MergePolicy) -> Self {
        Self {
            cfg,
            policy,
            stage: Stage::None,
            stage_label: None,
            window: VecDeque::with_capacity(WINDOW_CAPACITY + 1),
            devices: BTreeSet::new(),
            running: false,
        }
    }

    pub fn window(&self) -> &VecDeque<SeriesPoint> {
        &self.window
    }

    pub fn active_devices(&self) -> &BTreeSet<String> {
        &self.devices
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn stage_label(&self) -> Option<&str> {
        self.stage_label.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_stage(&mut self, stage: Stage) {
        if stage != self.stage {
            debug!("telemetry: Stage {} -> {}", self.stage, stage);
            self.stage = stage;
        }
    }

    /// Clears the window together with the device set.
    pub fn reset(&mut self) {
        self.window.clear();
        self.devices.clear();
    }

    fn new_point(&self, sample: &Sample, dev: &str, bucket: Option<u64>) -> SeriesPoint {
        let timestamp_label = if sample.timestamp_label.len() > 0 {
            sample.timestamp_label.clone()
        } else {
            match (bucket, self.policy) {
                (Some(b), MergePolicy::Bucket { quantum }) => bucket_label(b, quantum),
                _ => time_label(),
            }
        };
        let mut point = SeriesPoint {
            timestamp_label,
            values: BTreeMap::new(),
            bucket,
        };
        point.merge(dev, sample);
        point
    }

    fn ingest_by_absence(&mut self, sample: &Sample, dev: &str) {
        if let Some(last) = self.window.back_mut() {
            if !last.has_device(dev) {
                last.merge(dev, sample);
                return;
            }
        }
        let point = self.new_point(sample, dev, None);
        self.window.push_back(point);
    }

    fn ingest_by_bucket(&mut self, sample: &Sample, dev: &str, bucket: u64) -> bool {
        if let Some(point) = self.window.iter_mut().find(|p| p.bucket == Some(bucket)) {
            if point.has_device(dev) {
                trace!("telemetry: {} already reported for bucket {}", dev, bucket);
                return false;
            }
            point.merge(dev, sample);
            return true;
        }

        let pos = self
            .window
            .iter()
            .position(|p| p.bucket.map(|b| b > bucket).unwrap_or(false));

        // Older than everything in a full window, would be evicted right away.
        if pos == Some(0) && self.window.len() >= WINDOW_CAPACITY {
            trace!("telemetry: {} bucket {} is out of the window", dev, bucket);
            return false;
        }

        let point = self.new_point(sample, dev, Some(bucket));
        match pos {
            Some(idx) => self.window.insert(idx, point),
            None => self.window.push_back(point),
        }
        true
    }

    /// Adds a sample to the window. Returns whether it was accepted.
    pub fn ingest(&mut self, sample: &Sample) -> bool {
        if !sample.is_valid() {
            debug!("telemetry: Dropping malformed sample {:?}", sample);
            return false;
        }
        if classify(&sample.device, self.stage, &self.cfg) == DeviceClass::Unknown {
            trace!(
                "telemetry: Ignoring {:?} in stage {}",
                &sample.device,
                self.stage
            );
            return false;
        }

        let dev = device_name(&sample.device).to_string();
        self.devices.insert(dev.clone());

        let accepted = match (self.policy, sample.at) {
            (MergePolicy::Bucket { quantum }, Some(at)) if quantum > 0.0 && at.is_finite() => {
                let bucket = (at.max(0.0) / quantum).floor() as u64;
                self.ingest_by_bucket(sample, &dev, bucket)
            }
            _ => {
                self.ingest_by_absence(sample, &dev);
                true
            }
        };

        while self.window.len() > WINDOW_CAPACITY {
            self.window.pop_front();
        }
        accepted
    }

    /// Aggregates the newest point over the active devices present there.
    pub fn summarize(&self) -> Option<SummaryMetrics> {
        let last = self.window.back()?;
        let mut sum = SummaryMetrics::default();

        for dev in self.devices.iter() {
            if !last.has_device(dev) {
                continue;
            }
            let get = |metric| last.get(dev, metric).unwrap_or(0.0);
            sum.iops_read += get("iops_read");
            sum.iops_write += get("iops_write");
            sum.bw_read += get("bw_read");
            sum.bw_write += get("bw_write");
            sum.lat_read += get("lat_read");
            sum.lat_write += get("lat_write");
            sum.nr_devices += 1;
        }

        if sum.nr_devices == 0 {
            return None;
        }
        sum.lat_read /= sum.nr_devices as f64;
        sum.lat_write /= sum.nr_devices as f64;
        Some(sum)
    }

    pub fn handle_event(&mut self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::Sample(sample) => {
                self.ingest(sample);
            }
            TelemetryEvent::Status { status, message } => match status {
                RunStatus::Started => {
                    info!("telemetry: Run started {}", message);
                    self.reset();
                    self.running = true;
                }
                RunStatus::Completed => {
                    info!(
                        "telemetry: Run completed with {} points {}",
                        self.window.len(),
                        message
                    );
                    self.running = false;
                }
                RunStatus::Failed => {
                    warn!("telemetry: Run failed {}", message);
                    self.running = false;
                }
            },
            TelemetryEvent::Stage { stage, label } => {
                self.set_stage(*stage);
                self.stage_label = label.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Aggregator, MergePolicy};
    use raid_bench_intf::{
        ClassifierConfig, RunStatus, Sample, Stage, TelemetryEvent, WINDOW_CAPACITY,
    };

    fn pd_aggr(policy: MergePolicy) -> Aggregator {
        let mut aggr = Aggregator::new(Default::default(), policy);
        aggr.set_stage(Stage::Pd);
        aggr
    }

    fn sample(dev: &str, iops: f64) -> Sample {
        let mut s = Sample::new(dev, [iops, iops / 2.0, iops / 250.0, 0.0, 0.1, 0.2]);
        s.timestamp_label = "t".into();
        s
    }

    fn timed(dev: &str, iops: f64, at: f64) -> Sample {
        let mut s = sample(dev, iops);
        s.at = Some(at);
        s
    }

    #[test]
    fn test_merge_by_absence() {
        let _ = ::env_logger::try_init();
        let mut aggr = pd_aggr(MergePolicy::Absence);

        assert!(aggr.ingest(&sample("nvme0n1", 1000.0)));
        assert!(aggr.ingest(&sample("nvme1n1", 2000.0)));
        assert_eq!(aggr.window().len(), 1);
        assert_eq!(aggr.window()[0].values.len(), 12);

        // same device back to back starts a new point
        assert!(aggr.ingest(&sample("nvme1n1", 3000.0)));
        assert!(aggr.ingest(&sample("nvme1n1", 4000.0)));
        assert_eq!(aggr.window().len(), 3);
        assert_eq!(aggr.window()[0].get("nvme1n1", "iops_read"), Some(2000.0));
        assert_eq!(aggr.window()[2].get("nvme1n1", "iops_read"), Some(4000.0));

        assert!(!aggr.ingest(&sample("md0", 100.0)));
        assert_eq!(aggr.active_devices().len(), 2);
    }

    #[test]
    fn test_window_bound_and_reset() {
        let _ = ::env_logger::try_init();
        let mut aggr = pd_aggr(MergePolicy::Absence);

        for i in 0..(WINDOW_CAPACITY * 3) {
            aggr.ingest(&sample("nvme0n1", i as f64));
            if i % 2 == 0 {
                aggr.ingest(&sample("nvme1n1", i as f64));
            }
            assert!(aggr.window().len() <= WINDOW_CAPACITY);
        }
        assert_eq!(aggr.window().len(), WINDOW_CAPACITY);
        assert_eq!(
            aggr.window().back().unwrap().get("nvme0n1", "iops_read"),
            Some((WINDOW_CAPACITY * 3 - 1) as f64)
        );

        aggr.handle_event(&TelemetryEvent::Status {
            status: RunStatus::Started,
            message: "".into(),
        });
        assert!(aggr.window().is_empty());
        assert!(aggr.active_devices().is_empty());
        assert!(aggr.is_running());
        assert!(aggr.summarize().is_none());
    }

    #[test]
    fn test_summarize() {
        let _ = ::env_logger::try_init();
        let mut aggr = pd_aggr(MergePolicy::Absence);

        aggr.ingest(&sample("nvme0n1", 1000.0));
        aggr.ingest(&sample("nvme1n1", 3000.0));
        let sum = aggr.summarize().unwrap();
        assert_eq!(sum.nr_devices, 2);
        assert_eq!(sum.iops_read, 4000.0);
        assert_eq!(sum.iops_write, 2000.0);
        assert_eq!(sum.bw_read, 16.0);
        assert!((sum.lat_read - 0.1).abs() < 1e-9);
        assert!((sum.lat_write - 0.2).abs() < 1e-9);

        // only nvme0n1 has arrived for the new tick
        aggr.ingest(&sample("nvme0n1", 500.0));
        let sum = aggr.summarize().unwrap();
        assert_eq!(sum.nr_devices, 1);
        assert_eq!(sum.iops_read, 500.0);
    }

    #[test]
    fn test_merge_values_are_kept() {
        let mut aggr = pd_aggr(MergePolicy::Absence);
        aggr.ingest(&sample("nvme0n1", 1000.0));
        aggr.ingest(&sample("/dev/nvme1n1", 2000.0));
        assert_eq!(aggr.window().len(), 1);
        assert_eq!(aggr.window()[0].get("nvme1n1", "iops_read"), Some(2000.0));
        assert!(aggr.active_devices().contains("nvme1n1"));
    }

    #[test]
    fn test_merge_by_bucket() {
        let _ = ::env_logger::try_init();
        let mut aggr = pd_aggr(MergePolicy::Bucket { quantum: 1.0 });

        // nvme1n1 reports twice for tick 100 before nvme0n1 catches up
        assert!(aggr.ingest(&timed("nvme1n1", 1.0, 100.2)));
        assert!(!aggr.ingest(&timed("nvme1n1", 2.0, 100.7)));
        assert!(aggr.ingest(&timed("nvme1n1", 3.0, 101.1)));
        assert!(aggr.ingest(&timed("nvme0n1", 4.0, 100.9)));
        assert!(aggr.ingest(&timed("nvme0n1", 5.0, 101.3)));
        assert_eq!(aggr.window().len(), 2);
        assert_eq!(aggr.window()[0].get("nvme1n1", "iops_read"), Some(1.0));
        assert_eq!(aggr.window()[0].get("nvme0n1", "iops_read"), Some(4.0));
        assert_eq!(aggr.window()[1].get("nvme0n1", "iops_read"), Some(5.0));

        // late arrival lands in order
        assert!(aggr.ingest(&timed("nvme0n1", 6.0, 99.5)));
        assert_eq!(aggr.window().len(), 3);
        assert_eq!(aggr.window()[0].get("nvme0n1", "iops_read"), Some(6.0));

        // untimed samples fall back to merge by absence
        assert!(aggr.ingest(&sample("nvme1n1", 7.0)));
        assert_eq!(aggr.window().len(), 4);
    }

    #[test]
    fn test_bucket_older_than_full_window() {
        let mut aggr = pd_aggr(MergePolicy::Bucket { quantum: 1.0 });
        for tick in 0..WINDOW_CAPACITY {
            assert!(aggr.ingest(&timed("nvme0n1", 1.0, 100.0 + tick as f64)));
        }
        assert_eq!(aggr.window().len(), WINDOW_CAPACITY);

        assert!(!aggr.ingest(&timed("nvme0n1", 9.0, 50.0)));
        assert_eq!(aggr.window().len(), WINDOW_CAPACITY);
        assert_eq!(aggr.window()[0].get("nvme0n1", "iops_read"), Some(1.0));

        // a missing device still merges into the oldest bucket
        assert!(aggr.ingest(&timed("nvme1n1", 2.0, 100.5)));
        assert_eq!(aggr.window()[0].get("nvme1n1", "iops_read"), Some(2.0));

        // a newer bucket pushes the oldest one out
        assert!(aggr.ingest(&timed("nvme0n1", 3.0, 100.0 + WINDOW_CAPACITY as f64)));
        assert_eq!(aggr.window().len(), WINDOW_CAPACITY);
        assert_eq!(aggr.window()[0].get("nvme1n1", "iops_read"), None);
    }

    #[test]
    fn test_events() {
        let _ = ::env_logger::try_init();
        let cfg = ClassifierConfig {
            vd_name: "".into(),
            nvme_allow_list: vec![],
            run_pd: false,
            run_vd: false,
        };
        let mut aggr = Aggregator::new(cfg, MergePolicy::Absence);

        aggr.handle_event(&TelemetryEvent::Sample(sample("gdg0n1", 10.0)));
        assert!(aggr.window().is_empty());

        aggr.handle_event(&TelemetryEvent::Stage {
            stage: Stage::Vd,
            label: Some("RAID5".into()),
        });
        aggr.handle_event(&TelemetryEvent::Sample(sample("gdg0n1", 10.0)));
        assert_eq!(aggr.window().len(), 1);
        assert_eq!(aggr.stage_label(), Some("RAID5"));

        aggr.handle_event(&TelemetryEvent::Status {
            status: RunStatus::Completed,
            message: "".into(),
        });
        assert!(!aggr.is_running());
        assert_eq!(aggr.window().len(), 1);
    }
}
