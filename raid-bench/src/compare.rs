// Copyright (c) Facebook, Inc. and its affiliates.
use log::debug;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use raid_bench_intf::{Metric, ResultRow, BASELINE_LABEL, SINGLE_TEST, STATUS_NORMAL, STATUS_REBUILD};

/// Workloads which are recorded but never charted.
pub const NOISE_WORKLOADS: &[&str] = &[
    "32k Sequential Read",
    "32.00 Sequential Read",
    "128.00 Sequential Read/Write",
    "4k randrw",
];

const MIXED_WORKLOAD_TAG: &str = "70/30";

/// Selectable options derived from a baseline/candidate pair.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Facets {
    pub workloads: Vec<String>,
    pub raid_types: Vec<String>,
    pub statuses: Vec<String>,
    pub stages: Vec<String>,
    pub metrics: Vec<Metric>,
    pub show_baseline: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComparisonFilter {
    pub workloads: Vec<String>,
    pub raid_types: Vec<String>,
    pub statuses: Vec<String>,
    pub stages: Vec<String>,
    pub metrics: Vec<Metric>,
    pub show_baseline: bool,
}

impl Facets {
    pub fn full_selection(&self) -> ComparisonFilter {
        ComparisonFilter {
            workloads: self.workloads.clone(),
            raid_types: self.raid_types.clone(),
            statuses: self.statuses.clone(),
            stages: self.stages.clone(),
            metrics: self.metrics.clone(),
            show_baseline: self.show_baseline,
        }
    }
}

/// One chart bar group. Serializes as `{"name": M, "Baseline": v, T: v...}`.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint {
    pub name: Metric,
    pub baseline: Option<f64>,
    pub values: BTreeMap<String, f64>,
}

impl Serialize for DataPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let nr = 1 + self.baseline.is_some() as usize + self.values.len();
        let mut map = serializer.serialize_map(Some(nr))?;
        map.serialize_entry("name", self.name.column())?;
        if let Some(v) = self.baseline.as_ref() {
            map.serialize_entry(BASELINE_LABEL, v)?;
        }
        for (k, v) in self.values.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkloadDataset {
    pub workload: String,
    /// Selected RAID types which have a stored row for the workload.
    pub raid_types: Vec<String>,
    pub points: Vec<DataPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonGroup {
    pub stage: String,
    pub raid_status: String,
    pub baseline_visible: bool,
    pub datasets: Vec<WorkloadDataset>,
}

fn is_sentinel_workload(workload: &str) -> bool {
    workload == SINGLE_TEST || workload == BASELINE_LABEL
}

fn is_mixed_workload(workload: &str) -> bool {
    workload.contains(MIXED_WORKLOAD_TAG)
}

pub fn derive_facets(baseline: Option<&[ResultRow]>, candidate: &[ResultRow]) -> Facets {
    let baseline = baseline.unwrap_or(&[]);
    let mut workloads = BTreeSet::new();
    let mut raid_types = BTreeSet::new();
    let mut statuses = BTreeSet::new();
    let mut stages = BTreeSet::new();

    for (row, in_candidate) in baseline
        .iter()
        .map(|r| (r, false))
        .chain(candidate.iter().map(|r| (r, true)))
    {
        let wl = row.workload.as_str();
        if wl.len() > 0
            && !is_sentinel_workload(wl)
            && !NOISE_WORKLOADS.contains(&wl)
            && (in_candidate || !is_mixed_workload(wl))
        {
            workloads.insert(wl.to_string());
        }
    }

    for row in candidate.iter() {
        if row.raid_type.len() > 0
            && row.raid_type != SINGLE_TEST
            && !row.raid_type.contains(BASELINE_LABEL)
        {
            raid_types.insert(row.raid_type.clone());
        }
        statuses.insert(row.raid_status.clone());
        stages.insert(row.stage.clone());
    }

    let metrics = match candidate.first() {
        Some(row) => Metric::ALL
            .iter()
            .cloned()
            .filter(|m| row.metric(*m).map(|v| v.is_finite()).unwrap_or(false))
            .collect(),
        None => vec![],
    };

    let show_baseline = baseline
        .iter()
        .chain(candidate.iter())
        .any(|r| r.raid_type == SINGLE_TEST || r.workload == SINGLE_TEST);

    Facets {
        workloads: workloads.into_iter().collect(),
        raid_types: raid_types.into_iter().collect(),
        statuses: statuses.into_iter().collect(),
        stages: stages.into_iter().collect(),
        metrics,
        show_baseline,
    }
}

fn status_rank(status: &str) -> usize {
    match status {
        STATUS_NORMAL => 0,
        STATUS_REBUILD => 1,
        _ => 2,
    }
}

/// The baseline row with the highest IOPS for `workload`. Ties keep the
/// first row.
fn best_baseline<'a>(baseline: &'a [ResultRow], workload: &str) -> Option<&'a ResultRow> {
    let mut best: Option<&ResultRow> = None;
    for row in baseline.iter().filter(|r| r.workload == workload) {
        let iops = row.metric(Metric::IopsK).unwrap_or(0.0);
        match best {
            Some(b) if b.metric(Metric::IopsK).unwrap_or(0.0) >= iops => {}
            _ => best = Some(row),
        }
    }
    best
}

pub fn build_comparison(
    baseline: Option<&[ResultRow]>,
    candidate: &[ResultRow],
    filter: &ComparisonFilter,
) -> Vec<ComparisonGroup> {
    let baseline = baseline.unwrap_or(&[]);

    let mut pairs: Vec<(&str, &str)> = candidate
        .iter()
        .filter(|r| filter.stages.contains(&r.stage) && filter.statuses.contains(&r.raid_status))
        .map(|r| (r.stage.as_str(), r.raid_status.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    pairs.sort_by(|a, b| {
        (status_rank(a.1), a.0, a.1).cmp(&(status_rank(b.1), b.0, b.1))
    });

    let mut groups = vec![];
    for (stage, status) in pairs.into_iter() {
        let baseline_visible = status != STATUS_REBUILD;
        let mut datasets = vec![];

        for workload in filter.workloads.iter() {
            let lookup = if workload == BASELINE_LABEL {
                SINGLE_TEST
            } else {
                workload.as_str()
            };

            let base_row = match filter.show_baseline {
                true => best_baseline(baseline, lookup),
                false => None,
            };

            let found: Vec<(&String, &ResultRow)> = filter
                .raid_types
                .iter()
                .filter_map(|rt| {
                    candidate
                        .iter()
                        .find(|r| {
                            r.stage == stage
                                && r.raid_status == status
                                && r.workload == lookup
                                && &r.raid_type == rt
                        })
                        .map(|r| (rt, r))
                })
                .collect();
            debug!(
                "compare: {}/{}/{} has {} of {} RAID types",
                stage,
                status,
                workload,
                found.len(),
                filter.raid_types.len()
            );

            let points = filter
                .metrics
                .iter()
                .map(|m| DataPoint {
                    name: *m,
                    baseline: match baseline_visible {
                        true => Some(base_row.and_then(|r| r.metric(*m)).unwrap_or(0.0)),
                        false => None,
                    },
                    values: found
                        .iter()
                        .filter_map(|(rt, r)| r.metric(*m).map(|v| (rt.to_string(), v)))
                        .collect(),
                })
                .collect();

            datasets.push(WorkloadDataset {
                workload: workload.clone(),
                raid_types: found.iter().map(|(rt, _)| rt.to_string()).collect(),
                points,
            });
        }

        groups.push(ComparisonGroup {
            stage: stage.to_string(),
            raid_status: status.to_string(),
            baseline_visible,
            datasets,
        });
    }
    groups
}

pub fn format_comparison(groups: &[ComparisonGroup]) -> String {
    let mut buf = String::new();

    for group in groups.iter() {
        writeln!(
            buf,
            "[{} / {}]{}",
            &group.stage,
            &group.raid_status,
            if group.baseline_visible {
                ""
            } else {
                " (baseline hidden)"
            }
        )
        .unwrap();

        for ds in group.datasets.iter() {
            writeln!(buf, "\n  {}", &ds.workload).unwrap();
            let mut cols = vec![];
            if group.baseline_visible {
                cols.push(BASELINE_LABEL.to_string());
            }
            cols.extend(ds.raid_types.iter().cloned());

            write!(buf, "    {:<20}", "").unwrap();
            for col in cols.iter() {
                write!(buf, " {:>12}", col).unwrap();
            }
            writeln!(buf, "").unwrap();

            for pt in ds.points.iter() {
                write!(buf, "    {:<20}", pt.name.column()).unwrap();
                if let Some(v) = pt.baseline {
                    write!(buf, " {:>12.2}", v).unwrap();
                }
                for rt in ds.raid_types.iter() {
                    match pt.values.get(rt) {
                        Some(v) => write!(buf, " {:>12.2}", v).unwrap(),
                        None => write!(buf, " {:>12}", "-").unwrap(),
                    }
                }
                writeln!(buf, "").unwrap();
            }
        }
        writeln!(buf, "").unwrap();
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::{build_comparison, derive_facets, format_comparison, ComparisonFilter};
    use raid_bench_intf::{Metric, ResultRow};

    fn row(stage: &str, status: &str, wl: &str, rt: &str, iops: f64) -> ResultRow {
        ResultRow::new(wl, rt, status, stage)
            .with_metric(Metric::IopsK, iops)
            .with_metric(Metric::BandwidthGB, iops / 250.0)
    }

    fn filter(workloads: &[&str], raid_types: &[&str], statuses: &[&str]) -> ComparisonFilter {
        ComparisonFilter {
            workloads: workloads.iter().map(|s| s.to_string()).collect(),
            raid_types: raid_types.iter().map(|s| s.to_string()).collect(),
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            stages: vec!["afterdiscard".into(), "aftersustain".into()],
            metrics: vec![Metric::IopsK],
            show_baseline: true,
        }
    }

    #[test]
    fn test_facets() {
        let baseline = vec![
            row("afterdiscard", "Normal", "4k Random Read", "SingleTest", 900.0),
            row("afterdiscard", "Normal", "4k Random 70/30", "SingleTest", 300.0),
            row("afterdiscard", "Normal", "4k randrw", "SingleTest", 100.0),
        ];
        let mut candidate = vec![
            row("afterdiscard", "Normal", "4k Random Read", "RAID5", 500.0),
            row("aftersustain", "Rebuild", "64k Sequential Write", "RAID10", 20.0),
            row("afterdiscard", "Normal", "SingleTest", "Baseline-ref", 1.0),
        ];
        candidate[0].metrics.insert(Metric::LatencyUs, 80.0);

        let facets = derive_facets(Some(&baseline), &candidate);
        assert_eq!(facets.workloads, vec!["4k Random Read", "64k Sequential Write"]);
        assert_eq!(facets.raid_types, vec!["RAID10", "RAID5"]);
        assert_eq!(facets.statuses, vec!["Normal", "Rebuild"]);
        assert_eq!(facets.stages, vec!["afterdiscard", "aftersustain"]);
        assert_eq!(
            facets.metrics,
            vec![Metric::IopsK, Metric::BandwidthGB, Metric::LatencyUs]
        );
        assert!(facets.show_baseline);

        candidate.push(row("afterdiscard", "Normal", "4k Random 70/30", "RAID5", 200.0));
        let facets = derive_facets(None, &candidate);
        assert!(facets.workloads.iter().any(|w| w == "4k Random 70/30"));

        let facets = derive_facets(None, &candidate[..2]);
        assert!(!facets.show_baseline);
    }

    #[test]
    fn test_missing_baseline_reads_zero() {
        let _ = ::env_logger::try_init();
        let candidate = vec![row("afterdiscard", "Normal", "4k Random Read", "RAID5", 500.0)];
        let groups = build_comparison(
            None,
            &candidate,
            &filter(&["4k Random Read"], &["RAID5", "RAID6"], &["Normal"]),
        );

        assert_eq!(groups.len(), 1);
        assert!(groups[0].baseline_visible);
        let ds = &groups[0].datasets[0];
        assert_eq!(ds.raid_types, vec!["RAID5"]);
        let pt = &ds.points[0];
        assert_eq!(pt.baseline, Some(0.0));
        assert_eq!(pt.values.get("RAID5"), Some(&500.0));
        assert_eq!(pt.values.get("RAID6"), None);
        assert_eq!(
            serde_json::to_string(pt).unwrap(),
            r#"{"name":"IOPS(K)","Baseline":0.0,"RAID5":500.0}"#
        );
    }

    #[test]
    fn test_grouping() {
        let _ = ::env_logger::try_init();
        let baseline = vec![
            row("afterdiscard", "Normal", "4k Random Read", "SingleTest", 800.0),
            row("afterdiscard", "Normal", "4k Random Read", "SingleTest", 950.0),
            row("afterdiscard", "Normal", "4k Random Read", "SingleTest", 950.0)
                .with_metric(Metric::BandwidthGB, 1.0),
            row("afterdiscard", "Normal", "SingleTest", "SingleTest", 990.0),
        ];
        let candidate = vec![
            row("aftersustain", "Rebuild", "4k Random Read", "RAID5", 300.0),
            row("afterdiscard", "Degraded", "4k Random Read", "RAID5", 100.0),
            row("aftersustain", "Normal", "4k Random Read", "RAID5", 450.0),
            row("afterdiscard", "Normal", "4k Random Read", "RAID5", 500.0),
            row("afterdiscard", "Normal", "4k Random Read", "RAID6", 400.0),
            row("beforediscard", "Normal", "4k Random Read", "RAID6", 123.0),
        ];
        let mut f = filter(
            &["4k Random Read", "Baseline"],
            &["RAID5", "RAID6"],
            &["Normal", "Rebuild", "Degraded"],
        );
        f.metrics = vec![Metric::IopsK, Metric::BandwidthGB];

        let groups = build_comparison(Some(&baseline), &candidate, &f);
        let keys: Vec<(&str, &str)> = groups
            .iter()
            .map(|g| (g.stage.as_str(), g.raid_status.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("afterdiscard", "Normal"),
                ("aftersustain", "Normal"),
                ("aftersustain", "Rebuild"),
                ("afterdiscard", "Degraded"),
            ]
        );

        let normal = &groups[0];
        assert_eq!(normal.datasets.len(), 2);
        let rr = &normal.datasets[0];
        assert_eq!(rr.points[0].baseline, Some(950.0));
        // first of the tied best rows wins
        assert_eq!(rr.points[1].baseline, Some(3.8));
        assert_eq!(rr.points[0].values.get("RAID6"), Some(&400.0));

        // "Baseline" looks up the SingleTest rows
        let bl = &normal.datasets[1];
        assert_eq!(bl.workload, "Baseline");
        assert_eq!(bl.points[0].baseline, Some(990.0));
        assert!(bl.points[0].values.is_empty());

        let rebuild = &groups[2];
        assert!(!rebuild.baseline_visible);
        assert_eq!(rebuild.datasets[0].points[0].baseline, None);
        assert_eq!(rebuild.datasets[0].points[0].values.get("RAID5"), Some(&300.0));

        f.show_baseline = false;
        let groups = build_comparison(Some(&baseline), &candidate, &f);
        assert_eq!(groups[0].datasets[0].points[0].baseline, Some(0.0));

        f.statuses = vec!["Rebuild".into()];
        let groups = build_comparison(Some(&baseline), &candidate, &f);
        assert_eq!(groups.len(), 1);
        print!("{}", format_comparison(&groups));
    }
}
