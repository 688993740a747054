// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fs;
use std::io::{self, BufReader};
use std::thread;

use raid_bench::compare::format_comparison;
use raid_bench::fio::{parse_baseline_fio, parse_pd_fio};
use raid_bench::perf::format_estimates;
use raid_bench::results::load_rows;
use raid_bench::*;
use raid_bench_intf::{Args, BenchConf, CardProfiles, ClassifierConfig, Mode, TelemetryEvent};
use rb_util::*;

#[derive(Default, Serialize)]
struct CalcReport {
    input: CalcInput,
    estimates: Vec<PerfEstimate>,
}

impl JsonSave for CalcReport {}

#[derive(Default, Serialize)]
struct CompareReport {
    facets: Facets,
    filter: ComparisonFilter,
    groups: Vec<ComparisonGroup>,
}

impl JsonSave for CompareReport {}

#[derive(Default, Serialize)]
struct ReplayReport {
    nr_events: usize,
    nr_dropped: usize,
    devices: Vec<String>,
    summary: Option<SummaryMetrics>,
    window: Vec<SeriesPoint>,
}

impl JsonSave for ReplayReport {}

fn commit_report<T: JsonSave>(path: &str, data: T) -> Result<()> {
    if path.len() == 0 {
        return Ok(());
    }
    let mut rep = JsonReportFile::<T>::new(Some(path));
    rep.data = data;
    rep.commit()
        .with_context(|| format!("Writing result file {:?}", path))?;
    info!("Wrote {:?}", path);
    Ok(())
}

fn load_cards(args: &Args) -> Result<CardProfiles> {
    let mut cards = CardProfiles::default();
    if let Some(path) = args.cards.as_ref() {
        cards.extend(CardProfiles::load_verified(path)?);
        debug!("cards: {:?}", cards.models());
    }
    Ok(cards)
}

fn run_calc(args: &Args) -> Result<()> {
    let cards = load_cards(args)?;
    let mut input = CalcInput::from(&args.calc);

    if let Some(path) = args.pd_fio.as_ref() {
        let buf = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        let pd = parse_pd_fio(&buf).with_context(|| format!("Parsing {:?}", path))?;
        info!("calc: Drive metrics from {:?}: {:?}", path, &pd);
        pd.apply_to(&mut input.pd);
    }
    if let Some(path) = args.baseline_fio.as_ref() {
        let buf = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        input.platform_baseline_iops =
            parse_baseline_fio(&buf).with_context(|| format!("Parsing {:?}", path))?;
        info!(
            "calc: Platform baseline from {:?}: {}",
            path,
            format_iops(input.platform_baseline_iops)
        );
    }

    let estimates = estimate_table(&input, &cards)?;
    print!("{}", format_estimates(&input, &estimates));

    commit_report(&args.result, CalcReport { input, estimates })
}

fn run_compare(args: &Args) -> Result<()> {
    let cmp = &args.compare;
    let candidate = load_rows(&cmp.candidate)?;
    let baseline = match cmp.baseline.as_ref() {
        Some(path) => Some(load_rows(path)?),
        None => None,
    };

    let facets = derive_facets(baseline.as_deref(), &candidate);
    info!(
        "compare: {} workloads, {} RAID types, {} statuses, {} stages, {} metrics",
        facets.workloads.len(),
        facets.raid_types.len(),
        facets.statuses.len(),
        facets.stages.len(),
        facets.metrics.len()
    );

    let mut filter = facets.full_selection();
    if let Some(v) = cmp.workloads.as_ref() {
        filter.workloads = v.clone();
    }
    if let Some(v) = cmp.raid_types.as_ref() {
        filter.raid_types = v.clone();
    }
    if let Some(v) = cmp.statuses.as_ref() {
        filter.statuses = v.clone();
    }
    if let Some(v) = cmp.stages.as_ref() {
        filter.stages = v.clone();
    }
    if let Some(v) = cmp.metrics.as_ref() {
        filter.metrics = v.clone();
    }
    if cmp.no_baseline {
        filter.show_baseline = false;
    }

    let groups = build_comparison(baseline.as_deref(), &candidate, &filter);
    if groups.is_empty() {
        warn!("compare: Nothing matches the selection");
    }
    print!("{}", format_comparison(&groups));

    commit_report(
        &args.result,
        CompareReport {
            facets,
            filter,
            groups,
        },
    )
}

fn load_conf(path: &str) -> Result<BenchConf> {
    let conf = BenchConf::load(path)?;
    for err in conf.validate().iter() {
        warn!("conf: {}", err);
    }
    Ok(conf)
}

fn run_replay(args: &Args) -> Result<()> {
    let cfg = match args.conf.as_ref() {
        Some(path) => load_conf(path)?.classifier_config(),
        None => ClassifierConfig::default(),
    };
    let policy = match args.bucket {
        Some(quantum) => MergePolicy::Bucket { quantum },
        None => MergePolicy::Absence,
    };
    debug!("replay: {:?} {:?}", &cfg, &policy);

    let file = match args.events.as_str() {
        "-" => None,
        path => Some(fs::File::open(path).with_context(|| format!("Opening {:?}", path))?),
    };
    let name = args.events.clone();
    let (tx, rx) = channel::unbounded::<String>();
    let reader = thread::spawn(move || match file {
        Some(f) => line_reader_thread(name, BufReader::new(f), tx),
        None => {
            let stdin = io::stdin();
            line_reader_thread(name, stdin.lock(), tx)
        }
    });

    let mut aggr = Aggregator::new(cfg, policy);
    let mut rep = ReplayReport::default();

    for line in rx.iter() {
        let line = line.trim();
        if line.len() == 0 || line.starts_with("//") {
            continue;
        }
        let event = match serde_json::from_str::<TelemetryEvent>(line) {
            Ok(v) => v,
            Err(e) => {
                debug!("replay: Dropping {:?} ({})", line, &e);
                rep.nr_dropped += 1;
                continue;
            }
        };
        rep.nr_events += 1;

        let prev_len = aggr.window().len();
        let prev_label = aggr.window().back().map(|p| p.timestamp_label.clone());
        let prev_sum = aggr.summarize();

        aggr.handle_event(&event);

        let new_point = aggr.window().len() > prev_len
            || aggr.window().back().map(|p| &p.timestamp_label) != prev_label.as_ref();
        match (&event, prev_sum) {
            (TelemetryEvent::Sample(_), Some(sum)) if new_point && prev_len > 0 => {
                println!("[{}] {}", prev_label.unwrap_or_default(), sum.format());
            }
            (TelemetryEvent::Stage { stage, label }, _) => {
                println!("-- stage {} {}", stage, label.as_deref().unwrap_or(""));
            }
            (TelemetryEvent::Status { status, .. }, _) => {
                println!("-- run {:?}", status);
            }
            _ => {}
        }
    }

    reader
        .join()
        .map_err(|_| anyhow!("event reader thread panicked"))?;

    rep.summary = aggr.summarize();
    if let (Some(sum), Some(last)) = (rep.summary.as_ref(), aggr.window().back()) {
        println!("[{}] {}", &last.timestamp_label, sum.format());
    }
    info!(
        "replay: {} events, {} dropped, {} points, {} devices",
        rep.nr_events,
        rep.nr_dropped,
        aggr.window().len(),
        aggr.active_devices().len()
    );

    rep.devices = aggr.active_devices().iter().cloned().collect();
    rep.window = aggr.window().iter().cloned().collect();
    commit_report(&args.result, rep)
}

fn run_validate(args: &Args) -> Result<()> {
    let path = match args.conf.as_ref() {
        Some(v) => v,
        None => bail!("--conf is required"),
    };
    let conf = BenchConf::load(path)?;
    let errs = conf.validate();
    if errs.is_empty() {
        println!("{}: OK", path);
        return Ok(());
    }
    for err in errs.iter() {
        println!("{}: {}", path, err);
    }
    bail!("{} problem(s) found", errs.len());
}

fn main() {
    let (args_file, updated) = Args::init_args_and_logging_nosave().unwrap_or_else(|e| {
        error!("Failed to process args file ({})", &e);
        std::process::exit(1);
    });

    if updated {
        if let Err(e) = Args::save_args(&args_file) {
            error!("Failed to update args file ({})", &e);
            std::process::exit(1);
        }
    }

    let args = &args_file.data;
    let res = match args.mode {
        Mode::Calc => run_calc(args),
        Mode::Compare => run_compare(args),
        Mode::Replay => run_replay(args),
        Mode::Validate => run_validate(args),
    };

    if let Err(e) = res {
        error!("{:?} failed ({:#})", args.mode, &e);
        std::process::exit(1);
    }
}
