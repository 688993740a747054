// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::Result;
use log::error;
use serde::{Deserialize, Serialize};
use std::process::exit;

use super::{CardProfiles, FormulaVersion, Metric};
use rb_util::*;

const TOP_ARGS_STR: &str = "-r, --result=[RESULTFILE]    'Write the json output to RESULTFILE'
     -a, --args=[FILE]            'Loads base command line arguments from FILE'
     -C, --cards=[FILE]           'Card profile overrides, merged over the built-in table'
     -v...                        'Sets the level of verbosity'";

const ARGS_DOC: &str = "\
//
// raid-bench command line arguments
//
// Loaded with --args and updated with the options given on the command line.
//
//  mode: Last subcommand, one of Calc, Compare, Replay, Validate
//  cards: Card profile override file
//  conf: Benchmark configuration file used by replay and validate
//  bucket: Replay merge quantum in seconds, null merges by device absence
//  calc: Calculator inputs, see raid-bench calc --help
//
";

lazy_static::lazy_static! {
    static ref CALC_ARGS_STR: String = {
        let dfl = Args::default();
        format!(
            "-n, --drives=[NR]            'Number of drives in the array (dfl: {dfl_drives})'
                 --pd-read=[IOPS]         '4k random read IOPS of one drive (dfl: {dfl_read})'
                 --pd-write=[IOPS]        '4k random write IOPS of one drive (dfl: {dfl_write})'
                 --pd-mixed=[IOPS]        '4k 50/50 mixed IOPS of one drive (dfl: {dfl_mixed})'
                 --pd-read-bw=[MBPS]      '64k read bandwidth of one drive (dfl: {dfl_read_bw})'
                 --pd-write-bw=[MBPS]     '64k write bandwidth of one drive (dfl: {dfl_write_bw})'
             -p, --platform=[IOPS]        'Platform baseline IOPS (dfl: {dfl_platform})'
             -f, --formula=[VER]          'Write formula version, 1.7 or 2.0 (dfl: {dfl_formula})'
             -c, --card=[MODEL]           'RAID card model (dfl: {dfl_card})'
                 --pd-fio=[FILE]          'Single drive fio json log to take drive metrics from'
                 --baseline-fio=[FILE]    'Platform fio json log to take the baseline IOPS from'",
            dfl_drives = dfl.calc.num_drives,
            dfl_read = format_iops(dfl.calc.pd_read_iops),
            dfl_write = format_iops(dfl.calc.pd_write_iops),
            dfl_mixed = format_iops(dfl.calc.pd_mixed_iops),
            dfl_read_bw = format_throughput(dfl.calc.pd_read_bw),
            dfl_write_bw = format_throughput(dfl.calc.pd_write_bw),
            dfl_platform = format_iops(dfl.calc.platform_iops),
            dfl_formula = dfl.calc.formula,
            dfl_card = &dfl.calc.card,
        )
    };
}

const COMPARE_ARGS_STR: &str =
    "-c, --candidate=<FILE>       'Result table to chart (csv or json)'
     -b, --baseline=[FILE]        'Result table holding the reference runs'
         --workloads=[LIST]       'Workloads to compare, comma separated (dfl: all)'
         --raid-types=[LIST]      'RAID types to compare (dfl: all)'
         --statuses=[LIST]        'RAID statuses to compare (dfl: all)'
         --stages=[LIST]          'Stages to compare (dfl: all)'
         --metrics=[LIST]         'Metrics to compare (dfl: all available)'
         --no-baseline            'Hide the baseline series'";

const REPLAY_ARGS_STR: &str =
    "-c, --conf=[FILE]            'graid-bench.conf to derive device filters from'
     -b, --bucket=[SECS]          'Merge samples by time bucket instead of by arrival'
     [EVENTFILE]                  'JSON lines event file, - for stdin (dfl: -)'";

const VALIDATE_ARGS_STR: &str = "-c, --conf=[FILE]            'graid-bench.conf to validate'";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mode {
    Calc,
    Compare,
    Replay,
    Validate,
}

/// Calculator knobs. Persisted in the args file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalcArgs {
    pub num_drives: usize,
    pub pd_read_iops: f64,
    pub pd_write_iops: f64,
    pub pd_mixed_iops: f64,
    pub pd_read_bw: f64,
    pub pd_write_bw: f64,
    pub platform_iops: f64,
    pub formula: FormulaVersion,
    pub card: String,
}

impl Default for CalcArgs {
    fn default() -> Self {
        Self {
            num_drives: 12,
            pd_read_iops: 1_000_000.0,
            pd_write_iops: 600_000.0,
            pd_mixed_iops: 400_000.0,
            pd_read_bw: 5000.0,
            pd_write_bw: 2000.0,
            platform_iops: 20_000_000.0,
            formula: FormulaVersion::V1_7,
            card: CardProfiles::LEGACY_DFL.into(),
        }
    }
}

/// Comparison facet selection. `None` selects everything available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareArgs {
    pub candidate: String,
    pub baseline: Option<String>,
    pub workloads: Option<Vec<String>>,
    pub raid_types: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub stages: Option<Vec<String>>,
    pub metrics: Option<Vec<Metric>>,
    pub no_baseline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Args {
    pub mode: Mode,
    pub cards: Option<String>,
    pub conf: Option<String>,
    pub bucket: Option<f64>,
    pub calc: CalcArgs,

    #[serde(skip)]
    pub result: String,
    #[serde(skip)]
    pub pd_fio: Option<String>,
    #[serde(skip)]
    pub baseline_fio: Option<String>,
    #[serde(skip)]
    pub compare: CompareArgs,
    #[serde(skip)]
    pub events: String,
    #[serde(skip)]
    pub verbosity: u32,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            mode: Mode::Calc,
            cards: None,
            conf: None,
            bucket: None,
            calc: Default::default(),
            result: "".into(),
            pd_fio: None,
            baseline_fio: None,
            compare: Default::default(),
            events: "-".into(),
            verbosity: 0,
        }
    }
}

fn or_exit<T>(what: &str, res: Result<T>) -> T {
    match res {
        Ok(v) => v,
        Err(e) => {
            error!("Invalid {}: {:#}", what, &e);
            exit(1);
        }
    }
}

fn opt_list(subm: &clap::ArgMatches, name: &str) -> Option<Vec<String>> {
    subm.value_of(name).map(|v| parse_list(v))
}

impl Args {
    fn process_calc(&mut self, subm: &clap::ArgMatches) -> bool {
        let dfl = CalcArgs::default();
        let calc = &mut self.calc;
        let mut updated = false;

        if let Some(v) = subm.value_of("drives") {
            calc.num_drives = if v.len() > 0 {
                let nr = or_exit("--drives", v.parse::<usize>().map_err(|e| e.into()));
                if nr == 0 {
                    error!("--drives must be positive");
                    exit(1);
                }
                nr
            } else {
                dfl.num_drives
            };
            updated = true;
        }

        for (name, field, dfl_val, is_bw) in &mut [
            ("pd-read", &mut calc.pd_read_iops, dfl.pd_read_iops, false),
            ("pd-write", &mut calc.pd_write_iops, dfl.pd_write_iops, false),
            ("pd-mixed", &mut calc.pd_mixed_iops, dfl.pd_mixed_iops, false),
            ("pd-read-bw", &mut calc.pd_read_bw, dfl.pd_read_bw, true),
            ("pd-write-bw", &mut calc.pd_write_bw, dfl.pd_write_bw, true),
            ("platform", &mut calc.platform_iops, dfl.platform_iops, false),
        ] {
            if let Some(v) = subm.value_of(*name) {
                **field = if v.len() == 0 {
                    *dfl_val
                } else if *is_bw {
                    or_exit(*name, parse_bandwidth(v))
                } else {
                    or_exit(*name, parse_count(v))
                };
                updated = true;
            }
        }

        if let Some(v) = subm.value_of("formula") {
            calc.formula = if v.len() > 0 {
                or_exit("--formula", v.parse::<FormulaVersion>())
            } else {
                dfl.formula
            };
            updated = true;
        }
        if let Some(v) = subm.value_of("card") {
            calc.card = if v.len() > 0 {
                v.to_string()
            } else {
                dfl.card.clone()
            };
            updated = true;
        }

        self.pd_fio = subm.value_of("pd-fio").map(|v| v.to_string());
        self.baseline_fio = subm.value_of("baseline-fio").map(|v| v.to_string());
        updated
    }

    fn process_compare(&mut self, subm: &clap::ArgMatches) {
        let cmp = &mut self.compare;

        cmp.candidate = subm.value_of("candidate").unwrap_or("").into();
        cmp.baseline = subm.value_of("baseline").map(|v| v.to_string());
        cmp.workloads = opt_list(subm, "workloads");
        cmp.raid_types = opt_list(subm, "raid-types");
        cmp.statuses = opt_list(subm, "statuses");
        cmp.stages = opt_list(subm, "stages");
        cmp.metrics = opt_list(subm, "metrics").map(|list| {
            list.iter()
                .map(|name| match Metric::from_column(name) {
                    Some(m) => m,
                    None => {
                        error!("Unknown metric {:?} in --metrics", name);
                        exit(1);
                    }
                })
                .collect()
        });
        cmp.no_baseline = subm.is_present("no-baseline");
    }
}

impl JsonLoad for Args {}
impl JsonSave for Args {
    fn preamble() -> Option<String> {
        Some(ARGS_DOC.into())
    }
}

impl JsonArgs for Args {
    #[allow(dangerous_implicit_autorefs)]
    fn match_cmdline() -> clap::ArgMatches<'static> {
        clap::App::new("raid-bench")
            .version(*super::VERSION)
            .author(clap::crate_authors!("\n"))
            .about("RAID benchmark telemetry and performance model")
            .setting(clap::AppSettings::UnifiedHelpMessage)
            .setting(clap::AppSettings::DeriveDisplayOrder)
            .setting(clap::AppSettings::SubcommandRequiredElseHelp)
            .args_from_usage(TOP_ARGS_STR)
            .subcommand(
                clap::SubCommand::with_name("calc")
                    .about("Estimates RAID performance ceilings from single drive metrics")
                    .args_from_usage(&CALC_ARGS_STR),
            )
            .subcommand(
                clap::SubCommand::with_name("compare")
                    .about("Groups stored results into baseline vs. RAID type comparisons")
                    .args_from_usage(COMPARE_ARGS_STR),
            )
            .subcommand(
                clap::SubCommand::with_name("replay")
                    .about("Feeds recorded telemetry events through the live aggregator")
                    .args_from_usage(REPLAY_ARGS_STR),
            )
            .subcommand(
                clap::SubCommand::with_name("validate")
                    .about("Checks a benchmark configuration before a run")
                    .args_from_usage(VALIDATE_ARGS_STR),
            )
            .get_matches()
    }

    fn verbosity(matches: &clap::ArgMatches) -> u32 {
        matches.occurrences_of("v") as u32
    }

    fn process_cmdline(&mut self, matches: &clap::ArgMatches) -> bool {
        let mut updated = false;

        if let Some(v) = matches.value_of("cards") {
            self.cards = if v.len() > 0 { Some(v.to_string()) } else { None };
            updated = true;
        }

        self.result = matches.value_of("result").unwrap_or("").into();
        self.verbosity = Self::verbosity(matches);

        match matches.subcommand() {
            ("calc", Some(subm)) => {
                self.mode = Mode::Calc;
                updated |= self.process_calc(subm);
            }
            ("compare", Some(subm)) => {
                self.mode = Mode::Compare;
                self.process_compare(subm);
            }
            ("replay", Some(subm)) => {
                self.mode = Mode::Replay;
                if let Some(v) = subm.value_of("conf") {
                    self.conf = if v.len() > 0 { Some(v.to_string()) } else { None };
                    updated = true;
                }
                if let Some(v) = subm.value_of("bucket") {
                    self.bucket = if v.len() > 0 {
                        let secs = or_exit("--bucket", v.parse::<f64>().map_err(|e| e.into()));
                        if !(secs > 0.0) {
                            error!("--bucket must be positive");
                            exit(1);
                        }
                        Some(secs)
                    } else {
                        None
                    };
                    updated = true;
                }
                self.events = subm.value_of("EVENTFILE").unwrap_or("-").into();
            }
            ("validate", Some(subm)) => {
                self.mode = Mode::Validate;
                if let Some(v) = subm.value_of("conf") {
                    self.conf = Some(v.to_string());
                    updated = true;
                }
                if self.conf.is_none() {
                    error!("validate requires --conf");
                    exit(1);
                }
            }
            _ => {}
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, CalcArgs, Mode};
    use crate::FormulaVersion;
    use rb_util::{JsonLoad, JsonSave};

    #[test]
    fn test_args_file() {
        let mut args = Args::default();
        args.mode = Mode::Replay;
        args.bucket = Some(1.0);
        args.calc.formula = FormulaVersion::V2_0;
        args.result = "out.json".into();

        let loaded = Args::load_str(&args.as_json().unwrap()).unwrap();
        assert_eq!(loaded.mode, Mode::Replay);
        assert_eq!(loaded.bucket, Some(1.0));
        assert_eq!(loaded.calc.formula, FormulaVersion::V2_0);
        assert_eq!(loaded.result, "");
        assert_eq!(loaded.events, "-");

        let partial = Args::load_str(r#"{ "calc": { "num_drives": 8 } }"#).unwrap();
        assert_eq!(partial.calc.num_drives, 8);
        assert_eq!(partial.calc.card, CalcArgs::default().card);
    }
}
