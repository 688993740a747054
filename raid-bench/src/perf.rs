// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{bail, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use raid_bench_intf::{
    CalcArgs, CardProfile, CardProfiles, FormulaVersion, RaidLimits, RaidType, RAID_LABELS,
};
use rb_util::*;

/// Single drive measurements, IOPS in IO/s and bandwidth in MB/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PdMetrics {
    pub read_iops: f64,
    pub write_iops: f64,
    pub mixed_iops: f64,
    pub read_bw: f64,
    pub write_bw: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcInput {
    pub num_drives: usize,
    pub pd: PdMetrics,
    pub platform_baseline_iops: f64,
    pub formula: FormulaVersion,
    pub card_model: String,
}

impl From<&CalcArgs> for CalcInput {
    fn from(args: &CalcArgs) -> Self {
        Self {
            num_drives: args.num_drives,
            pd: PdMetrics {
                read_iops: args.pd_read_iops,
                write_iops: args.pd_write_iops,
                mixed_iops: args.pd_mixed_iops,
                read_bw: args.pd_read_bw,
                write_bw: args.pd_write_bw,
            },
            platform_baseline_iops: args.platform_iops,
            formula: args.formula,
            card_model: args.card.clone(),
        }
    }
}

/// What limits a figure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    Drives,
    PlatformBaseline,
    CardSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub value: f64,
    /// Drive bound estimate before any cap.
    pub raw: f64,
    pub bound: Bound,
    pub text: String,
    pub note: String,
}

impl Figure {
    fn new(raw: f64, note: String) -> Self {
        Self {
            value: raw,
            raw,
            bound: Bound::Drives,
            text: "".into(),
            note,
        }
    }

    /// Lowers the value to `cap`, never below zero. Returns whether it
    /// was binding.
    fn cap(&mut self, cap: f64, bound: Bound) -> bool {
        let cap = cap.max(0.0);
        if self.value > cap {
            self.value = cap;
            self.bound = bound;
            true
        } else {
            false
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerfEstimate {
    pub label: String,
    pub raid_type: RaidType,
    /// Card whose caps were applied, if any.
    pub card_model: Option<String>,
    pub read_iops: Figure,
    pub write_iops: Figure,
    pub read_bw: Figure,
    pub write_bw: Figure,
}

enum CardCaps<'a> {
    PerRaid(&'a RaidLimits),
    Legacy { read: f64, write: Option<f64> },
    None,
}

fn select_card<'a>(
    input: &CalcInput,
    rt: RaidType,
    cards: &'a CardProfiles,
) -> (Option<String>, CardCaps<'a>) {
    let mut model = input.card_model.as_str();
    let mut profile = cards.get(model);

    if input.formula == FormulaVersion::V1_7 && profile.map(|p| p.is_per_raid()).unwrap_or(false)
    {
        warn!(
            "perf: {} profile needs formula 2.0, using {}",
            model,
            CardProfiles::LEGACY_DFL
        );
        model = CardProfiles::LEGACY_DFL;
        profile = cards.get(model);
    }

    match profile {
        Some(CardProfile::PerRaid(limits)) => match limits.get(&rt) {
            Some(l) => (Some(model.into()), CardCaps::PerRaid(l)),
            None => {
                debug!("perf: {} has no {} limits", model, rt);
                (None, CardCaps::None)
            }
        },
        Some(CardProfile::Legacy {
            rand_read_iops,
            rand_write_iops,
        }) => (
            Some(model.into()),
            CardCaps::Legacy {
                read: *rand_read_iops,
                write: match rt.is_parity() {
                    true => rand_write_iops.get(&rt).cloned(),
                    false => None,
                },
            },
        ),
        None => {
            if model.len() > 0 {
                warn!("perf: Unknown card model {:?}, not applying card caps", model);
            }
            (None, CardCaps::None)
        }
    }
}

/// Estimates the performance ceiling of `raid_label` built from
/// `input.num_drives` drives.
pub fn estimate(raid_label: &str, input: &CalcInput, cards: &CardProfiles) -> Result<PerfEstimate> {
    let rt = RaidType::resolve(raid_label)?;
    let n = input.num_drives;
    let nf = n as f64;
    let pd = &input.pd;
    let v2 = input.formula == FormulaVersion::V2_0;

    if n == 0 {
        bail!("number of drives must be positive");
    }
    if input.platform_baseline_iops.is_nan() {
        bail!("platform baseline IOPS is not a number");
    }
    if input.platform_baseline_iops < 0.0 {
        bail!(
            "platform baseline IOPS {} is negative",
            input.platform_baseline_iops
        );
    }

    let raw_read_iops = (pd.read_iops * nf).max(0.0);
    let raw_read_bw = (pd.read_bw * nf).max(0.0);
    let fi = |v: f64| format_iops(v);
    let ft = |v: f64| format_throughput(v);

    let (raw_write_iops, write_iops_note, raw_write_bw, write_bw_note, read_bw_note) = match rt {
        RaidType::Raid0 => (
            pd.write_iops * nf,
            format!("{} x {}", fi(pd.write_iops), n),
            pd.write_bw * nf,
            format!("{} x {} (Typically higher)", ft(pd.write_bw), n),
            format!("{} x {} (Typically higher)", ft(pd.read_bw), n),
        ),
        RaidType::Raid1 => (
            pd.write_iops,
            format!("{} x 1", fi(pd.write_iops)),
            pd.write_bw,
            format!("{} x 1", ft(pd.write_bw)),
            format!("{} x {}", ft(pd.read_bw), n),
        ),
        RaidType::Raid10 => (
            pd.write_iops * nf / 2.0,
            format!("{} x {} / 2", fi(pd.write_iops), n),
            pd.write_bw * nf / 2.0,
            format!("{} x {} / 2", ft(pd.write_bw), n),
            format!("{} x {}", ft(pd.read_bw), n),
        ),
        RaidType::Raid5 | RaidType::Raid6 => {
            let (div, nr_parity) = match rt {
                RaidType::Raid5 => (4.0, 1.0),
                _ => (6.0, 2.0),
            };
            let (iops, iops_note) = match v2 {
                true => (
                    raw_read_iops / div * 0.9,
                    format!("(random read) / {} * 0.9 (v2.0 formula)", div),
                ),
                false => (
                    pd.mixed_iops * nf / (nr_parity + 1.0),
                    format!("{} x {} / {}", fi(pd.mixed_iops), n, nr_parity + 1.0),
                ),
            };
            (
                iops,
                iops_note,
                pd.write_bw * (nf - nr_parity) * 0.9,
                format!("{} x ({} - {}) * 0.9", ft(pd.write_bw), n, nr_parity),
                format!("{} x {}", ft(pd.read_bw), n),
            )
        }
    };

    let mut read_iops = Figure::new(
        raw_read_iops,
        format!("{} x {} = {}", fi(pd.read_iops), n, fi(raw_read_iops)),
    );
    let mut write_iops = Figure::new(raw_write_iops.max(0.0), write_iops_note);
    let mut read_bw = Figure::new(raw_read_bw, read_bw_note);
    let mut write_bw = Figure::new(raw_write_bw.max(0.0), write_bw_note);

    let platform = input.platform_baseline_iops;
    if read_iops.cap(platform, Bound::PlatformBaseline) {
        read_iops.note = format!("Capped by platform baseline: {}", fi(platform));
    }

    let (card_model, caps) = select_card(input, rt, cards);
    let card_note = |cap: f64| {
        format!(
            "Capped by card spec ({}): {}",
            card_model.as_deref().unwrap_or(""),
            fi(cap)
        )
    };
    let card_bw_note = |cap: f64| {
        format!(
            "Capped by card spec ({}): {}",
            card_model.as_deref().unwrap_or(""),
            ft(cap)
        )
    };

    match caps {
        CardCaps::PerRaid(l) => {
            if read_iops.cap(l.rand_read_iops, Bound::CardSpec) {
                read_iops.note = card_note(l.rand_read_iops);
            }
            if write_iops.cap(l.rand_write_iops, Bound::CardSpec) {
                write_iops.note = card_note(l.rand_write_iops);
            }
            if read_bw.cap(l.seq_read_bw, Bound::CardSpec) {
                read_bw.note = card_bw_note(l.seq_read_bw);
            }
            if write_bw.cap(l.seq_write_bw, Bound::CardSpec) {
                write_bw.note = card_bw_note(l.seq_write_bw);
            }
        }
        CardCaps::Legacy { read, write } => {
            if read_iops.cap(read, Bound::CardSpec) {
                read_iops.note = card_note(read);
            }
            if let Some(write) = write {
                if write_iops.cap(write, Bound::CardSpec) {
                    write_iops.note = card_note(write);
                }
            }
        }
        CardCaps::None => {}
    }

    for fig in [&mut read_iops, &mut write_iops].iter_mut() {
        fig.text = fi(fig.value);
    }
    for fig in [&mut read_bw, &mut write_bw].iter_mut() {
        fig.text = ft(fig.value);
    }

    Ok(PerfEstimate {
        label: raid_label.into(),
        raid_type: rt,
        card_model,
        read_iops,
        write_iops,
        read_bw,
        write_bw,
    })
}

/// Estimates for every calculator label.
pub fn estimate_table(input: &CalcInput, cards: &CardProfiles) -> Result<Vec<PerfEstimate>> {
    RAID_LABELS
        .iter()
        .map(|label| estimate(label, input, cards))
        .collect()
}

pub fn format_estimates(input: &CalcInput, ests: &[PerfEstimate]) -> String {
    let mut buf = String::new();

    writeln!(
        buf,
        "drives={} read={} write={} mixed={} read_bw={} write_bw={} platform={} formula={} card={}\n",
        input.num_drives,
        format_iops(input.pd.read_iops),
        format_iops(input.pd.write_iops),
        format_iops(input.pd.mixed_iops),
        format_throughput(input.pd.read_bw),
        format_throughput(input.pd.write_bw),
        format_iops(input.platform_baseline_iops),
        input.formula,
        &input.card_model,
    )
    .unwrap();

    writeln!(
        buf,
        "{:<12} {:>14} {:>14} {:>12} {:>12}",
        "RAID", "Read IOPS", "Write IOPS", "Read BW", "Write BW"
    )
    .unwrap();
    for est in ests.iter() {
        writeln!(
            buf,
            "{:<12} {:>14} {:>14} {:>12} {:>12}",
            &est.label,
            &est.read_iops.text,
            &est.write_iops.text,
            &est.read_bw.text,
            &est.write_bw.text
        )
        .unwrap();
    }

    writeln!(buf, "\nNotes:").unwrap();
    for est in ests.iter() {
        writeln!(buf, "  {}", &est.label).unwrap();
        for (name, fig) in &[
            ("read IOPS", &est.read_iops),
            ("write IOPS", &est.write_iops),
            ("read BW", &est.read_bw),
            ("write BW", &est.write_bw),
        ] {
            writeln!(buf, "    {:<10} {}", name, &fig.note).unwrap();
        }
    }
    buf
}
