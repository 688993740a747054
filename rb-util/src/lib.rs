// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{bail, Context, Result};
use chrono::Local;
use crossbeam::channel::Sender;
use log::{info, warn};
use simplelog as sl;
use std::collections::HashMap;
use std::io::BufRead;

pub mod json_file;

pub use json_file::{
    JsonArgs, JsonArgsHelper, JsonConfigFile, JsonLoad, JsonReportFile, JsonSave,
};

pub const TO_MSEC: f64 = 1000.0;

/// One decimal, with a trailing ".0" dropped.
pub fn trim_decimal(value: f64) -> String {
    let fixed = format!("{:.1}", value);
    match fixed.strip_suffix(".0") {
        Some(int) if int == "-0" => "0".into(),
        Some(int) => int.to_string(),
        None => fixed,
    }
}

/// Calculator style IOPS string, e.g. "1.5M IOPS".
pub fn format_iops<T>(iops: T) -> String
where
    T: num::ToPrimitive,
{
    let v = iops.to_f64().unwrap_or(0.0);
    if !v.is_finite() {
        "unlimited".into()
    } else if v >= 1_000_000_000.0 {
        trim_decimal(v / 1_000_000_000.0) + "B IOPS"
    } else if v >= 1_000_000.0 {
        trim_decimal(v / 1_000_000.0) + "M IOPS"
    } else if v >= 1_000.0 {
        trim_decimal(v / 1_000.0) + "k IOPS"
    } else {
        format!("{:.0} IOPS", v)
    }
}

/// Calculator style throughput string, input in MB/s.
pub fn format_throughput<T>(mbps: T) -> String
where
    T: num::ToPrimitive,
{
    let v = mbps.to_f64().unwrap_or(0.0);
    if !v.is_finite() {
        "unlimited".into()
    } else if v >= 1000.0 {
        trim_decimal(v / 1000.0) + " GB/s"
    } else if v >= 1.0 {
        trim_decimal(v) + " MB/s"
    } else {
        trim_decimal(v * 1000.0) + " kB/s"
    }
}

/// Scales IO/s for live display.
pub fn scale_iops(iops: f64) -> (f64, &'static str) {
    if iops < 1e3 {
        (iops, "IO/s")
    } else if iops < 1e6 {
        (iops / 1e3, "KIO/s")
    } else if iops < 1e9 {
        (iops / 1e6, "MIO/s")
    } else {
        (iops / 1e9, "GIO/s")
    }
}

/// Scales MB/s for live display.
pub fn scale_throughput(mbps: f64) -> (f64, &'static str) {
    if mbps >= 1000.0 {
        (mbps / 1000.0, "GB/s")
    } else {
        (mbps, "MB/s")
    }
}

pub fn format_scaled_iops(iops: f64) -> String {
    let (v, unit) = scale_iops(iops);
    format!("{:.2} {}", v, unit)
}

pub fn format_scaled_throughput(mbps: f64) -> String {
    let (v, unit) = scale_throughput(mbps);
    format!("{:.2} {}", v, unit)
}

/// Latency string, input in msecs.
pub fn format_latency(msecs: f64) -> String {
    if msecs == 0.0 {
        "0.000 ms".into()
    } else if msecs < 0.001 {
        format!("{:.2} ns", msecs * 1_000_000.0)
    } else if msecs < 1.0 {
        format!("{:.2} us", msecs * TO_MSEC)
    } else {
        format!("{:.2} ms", msecs)
    }
}

fn parse_with_units(input: &str, units: &HashMap<char, f64>) -> Result<f64> {
    let mut num = String::new();
    let mut sum = 0.0;
    for ch in input.chars() {
        let lch = ch.to_ascii_lowercase();
        match lch {
            '_' | ',' => continue,
            lch if units.contains_key(&lch) => {
                sum += num.trim().parse::<f64>()? * units[&lch];
                num.clear();
            }
            _ => num.push(ch),
        }
    }
    if num.trim().len() > 0 {
        sum += num.trim().parse::<f64>()?;
    }
    Ok(sum)
}

/// Parses decimal counts such as "600k", "1.5M" or "20m".
pub fn parse_count(input: &str) -> Result<f64> {
    lazy_static::lazy_static! {
        static ref UNITS: HashMap<char, f64> = [
            ('k', 1e3),
            ('m', 1e6),
            ('g', 1e9),
            ('b', 1e9),
        ]
            .iter()
            .cloned()
            .collect();
    }

    let v = parse_with_units(input.trim(), &UNITS)
        .with_context(|| format!("failed to parse count {:?}", input))?;
    if v < 0.0 {
        bail!("count {} is negative", v);
    }
    Ok(v)
}

/// Parses bandwidth into MB/s, e.g. "5G" -> 5000.0, "800k" -> 0.8.
pub fn parse_bandwidth(input: &str) -> Result<f64> {
    lazy_static::lazy_static! {
        static ref UNITS: HashMap<char, f64> = [
            ('k', 0.001),
            ('m', 1.0),
            ('g', 1000.0),
            ('t', 1_000_000.0),
        ]
            .iter()
            .cloned()
            .collect();
    }

    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_suffix("B/s")
        .or_else(|| trimmed.strip_suffix("b/s"))
        .unwrap_or(trimmed);
    let v = parse_with_units(trimmed, &UNITS)
        .with_context(|| format!("failed to parse bandwidth {:?}", input))?;
    if v < 0.0 {
        bail!("bandwidth {} is negative", v);
    }
    Ok(v)
}

/// Splits a comma separated list, dropping empty entries.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| s.len() > 0)
        .map(|s| s.to_string())
        .collect()
}

/// Wall clock label used for live series points.
pub fn time_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn init_logging(verbosity: u32) {
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    } else {
        let sl_level = match verbosity {
            0 | 1 => sl::LevelFilter::Info,
            2 => sl::LevelFilter::Debug,
            _ => sl::LevelFilter::Trace,
        };
        let mut lcfg = sl::ConfigBuilder::new();
        lcfg.set_time_level(sl::LevelFilter::Off)
            .set_location_level(sl::LevelFilter::Off)
            .set_target_level(sl::LevelFilter::Off)
            .set_thread_level(sl::LevelFilter::Off);
        if !console::user_attended_stderr()
            || sl::TermLogger::init(
                sl_level,
                lcfg.build(),
                sl::TerminalMode::Stderr,
                sl::ColorChoice::Auto,
            )
            .is_err()
        {
            let _ = sl::SimpleLogger::init(sl_level, lcfg.build());
        }
    }
}

/// Forwards lines from `reader` to `tx` until either side is done.
pub fn line_reader_thread<R: BufRead>(name: String, reader: R, tx: Sender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if let Err(e) = tx.send(line) {
                    info!("{}: Reader thread terminating ({:?})", &name, &e);
                    break;
                }
            }
            Err(e) => {
                warn!("{}: Failed to read ({:?})", &name, &e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_format_iops() {
        for pair in &[
            (0.0, "0 IOPS"),
            (999.0, "999 IOPS"),
            (600_000.0, "600k IOPS"),
            (1_500_000.0, "1.5M IOPS"),
            (20_000_000.0, "20M IOPS"),
            (2_340_000_000.0, "2.3B IOPS"),
        ] {
            let result = super::format_iops(pair.0);
            assert_eq!(&result, pair.1);
            println!("{} -> {} ({})", pair.0, &result, pair.1);
        }
        assert_eq!(super::format_iops(std::f64::INFINITY), "unlimited");
    }

    #[test]
    fn test_format_throughput() {
        for pair in &[
            (2500.0, "2.5 GB/s"),
            (1000.0, "1 GB/s"),
            (720.0, "720 MB/s"),
            (65.2, "65.2 MB/s"),
            (140_000.0, "140 GB/s"),
            (0.5, "500 kB/s"),
        ] {
            let result = super::format_throughput(pair.0);
            assert_eq!(&result, pair.1);
            println!("{} -> {} ({})", pair.0, &result, pair.1);
        }
    }

    #[test]
    fn test_format_latency() {
        for pair in &[
            (0.0, "0.000 ms"),
            (0.0005, "500.00 ns"),
            (0.25, "250.00 us"),
            (1.5, "1.50 ms"),
        ] {
            let result = super::format_latency(pair.0);
            assert_eq!(&result, pair.1);
            println!("{} -> {} ({})", pair.0, &result, pair.1);
        }
    }

    #[test]
    fn test_scale() {
        assert_eq!(super::scale_iops(512.0), (512.0, "IO/s"));
        assert_eq!(super::scale_iops(2_000.0), (2.0, "KIO/s"));
        assert_eq!(super::scale_iops(3_000_000.0), (3.0, "MIO/s"));
        assert_eq!(super::scale_iops(4e9), (4.0, "GIO/s"));
        assert_eq!(super::scale_throughput(999.0), (999.0, "MB/s"));
        assert_eq!(super::scale_throughput(1500.0), (1.5, "GB/s"));
        assert_eq!(super::format_scaled_iops(1_250.0), "1.25 KIO/s");
    }

    #[test]
    fn test_parse_count() {
        for pair in &[
            (600_000.0, "600k"),
            (1_500_000.0, "1.5M"),
            (20_000_000.0, "20m"),
            (1234.0, "1_234"),
            (3_000_000_000.0, "3B"),
        ] {
            let result = super::parse_count(pair.1).unwrap();
            assert_eq!(pair.0, result);
            println!("{} -> {} ({})", pair.1, result, pair.0);
        }
        assert!(super::parse_count("fast").is_err());
    }

    #[test]
    fn test_parse_bandwidth() {
        assert_eq!(super::parse_bandwidth("5G").unwrap(), 5000.0);
        assert_eq!(super::parse_bandwidth("2000").unwrap(), 2000.0);
        assert_eq!(super::parse_bandwidth("2.5GB/s").unwrap(), 2500.0);
        assert!((super::parse_bandwidth("500k").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            super::parse_list(" nvme0n1, nvme1n1,,nvme2n1 "),
            vec!["nvme0n1", "nvme1n1", "nvme2n1"]
        );
        assert!(super::parse_list("").is_empty());
    }
}
