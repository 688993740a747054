// Copyright (c) Facebook, Inc. and its affiliates.
use anyhow::{bail, Context, Result};
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::Path;

use raid_bench_intf::ResultRow;

/// Parses a result table with a header row.
pub fn parse_rows_csv<R: Read>(input: R) -> Result<Vec<ResultRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);
    let headers = rdr.headers()?.clone();

    let mut rows = vec![];
    for (idx, rec) in rdr.records().enumerate() {
        let rec = rec.with_context(|| format!("Reading record {}", idx + 1))?;
        let row = ResultRow::from_columns(headers.iter().zip(rec.iter()))
            .with_context(|| format!("Parsing record {}", idx + 1))?;
        rows.push(row);
    }
    Ok(rows)
}

fn cell_string(v: &Value) -> String {
    match v {
        Value::Null => "".into(),
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

/// Parses a json array of row objects.
pub fn parse_rows_json(input: &str) -> Result<Vec<ResultRow>> {
    let doc: Value = serde_json::from_str(input)?;
    let items = match doc {
        Value::Array(items) => items,
        _ => bail!("expected an array of result rows"),
    };

    let mut rows = vec![];
    for (idx, item) in items.iter().enumerate() {
        let obj = match item.as_object() {
            Some(v) => v,
            None => bail!("row {} is not an object", idx),
        };
        let cells: Vec<(&str, String)> = obj
            .iter()
            .map(|(k, v)| (k.as_str(), cell_string(v)))
            .collect();
        let row = ResultRow::from_columns(cells.iter().map(|(k, v)| (*k, v.as_str())))
            .with_context(|| format!("Parsing row {}", idx))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Loads a stored result table, csv by extension and json otherwise.
pub fn load_rows<P: AsRef<Path>>(path: P) -> Result<Vec<ResultRow>> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let rows = if is_csv {
        let f = fs::File::open(path).with_context(|| format!("Opening {:?}", path))?;
        parse_rows_csv(f).with_context(|| format!("Loading {:?}", path))?
    } else {
        let buf = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        parse_rows_json(&buf).with_context(|| format!("Loading {:?}", path))?
    };
    debug!("results: Loaded {} rows from {:?}", rows.len(), path);
    Ok(rows)
}
