// Copyright (c) Facebook, Inc. and its affiliates.
use thiserror::Error;

/// Input mistakes in externally produced logs and result tables. Unlike
/// telemetry noise, these are reported to the user.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid json ({0})")]
    Json(#[from] serde_json::Error),
    #[error("missing \"{0}\"")]
    Missing(String),
    #[error("job {job:?}: \"{field}\" is not a number ({value})")]
    NotNumeric {
        job: String,
        field: String,
        value: String,
    },
    #[error("no job matching any of {0:?}")]
    NoMatchingJob(Vec<String>),
    #[error("column {column:?}: {value:?} is not a number")]
    BadColumn { column: String, value: String },
}
