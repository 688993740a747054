// Copyright (c) Facebook, Inc. and its affiliates.
pub mod classify;
pub mod compare;
pub mod fio;
pub mod perf;
pub mod results;
pub mod telemetry;

pub use classify::classify;
pub use compare::{build_comparison, derive_facets, ComparisonFilter, ComparisonGroup, Facets};
pub use perf::{estimate, estimate_table, CalcInput, PdMetrics, PerfEstimate};
pub use telemetry::{Aggregator, MergePolicy, SeriesPoint, SummaryMetrics};
