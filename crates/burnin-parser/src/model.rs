use chrono::NaiveDateTime;

use crate::errors::RowSkip;

/// One candidate summary row from a results file. Timestamps are still in the
/// configured civil time zone at this stage; normalization to UTC happens in
/// the pipeline, not the parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub serial_number: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub firmware: String,
    pub overall: String,
    pub output_a: Option<String>,
    pub output_b: Option<String>,
    pub status_flags: Option<String>,
    pub failure_description: Option<String>,
    pub failure_time: Option<NaiveDateTime>,
}

/// Everything extracted from one results file: the usable rows plus the rows
/// that had to be dropped (missing serial number or unparsable start time).
#[derive(Debug)]
pub struct ResultsFile {
    pub rows: Vec<ResultRow>,
    pub skipped: Vec<RowSkip>,
}

/// One time-series sample from a data file. Every measurement is optional;
/// field equipment routinely leaves gaps and a blank reading must stay a gap,
/// not become a zero.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub timestamp: NaiveDateTime,
    pub dc_voltage: Option<f64>,
    pub ac_voltage_a: Option<f64>,
    pub ac_voltage_b: Option<f64>,
    pub power_a: Option<f64>,
    pub power_b: Option<f64>,
    pub frequency_a: Option<f64>,
    pub frequency_b: Option<f64>,
    pub energy_a: Option<f64>,
    pub energy_b: Option<f64>,
    pub status_flags: Option<i64>,
    pub latched_flags: Option<i64>,
    pub fault_code: Option<String>,
}
