use std::io;

use csv::StringRecord;

use crate::common::{clean_optional, parse_civil_timestamp, parse_optional_f64, parse_optional_i64};
use crate::errors::{ParserError, RowSkip};
use crate::model::DataRow;

const PARSER: &str = "DATA";

const COL_TIMESTAMP: &str = "Timestamp";
const COL_DC_VOLTAGE: &str = "DC Voltage";
const COL_AC_VOLTAGE_A: &str = "AC Voltage A";
const COL_AC_VOLTAGE_B: &str = "AC Voltage B";
const COL_POWER_A: &str = "Power A";
const COL_POWER_B: &str = "Power B";
const COL_FREQUENCY_A: &str = "Frequency A";
const COL_FREQUENCY_B: &str = "Frequency B";
const COL_ENERGY_A: &str = "Energy A";
const COL_ENERGY_B: &str = "Energy B";
const COL_STATUS_FLAGS: &str = "Status Flags";
const COL_LATCHED_FLAGS: &str = "Latched Flags";
const COL_FAULT_CODE: &str = "Fault Code";

#[derive(Debug)]
struct DataColumns {
    timestamp: usize,
    dc_voltage: Option<usize>,
    ac_voltage_a: Option<usize>,
    ac_voltage_b: Option<usize>,
    power_a: Option<usize>,
    power_b: Option<usize>,
    frequency_a: Option<usize>,
    frequency_b: Option<usize>,
    energy_a: Option<usize>,
    energy_b: Option<usize>,
    status_flags: Option<usize>,
    latched_flags: Option<usize>,
    fault_code: Option<usize>,
}

impl DataColumns {
    fn from_header(header: &StringRecord) -> Result<Self, ParserError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };

        let timestamp = find(COL_TIMESTAMP).ok_or(ParserError::MissingColumn {
            parser: PARSER,
            column: COL_TIMESTAMP,
        })?;

        Ok(Self {
            timestamp,
            dc_voltage: find(COL_DC_VOLTAGE),
            ac_voltage_a: find(COL_AC_VOLTAGE_A),
            ac_voltage_b: find(COL_AC_VOLTAGE_B),
            power_a: find(COL_POWER_A),
            power_b: find(COL_POWER_B),
            frequency_a: find(COL_FREQUENCY_A),
            frequency_b: find(COL_FREQUENCY_B),
            energy_a: find(COL_ENERGY_A),
            energy_b: find(COL_ENERGY_B),
            status_flags: find(COL_STATUS_FLAGS),
            latched_flags: find(COL_LATCHED_FLAGS),
            fault_code: find(COL_FAULT_CODE),
        })
    }
}

/// Streaming reader over a data file. The caller pulls fixed-size batches so
/// a very dense series never has to be buffered whole; skipped rows (missing
/// or unparsable timestamps) accumulate in `skipped` for the caller to log.
#[derive(Debug)]
pub struct DataReader<R: io::Read> {
    reader: csv::Reader<R>,
    columns: DataColumns,
    line_index: usize,
    pub skipped: Vec<RowSkip>,
}

impl<R: io::Read> DataReader<R> {
    pub fn new(inner: R) -> Result<Self, ParserError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(inner);

        let header = reader
            .headers()
            .map_err(|err| ParserError::Csv {
                parser: PARSER,
                source: err,
            })?
            .clone();
        if header.is_empty() {
            return Err(ParserError::MissingHeader { parser: PARSER });
        }
        let columns = DataColumns::from_header(&header)?;

        Ok(Self {
            reader,
            columns,
            line_index: 1,
            skipped: Vec::new(),
        })
    }

    /// Reads up to `max_rows` further rows. An empty return means the file is
    /// exhausted.
    pub fn next_batch(&mut self, max_rows: usize) -> Result<Vec<DataRow>, ParserError> {
        let mut rows = Vec::with_capacity(max_rows);

        while rows.len() < max_rows {
            let mut record = StringRecord::new();
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|err| ParserError::Csv {
                    parser: PARSER,
                    source: err,
                })?;
            if !more {
                break;
            }
            self.line_index += 1;

            match self.parse_record(&record) {
                Ok(row) => rows.push(row),
                Err(skip) => self.skipped.push(skip),
            }
        }

        Ok(rows)
    }

    fn parse_record(&self, record: &StringRecord) -> Result<DataRow, RowSkip> {
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let ts_raw = record.get(self.columns.timestamp).unwrap_or("");
        let timestamp = parse_civil_timestamp(ts_raw).ok_or_else(|| {
            RowSkip::new(self.line_index, format!("invalid timestamp '{ts_raw}'"))
        })?;

        Ok(DataRow {
            timestamp,
            dc_voltage: parse_optional_f64(field(self.columns.dc_voltage)),
            ac_voltage_a: parse_optional_f64(field(self.columns.ac_voltage_a)),
            ac_voltage_b: parse_optional_f64(field(self.columns.ac_voltage_b)),
            power_a: parse_optional_f64(field(self.columns.power_a)),
            power_b: parse_optional_f64(field(self.columns.power_b)),
            frequency_a: parse_optional_f64(field(self.columns.frequency_a)),
            frequency_b: parse_optional_f64(field(self.columns.frequency_b)),
            energy_a: parse_optional_f64(field(self.columns.energy_a)),
            energy_b: parse_optional_f64(field(self.columns.energy_b)),
            status_flags: parse_optional_i64(field(self.columns.status_flags)),
            latched_flags: parse_optional_i64(field(self.columns.latched_flags)),
            fault_code: self
                .columns
                .fault_code
                .and_then(|idx| clean_optional(record.get(idx))),
        })
    }
}
