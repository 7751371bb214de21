use csv::StringRecord;

use crate::common::{clean_optional, parse_civil_timestamp};
use crate::errors::{ParserError, RowSkip};
use crate::model::{ResultRow, ResultsFile};

const PARSER: &str = "RESULTS";

const COL_SERIAL: &str = "Serial Number";
const COL_START: &str = "Start Time";
const COL_END: &str = "End Time";
const COL_FIRMWARE: &str = "Inverter Firmware";
const COL_OVERALL: &str = "Overall";
const COL_OUTPUT_A: &str = "Output A";
const COL_OUTPUT_B: &str = "Output B";
const COL_STATUS_FLAGS: &str = "Status Flags";
const COL_FAILURE_DESC: &str = "Failure Description";
const COL_FAILURE_TIME: &str = "Failure time";

/// Explicit header-name-to-field mapping. A renamed or missing required
/// column fails the file at open time instead of propagating nulls into the
/// classifier.
struct ResultColumns {
    serial: usize,
    start: usize,
    end: usize,
    firmware: usize,
    overall: usize,
    output_a: Option<usize>,
    output_b: Option<usize>,
    status_flags: Option<usize>,
    failure_desc: Option<usize>,
    failure_time: Option<usize>,
}

impl ResultColumns {
    fn from_header(header: &StringRecord) -> Result<Self, ParserError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|column| column.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &'static str| {
            find(name).ok_or(ParserError::MissingColumn {
                parser: PARSER,
                column: name,
            })
        };

        Ok(Self {
            serial: require(COL_SERIAL)?,
            start: require(COL_START)?,
            end: require(COL_END)?,
            firmware: require(COL_FIRMWARE)?,
            overall: require(COL_OVERALL)?,
            output_a: find(COL_OUTPUT_A),
            output_b: find(COL_OUTPUT_B),
            status_flags: find(COL_STATUS_FLAGS),
            failure_desc: find(COL_FAILURE_DESC),
            failure_time: find(COL_FAILURE_TIME),
        })
    }
}

/// Parses a results file into its candidate rows. Almost always one row;
/// occasionally the equipment appends duplicate or partial retry rows, which
/// is why the classifier exists. Rows missing a serial number or a parsable
/// start/end time are skipped, not fatal.
pub fn parse_results(content: &str) -> Result<ResultsFile, ParserError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

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
    let columns = ResultColumns::from_header(&header)?;

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        // 1-indexed, accounting for the header row.
        let line_index = row_idx + 2;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                skipped.push(RowSkip::new(line_index, format!("malformed row: {err}")));
                continue;
            }
        };

        let field = |idx: usize| record.get(idx).unwrap_or("");

        let serial_number = field(columns.serial).trim().to_string();
        if serial_number.is_empty() {
            skipped.push(RowSkip::new(line_index, "serial number missing"));
            continue;
        }

        let start_raw = field(columns.start);
        let Some(start_time) = parse_civil_timestamp(start_raw) else {
            skipped.push(RowSkip::new(
                line_index,
                format!("invalid start time '{start_raw}'"),
            ));
            continue;
        };

        let end_raw = field(columns.end);
        let Some(end_time) = parse_civil_timestamp(end_raw) else {
            skipped.push(RowSkip::new(
                line_index,
                format!("invalid end time '{end_raw}'"),
            ));
            continue;
        };

        let failure_time = columns
            .failure_time
            .and_then(|idx| clean_optional(record.get(idx)))
            .and_then(|raw| parse_civil_timestamp(&raw));

        rows.push(ResultRow {
            serial_number,
            start_time,
            end_time,
            firmware: field(columns.firmware).trim().to_string(),
            overall: field(columns.overall).trim().to_string(),
            output_a: columns.output_a.and_then(|idx| clean_optional(record.get(idx))),
            output_b: columns.output_b.and_then(|idx| clean_optional(record.get(idx))),
            status_flags: columns
                .status_flags
                .and_then(|idx| clean_optional(record.get(idx))),
            failure_description: columns
                .failure_desc
                .and_then(|idx| clean_optional(record.get(idx))),
            failure_time,
        });
    }

    Ok(ResultsFile { rows, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HEADER: &str = "Serial Number,Start Time,End Time,Inverter Firmware,Overall,Output A,Output B,Status Flags,Failure Description,Failure time";

    fn civil(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_single_row_file() {
        let content = format!(
            "{HEADER}\n190825130075,2024-03-01_08-00-00,2024-03-01_11-30-00,1.10.02,PASS,OK,OK,0x0000,N/A,N/A\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.skipped.is_empty());

        let row = &parsed.rows[0];
        assert_eq!(row.serial_number, "190825130075");
        assert_eq!(row.start_time, civil(2024, 3, 1, 8, 0, 0));
        assert_eq!(row.end_time, civil(2024, 3, 1, 11, 30, 0));
        assert_eq!(row.firmware, "1.10.02");
        assert_eq!(row.overall, "PASS");
        assert_eq!(row.output_a.as_deref(), Some("OK"));
        assert_eq!(row.status_flags.as_deref(), Some("0x0000"));
        assert_eq!(row.failure_description, None);
        assert_eq!(row.failure_time, None);
    }

    #[test]
    fn keeps_duplicate_rows_for_classifier() {
        let content = format!(
            "{HEADER}\n\
             190825130075,2024-03-01_08-00-00,2024-03-01_11-30-00,1.10.02,PASS,OK,OK,,,N/A\n\
             190825130075,2024-03-01_08-00-00,2024-03-01_08-05-00,1.10.02,PASS,OK,OK,,,N/A\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        assert_eq!(parsed.rows.len(), 2);
    }

    #[test]
    fn skips_row_with_missing_serial_number() {
        let content = format!(
            "{HEADER}\n\
             ,2024-03-01_08-00-00,2024-03-01_11-30-00,1.10.02,PASS,,,,,\n\
             190825130075,2024-03-01_08-00-00,2024-03-01_11-30-00,1.10.02,PASS,,,,,\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line_index, 2);
        assert!(parsed.skipped[0].message.contains("serial number"));
    }

    #[test]
    fn skips_row_with_unparsable_start_time() {
        let content = format!(
            "{HEADER}\n190825130075,not-a-time,2024-03-01_11-30-00,1.10.02,PASS,,,,,\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.skipped.len(), 1);
        assert!(parsed.skipped[0].message.contains("start time"));
    }

    #[test]
    fn parses_failure_time_underscore_format() {
        let content = format!(
            "{HEADER}\n190825130075,2024-03-01_08-00-00,2024-03-01_11-30-00,1.10.02,FAIL,FAULT,OK,0x0400,overvoltage on channel A,2024-03-01_10-12-41\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        let row = &parsed.rows[0];
        assert_eq!(row.failure_time, Some(civil(2024, 3, 1, 10, 12, 41)));
        assert_eq!(
            row.failure_description.as_deref(),
            Some("overvoltage on channel A")
        );
    }

    #[test]
    fn missing_required_column_fails_fast() {
        let content =
            "Serial Number,Start Time,End Time,Overall\n190825130075,2024-03-01_08-00-00,2024-03-01_11-30-00,PASS\n";
        let err = parse_results(content).expect_err("expected missing column error");
        assert!(matches!(
            err,
            ParserError::MissingColumn {
                column: "Inverter Firmware",
                ..
            }
        ));
    }

    #[test]
    fn legacy_colon_timestamps_are_accepted() {
        let content = format!(
            "{HEADER}\n190825130075,2024-03-01 08:00:00,2024-03-01 11:30:00,1.10.02,PASS,,,,,\n"
        );
        let parsed = parse_results(&content).expect("results parse failed");
        assert_eq!(parsed.rows[0].start_time, civil(2024, 3, 1, 8, 0, 0));
    }
}
