use chrono::Duration;

use burnin_parser::ResultRow;

/// How much a candidate result row can be trusted, lowest first. When a
/// results file carries several rows (equipment retry appends), the
/// highest-priority row is the one persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowPriority {
    /// Start after end: the row is corrupt and only usable as a last resort.
    DateRangeInvalid = 1,
    /// The run ended too quickly to be a completed burn-in.
    DurationInvalid = 2,
    /// The source itself reported INVALID, or the firmware is the debug build.
    SourceInvalid = 3,
    Valid = 4,
}

impl RowPriority {
    pub fn rank(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Pass,
    Fail,
    Invalid,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Invalid => "INVALID",
        }
    }

    fn from_reported(overall: &str) -> Self {
        if overall.eq_ignore_ascii_case("pass") {
            TestStatus::Pass
        } else if overall.eq_ignore_ascii_case("fail") {
            TestStatus::Fail
        } else {
            // Anything the equipment did not label PASS/FAIL is untrusted.
            TestStatus::Invalid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    DebugFirmware,
    InvalidDateRange,
    DurationBelowMinimum,
}

impl InvalidReason {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidReason::DebugFirmware => "debug firmware",
            InvalidReason::InvalidDateRange => "invalid date range",
            InvalidReason::DurationBelowMinimum => "duration below minimum",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedRow {
    pub row: ResultRow,
    pub status: TestStatus,
    pub reason: Option<InvalidReason>,
    pub priority: RowPriority,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierConfig<'a> {
    pub debug_firmware: &'a str,
    pub min_duration: Duration,
}

/// Pure per-row classification, rules applied in order:
/// debug-firmware sentinel, inverted date range, sub-minimum duration, then
/// source-reported INVALID.
pub fn classify_row(row: ResultRow, config: &ClassifierConfig<'_>) -> ClassifiedRow {
    let reported = TestStatus::from_reported(&row.overall);
    let mut status = reported;
    let mut reason = None;
    let mut priority = RowPriority::Valid;

    if row.firmware == config.debug_firmware {
        status = TestStatus::Invalid;
        reason = Some(InvalidReason::DebugFirmware);
        priority = priority.min(RowPriority::SourceInvalid);
    }

    if row.start_time > row.end_time {
        status = TestStatus::Invalid;
        reason = Some(InvalidReason::InvalidDateRange);
        priority = RowPriority::DateRangeInvalid;
    } else if row.end_time - row.start_time < config.min_duration {
        status = TestStatus::Invalid;
        reason = Some(InvalidReason::DurationBelowMinimum);
        priority = priority.min(RowPriority::DurationInvalid);
    }

    if reported == TestStatus::Invalid && reason.is_none() {
        priority = priority.min(RowPriority::SourceInvalid);
    }

    ClassifiedRow {
        row,
        status,
        reason,
        priority,
    }
}

#[derive(Debug)]
pub enum Selection {
    Chosen(ClassifiedRow),
    /// Every row in the file had an inverted date range; persisting any of
    /// them would record known-bad data, so the whole file is rejected.
    AllRowsUntrusted,
}

/// Picks the single authoritative row for a results file. A lone row is
/// always the best available evidence and is kept regardless of validity;
/// among several, the highest priority wins with input order breaking ties.
pub fn select_row(rows: Vec<ResultRow>, config: &ClassifierConfig<'_>) -> Selection {
    let mut classified: Vec<ClassifiedRow> = rows
        .into_iter()
        .map(|row| classify_row(row, config))
        .collect();

    if classified.len() == 1 {
        return Selection::Chosen(classified.remove(0));
    }

    if classified
        .iter()
        .all(|c| c.priority == RowPriority::DateRangeInvalid)
    {
        return Selection::AllRowsUntrusted;
    }

    let best_idx = classified
        .iter()
        .enumerate()
        // max_by_key returns the last maximum, so compare strictly to keep
        // the first row on ties.
        .fold(0usize, |best, (idx, candidate)| {
            if candidate.priority > classified[best].priority {
                idx
            } else {
                best
            }
        });

    Selection::Chosen(classified.swap_remove(best_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn config() -> ClassifierConfig<'static> {
        ClassifierConfig {
            debug_firmware: "1.11.11",
            min_duration: Duration::hours(2),
        }
    }

    fn row(start_h: u32, end_h: u32, firmware: &str, overall: &str) -> ResultRow {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        ResultRow {
            serial_number: "190825130075".to_string(),
            start_time: day.and_hms_opt(start_h, 0, 0).unwrap(),
            end_time: day.and_hms_opt(end_h, 0, 0).unwrap(),
            firmware: firmware.to_string(),
            overall: overall.to_string(),
            output_a: None,
            output_b: None,
            status_flags: None,
            failure_description: None,
            failure_time: None,
        }
    }

    #[test]
    fn clean_pass_row_keeps_reported_status() {
        let classified = classify_row(row(8, 12, "1.10.02", "PASS"), &config());
        assert_eq!(classified.status, TestStatus::Pass);
        assert_eq!(classified.reason, None);
        assert_eq!(classified.priority, RowPriority::Valid);
    }

    #[test]
    fn debug_firmware_forces_invalid_at_priority_three() {
        // The end-to-end scenario: debug sentinel, start < end, duration 3h.
        let classified = classify_row(row(8, 11, "1.11.11", "PASS"), &config());
        assert_eq!(classified.status, TestStatus::Invalid);
        assert_eq!(classified.reason, Some(InvalidReason::DebugFirmware));
        assert_eq!(classified.priority, RowPriority::SourceInvalid);
        assert_eq!(classified.priority.rank(), 3);
    }

    #[test]
    fn inverted_date_range_is_lowest_priority() {
        let classified = classify_row(row(12, 8, "1.10.02", "PASS"), &config());
        assert_eq!(classified.status, TestStatus::Invalid);
        assert_eq!(classified.reason, Some(InvalidReason::InvalidDateRange));
        assert_eq!(classified.priority, RowPriority::DateRangeInvalid);
    }

    #[test]
    fn short_duration_invalidates_regardless_of_reported_status() {
        for overall in ["PASS", "FAIL", "INVALID"] {
            let classified = classify_row(row(8, 9, "1.10.02", overall), &config());
            assert_eq!(classified.status, TestStatus::Invalid);
            assert_eq!(classified.reason, Some(InvalidReason::DurationBelowMinimum));
            assert!(classified.reason.unwrap().as_str().contains("duration"));
            assert_eq!(classified.priority, RowPriority::DurationInvalid);
        }
    }

    #[test]
    fn duration_rule_does_not_raise_a_date_range_row() {
        // Inverted range already forced priority 1; the duration rule must
        // not fire on top of it.
        let classified = classify_row(row(9, 8, "1.10.02", "PASS"), &config());
        assert_eq!(classified.priority, RowPriority::DateRangeInvalid);
        assert_eq!(classified.reason, Some(InvalidReason::InvalidDateRange));
    }

    #[test]
    fn source_reported_invalid_gets_priority_three() {
        let classified = classify_row(row(8, 12, "1.10.02", "INVALID"), &config());
        assert_eq!(classified.status, TestStatus::Invalid);
        assert_eq!(classified.reason, None);
        assert_eq!(classified.priority, RowPriority::SourceInvalid);
    }

    #[test]
    fn unknown_overall_is_treated_as_invalid() {
        let classified = classify_row(row(8, 12, "1.10.02", "???"), &config());
        assert_eq!(classified.status, TestStatus::Invalid);
        assert_eq!(classified.priority, RowPriority::SourceInvalid);
    }

    #[test]
    fn highest_priority_row_wins_in_any_order() {
        // Priorities [1,3,2,4]: the valid row must always win.
        let rows = vec![
            row(12, 8, "1.10.02", "PASS"),    // date range, 1
            row(8, 12, "1.11.11", "PASS"),    // debug firmware, 3
            row(8, 9, "1.10.02", "PASS"),     // short duration, 2
            row(8, 12, "1.10.02", "PASS"),    // valid, 4
        ];
        for rotation in 0..rows.len() {
            let mut rotated = rows.clone();
            rotated.rotate_left(rotation);
            match select_row(rotated, &config()) {
                Selection::Chosen(chosen) => {
                    assert_eq!(chosen.priority, RowPriority::Valid);
                    assert_eq!(chosen.status, TestStatus::Pass);
                }
                Selection::AllRowsUntrusted => panic!("file should not be rejected"),
            }
        }
    }

    #[test]
    fn ties_break_by_input_order() {
        let mut first = row(8, 12, "1.10.02", "PASS");
        first.firmware = "1.10.01".to_string();
        let second = row(8, 12, "1.10.02", "PASS");

        match select_row(vec![first, second], &config()) {
            Selection::Chosen(chosen) => assert_eq!(chosen.row.firmware, "1.10.01"),
            Selection::AllRowsUntrusted => panic!("file should not be rejected"),
        }
    }

    #[test]
    fn file_of_only_date_range_rows_is_rejected() {
        let rows = vec![
            row(12, 8, "1.10.02", "PASS"),
            row(13, 9, "1.10.02", "FAIL"),
            row(14, 10, "1.10.02", "PASS"),
        ];
        assert!(matches!(
            select_row(rows, &config()),
            Selection::AllRowsUntrusted
        ));
    }

    #[test]
    fn single_date_range_row_is_still_processed() {
        // A lone row is always the best available evidence.
        match select_row(vec![row(12, 8, "1.10.02", "PASS")], &config()) {
            Selection::Chosen(chosen) => {
                assert_eq!(chosen.priority, RowPriority::DateRangeInvalid);
                assert_eq!(chosen.status, TestStatus::Invalid);
            }
            Selection::AllRowsUntrusted => panic!("single-row files are never rejected"),
        }
    }
}
