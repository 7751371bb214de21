use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parsed form of a data-file name:
/// `inverter_{serial}_{YYYY-MM-DD}_{HH-MM-SS}.csv`, or the legacy
/// minute-precision `inverter_{serial}_{YYYY-MM-DD}_{HH-MM}.csv` where the
/// seconds are implicitly zero. The embedded timestamp is civil time in the
/// configured zone, never UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFileName {
    pub serial: String,
    pub timestamp: NaiveDateTime,
    pub minute_precision: bool,
}

pub fn parse_data_filename(name: &str) -> Option<DataFileName> {
    let stem = name.strip_prefix("inverter_")?.strip_suffix(".csv")?;

    // Serial numbers may themselves contain underscores, so peel the date and
    // time off the right-hand side.
    let (rest, time_str) = stem.rsplit_once('_')?;
    let (serial, date_str) = rest.rsplit_once('_')?;
    if serial.is_empty() {
        return None;
    }

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
    let (time, minute_precision) = match NaiveTime::parse_from_str(time_str, "%H-%M-%S") {
        Ok(time) => (time, false),
        Err(_) => (NaiveTime::parse_from_str(time_str, "%H-%M").ok()?, true),
    };

    Some(DataFileName {
        serial: serial.to_string(),
        timestamp: date.and_time(time),
        minute_precision,
    })
}

pub fn seconds_filename(serial: &str, local: NaiveDateTime) -> String {
    format!("inverter_{serial}_{}.csv", local.format("%Y-%m-%d_%H-%M-%S"))
}

pub fn minute_filename(serial: &str, local: NaiveDateTime) -> String {
    format!("inverter_{serial}_{}.csv", local.format("%Y-%m-%d_%H-%M"))
}
