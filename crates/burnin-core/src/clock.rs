use burnin_parser::parse_civil_timestamp;
use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone as _, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampParseError {
    #[error("invalid civil timestamp '{0}'")]
    Invalid(String),
}

/// Converts between the one configured civil time zone and UTC. Every
/// timestamp embedded in filenames and CSV fields is civil time in this zone;
/// the store only ever holds UTC. This must be a real zoned conversion, not a
/// fixed-hour shift, or ingestion breaks twice a year.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    tz: Tz,
}

impl LocalClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Resolves a civil timestamp to an absolute instant. During the
    /// fall-back overlap the first (earlier UTC) occurrence wins; a civil
    /// time inside the spring-forward gap is pushed across it.
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(first, _second) => first.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = local + Duration::hours(1);
                match self.tz.from_local_datetime(&shifted) {
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                        dt.with_timezone(&Utc)
                    }
                    LocalResult::None => Utc.from_utc_datetime(&local),
                }
            }
        }
    }

    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.tz).naive_local()
    }

    /// Parses an accepted civil format and converts it to UTC. The format
    /// list lives with the parsers so normalization and parsing cannot drift.
    pub fn parse_to_utc(&self, value: &str) -> Result<DateTime<Utc>, TimestampParseError> {
        let local = parse_civil_timestamp(value)
            .ok_or_else(|| TimestampParseError::Invalid(value.trim().to_string()))?;
        Ok(self.to_utc(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone as _};
    use chrono_tz::America::New_York;

    fn clock() -> LocalClock {
        LocalClock::new(New_York)
    }

    fn civil(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn converts_standard_time_with_zone_offset() {
        // EST is UTC-5.
        let utc = clock().to_utc(civil(2024, 1, 15, 8, 0, 0));
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap());
    }

    #[test]
    fn converts_daylight_time_with_zone_offset() {
        // EDT is UTC-4; a naive fixed-hour shift would get this wrong.
        let utc = clock().to_utc(civil(2024, 7, 15, 8, 0, 0));
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap());
    }

    #[test]
    fn round_trips_across_dst_transition() {
        // Instants on both sides of the 2024-03-10 spring-forward boundary.
        for utc in [
            Utc.with_ymd_and_hms(2024, 3, 10, 6, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap(),
        ] {
            let clock = clock();
            assert_eq!(clock.to_utc(clock.to_local(utc)), utc);
        }
    }

    #[test]
    fn ambiguous_fall_back_hour_resolves_to_first_occurrence() {
        // 2024-11-03 01:30 happens twice in New York; the earlier UTC instant
        // (EDT, UTC-4) wins.
        let utc = clock().to_utc(civil(2024, 11, 3, 1, 30, 0));
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn nonexistent_spring_forward_time_shifts_across_gap() {
        // 2024-03-10 02:30 does not exist in New York.
        let utc = clock().to_utc(civil(2024, 3, 10, 2, 30, 0));
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap());
    }

    #[test]
    fn parses_filename_style_timestamp() {
        let utc = clock()
            .parse_to_utc("2024-01-15_08-00-00")
            .expect("parse failed");
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap());
    }

    #[test]
    fn parses_every_civil_format_the_parsers_accept() {
        // parse_to_utc delegates to the parser crate's format list; all three
        // shapes must normalize to the same instant.
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        for raw in [
            "2024-01-15_08-00-00",
            "2024-01-15 08-00-00",
            "2024-01-15 08:00:00",
        ] {
            assert_eq!(clock().parse_to_utc(raw).expect(raw), expected);
        }
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let err = clock().parse_to_utc("2024-01-15T08:00:00Z").unwrap_err();
        assert!(err.to_string().contains("invalid civil timestamp"));
    }
}
