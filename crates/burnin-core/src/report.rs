use chrono::Duration;
use serde::Serialize;

/// A closest-match association, kept in the report so operators can audit
/// fuzzy matches after the fact.
#[derive(Debug, Clone, Serialize)]
pub struct ClosestEntry {
    pub results_file: String,
    pub data_file: String,
    pub delta_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnmatchedEntry {
    pub results_file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub file: String,
    pub message: String,
}

/// End-of-run summary. Every pending file lands in exactly one bucket; there
/// is no silent partial success.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Results files whose data file matched by exact filename.
    pub exact: Vec<String>,
    /// Results files matched by closest-timestamp fallback.
    pub closest: Vec<ClosestEntry>,
    /// Results files with no usable data-file candidate, left for review.
    pub unmatched: Vec<UnmatchedEntry>,
    /// Results files whose name was already ingested; no-op skips.
    pub duplicates: Vec<String>,
    /// Results files where every candidate row had an inverted date range.
    pub rejected: Vec<String>,
    /// Per-file failures (parse or persistence); the files stay in place for
    /// the next run to retry.
    pub errors: Vec<ErrorEntry>,
}

impl RunReport {
    pub fn record_closest(&mut self, results_file: String, data_file: String, delta: Duration) {
        self.closest.push(ClosestEntry {
            results_file,
            data_file,
            delta_seconds: delta.num_seconds(),
        });
    }

    pub fn record_unmatched(&mut self, results_file: String, reason: impl Into<String>) {
        self.unmatched.push(UnmatchedEntry {
            results_file,
            reason: reason.into(),
        });
    }

    pub fn record_error(&mut self, file: String, message: impl Into<String>) {
        self.errors.push(ErrorEntry {
            file,
            message: message.into(),
        });
    }

    pub fn total(&self) -> usize {
        self.exact.len()
            + self.closest.len()
            + self.unmatched.len()
            + self.duplicates.len()
            + self.rejected.len()
            + self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_file_counts_exactly_once() {
        let mut report = RunReport::default();
        report.exact.push("a.csv".to_string());
        report.record_closest("b.csv".to_string(), "d.csv".to_string(), Duration::seconds(90));
        report.record_unmatched("c.csv".to_string(), "no candidate within window");
        report.duplicates.push("e.csv".to_string());
        report.rejected.push("f.csv".to_string());
        report.record_error("g.csv".to_string(), "boom");

        assert_eq!(report.total(), 6);
        assert_eq!(report.closest[0].delta_seconds, 90);
    }
}
