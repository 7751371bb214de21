use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use burnin_parser::filename::{minute_filename, parse_data_filename, seconds_filename, DataFileName};

use crate::clock::LocalClock;
use crate::error::Result;

/// What the matcher is looking for: the identity the selected result row
/// implies for its data file.
#[derive(Debug, Clone)]
pub struct MatchTarget {
    pub serial: String,
    pub start_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMatch {
    /// An exact filename hit, seconds- or minute-precision.
    Exact(String),
    /// Fallback hit by minimum absolute time delta within the ±1 day window.
    Closest { file: String, delta: Duration },
    Unmatched,
}

/// One data file present in the candidate directory whose name parsed.
#[derive(Debug, Clone)]
pub struct DataFileCandidate {
    pub file_name: String,
    pub parsed: DataFileName,
}

/// Lists the parsable `inverter_*.csv` names in a directory, sorted by name
/// so that downstream tie-breaks are deterministic. Files with foreign names
/// are ignored here and reported by the orchestrator's directory sweep.
pub fn scan_candidates(dir: &Path) -> Result<Vec<DataFileCandidate>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        match parse_data_filename(&file_name) {
            Some(parsed) => candidates.push(DataFileCandidate { file_name, parsed }),
            None => debug!(file = %file_name, "ignoring non-candidate file in data directory"),
        }
    }
    candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(candidates)
}

/// Locates the data file for `target` among `candidates`. Filenames already
/// recorded as a source_file (or claimed earlier in this run) are excluded at
/// every step so one data file can never attach to two tests.
///
/// Order, first hit wins: exact seconds-precision name, exact legacy
/// minute-precision name, then closest embedded timestamp among candidates
/// with the same serial whose embedded date is within one day of the
/// target's; ties go to the lexicographically first filename.
pub fn match_data_file(
    target: &MatchTarget,
    clock: &LocalClock,
    candidates: &[DataFileCandidate],
    consumed: &HashSet<String>,
) -> FileMatch {
    let local_start = clock.to_local(target.start_utc);

    let available =
        |name: &str| !consumed.contains(name) && candidates.iter().any(|c| c.file_name == name);

    let exact = seconds_filename(&target.serial, local_start);
    if available(&exact) {
        return FileMatch::Exact(exact);
    }

    let legacy = minute_filename(&target.serial, local_start);
    if available(&legacy) {
        return FileMatch::Exact(legacy);
    }

    let target_date = local_start.date();
    let mut best: Option<(&DataFileCandidate, Duration)> = None;

    for candidate in candidates {
        if candidate.parsed.serial != target.serial || consumed.contains(&candidate.file_name) {
            continue;
        }
        let day_distance = (candidate.parsed.timestamp.date() - target_date).num_days().abs();
        if day_distance > 1 {
            continue;
        }

        let candidate_utc = clock.to_utc(candidate.parsed.timestamp);
        let delta = (candidate_utc - target.start_utc).abs();

        // Strictly-less keeps the first (lexicographically smallest) name on
        // ties, since candidates arrive sorted.
        let closer = match &best {
            Some((_, best_delta)) => delta < *best_delta,
            None => true,
        };
        if closer {
            best = Some((candidate, delta));
        }
    }

    match best {
        Some((candidate, delta)) => FileMatch::Closest {
            file: candidate.file_name.clone(),
            delta,
        },
        None => FileMatch::Unmatched,
    }
}
