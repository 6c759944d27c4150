//! Verification Aggregator
//!
//! Verify containers print one summary line per table:
//!
//! ```text
//! Table users: 2500 matched, 0 missing, 0 mismatched
//! ```
//!
//! Lines are parsed independently and summed. Anything that does not carry
//! the three counters is ignored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Lines dumped when a log produced nothing parseable
const UNPARSED_PREVIEW_LINES: usize = 20;

#[allow(clippy::expect_used)] // Literal pattern; a typo panics on first use and in tests
static VERIFICATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s+matched,\s+(\d+)\s+missing,\s+(\d+)\s+mismatched")
        .expect("verification line pattern must compile")
});

/// Row-level verification counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub matched: u64,
    pub missing: u64,
    pub mismatched: u64,
}

impl VerificationStats {
    pub fn new(matched: u64, missing: u64, mismatched: u64) -> Self {
        Self {
            matched,
            missing,
            mismatched,
        }
    }

    /// Any missing or mismatched row
    pub fn has_discrepancies(&self) -> bool {
        self.missing > 0 || self.mismatched > 0
    }

    pub fn total_checked(&self) -> u64 {
        self.matched + self.missing + self.mismatched
    }
}

impl Add for VerificationStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            matched: self.matched + rhs.matched,
            missing: self.missing + rhs.missing,
            mismatched: self.mismatched + rhs.mismatched,
        }
    }
}

impl AddAssign for VerificationStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for VerificationStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Parse one log line
///
/// Returns None when the line does not contain `<N> matched, <N> missing,
/// <N> mismatched`. Surrounding text is allowed.
pub fn parse_verification_line(line: &str) -> Option<VerificationStats> {
    let caps = VERIFICATION_LINE.captures(line)?;
    let field = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u64>().ok());

    Some(VerificationStats {
        matched: field(1)?,
        missing: field(2)?,
        mismatched: field(3)?,
    })
}

/// Sum every verification line found in `lines`
///
/// Order does not matter and an empty input yields zeros.
pub fn aggregate_verification_stats<'a, I>(lines: I) -> VerificationStats
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(parse_verification_line)
        .sum()
}

/// Aggregate over several container logs, warning about logs that parse to nothing
///
/// # Arguments
/// * `logs` - `(container name, full log)` pairs
pub fn aggregate_container_logs(logs: &[(String, String)]) -> VerificationStats {
    let mut total = VerificationStats::default();

    for (container, log) in logs {
        let stats = aggregate_verification_stats(log.lines());
        let parsed_any = log.lines().any(|l| parse_verification_line(l).is_some());

        if !parsed_any && !log.trim().is_empty() {
            let preview: Vec<&str> = log.lines().take(UNPARSED_PREVIEW_LINES).collect();
            warn!(
                container = %container,
                preview = %preview.join("\n"),
                "No verification results found in container log"
            );
        } else {
            debug!(
                container = %container,
                matched = stats.matched,
                missing = stats.missing,
                mismatched = stats.mismatched,
                "Parsed verification results"
            );
        }

        total += stats;
    }

    total
}
