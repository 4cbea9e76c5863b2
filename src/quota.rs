//! Persisted per-day usage ledger backing the daily optimization quota.
//!
//! One JSON record per install: `{ "day": "YYYY-MM-DD", "used": n }`. The day
//! is the UTC calendar date of the injected clock; reading a record stored
//! under an earlier date yields 0 and the next increment rewrites the file
//! under the current date. A corrupt or unreadable file degrades to an empty
//! day instead of failing the session.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{PxpError, Result};

/// Source of the current UTC date.
///
/// Injected so day-rollover behavior is testable without waiting for
/// midnight.
pub trait Clock {
    /// Current UTC calendar date.
    fn today_utc(&self) -> NaiveDate;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today_utc(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// On-disk shape of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerRecord {
    day: NaiveDate,
    used: u32,
}

/// File-backed daily usage counter.
///
/// Stateless handle: every read goes to disk, so concurrent `pxp` processes
/// observe each other's completed runs. Writes are atomic (tmp + rename).
#[derive(Debug, Clone)]
pub struct QuotaLedger<C: Clock = SystemClock> {
    path: PathBuf,
    clock: C,
}

impl QuotaLedger {
    /// Ledger at `path` driven by the system clock.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            clock: SystemClock,
        }
    }
}

impl<C: Clock> QuotaLedger<C> {
    /// Ledger with an explicit clock.
    #[must_use]
    pub fn with_clock(path: PathBuf, clock: C) -> Self {
        Self { path, clock }
    }

    /// Location of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed optimizations recorded for the current UTC day.
    ///
    /// Missing file, unreadable file, malformed JSON, and records from a
    /// different day all read as 0.
    #[must_use]
    pub fn used_today(&self) -> u32 {
        let today = self.clock.today_utc();
        match self.read_record() {
            Some(record) if record.day == today => record.used,
            _ => 0,
        }
    }

    /// Record one completed optimization and return the new count for today.
    ///
    /// Rolls the record over to the current date when the stored one is
    /// older, so the first completion of a new day always yields 1.
    pub fn record_completion(&self) -> Result<u32> {
        let today = self.clock.today_utc();
        let used = self.used_today() + 1;
        self.store(&LedgerRecord { day: today, used })?;
        Ok(used)
    }

    fn read_record(&self) -> Option<LedgerRecord> {
        let raw = fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Atomic write: serialize to a sibling tmp file, then rename over the
    /// ledger so readers never observe a partial record.
    fn store(&self, record: &LedgerRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|error| PxpError::QuotaState {
                path: self.path.clone(),
                details: format!("failed to create ledger directory: {error}"),
            })?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp_path, data).map_err(|error| PxpError::QuotaState {
            path: tmp_path.clone(),
            details: format!("failed to write ledger: {error}"),
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|error| PxpError::QuotaState {
            path: self.path.clone(),
            details: format!("failed to commit ledger: {error}"),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock pinned to a fixed date.
    #[derive(Debug, Clone, Copy)]
    struct FixedClock(NaiveDate);

    impl Clock for FixedClock {
        fn today_utc(&self) -> NaiveDate {
            self.0
        }
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().expect("valid date literal")
    }

    fn ledger_at(path: PathBuf, date: &str) -> QuotaLedger<FixedClock> {
        QuotaLedger::with_clock(path, FixedClock(day(date)))
    }

    #[test]
    fn missing_file_reads_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger_at(dir.path().join("usage.json"), "2026-08-25");
        assert_eq!(ledger.used_today(), 0);
    }

    #[test]
    fn completions_increment_within_a_day() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = ledger_at(dir.path().join("usage.json"), "2026-08-25");
        assert_eq!(ledger.record_completion().expect("record"), 1);
        assert_eq!(ledger.record_completion().expect("record"), 2);
        assert_eq!(ledger.used_today(), 2);
    }

    #[test]
    fn later_day_reads_zero_and_increment_rewrites_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("usage.json");

        let yesterday = ledger_at(path.clone(), "2026-08-24");
        for _ in 0..5 {
            yesterday.record_completion().expect("record");
        }
        assert_eq!(yesterday.used_today(), 5);

        let today = ledger_at(path.clone(), "2026-08-25");
        assert_eq!(today.used_today(), 0);
        assert_eq!(today.record_completion().expect("record"), 1);

        let raw = fs::read_to_string(&path).expect("read ledger");
        assert!(raw.contains("2026-08-25"), "record rewritten: {raw}");
        assert!(!raw.contains("2026-08-24"), "old day gone: {raw}");
    }

    #[test]
    fn corrupt_file_degrades_to_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("usage.json");
        fs::write(&path, "{not-json").expect("write corrupt ledger");

        let ledger = ledger_at(path, "2026-08-25");
        assert_eq!(ledger.used_today(), 0);
        assert_eq!(ledger.record_completion().expect("record"), 1);
        assert_eq!(ledger.used_today(), 1);
    }

    #[test]
    fn store_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state").join("usage.json");
        let ledger = ledger_at(path.clone(), "2026-08-25");
        ledger.record_completion().expect("record");
        assert!(path.exists());
    }

    #[test]
    fn store_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("usage.json");
        let ledger = ledger_at(path.clone(), "2026-08-25");
        ledger.record_completion().expect("record");
        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn day_is_stored_as_iso_date() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("usage.json");
        ledger_at(path.clone(), "2026-08-25")
            .record_completion()
            .expect("record");
        let raw = fs::read_to_string(&path).expect("read ledger");
        assert!(raw.contains("\"day\": \"2026-08-25\""), "{raw}");
        assert!(raw.contains("\"used\": 1"), "{raw}");
    }
}
