//! Atomic file-backed persistence for linkwatch state.
//!
//! Provides [`FileRebootStateStore`], the on-disk implementation of
//! `linkwatch_core::RebootStateStore`.

#![forbid(unsafe_code)]

use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use linkwatch_core::RebootStateStore;
use tracing::warn;

/// Write `content` to `path` via a temp file in the same directory followed by
/// an atomic rename, so a crash mid-write never leaves a half-written file.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// `linkwatch_core::RebootStateStore` backed by a single-line file holding
/// `YYYY-MM-DD COUNT`. Missing or unparsable files are treated as "no
/// attempts recorded today" — never a reason to fail startup.
pub struct FileRebootStateStore {
    path: PathBuf,
}

impl FileRebootStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RebootStateStore for FileRebootStateStore {
    fn read(&self) -> Option<(NaiveDate, u32)> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let line = content.trim();
        let (date_str, count_str) = line.split_once(' ')?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
        let count: u32 = count_str.trim().parse().ok()?;
        Some((date, count))
    }

    fn write(&self, date: NaiveDate, count: u32) {
        let content = format!("{} {}\n", date.format("%Y-%m-%d"), count);
        if let Err(e) = write_atomic(&self.path, &content) {
            warn!(path = %self.path.display(), error = %e, "failed to persist reboot quota");
        }
    }
}
