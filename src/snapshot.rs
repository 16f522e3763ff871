use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use crate::models::RawResultSet;

const MAX_SUFFIX: u32 = 1000;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unable to write snapshot in {dir}: {source}")]
    Io {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// Direct search response.
    Results,
    /// Expanded products response.
    Products,
    /// Phase-1 response that carried no page token.
    Token,
}

impl SnapshotKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            SnapshotKind::Results => "lens_results",
            SnapshotKind::Products => "lens_products",
            SnapshotKind::Token => "lens_token",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn persist(&self, raw: &RawResultSet, kind: SnapshotKind) -> Result<PathBuf, SnapshotError> {
        self.persist_at(raw, kind, Local::now())
    }

    /// Writes `<prefix>_<YYYYmmdd_HHMMSS>.json`, adding `_1`, `_2`, ... when the
    /// name is already taken. Existing files are never overwritten.
    pub fn persist_at(
        &self,
        raw: &RawResultSet,
        kind: SnapshotKind,
        at: DateTime<Local>,
    ) -> Result<PathBuf, SnapshotError> {
        let body = serde_json::to_vec_pretty(raw)?;
        fs::create_dir_all(&self.dir).map_err(|source| self.io_error(source))?;

        let stem = format!("{}_{}", kind.prefix(), at.format("%Y%m%d_%H%M%S"));
        for attempt in 0..MAX_SUFFIX {
            let name = if attempt == 0 {
                format!("{stem}.json")
            } else {
                format!("{stem}_{attempt}.json")
            };
            let path = self.dir.join(name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(self.io_error(err)),
            };
            file.write_all(&body)
                .and_then(|_| file.write_all(b"\n"))
                .map_err(|source| self.io_error(source))?;
            info!(target: "lens.snapshot", path = %path.display(), bytes = body.len(), "snapshot_written");
            return Ok(path);
        }

        Err(self.io_error(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for {stem}"),
        )))
    }

    fn io_error(&self, source: io::Error) -> SnapshotError {
        SnapshotError::Io {
            dir: self.dir.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("lens-scout-test-{}", Uuid::new_v4().simple()))
    }

    fn sample() -> RawResultSet {
        match json!({"visual_matches": [{"title": "A", "source": "Amazon"}]}) {
            Value::Object(map) => RawResultSet::new(map),
            _ => unreachable!(),
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn writes_timestamped_pretty_json() {
        let dir = scratch_dir();
        let writer = SnapshotWriter::new(&dir);
        let path = writer
            .persist_at(&sample(), SnapshotKind::Products, fixed_time())
            .expect("persist");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("lens_products_20240309_140507.json")
        );
        let written = fs::read_to_string(&path).expect("read back");
        assert!(written.contains("\n  \"visual_matches\""));
        let parsed: Value = serde_json::from_str(&written).expect("valid json");
        assert_eq!(parsed["visual_matches"][0]["title"], json!("A"));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn same_second_gets_a_suffix() {
        let dir = scratch_dir();
        let writer = SnapshotWriter::new(&dir);
        let first = writer
            .persist_at(&sample(), SnapshotKind::Results, fixed_time())
            .expect("first");
        let second = writer
            .persist_at(&sample(), SnapshotKind::Results, fixed_time())
            .expect("second");
        assert_ne!(first, second);
        assert_eq!(
            second.file_name().and_then(|n| n.to_str()),
            Some("lens_results_20240309_140507_1.json")
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn unwritable_dir_is_reported() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).expect("mkdir");
        let blocker = dir.join("not-a-dir");
        fs::write(&blocker, b"x").expect("file");
        let writer = SnapshotWriter::new(&blocker);
        let err = writer
            .persist(&sample(), SnapshotKind::Results)
            .expect_err("a file is not a directory");
        assert!(matches!(err, SnapshotError::Io { .. }));
        fs::remove_dir_all(&dir).ok();
    }
}
