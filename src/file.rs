//! File sink lifecycle: placement, rollover and size-bounded trimming
//!
//! A `FileSink` owns exactly one physical log file. Before every write the
//! target path is recomputed from the sink's naming settings; a changed path
//! (date rollover, bucket rollover) closes the old handle and opens a new
//! one. When a size limit is set, the oldest bytes are trimmed from the front
//! so the file never exceeds the cap after a write completes.
//!
//! The sink knows nothing about levels or rules. All mutable state lives
//! behind one mutex, so concurrent callers into the same rule are serialized
//! through the whole resolve -> rotate -> trim -> write sequence.

use chrono::{DateTime, DurationRound, Local};
use colored::Colorize;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{LogError, LogResult};

/// Grouping of log files under a subdirectory keyed by a truncated timestamp
#[derive(Debug, Clone)]
pub struct TimeBucket {
    pub period: Duration,
    pub format: String,
}

pub struct FileSink {
    directory: PathBuf,
    base_name: String,
    extension: String,
    date_stamped: bool,
    date_format: String,
    bucket: Option<TimeBucket>,
    size_limit: Option<u64>,
    // set after the first failed write so the console fallback fires once,
    // cleared again by the next successful write
    error_reported: AtomicBool,
    state: Mutex<SinkState>,
}

#[derive(Default)]
struct SinkState {
    file: Option<File>,
    current_path: PathBuf,
}

impl FileSink {
    pub(crate) fn new(
        directory: PathBuf,
        base_name: String,
        extension: String,
        date_stamped: bool,
        date_format: String,
        bucket: Option<TimeBucket>,
        size_limit: Option<u64>,
    ) -> Self {
        Self {
            directory,
            base_name,
            extension,
            date_stamped,
            date_format,
            bucket,
            size_limit,
            error_reported: AtomicBool::new(false),
            state: Mutex::new(SinkState::default()),
        }
    }

    /// Explicitly create the directory tree and open the file.
    ///
    /// Writes do this lazily; calling it up front surfaces path problems at
    /// setup time instead of on the first log call.
    pub fn init(&self) -> LogResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&mut state)
    }

    /// Append one rendered payload, rotating and trimming as needed
    pub fn write(&self, payload: &str) -> LogResult<()> {
        let mut state = self.state.lock();
        self.ensure_open(&mut state)?;

        if let Some(limit) = self.size_limit {
            let current_size = match state.file.as_ref() {
                Some(file) => file.metadata()?.len(),
                None => 0,
            };
            let incoming = payload.len() as u64;
            if current_size + incoming > limit {
                let overflow = current_size + incoming - limit;
                Self::trim(&state.current_path, overflow)?;
            }
        }

        let file = match state.file.as_mut() {
            Some(file) => file,
            None => return Err(LogError::Config("log file is not open".to_string())),
        };
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        self.error_reported.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Flush the open handle, if any
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if let Some(file) = state.file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Close the open handle. The next write reopens lazily.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(file) = state.file.take() {
            let _ = file.sync_all();
        }
    }

    /// The path currently backing this sink, if a file has been opened
    pub fn current_path(&self) -> Option<PathBuf> {
        let state = self.state.lock();
        if state.file.is_some() {
            Some(state.current_path.clone())
        } else {
            None
        }
    }

    /// Announce a delivery failure on the console fallback, once per failure
    /// streak, and keep going.
    pub(crate) fn report_failure(&self, module: &str, err: &LogError) {
        if !self.error_reported.swap(true, Ordering::Relaxed) {
            eprintln!(
                "{}",
                format!("❌ [LOGGER] File output failed for module '{}': {}", module, err).red()
            );
        }
    }

    /// Resolve the target path for "now" and make sure it is the open one.
    fn ensure_open(&self, state: &mut SinkState) -> LogResult<()> {
        let target = self.resolve_path(Local::now())?;

        if state.file.is_none() || state.current_path != target {
            if let Some(previous) = state.file.take() {
                let _ = previous.sync_all();
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&target)?;
            state.file = Some(file);
            state.current_path = target;
        }

        Ok(())
    }

    /// Compute `directory[/bucketDir]/[dateStamp_]baseName.extension` for the
    /// given instant.
    fn resolve_path(&self, now: DateTime<Local>) -> LogResult<PathBuf> {
        let mut dir = self.directory.clone();

        if let Some(bucket) = &self.bucket {
            // Sub-hour periods are formatted as-is; longer periods align the
            // timestamp to the period boundary first
            let folder = if bucket.period < Duration::from_secs(3600) {
                now.format(&bucket.format).to_string()
            } else {
                let period = chrono::Duration::from_std(bucket.period).map_err(|e| {
                    LogError::Config(format!("invalid time bucket period: {}", e))
                })?;
                now.duration_trunc(period)
                    .map_err(|e| LogError::Config(format!("invalid time bucket period: {}", e)))?
                    .format(&bucket.format)
                    .to_string()
            };
            dir.push(folder);
        }

        let file_name = if self.date_stamped {
            format!(
                "{}_{}{}",
                now.format(&self.date_format),
                self.base_name,
                self.extension
            )
        } else {
            format!("{}{}", self.base_name, self.extension)
        };

        Ok(dir.join(file_name))
    }

    /// Drop `overflow` bytes from the front of the file, keeping the newest
    /// tail. Uses a separate read-write handle since the sink handle is in
    /// append mode.
    fn trim(path: &Path, overflow: u64) -> LogResult<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();

        if overflow >= size {
            file.set_len(0)?;
            return Ok(());
        }

        let keep = size - overflow;
        let mut retained = vec![0u8; keep as usize];
        file.seek(SeekFrom::Start(overflow))?;
        file.read_exact(&mut retained)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&retained)?;
        file.set_len(keep)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn plain_sink(dir: &Path) -> FileSink {
        FileSink::new(
            dir.to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            None,
            None,
        )
    }

    #[test]
    fn test_lazy_creation_and_append() {
        let dir = tempdir().unwrap();
        let sink = plain_sink(dir.path());
        assert!(sink.current_path().is_none());

        sink.write("one\n").unwrap();
        sink.write("two\n").unwrap();

        let path = dir.path().join("app.log");
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_same_bucket_reuses_handle_and_path() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            true,
            "%Y-%m-%d".to_string(),
            Some(TimeBucket {
                period: Duration::from_secs(24 * 3600),
                format: "%Y-%m-%d".to_string(),
            }),
            None,
        );

        sink.write("a\n").unwrap();
        let first = sink.current_path().unwrap();
        sink.write("b\n").unwrap();
        assert_eq!(sink.current_path().unwrap(), first);

        // one bucket directory, one file inside it
        let buckets: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(buckets.len(), 1);
        let bucket_dir = buckets[0].as_ref().unwrap().path();
        assert!(bucket_dir.is_dir());
        let files: Vec<_> = fs::read_dir(&bucket_dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(fs::read_to_string(&first).unwrap(), "a\nb\n");
    }

    #[test]
    fn test_date_stamped_filename_contains_today() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            true,
            "%Y-%m-%d".to_string(),
            None,
            None,
        );
        sink.write("x\n").unwrap();

        let today = Local::now().format("%Y-%m-%d").to_string();
        let name = sink
            .current_path()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .to_string();
        assert_eq!(name, format!("{}_app.log", today));
    }

    #[test]
    fn test_trim_keeps_newest_suffix() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            None,
            Some(100),
        );

        // 90 bytes on disk, then a 30-byte write: 20 bytes trimmed from the
        // front, final size exactly at the limit
        let old = "a".repeat(90);
        sink.write(&old).unwrap();
        let incoming = "b".repeat(30);
        sink.write(&incoming).unwrap();

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(content.len(), 100);
        assert_eq!(content, format!("{}{}", "a".repeat(70), "b".repeat(30)));
    }

    #[test]
    fn test_oversized_write_truncates_to_empty_first() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            None,
            Some(10),
        );

        sink.write("0123456789").unwrap();
        // 15 incoming bytes push overflow past the current size: everything
        // old goes, the file ends up holding only the new payload
        sink.write("ABCDEFGHIJKLMNO").unwrap();

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(content, "ABCDEFGHIJKLMNO");
    }

    #[test]
    fn test_never_exceeds_limit_across_many_writes() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            None,
            Some(64),
        );

        for i in 0..50 {
            sink.write(&format!("message number {:03}\n", i)).unwrap();
            let size = fs::metadata(dir.path().join("app.log")).unwrap().len();
            assert!(size <= 64, "size {} exceeded limit after write {}", size, i);
        }
        // newest content survived
        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert!(content.ends_with("message number 049\n"));
    }

    #[test]
    fn test_close_then_write_reopens() {
        let dir = tempdir().unwrap();
        let sink = plain_sink(dir.path());
        sink.write("before\n").unwrap();
        sink.close();
        assert!(sink.current_path().is_none());

        sink.write("after\n").unwrap();
        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        assert_eq!(content, "before\nafter\n");
    }

    #[test]
    fn test_sub_hour_bucket_formats_without_truncation() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            Some(TimeBucket {
                period: Duration::from_secs(60),
                format: "%H-%M".to_string(),
            }),
            None,
        );
        let now = Local::now();
        let path = sink.resolve_path(now).unwrap();
        let folder = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(folder, now.format("%H-%M").to_string());
    }

    #[test]
    fn test_hourly_bucket_truncates_to_period() {
        let dir = tempdir().unwrap();
        let sink = FileSink::new(
            dir.path().to_path_buf(),
            "app".to_string(),
            ".log".to_string(),
            false,
            "%Y-%m-%d".to_string(),
            Some(TimeBucket {
                period: Duration::from_secs(3600),
                format: "%Y-%m-%d %H:%M".to_string(),
            }),
            None,
        );
        let now = Local::now();
        let path = sink.resolve_path(now).unwrap();
        let folder = path.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        let expected = now
            .duration_trunc(chrono::Duration::hours(1))
            .unwrap()
            .format("%Y-%m-%d %H:%M")
            .to_string();
        assert_eq!(folder, expected);
    }
}
