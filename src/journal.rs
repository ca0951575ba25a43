use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// An append-only destination for job events, one line per event.
///
/// Handles are passed explicitly to the tasks that write to them; nothing
/// here is process-wide.
pub trait JobLog: Send + Sync {
    /// Names the destination in errors and diagnostics.
    fn destination(&self) -> &str;

    /// Append one timestamped line.
    ///
    /// Fails with `Error::LogSinkUnavailable` if the destination cannot be
    /// opened or written.
    fn append(&self, text: &str) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn format_line(at: &DateTime<Local>, text: &str) -> String {
    format!("{} {}", at.format(TIMESTAMP_FORMAT), text)
}

/// A job log backed by a file opened in append mode.
///
/// The file is opened on the first append and kept for the lifetime of the
/// handle. Each line goes out in a single write. Writers in other handles or
/// processes may interleave with ours.
pub struct FileJobLog {
    path: PathBuf,
    destination: String,
    file: Mutex<Option<File>>,
}

impl FileJobLog {
    pub fn new<P: AsRef<Path>>(path: P) -> FileJobLog {
        let path = path.as_ref().to_path_buf();
        FileJobLog {
            destination: path.display().to_string(),
            path,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.unavailable(err))?;
        debug!(destination = %self.destination, "opened job log");
        Ok(file)
    }

    fn unavailable(&self, source: io::Error) -> Error {
        Error::LogSinkUnavailable {
            destination: self.destination.clone(),
            source,
        }
    }
}

impl JobLog for FileJobLog {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut line = format_line(&Local::now(), text);
        line.push('\n');

        let mut slot = lock(&self.file);
        let mut file = match slot.take() {
            Some(file) => file,
            None => self.open()?,
        };
        // A file that failed a write is dropped; the next append reopens.
        file.write_all(line.as_bytes())
            .map_err(|err| self.unavailable(err))?;
        *slot = Some(file);
        Ok(())
    }
}

impl fmt::Debug for FileJobLog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FileJobLog")
            .field("path", &self.path)
            .field("open", &lock(&self.file).is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
struct Entry {
    at: DateTime<Local>,
    text: String,
}

/// A job log that keeps its lines in memory.
///
/// Can be told to start failing after a number of appends, which makes the
/// log failure paths testable without touching the file system.
#[derive(Debug)]
pub struct MemoryJobLog {
    name: String,
    fail_after: Option<usize>,
    entries: Mutex<Vec<Entry>>,
}

impl MemoryJobLog {
    pub fn new<S: Into<String>>(name: S) -> MemoryJobLog {
        MemoryJobLog {
            name: name.into(),
            fail_after: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// A log that accepts `count` appends and fails every one after that.
    pub fn failing_after<S: Into<String>>(name: S, count: usize) -> MemoryJobLog {
        MemoryJobLog {
            fail_after: Some(count),
            ..MemoryJobLog::new(name)
        }
    }

    /// The appended texts, without timestamps, in append order.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.entries).iter().map(|e| e.text.clone()).collect()
    }

    /// The appended lines exactly as a file log would have written them.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .map(|e| format_line(&e.at, &e.text))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobLog for MemoryJobLog {
    fn destination(&self) -> &str {
        &self.name
    }

    fn append(&self, text: &str) -> Result<()> {
        let mut entries = lock(&self.entries);
        if let Some(limit) = self.fail_after {
            if entries.len() >= limit {
                return Err(Error::LogSinkUnavailable {
                    destination: self.name.clone(),
                    source: io::Error::new(io::ErrorKind::Other, "log is refusing writes"),
                });
            }
        }
        entries.push(Entry {
            at: Local::now(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDateTime;

    use super::{FileJobLog, JobLog, MemoryJobLog, TIMESTAMP_FORMAT};
    use crate::error::Error;

    fn split_stamp(line: &str) -> (&str, &str) {
        // "YYYY/MM/DD HH:MM:SS" is 19 bytes.
        (&line[..19], &line[20..])
    }

    #[test]
    fn file_log_appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testLogs");
        let log = FileJobLog::new(&path);
        assert!(!path.exists());

        log.append("sent job 1").unwrap();
        log.append("received job 1").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let (stamp, text) = split_stamp(lines[0]);
        assert!(NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(text, "sent job 1");
        assert_eq!(split_stamp(lines[1]).1, "received job 1");
    }

    #[test]
    fn file_log_keeps_existing_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testLogs");
        fs::write(&path, "earlier\n").unwrap();

        FileJobLog::new(&path).append("later").unwrap();
        FileJobLog::new(&path).append("latest").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "earlier");
        assert_eq!(split_stamp(lines[1]).1, "later");
        assert_eq!(split_stamp(lines[2]).1, "latest");
    }

    #[test]
    fn file_log_on_a_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileJobLog::new(dir.path());
        match log.append("sent job 1") {
            Err(Error::LogSinkUnavailable { destination, .. }) => {
                assert_eq!(destination, dir.path().display().to_string());
            }
            other => panic!("expected LogSinkUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn memory_log_records_in_order() {
        let log = MemoryJobLog::new("mem");
        assert!(log.is_empty());
        log.append("a").unwrap();
        log.append("b").unwrap();
        assert_eq!(log.messages(), vec!["a", "b"]);
        let lines = log.lines();
        assert_eq!(split_stamp(&lines[1]).1, "b");
    }

    #[test]
    fn memory_log_fails_after_limit() {
        let log = MemoryJobLog::failing_after("mem", 1);
        log.append("ok").unwrap();
        let err = log.append("refused").unwrap_err();
        assert!(matches!(err, Error::LogSinkUnavailable { .. }));
        assert_eq!(log.len(), 1);
    }
}
