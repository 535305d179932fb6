//! Segment file manager.
//!
//! A segment is an append-only file named `wal_<unix_millis>.log`;
//! lexicographic filename order equals creation order. `SegmentWriter`
//! owns at most one active segment at a time and rotates to a new one
//! when the active segment would exceed `max_size`.

use crate::error::WalError;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const PREFIX: &str = "wal_";
const SUFFIX: &str = ".log";

/// Formats a segment filename from a millisecond timestamp.
pub fn segment_filename(unix_millis: u128) -> String {
    format!("{PREFIX}{unix_millis}{SUFFIX}")
}

/// Parses a segment filename back into its millisecond timestamp.
/// Returns `None` for names that don't match `wal_<digits>.log` exactly.
pub fn parse_segment_filename(name: &str) -> Option<u128> {
    let digits = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn now_unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis()
}

/// Lists segment filenames present in `dir`, sorted lexicographically
/// ascending (which equals creation order for this naming scheme).
/// Non-matching entries (subdirectories, other files) are ignored.
pub fn list_segments(dir: &Path) -> Result<Vec<String>, WalError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if parse_segment_filename(&name).is_some() {
            names.push(name.into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Returns the lexicographically-largest segment filename in `dir`.
pub fn segment_last(dir: &Path) -> Result<String, WalError> {
    list_segments(dir)?
        .into_iter()
        .next_back()
        .ok_or(WalError::NoSegmentsFound)
}

/// Returns the segment filename strictly greater than `after`, or `None`
/// if `after` is already the newest (or there are no segments). An empty
/// `after` matches against the very first segment, if any.
pub fn segment_next(dir: &Path, after: &str) -> Result<Option<String>, WalError> {
    Ok(list_segments(dir)?
        .into_iter()
        .find(|name| name.as_str() > after))
}

/// Reads the full contents of `dir/name`.
pub fn read_segment(dir: &Path, name: &str) -> Result<Vec<u8>, WalError> {
    let mut file = File::open(dir.join(name))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Writes `data` as a brand-new segment file named from `name`, truncating
/// any existing file of that name, then fsyncs it. Used by the replication
/// slave to persist a segment pulled from the master.
pub fn write_segment(dir: &Path, name: &str, data: &[u8]) -> Result<(), WalError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(dir.join(name))?;
    file.write_all(data)?;
    file.sync_data()?;
    Ok(())
}

/// Owns the single active segment a WAL writes to, rotating as needed.
pub struct SegmentWriter {
    dir: PathBuf,
    max_size: u64,
    active: Option<(File, u64)>,
}

impl SegmentWriter {
    pub fn new(dir: PathBuf, max_size: u64) -> Self {
        Self {
            dir,
            max_size,
            active: None,
        }
    }

    /// Opens a fresh segment, retrying on filename collision (two rotations
    /// within the same millisecond) by waiting for the clock to advance
    /// rather than truncating a file that might already hold data.
    fn open_new_segment(&self) -> Result<(File, u64), WalError> {
        loop {
            let millis = now_unix_millis();
            let name = segment_filename(millis);
            let path = self.dir.join(&name);
            match OpenOptions::new()
                .create_new(true)
                .read(true)
                .write(true)
                .open(&path)
            {
                Ok(file) => return Ok((file, 0)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    std::thread::yield_now();
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Appends `data` as a single write, rotating first if it would not
    /// fit in the active segment (or no segment is open yet), then fsyncs.
    pub fn append(&mut self, data: &[u8]) -> Result<(), WalError> {
        let needs_rotation = match &self.active {
            None => true,
            Some((_, size)) => *size > 0 && *size + data.len() as u64 > self.max_size,
        };
        if needs_rotation {
            self.active = Some(self.open_new_segment()?);
        }

        let (file, size) = self.active.as_mut().expect("segment just opened");
        file.write_all(data)?;
        file.sync_data()?;
        *size += data.len() as u64;
        Ok(())
    }

    /// Byte size of the currently active segment, 0 if none is open.
    pub fn active_size(&self) -> u64 {
        self.active.as_ref().map(|(_, size)| *size).unwrap_or(0)
    }
}
