//! The write-ahead log: logs manager (encode/decode + segment I/O) and the
//! group-commit batcher sitting in front of it.

use crate::error::WalError;
use crate::request::{encode_batch, Command, Request};
use crate::segment::{self, SegmentWriter};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default max size of one WAL segment before rotation.
pub const DEFAULT_SEGMENT_SIZE: u64 = 64 * 1024 * 1024;

/// Immutable WAL configuration, fixed once the WAL is started.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_segment_size: u64,
    pub flushing_batch_size: usize,
    pub flushing_batch_timeout: Duration,
    pub data_directory: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_SEGMENT_SIZE,
            flushing_batch_size: 100,
            flushing_batch_timeout: Duration::from_millis(100),
            data_directory: PathBuf::from("./data/wal"),
        }
    }
}

/// Encodes/decodes Request records against the segment files on disk.
pub struct LogsManager {
    dir: PathBuf,
    writer: Mutex<SegmentWriter>,
}

impl LogsManager {
    pub fn open(settings: &Settings) -> Result<Self, WalError> {
        std::fs::create_dir_all(&settings.data_directory)?;
        Ok(Self {
            dir: settings.data_directory.clone(),
            writer: Mutex::new(SegmentWriter::new(
                settings.data_directory.clone(),
                settings.max_segment_size,
            )),
        })
    }

    /// Encodes every Request in `batch` into one contiguous buffer, appends
    /// it as a single segment write, fsyncs, then signals each Request's
    /// ack with the write's result — unconditionally, and with the same
    /// result for every member of the batch.
    pub fn write(&self, batch: &mut [Request]) -> Result<(), WalError> {
        let encoded = encode_batch(batch);
        let result = self.writer.lock().append(&encoded);
        for req in batch.iter_mut() {
            req.signal(result.clone());
        }
        result
    }

    /// Reads every segment in ascending name order, decoding sequentially
    /// into a flat ordered sequence of Requests. Stops at the first decode
    /// failure encountered.
    pub fn read_all(&self) -> Result<Vec<Request>, WalError> {
        let mut all = Vec::new();
        for name in segment::list_segments(&self.dir)? {
            let data = segment::read_segment(&self.dir, &name)?;
            all.extend(crate::request::decode_all(&data)?);
        }
        Ok(all)
    }
}

/// Group-commit batcher sitting in front of the logs manager.
///
/// `submit` is the producer path: it enqueues a Request and blocks on its
/// ack, returning once the batch containing it has been durably written
/// (or failed). A single long-lived flusher thread owns the segment
/// writer exclusively, so batches reach disk strictly in formation order.
pub struct Wal {
    logs: Arc<LogsManager>,
    buffer: Arc<Mutex<Vec<Request>>>,
    flush_tx: Mutex<Option<SyncSender<Vec<Request>>>>,
    batch_size: usize,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl Wal {
    /// Opens the WAL and starts its flusher thread.
    pub fn open(settings: Settings) -> Result<Arc<Self>, WalError> {
        let logs = Arc::new(LogsManager::open(&settings)?);
        let buffer = Arc::new(Mutex::new(Vec::new()));
        // Capacity 1: a size-triggered flush that finds the channel still
        // full means a flush is already in flight; the producer blocks
        // here holding the buffer lock, which is the back-pressure the
        // batcher relies on to bound in-flight batches to two.
        let (flush_tx, flush_rx) = sync_channel(1);

        let wal = Arc::new(Self {
            logs: logs.clone(),
            buffer: buffer.clone(),
            flush_tx: Mutex::new(Some(flush_tx)),
            batch_size: settings.flushing_batch_size.max(1),
            flusher: Mutex::new(None),
        });

        let timeout = settings.flushing_batch_timeout;
        let handle = std::thread::Builder::new()
            .name("wal-flusher".to_string())
            .spawn(move || flusher_loop(logs, buffer, flush_rx, timeout))
            .expect("failed to spawn WAL flusher thread");
        *wal.flusher.lock() = Some(handle);

        Ok(wal)
    }

    /// Enqueues a `SET key value` mutation and blocks until it is durable.
    pub fn set(&self, key: &str, value: &str) -> Result<(), WalError> {
        self.submit(Command::Set, vec![key.to_string(), value.to_string()])
    }

    /// Enqueues a `DEL key` mutation and blocks until it is durable.
    pub fn del(&self, key: &str) -> Result<(), WalError> {
        self.submit(Command::Del, vec![key.to_string()])
    }

    fn submit(&self, command: Command, args: Vec<String>) -> Result<(), WalError> {
        let (request, ack_rx) = Request::new(command, args);

        {
            let mut buf = self.buffer.lock();
            buf.push(request);
            if buf.len() == self.batch_size {
                let batch = std::mem::take(&mut *buf);
                // Lock is still held: send while `buf` is locked so any
                // producer racing to append blocks on the mutex instead
                // of silently interleaving with the batch we just cut.
                let tx = self.flush_tx.lock();
                if let Some(tx) = tx.as_ref() {
                    let _ = tx.send(batch);
                }
            }
        }

        ack_rx.recv().map_err(|_| WalError::Closed)?
    }

    /// Reads every record ever written, in replay order. Used for
    /// boot-time recovery before any client is served.
    pub fn read_all(&self) -> Result<Vec<Request>, WalError> {
        self.logs.read_all()
    }

    /// Signals the flusher to drain its buffer to disk and stop, then
    /// waits for it to finish. Idempotent.
    pub fn close(&self) {
        let tx = self.flush_tx.lock().take();
        drop(tx); // disconnects flush_rx, the flusher's cancellation signal
        if let Some(handle) = self.flusher.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        self.close();
    }
}

/// The flusher: single long-lived worker selecting among cancellation
/// (channel disconnect), a size-triggered batch arriving on `flush_rx`,
/// and its own timeout firing.
fn flusher_loop(
    logs: Arc<LogsManager>,
    buffer: Arc<Mutex<Vec<Request>>>,
    flush_rx: Receiver<Vec<Request>>,
    timeout: Duration,
) {
    loop {
        match flush_rx.recv_timeout(timeout) {
            Ok(mut batch) => {
                if let Err(e) = logs.write(&mut batch) {
                    tracing::warn!("WAL flush (size-triggered) failed: {e}");
                }
                // recv_timeout's own clock restarts on the next call, so
                // the idle window is measured since this flush, not since
                // whatever tick would otherwise have fired next.
            }
            Err(RecvTimeoutError::Timeout) => {
                let mut batch = {
                    let mut buf = buffer.lock();
                    if buf.is_empty() {
                        continue;
                    }
                    std::mem::take(&mut *buf)
                };
                if let Err(e) = logs.write(&mut batch) {
                    tracing::warn!("WAL flush (timeout-triggered) failed: {e}");
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                let mut batch = std::mem::take(&mut *buffer.lock());
                if !batch.is_empty() {
                    if let Err(e) = logs.write(&mut batch) {
                        tracing::warn!("WAL drain on shutdown failed: {e}");
                    }
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            max_segment_size: DEFAULT_SEGMENT_SIZE,
            flushing_batch_size: 2,
            flushing_batch_timeout: Duration::from_millis(50),
            data_directory: dir.to_path_buf(),
        }
    }

    #[test]
    fn set_and_del_round_trip_through_read_all() {
        let dir = TempDir::new().unwrap();
        let wal = Wal::open(settings(dir.path())).unwrap();

        wal.set("ozzy", "osbourne").unwrap();
        wal.set("lemmy", "kilmister").unwrap();
        wal.del("lemmy").unwrap();
        wal.close();

        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].args, vec!["ozzy", "osbourne"]);
        assert_eq!(records[2].command, Command::Del);
    }

    #[test]
    fn size_triggered_flush_is_fast() {
        let dir = TempDir::new().unwrap();
        let mut long_timeout = settings(dir.path());
        long_timeout.flushing_batch_timeout = Duration::from_secs(5);
        long_timeout.flushing_batch_size = 2;
        let wal = Wal::open(long_timeout).unwrap();

        let wal_a = wal.clone();
        let start = std::time::Instant::now();
        let t1 = std::thread::spawn(move || wal_a.set("k1", "v1").unwrap());
        let t2 = std::thread::spawn(move || wal.set("k2", "v2").unwrap());
        t1.join().unwrap();
        t2.join().unwrap();

        assert!(
            start.elapsed() < Duration::from_secs(1),
            "size-triggered flush should not wait for the timeout"
        );
    }

    #[test]
    fn timeout_triggered_flush_fires_around_configured_duration() {
        let dir = TempDir::new().unwrap();
        let mut cfg = settings(dir.path());
        cfg.flushing_batch_size = 100;
        cfg.flushing_batch_timeout = Duration::from_millis(100);
        let wal = Wal::open(cfg).unwrap();

        let start = std::time::Instant::now();
        wal.set("only", "one").unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(90));
        assert!(elapsed < Duration::from_millis(500));
    }

    #[test]
    fn recovery_after_restart_preserves_order() {
        let dir = TempDir::new().unwrap();
        {
            let wal = Wal::open(settings(dir.path())).unwrap();
            wal.set("a", "1").unwrap();
            wal.set("b", "2").unwrap();
            wal.close();
        }
        {
            let wal = Wal::open(settings(dir.path())).unwrap();
            let records = wal.read_all().unwrap();
            assert_eq!(records.len(), 2);
            assert_eq!(records[0].args[0], "a");
            assert_eq!(records[1].args[0], "b");
        }
    }
}
