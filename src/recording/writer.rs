use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use super::ring_buffer::RingBuffer;
use super::wav;

/// How long the writer parks when the ring is empty. A stop request wakes it
/// immediately; worst-case stop latency without a wake is one interval.
pub const IDLE_WAIT: Duration = Duration::from_secs(1);

// ── Writer thread control block ──

/// Shared between the recorder facade, the producer path, and the writer
/// thread. Cancellation is cooperative: `request_stop` clears the active flag
/// and wakes a parked writer, which re-checks the flag after every wake.
pub struct WriterControl {
    /// False = writer drains remaining bytes and exits
    active: AtomicBool,
    /// True = the writer patches the WAV header sizes on exit
    finish_requested: AtomicBool,
    /// PCM bytes written to the file. Written only by the writer thread;
    /// other threads read a possibly-stale snapshot for reporting.
    data_bytes: AtomicU64,
    /// Set when bytes were dropped or an I/O error hit the drain/finalize path
    degraded: AtomicBool,
    idle: Mutex<()>,
    wake: Condvar,
}

impl WriterControl {
    /// Fresh control block for a new session; finish is armed up front so the
    /// eventual stop always finalizes the header.
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(true),
            finish_requested: AtomicBool::new(true),
            data_bytes: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
            idle: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Signal the writer to drain and exit, waking it if parked.
    pub fn request_stop(&self) {
        self.active.store(false, Ordering::Release);
        // Taking the lock orders the store against a writer that is between
        // its active check and its wait
        if let Ok(_guard) = self.idle.lock() {
            self.wake.notify_all();
        }
    }

    pub fn data_bytes(&self) -> u64 {
        self.data_bytes.load(Ordering::Acquire)
    }

    pub fn mark_degraded(&self) {
        self.degraded.store(true, Ordering::Release);
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    /// Park until woken or `timeout` elapses. Returns the active flag as
    /// observed under the lock, so a stop request issued between the caller's
    /// empty check and the wait is never missed.
    fn park(&self, timeout: Duration) -> bool {
        match self.idle.lock() {
            Ok(guard) => {
                if !self.active.load(Ordering::Acquire) {
                    return false;
                }
                let _ = self.wake.wait_timeout(guard, timeout);
            }
            Err(_) => std::thread::sleep(timeout),
        }
        self.active.load(Ordering::Acquire)
    }
}

impl Default for WriterControl {
    fn default() -> Self {
        Self::new()
    }
}

// ── Writer thread ──

/// Spawn the dedicated writer thread that drains the ring buffer into `sink`.
///
/// The thread owns the file sink and tears it down on exit: final drain,
/// flush, then header finalize when finish was requested, so bytes pushed
/// concurrently with a stop request always land ahead of finalize. Yields the
/// total PCM bytes written on join.
pub fn spawn_writer_thread(
    ring: Arc<RingBuffer>,
    ctl: Arc<WriterControl>,
    sink: BufWriter<File>,
    path: PathBuf,
) -> std::io::Result<JoinHandle<u64>> {
    std::thread::Builder::new()
        .name("wav-writer".into())
        .spawn(move || run_writer_loop(&ring, &ctl, sink, &path))
}

fn run_writer_loop(
    ring: &RingBuffer,
    ctl: &WriterControl,
    mut sink: BufWriter<File>,
    path: &std::path::Path,
) -> u64 {
    loop {
        let span = ring.pop_available();
        if span.is_empty() {
            if !ctl.park(IDLE_WAIT) {
                break;
            }
            continue;
        }
        drain_span(ring, ctl, &mut sink, span);
    }

    // Final drain after the stop signal; a wrapped backlog takes two rounds
    loop {
        let span = ring.pop_available();
        if span.is_empty() {
            break;
        }
        drain_span(ring, ctl, &mut sink, span);
    }

    if let Err(e) = sink.flush() {
        log::error!("Failed to flush WAV sink for {:?}: {}", path, e);
        ctl.mark_degraded();
    }
    drop(sink);

    let total = ctl.data_bytes.load(Ordering::Acquire);
    if ctl.finish_requested.swap(false, Ordering::AcqRel) && total > 0 {
        // total stays below wav::MAX_DATA_BYTES: the producer path stops the
        // session before the u32 size fields can overflow
        if let Err(e) = wav::finalize(path, total as u32) {
            log::error!(
                "Failed to finalize WAV header for {:?}: {}; size fields left provisional",
                path,
                e
            );
            ctl.mark_degraded();
        }
    }

    log::info!(
        "Writer thread finished: {} PCM bytes to {:?}. Ring telemetry: overruns={}, max_fill={}/{}",
        total,
        path,
        ring.overruns(),
        ring.max_fill(),
        ring.capacity()
    );
    total
}

fn drain_span(ring: &RingBuffer, ctl: &WriterControl, sink: &mut BufWriter<File>, span: &[u8]) {
    let len = span.len();
    match sink.write_all(span) {
        Ok(()) => {
            ctl.data_bytes.fetch_add(len as u64, Ordering::Release);
        }
        Err(e) => {
            // Best effort: drop the span and keep draining so the producer
            // side never stalls; the session is reported as degraded
            log::error!("WAV drain write failed, dropping {} bytes: {}", len, e);
            ctl.mark_degraded();
        }
    }
    ring.advance(len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Instant;

    fn spawn_session(
        dir: &std::path::Path,
        ring_capacity: usize,
    ) -> (Arc<RingBuffer>, Arc<WriterControl>, JoinHandle<u64>, PathBuf) {
        let path = dir.join("session.wav");
        let file = File::create(&path).unwrap();
        let mut sink = BufWriter::new(file);
        wav::write_header(&mut sink, 2, 44_100).unwrap();

        let ring = Arc::new(RingBuffer::new(ring_capacity));
        let ctl = Arc::new(WriterControl::new());
        let handle =
            spawn_writer_thread(Arc::clone(&ring), Arc::clone(&ctl), sink, path.clone()).unwrap();
        (ring, ctl, handle, path)
    }

    #[test]
    fn drains_pending_bytes_and_finalizes_on_stop() {
        let dir = tempfile::tempdir().unwrap();
        let (ring, ctl, handle, path) = spawn_session(dir.path(), 1024);

        let payload: Vec<u8> = (0..200u16).map(|i| i as u8).collect();
        ring.push(&payload).unwrap();
        ctl.request_stop();

        assert_eq!(handle.join().unwrap(), 200);

        let contents = fs::read(&path).unwrap();
        assert_eq!(contents.len(), wav::HEADER_LEN + 200);
        assert_eq!(&contents[wav::HEADER_LEN..], &payload[..]);

        let info = wav::read_header(&path).unwrap();
        assert_eq!(info.data_len, 200);
        assert!(wav::is_finalized(&path));
        assert!(!ctl.is_degraded());
    }

    #[test]
    fn stop_wakes_parked_writer_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let (_ring, ctl, handle, _path) = spawn_session(dir.path(), 256);

        // Let the writer reach its idle park
        std::thread::sleep(Duration::from_millis(50));

        let t = Instant::now();
        ctl.request_stop();
        handle.join().unwrap();
        // Well under the 1s idle interval: the condvar wake must be honored
        assert!(t.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn zero_byte_session_leaves_header_provisional() {
        let dir = tempfile::tempdir().unwrap();
        let (_ring, ctl, handle, path) = spawn_session(dir.path(), 256);

        ctl.request_stop();
        assert_eq!(handle.join().unwrap(), 0);

        // finalize(0) would be a no-op by value, so the reopen is skipped
        assert_eq!(fs::read(&path).unwrap().len(), wav::HEADER_LEN);
        assert!(!wav::is_finalized(&path));
    }

    #[test]
    fn wrapped_backlog_is_fully_drained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrapped.wav");
        let file = File::create(&path).unwrap();
        let mut sink = BufWriter::new(file);
        wav::write_header(&mut sink, 1, 8_000).unwrap();

        // Pre-wrap the ring before the writer thread exists, so the backlog
        // crosses the buffer boundary when the final drain runs
        let ring = Arc::new(RingBuffer::new(16));
        ring.push(&[0u8; 12]).unwrap();
        let span = ring.pop_available().to_vec();
        ring.advance(span.len());
        let payload: Vec<u8> = (1u8..=14).collect();
        ring.push(&payload).unwrap();

        let ctl = Arc::new(WriterControl::new());
        ctl.request_stop();
        let handle =
            spawn_writer_thread(Arc::clone(&ring), Arc::clone(&ctl), sink, path.clone()).unwrap();

        assert_eq!(handle.join().unwrap(), 14);
        let contents = fs::read(&path).unwrap();
        assert_eq!(&contents[wav::HEADER_LEN..], &payload[..]);
        assert_eq!(wav::read_header(&path).unwrap().data_len, 14);
    }
}
