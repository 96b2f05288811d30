pub mod error;
pub mod ring_buffer;
pub mod types;
pub mod wav;
pub mod writer;

pub use error::RecordError;
pub use ring_buffer::RingBuffer;
pub use types::{
    RecordCommand, RecorderConfig, RecorderState, RecordingSummary, FILE_BUFFER_SIZE,
    RECORD_BUFFER_SIZE,
};
pub use writer::{WriterControl, IDLE_WAIT};

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

/// Returns the tuned frequency in kHz at session start.
type FrequencySource = Box<dyn Fn() -> u32 + Send + Sync>;
/// Receives the end-of-session summary for display.
type SummarySink = Box<dyn Fn(RecordingSummary) + Send + Sync>;

/// Session filename: `FM-HHMMSS-FFFF.wav`, local wall-clock time at start
/// plus the zero-padded frequency label (tuned kHz / 100).
fn session_filename(time: chrono::NaiveTime, freq_label: u32) -> String {
    format!("FM-{}-{:04}.wav", time.format("%H%M%S"), freq_label)
}

/// One start-to-stop recording: the ring buffer, writer thread, and output
/// file bundle. Destroyed when the writer thread is joined.
struct Session {
    ring: Arc<RingBuffer>,
    ctl: Arc<WriterControl>,
    handle: JoinHandle<u64>,
    path: PathBuf,
    started: Instant,
}

/// Recorder facade: owns the `{Stopped, Recording}` state machine and at most
/// one active [`Session`].
///
/// Threading contract: the tuner pipeline calls [`write`](Self::write)
/// synchronously on its own thread and that path never blocks on I/O: it
/// only pushes into the lock-free ring. All disk work happens on the
/// `wav-writer` thread, which also finalizes the header and closes the file
/// on its own shutdown path. `start`/`stop`/`set_state` belong to a control
/// thread and may block briefly (file creation, thread join).
pub struct RadioRecorder {
    config: RecorderConfig,
    frequency_khz: Option<FrequencySource>,
    on_stopped: Option<SummarySink>,
    /// Fast-path state flag checked by write() before touching the session
    recording: AtomicBool,
    session: Mutex<Option<Session>>,
}

impl RadioRecorder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self::with_config(RecorderConfig::new(sample_rate, channels))
    }

    pub fn with_config(config: RecorderConfig) -> Self {
        Self {
            config,
            frequency_khz: None,
            on_stopped: None,
            recording: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    /// Install the tuned-frequency source used for the filename label.
    pub fn with_frequency_source(
        mut self,
        source: impl Fn() -> u32 + Send + Sync + 'static,
    ) -> Self {
        self.frequency_khz = Some(Box::new(source));
        self
    }

    /// Install the callback that receives the end-of-session summary.
    pub fn with_notification(
        mut self,
        sink: impl Fn(RecordingSummary) + Send + Sync + 'static,
    ) -> Self {
        self.on_stopped = Some(Box::new(sink));
        self
    }

    pub fn state(&self) -> RecorderState {
        if self.recording.load(Ordering::Acquire) {
            RecorderState::Recording
        } else {
            RecorderState::Stopped
        }
    }

    /// Start a new session. No-op returning `false` unless currently stopped;
    /// any setup failure tears down partial state and returns `false`.
    pub fn start(&self) -> bool {
        // A forced stop (overflow or size cap) leaves its finished session
        // behind; join it and report before starting anew
        self.reap_leftover();
        match self.try_start() {
            Ok(path) => {
                log::info!("Recording to {:?}", path);
                true
            }
            Err(RecordError::AlreadyRecording) => {
                log::debug!("start(): already recording");
                false
            }
            Err(e) => {
                log::error!("Failed to start recording: {}", e);
                false
            }
        }
    }

    /// Join a session abandoned by a forced stop and emit its summary.
    /// Runs outside the session lock so the notification callback is free to
    /// call back into the recorder.
    fn reap_leftover(&self) {
        let leftover = {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            if self.recording.load(Ordering::Acquire) {
                None
            } else {
                guard.take()
            }
        };
        if let Some(old) = leftover {
            self.reap(old);
        }
    }

    fn try_start(&self) -> Result<PathBuf, RecordError> {
        let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if self.recording.load(Ordering::Acquire) || guard.is_some() {
            return Err(RecordError::AlreadyRecording);
        }

        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| RecordError::CreateFile {
            path: self.config.output_dir.clone(),
            source: e,
        })?;

        let label = self.frequency_khz.as_ref().map(|f| f() / 100).unwrap_or(0);
        let filename = session_filename(chrono::Local::now().time(), label);
        let path = self.config.output_dir.join(filename);

        let file = File::create(&path).map_err(|e| RecordError::CreateFile {
            path: path.clone(),
            source: e,
        })?;
        let mut sink = BufWriter::with_capacity(FILE_BUFFER_SIZE, file);
        if let Err(e) = wav::write_header(&mut sink, self.config.channels, self.config.sample_rate)
        {
            drop(sink);
            let _ = std::fs::remove_file(&path);
            return Err(RecordError::Io(e));
        }

        let ring = Arc::new(RingBuffer::new(self.config.ring_capacity));
        let ctl = Arc::new(WriterControl::new());
        let handle =
            match writer::spawn_writer_thread(Arc::clone(&ring), Arc::clone(&ctl), sink, path.clone())
            {
                Ok(h) => h,
                Err(e) => {
                    let _ = std::fs::remove_file(&path);
                    return Err(RecordError::WriterSpawn(e));
                }
            };

        *guard = Some(Session {
            ring,
            ctl,
            handle,
            path: path.clone(),
            started: Instant::now(),
        });
        self.recording.store(true, Ordering::Release);
        Ok(path)
    }

    /// Hand a chunk of PCM bytes to the active session. No-op when stopped.
    ///
    /// Never blocks and never surfaces I/O errors to the caller: a ring
    /// overflow forces a stop and marks the session degraded, since audio was
    /// about to be lost.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() || !self.recording.load(Ordering::Acquire) {
            return;
        }
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sess) = guard.as_ref() else {
            return;
        };

        // The WAV data size is a u32 field; stop cleanly before the file
        // written so far plus the ring backlog could overflow it
        let pending = sess.ctl.data_bytes() + sess.ring.available() as u64;
        if pending + data.len() as u64 > wav::MAX_DATA_BYTES {
            log::warn!(
                "Maximum WAV data size reached ({} bytes pending), stopping recording",
                pending
            );
            self.force_stop(sess, false);
            return;
        }

        if let Err(e) = sess.ring.push(data) {
            log::error!("{}; stopping, session is incomplete", e);
            self.force_stop(sess, true);
        }
    }

    /// Non-blocking stop used on the producer path: flips state and signals
    /// the writer. The session bundle stays behind for the next `start()` or
    /// `stop()` to join and report.
    fn force_stop(&self, sess: &Session, degraded: bool) {
        if degraded {
            sess.ctl.mark_degraded();
        }
        self.recording.store(false, Ordering::Release);
        sess.ctl.request_stop();
    }

    /// Stop the active session. Idempotent; finalize runs inside the writer
    /// thread's shutdown path so the last drained byte always precedes it.
    pub fn stop(&self) {
        let taken = {
            let mut guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        self.recording.store(false, Ordering::Release);
        let Some(sess) = taken else {
            log::debug!("stop(): no active session");
            return;
        };
        sess.ctl.request_stop();
        self.reap(sess);
    }

    /// Join the finished writer thread and emit the end-of-session summary.
    fn reap(&self, sess: Session) {
        let Session {
            ctl,
            handle,
            path,
            started,
            ..
        } = sess;
        let duration_secs = started.elapsed().as_secs();
        let data_bytes = match handle.join() {
            Ok(n) => n,
            Err(_) => {
                log::error!("Writer thread panicked for {:?}", path);
                ctl.data_bytes()
            }
        };
        let degraded = ctl.is_degraded();
        if data_bytes == 0 && !degraded {
            return;
        }

        let summary = RecordingSummary {
            path,
            duration_secs,
            data_bytes,
            degraded,
        };
        log::info!(
            "Recorded {}s, {:.1} MB to {:?}{}",
            summary.duration_secs,
            summary.data_bytes as f64 / 1024.0 / 1024.0,
            summary.path,
            if summary.degraded { " (degraded)" } else { "" }
        );
        if let Some(sink) = &self.on_stopped {
            sink(summary);
        }
    }

    /// Dispatch a state command; `Toggle` inspects the current state.
    pub fn set_state(&self, cmd: RecordCommand) {
        match cmd {
            RecordCommand::Start => {
                self.start();
            }
            RecordCommand::Stop => self.stop(),
            RecordCommand::Toggle => {
                if self.recording.load(Ordering::Acquire) {
                    self.stop();
                } else {
                    self.start();
                }
            }
        }
    }

    /// Wall-clock seconds since the current session's `start()` was accepted;
    /// 0 when no session exists.
    pub fn current_duration_seconds(&self) -> u64 {
        let guard = self.session.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .as_ref()
            .map(|s| s.started.elapsed().as_secs())
            .unwrap_or(0)
    }
}
