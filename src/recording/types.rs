use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default ring buffer capacity in bytes (1 MiB, ~6 seconds of stereo 44.1kHz PCM).
pub const RECORD_BUFFER_SIZE: usize = 1_048_576;

/// Buffered file sink capacity for the writer thread.
pub const FILE_BUFFER_SIZE: usize = 131_072;

/// Recorder lifecycle state. Owned exclusively by the recorder facade;
/// only one session is ever active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Stopped,
    Recording,
}

/// Command accepted by `RadioRecorder::set_state`. `Toggle` is dispatched to
/// start or stop based on the current state and is never stored as a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCommand {
    Start,
    Stop,
    Toggle,
}

/// End-of-session report delivered to the notification callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub path: PathBuf,
    /// Wall-clock seconds between start and stop
    pub duration_secs: u64,
    /// PCM data bytes written to the file (excludes the 44-byte header)
    pub data_bytes: u64,
    /// True when audio was lost (ring buffer overflow) or an I/O error left
    /// the file incomplete or its header provisional
    pub degraded: bool,
}

/// Construction-time settings for [`crate::RadioRecorder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Writable directory resolved by the caller; one file per session
    pub output_dir: PathBuf,
    /// Ring buffer capacity in bytes
    pub ring_capacity: usize,
}

impl RecorderConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            output_dir: PathBuf::from("."),
            ring_capacity: RECORD_BUFFER_SIZE,
        }
    }
}
