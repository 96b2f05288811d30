//! Buffered WAV recording for FM radio capture.
//!
//! An external tuner pipeline hands decoded 16-bit PCM bytes to
//! [`RadioRecorder::write`] on its own thread. A lock-free SPSC ring buffer
//! absorbs the stream and a dedicated writer thread drains it to a WAV file,
//! so the producer path never touches disk I/O. When the session stops, the
//! writer thread drains the remaining bytes and patches the WAV header size
//! fields in place.

pub mod recording;

pub use recording::{
    RadioRecorder, RecordCommand, RecordError, RecorderConfig, RecorderState, RecordingSummary,
    RingBuffer,
};
