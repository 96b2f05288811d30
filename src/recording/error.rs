use std::io;
use std::path::PathBuf;

/// Typed recording errors.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to create output file {path:?}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Ring buffer overflow: {requested} bytes requested, {free} free")]
    Overflow { requested: usize, free: usize },
    #[error("Recording already in progress")]
    AlreadyRecording,
    #[error("Failed to spawn writer thread: {0}")]
    WriterSpawn(#[source] io::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
