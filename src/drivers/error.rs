use std::io;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum FaError {
    #[error("unable to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    /// Error text returned by the server in place of a successful handshake.
    #[error("{0}")]
    Protocol(String),
    #[error("receive timeout")]
    Timeout,
    #[error("connection closed by server")]
    Eof,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("channel id {0} is outside the subscription mask range")]
    InvalidChannel(usize),
    #[error("buffer capacity must be greater than zero")]
    InvalidCapacity,
    #[error("block of {len} samples does not fit a buffer of {capacity}")]
    BlockTooLarge { len: usize, capacity: usize },
    #[error("cannot read {size} samples from a buffer of {capacity}")]
    ReadTooLarge { size: usize, capacity: usize },
    #[error("invalid cadence: notify {notify_size}, update {update_size}, capacity {capacity}")]
    InvalidCadence {
        notify_size: usize,
        update_size: usize,
        capacity: usize,
    },
    #[error("window of {len} samples is not divisible by decimation {decimation}")]
    InvalidDecimation { len: usize, decimation: usize },
    #[error("timebase of {0} samples is too short")]
    InvalidTimebase(usize),
    #[error("smoothing constant {0} is outside (0, 1]")]
    InvalidFilter(f64),
    #[error("window mismatch: expected {expected} samples, got {actual}")]
    WindowMismatch { expected: usize, actual: usize },
    #[error("acquisition is already running")]
    AlreadyRunning,
}
impl FaError {
    /// True for the errors that end an active stream rather than a handshake.
    pub fn is_transport(&self) -> bool {
        matches!(self, FaError::Timeout | FaError::Eof | FaError::Io(_))
    }
}
