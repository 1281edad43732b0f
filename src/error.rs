//! Error types for artic-audio.

use thiserror::Error;

/// Error type for artic-audio operations.
///
/// Underrun and dropped-frame conditions are deliberately absent: they are
/// reported through the analysis channel and the bounded-write return value,
/// and never abort a running session.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("audio service unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("port registration failed: {0}")]
    PortRegistration(String),

    #[error("device client state: {0}")]
    ClientState(String),

    #[error("audio device shut down")]
    DeviceLost,

    #[error("playback failed: {0}")]
    Playback(String),

    #[error("audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[error("failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
