//! Crate-level error type.
//!
//! This is the *infrastructure* error channel: codec bugs, config I/O
//! failures, and socket setup errors. Device-layer failures travel as
//! [`crate::message::StatusCode`] instead and never become an [`Error`].

/// FujiNet-NIO error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A packet failed to parse (bad length, checksum, or descriptor chain).
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// Config store I/O failure.
    #[error("config store error: {0}")]
    Config(String),

    /// Socket setup or teardown failed outside of normal would-block flow.
    #[error("socket error: {0}")]
    Socket(String),

    /// A device id was already registered.
    #[error("device {0:#04x} already registered")]
    DuplicateDevice(crate::message::DeviceId),

    /// Wrapped I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
