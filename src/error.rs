use crate::exception::ExceptionCode;
use crate::serial::{Parity, StopBits};
use crate::types::UnitId;

/// Errors that can occur while opening and configuring the serial port.
///
/// This is the only fatal surface in the crate: once the port is open, the
/// observer degrades by losing data rather than by failing.
#[derive(Debug)]
pub enum OpenError {
    /// the underlying serial port could not be opened
    Serial(tokio_serial::Error),
    /// the serial backend cannot produce this parity setting
    UnsupportedParity(Parity),
    /// the serial backend cannot produce this stop bit setting
    UnsupportedStopBits(StopBits),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenError::Serial(err) => write!(f, "unable to open serial port: {err}"),
            OpenError::UnsupportedParity(parity) => {
                write!(f, "{parity} parity is not supported by the serial backend")
            }
            OpenError::UnsupportedStopBits(stop_bits) => {
                write!(f, "{stop_bits} stop bits are not supported by the serial backend")
            }
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OpenError::Serial(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tokio_serial::Error> for OpenError {
    fn from(err: tokio_serial::Error) -> Self {
        OpenError::Serial(err)
    }
}

/// Non-fatal anomalies noticed while reconstructing bus traffic.
///
/// Anomalies never halt the observer. They are logged at WARN level and
/// reported in [`BusActivity`](crate::BusActivity) so that a polling loop can
/// inspect them without unwinding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAnomaly {
    /// a byte window too short to hold any frame was discarded
    ShortFrame(usize),
    /// checksum mismatch on a request or response: received vs computed
    BadCrc(u16, u16),
    /// the window did not begin a recognizable frame and was discarded as noise
    UnrecognizedFrame(u8, usize),
    /// a slave signalled a protocol-level error
    ExceptionFrame(UnitId, ExceptionCode),
    /// declared response byte count vs the count implied by the request
    LengthMismatch(usize, usize),
    /// no complete response was observed within the request timeout
    RequestTimeout(UnitId),
}

impl std::fmt::Display for FrameAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameAnomaly::ShortFrame(length) => {
                write!(f, "window of {length} bytes is too short for any frame")
            }
            FrameAnomaly::BadCrc(received, computed) => write!(
                f,
                "crc mismatch: received {received:#06X} computed {computed:#06X}"
            ),
            FrameAnomaly::UnrecognizedFrame(function, length) => write!(
                f,
                "discarded {length} bytes that do not begin a frame (function code {function:#04X})"
            ),
            FrameAnomaly::ExceptionFrame(unit_id, code) => {
                write!(f, "exception from unit {unit_id}: {code}")
            }
            FrameAnomaly::LengthMismatch(declared, expected) => write!(
                f,
                "response declares {declared} data bytes, request implied {expected}"
            ),
            FrameAnomaly::RequestTimeout(unit_id) => {
                write!(f, "no response from unit {unit_id} within the request timeout")
            }
        }
    }
}
