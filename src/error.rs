use thiserror::Error;

/// Errors the driver can report.
///
/// The numeric taxonomy of the SEN55 protocol is kept as-is; the
/// `Display` strings match the device documentation so they can be shown
/// to an operator directly.
#[derive(Clone, Copy, Hash, Debug, PartialEq, Eq, PartialOrd, Ord, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Often transient: the device had not finished converting when the
    /// response was clocked out. Read transactions retry this a bounded
    /// number of times before surfacing it.
    #[error("wrong data length for this command (too much or little data)")]
    DataLength,
    #[error("unknown command")]
    UnknownCommand,
    #[error("no access right for command")]
    AccessDenied,
    #[error("illegal command parameter or parameter out of allowed range")]
    InvalidParameter,
    #[error("internal function argument out of range")]
    OutOfRange,
    #[error("command not allowed in current state")]
    IllegalState,
    #[error("no response received within timeout period")]
    Timeout,
    /// Checksum mismatch or malformed response.
    #[error("protocol error")]
    Protocol,
    #[error("not supported on this SEN55 firmware level")]
    FirmwareUnsupported,
    #[error(transparent)]
    I2c(#[from] E),
}

impl<E> embedded_hal::i2c::Error for Error<E>
where
    E: embedded_hal::i2c::Error,
{
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self {
            Self::I2c(err) => err.kind(),
            _ => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}
