//! Error types shared by the window manager core and the X11 backend.

use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

pub type Result<T> = std::result::Result<T, WmError>;

#[derive(Debug, Error)]
pub enum WmError {
    #[error("failed to open display: {0}")]
    Connect(#[from] ConnectError),
    #[error("X connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("X request failed: {0}")]
    Protocol(String),
    #[error("X resource ids exhausted")]
    IdsExhausted,
    #[error("another window manager is already running on screen {0}")]
    OtherWmRunning(usize),
    #[error("no usable font for the outline label (tried {0:?})")]
    NoFont(String),
}

impl WmError {
    /// Errors that only concern a single window.  The window probably vanished
    /// while we were talking about it; the caller drops the client and carries on.
    pub fn is_protocol(&self) -> bool {
        matches!(self, WmError::Protocol(_))
    }
}

impl From<ReplyError> for WmError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::ConnectionError(e) => WmError::Connection(e),
            ReplyError::X11Error(e) => WmError::Protocol(format!(
                "{:?} (major {}, resource {:#x})",
                e.error_kind, e.major_opcode, e.bad_value
            )),
        }
    }
}

impl From<ReplyOrIdError> for WmError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::ConnectionError(e) => WmError::Connection(e),
            ReplyOrIdError::X11Error(e) => WmError::Protocol(format!(
                "{:?} (major {}, resource {:#x})",
                e.error_kind, e.major_opcode, e.bad_value
            )),
            ReplyOrIdError::IdsExhausted => WmError::IdsExhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_protocol_errors_are_per_window() {
        assert!(WmError::Protocol("BadWindow".into()).is_protocol());
        assert!(!WmError::OtherWmRunning(0).is_protocol());
        assert!(!WmError::NoFont("fixed".into()).is_protocol());
    }

    #[test]
    fn running_out_of_ids_is_fatal() {
        let err = WmError::from(ReplyOrIdError::IdsExhausted);
        assert!(matches!(err, WmError::IdsExhausted));
        assert!(!err.is_protocol());
    }
}
