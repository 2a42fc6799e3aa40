use std::fmt;
use std::io;

use avdecc_controller::ControllerError;
use avdecc_frame::FrameError;
use avdecc_transport::TransportError;

// Process exit codes.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::BufferTooSmall { .. } | FrameError::PayloadMismatch(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn controller_error(context: &str, err: ControllerError) -> CliError {
    match err {
        ControllerError::Frame(err) => frame_error(context, err),
        ControllerError::Transport(err) => transport_error(context, err),
        ControllerError::UnsupportedCommand { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ControllerError::UnknownEntity(_)
        | ControllerError::UnknownDescriptor { .. }
        | ControllerError::DescriptorRejected { .. }
        | ControllerError::Misrouted(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_failures_are_data_errors() {
        let err = frame_error("decode failed", FrameError::BadEthertype(0x0800));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode failed: "));
    }

    #[test]
    fn unsupported_command_is_usage_error() {
        let err = controller_error(
            "encode failed",
            ControllerError::UnsupportedCommand {
                descriptor_type: 0x20,
                command: avdecc_controller::CommandKind::GetCounters,
            },
        );
        assert_eq!(err.code, USAGE);
    }
}
