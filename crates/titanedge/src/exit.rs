use std::fmt;
use std::io;

use titanedge_protocol::{ConfigError, ProtocolError};
use titanedge_rpc::RpcError;
use titanedge_transport::TransportError;

// Exit codes follow the sysexits-style layout used across 3leaps tools.
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
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::ElementNotFound(_) => USAGE,
        TransportError::AddressInUse(_) => TRANSPORT_ERROR,
        TransportError::Closed => FAILURE,
        TransportError::Timeout(_) => TIMEOUT,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn protocol_error(context: &str, err: ProtocolError) -> CliError {
    match err {
        ProtocolError::Io(source) => io_error(context, source),
        ProtocolError::SchemaCompile { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    match err {
        ConfigError::Delivery(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

pub fn rpc_error(context: &str, err: RpcError) -> CliError {
    match err {
        RpcError::Transport(err) => transport_error(context, err),
        RpcError::Protocol(err) => protocol_error(context, err),
        RpcError::ProtocolMismatch { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use titanedge_protocol::{StateError, ValidationError};

    use super::*;

    #[test]
    fn validation_errors_are_usage() {
        let err = config_error("input", ValidationError::PortOutOfRange(70000).into());
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("input: "));
    }

    #[test]
    fn empty_batch_is_usage() {
        assert_eq!(config_error("build", StateError::EmptyBatch.into()).code, USAGE);
    }

    #[test]
    fn malformed_frames_are_data_invalid() {
        assert_eq!(protocol_error("decode", ProtocolError::InvalidMagic).code, DATA_INVALID);
    }

    #[test]
    fn rpc_errors_unwrap_to_layer_codes() {
        let err = rpc_error(
            "request",
            RpcError::Transport(TransportError::Timeout(Duration::from_secs(1))),
        );
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(rpc_error("request", RpcError::EmptyRequest).code, USAGE);
    }
}
