// SPDX-License-Identifier: AGPL-3.0-or-later

//! Crate-wide error type. One flat enum covers every kind surfaced to
//! callers; lower-level parse failures fold into it via `#[from]` the
//! same way PDU-level errors fold into the session layer upstream.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IpmiError>;

/// Structural reason a frame failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    BadChecksum,
    BadLength,
    BadVersion,
    UnexpectedClass,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DecodeErrorKind::BadChecksum => "bad_checksum",
            DecodeErrorKind::BadLength => "bad_length",
            DecodeErrorKind::BadVersion => "bad_version",
            DecodeErrorKind::UnexpectedClass => "unexpected_class",
        })
    }
}

/// Session setup step, used to name where an `auth_error` or setup
/// `timeout` occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupState {
    AuthCap,
    ChallengeReq,
    ActivateReq,
    SetPriv,
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SetupState::AuthCap => "auth_cap",
            SetupState::ChallengeReq => "challenge",
            SetupState::ActivateReq => "activate",
            SetupState::SetPriv => "set_priv",
        })
    }
}

/// IPMI completion code, classified into the mnemonics named in the
/// completion-code table; anything unrecognized keeps its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionCode {
    NodeBusy,
    InvalidCommand,
    InvalidCommandForLun,
    Timeout,
    OutOfSpace,
    ReservationCanceled,
    RequestDataTruncated,
    RequestDataLengthInvalid,
    ParameterOutOfRange,
    CannotReturnRequestedBytes,
    RequestedDataNotPresent,
    InvalidDataFieldInRequest,
    CommandIllegalForSensor,
    ResponseCouldNotBeProvided,
    CannotExecuteDuplicateRequest,
    InsufficientPrivilege,
    CommandNotSupported,
    Other(u8),
}

impl CompletionCode {
    pub fn from_byte(code: u8) -> Self {
        match code {
            0xC0 => Self::NodeBusy,
            0xC1 => Self::InvalidCommand,
            0xC2 => Self::InvalidCommandForLun,
            0xC3 => Self::Timeout,
            0xC4 => Self::OutOfSpace,
            0xC5 => Self::ReservationCanceled,
            0xC6 => Self::RequestDataTruncated,
            0xC7 => Self::RequestDataLengthInvalid,
            0xC9 => Self::ParameterOutOfRange,
            0xCA => Self::CannotReturnRequestedBytes,
            0xCB => Self::RequestedDataNotPresent,
            0xCC => Self::InvalidDataFieldInRequest,
            0xCD => Self::CommandIllegalForSensor,
            0xCE => Self::ResponseCouldNotBeProvided,
            0xCF => Self::CannotExecuteDuplicateRequest,
            0xD4 => Self::InsufficientPrivilege,
            0xD5 => Self::CommandNotSupported,
            other => Self::Other(other),
        }
    }

    pub fn is_success(code: u8) -> bool {
        code == 0x00
    }
}

impl fmt::Display for CompletionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionCode::NodeBusy => f.write_str("node_busy"),
            CompletionCode::InvalidCommand => f.write_str("invalid_command"),
            CompletionCode::InvalidCommandForLun => f.write_str("invalid_command_for_lun"),
            CompletionCode::Timeout => f.write_str("command_timeout"),
            CompletionCode::OutOfSpace => f.write_str("out_of_space"),
            CompletionCode::ReservationCanceled => f.write_str("reservation_canceled"),
            CompletionCode::RequestDataTruncated => f.write_str("request_data_truncated"),
            CompletionCode::RequestDataLengthInvalid => {
                f.write_str("request_data_length_invalid")
            },
            CompletionCode::ParameterOutOfRange => f.write_str("parameter_out_of_range"),
            CompletionCode::CannotReturnRequestedBytes => {
                f.write_str("cannot_return_requested_bytes")
            },
            CompletionCode::RequestedDataNotPresent => f.write_str("requested_data_not_present"),
            CompletionCode::InvalidDataFieldInRequest => {
                f.write_str("invalid_data_field_in_request")
            },
            CompletionCode::CommandIllegalForSensor => {
                f.write_str("command_illegal_for_sensor")
            },
            CompletionCode::ResponseCouldNotBeProvided => {
                f.write_str("response_could_not_be_provided")
            },
            CompletionCode::CannotExecuteDuplicateRequest => {
                f.write_str("cannot_execute_duplicate_request")
            },
            CompletionCode::InsufficientPrivilege => f.write_str("insufficient_privilege"),
            CompletionCode::CommandNotSupported => f.write_str("command_not_supported"),
            CompletionCode::Other(code) => write!(f, "0x{code:02x}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IpmiError {
    #[error("no live session for this handle")]
    NoSession,

    #[error("request timed out before a response arrived")]
    Timeout,

    #[error("BMC returned non-zero completion code: {code}")]
    BmcError { code: CompletionCode },

    #[error("malformed frame: {reason}")]
    DecodeError { reason: DecodeErrorKind },

    #[error("session setup failed at step {step}")]
    AuthError { step: SetupState },

    #[error("transport error: {reason}")]
    TransportError { reason: String },

    #[error("FRU data could not be interpreted")]
    UnsupportedFruData,

    #[error("FRU common header checksum did not sum to zero")]
    IncorrectHeaderChecksum,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for IpmiError {
    fn from(e: std::io::Error) -> Self {
        IpmiError::TransportError {
            reason: e.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for IpmiError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        IpmiError::Timeout
    }
}
