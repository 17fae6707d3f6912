//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{ErrorKind, ListError};

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    AlreadyExists = 0x01,
    NotFound = 0x02,
    EmptyList = 0x03,
    InvalidIndex = 0x04,
    IoFailure = 0x05,
    Error = 0x06,
}

impl Status {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Status::Ok),
            0x01 => Some(Status::AlreadyExists),
            0x02 => Some(Status::NotFound),
            0x03 => Some(Status::EmptyList),
            0x04 => Some(Status::InvalidIndex),
            0x05 => Some(Status::IoFailure),
            0x06 => Some(Status::Error),
            _ => None,
        }
    }

    /// Error kind carried by a non-OK status
    pub fn error_kind(self) -> Option<ErrorKind> {
        match self {
            Status::Ok => None,
            Status::AlreadyExists => Some(ErrorKind::AlreadyExists),
            Status::NotFound => Some(ErrorKind::NotFound),
            Status::EmptyList => Some(ErrorKind::EmptyList),
            Status::InvalidIndex => Some(ErrorKind::InvalidIndex),
            Status::IoFailure => Some(ErrorKind::IoFailure),
            Status::Error => Some(ErrorKind::Other),
        }
    }
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::AlreadyExists => Status::AlreadyExists,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::EmptyList => Status::EmptyList,
            ErrorKind::InvalidIndex => Status::InvalidIndex,
            ErrorKind::IoFailure => Status::IoFailure,
            ErrorKind::Other => Status::Error,
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (8-byte value for OK, message for errors)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// OK with no value (Create, Append, Ping)
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            payload: None,
        }
    }

    /// OK carrying a value (Get, Remove, Size)
    pub fn value(value: i64) -> Self {
        Self {
            status: Status::Ok,
            payload: Some(value.to_be_bytes().to_vec()),
        }
    }

    /// Error response with an explicit status
    pub fn error(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Error response preserving the error's kind
    pub fn from_error(err: &ListError) -> Self {
        Self::error(Status::from(err.kind()), &err.to_string())
    }

    /// Turn a response back into the engine result it encodes
    pub fn into_result(self) -> Result<Option<i64>, ListError> {
        match self.status.error_kind() {
            None => match self.payload {
                None => Ok(None),
                Some(bytes) => {
                    let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                        ListError::Protocol(format!(
                            "OK payload must be 8 bytes, got {}",
                            bytes.len()
                        ))
                    })?;
                    Ok(Some(i64::from_be_bytes(raw)))
                }
            },
            Some(kind) => Err(ListError::Remote {
                kind,
                message: self
                    .payload
                    .map(|p| String::from_utf8_lossy(&p).into_owned())
                    .unwrap_or_default(),
            }),
        }
    }
}
