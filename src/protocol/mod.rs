//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Simple Binary, big-endian)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: CREATE - Payload: key
//! - 0x02: APPEND - Payload: key + value (i64)
//! - 0x03: GET    - Payload: key + index (i64)
//! - 0x04: REMOVE - Payload: key
//! - 0x05: SIZE   - Payload: key
//! - 0x06: PING   - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK (payload: empty or i64 value)
//! - 0x01: ALREADY_EXISTS
//! - 0x02: NOT_FOUND
//! - 0x03: EMPTY_LIST
//! - 0x04: INVALID_INDEX
//! - 0x05: IO_FAILURE
//! - 0x06: ERROR
//!
//! Error payloads carry the error message as UTF-8.

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{Response, Status};
pub use codec::{
    decode_command, decode_response, encode_command, encode_response, read_command,
    read_response, write_command, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
