//! Command definitions
//!
//! Represents commands from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Create = 0x01,
    Append = 0x02,
    Get = 0x03,
    Remove = 0x04,
    Size = 0x05,
    Ping = 0x06,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(CommandType::Create),
            0x02 => Some(CommandType::Append),
            0x03 => Some(CommandType::Get),
            0x04 => Some(CommandType::Remove),
            0x05 => Some(CommandType::Size),
            0x06 => Some(CommandType::Ping),
            _ => None,
        }
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an empty list
    Create { key: String },

    /// Append a value to a list
    Append { key: String, value: i64 },

    /// Read the element at `index`
    Get { key: String, index: i64 },

    /// Pop the most recently appended element
    Remove { key: String },

    /// Length of a list (0 if absent)
    Size { key: String },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Create { .. } => CommandType::Create,
            Command::Append { .. } => CommandType::Append,
            Command::Get { .. } => CommandType::Get,
            Command::Remove { .. } => CommandType::Remove,
            Command::Size { .. } => CommandType::Size,
            Command::Ping => CommandType::Ping,
        }
    }

    /// Key the command targets, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Command::Create { key }
            | Command::Append { key, .. }
            | Command::Get { key, .. }
            | Command::Remove { key }
            | Command::Size { key } => Some(key),
            Command::Ping => None,
        }
    }
}
