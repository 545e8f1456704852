//! SMA command definitions

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::EOL;
use crate::error::{Error, Result};

/// Protocol commands
///
/// Every command is an `ESC`-prefixed code followed by CR LF on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Read current weight
    ReadWeight,

    /// Query model designation
    QueryModel,

    /// Query serial number
    QuerySerial,

    /// Query software version
    QuerySoftware,

    /// Tare and zero
    Tare,
}

impl Command {
    /// All commands, in declaration order
    pub const ALL: [Command; 5] = [
        Self::ReadWeight,
        Self::QueryModel,
        Self::QuerySerial,
        Self::QuerySoftware,
        Self::Tare,
    ];

    /// Info queries, in the order the device expects them
    pub const INFO_QUERIES: [Command; 3] =
        [Self::QueryModel, Self::QuerySerial, Self::QuerySoftware];

    /// Wire code, without terminator
    pub fn code(self) -> &'static str {
        match self {
            Self::ReadWeight => "\x1bP",
            Self::QueryModel => "\x1bx1_",
            Self::QuerySerial => "\x1bx2_",
            Self::QuerySoftware => "\x1bx3_",
            Self::Tare => "\x1bT",
        }
    }

    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadWeight => "READ_WEIGHT",
            Self::QueryModel => "QUERY_MODEL",
            Self::QuerySerial => "QUERY_SERIAL",
            Self::QuerySoftware => "QUERY_SOFTWARE",
            Self::Tare => "TARE",
        }
    }

    /// Check if this is one of the info queries
    pub fn is_info_query(self) -> bool {
        matches!(
            self,
            Self::QueryModel | Self::QuerySerial | Self::QuerySoftware
        )
    }

    /// Encode command to bytes, terminator included
    ///
    /// # Examples
    ///
    /// ```
    /// use smascale_core::Command;
    ///
    /// assert_eq!(&Command::ReadWeight.encode()[..], b"\x1bP\r\n");
    /// ```
    pub fn encode(self) -> Bytes {
        let code = self.code().as_bytes();
        let mut buf = BytesMut::with_capacity(code.len() + EOL.len());
        buf.put_slice(code);
        buf.put_slice(EOL);
        buf.freeze()
    }
}

impl TryFrom<&str> for Command {
    type Error = Error;

    /// Accepts a code with or without its terminator
    fn try_from(value: &str) -> Result<Self> {
        let code = value.trim_end_matches(['\r', '\n']);
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.code() == code)
            .ok_or_else(|| Error::UnknownCommand(value.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", self.name(), self.code())
    }
}
