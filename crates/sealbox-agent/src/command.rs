use std::fmt;

use crate::error::AgentError;
use crate::params::{ParamType, ParamTypes};

/// Command id of the raw write.
pub const CMD_WRITE_RAW: u32 = 0;
/// Command id of the raw read.
pub const CMD_READ_RAW: u32 = 1;

/// Commands a session accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Persist the buffer contents as the configured object.
    WriteRaw,
    /// Copy the configured object into the buffer.
    ReadRaw,
}

impl Command {
    pub fn id(self) -> u32 {
        match self {
            Self::WriteRaw => CMD_WRITE_RAW,
            Self::ReadRaw => CMD_READ_RAW,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WriteRaw => "write_raw",
            Self::ReadRaw => "read_raw",
        }
    }

    /// Parameter shape the command requires: the payload buffer, then the
    /// slot receiving elapsed milliseconds.
    pub fn expected_param_types(self) -> ParamTypes {
        ParamTypes::new([
            ParamType::MemrefInout,
            ParamType::ValueOutput,
            ParamType::None,
            ParamType::None,
        ])
    }
}

impl TryFrom<u32> for Command {
    type Error = AgentError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        match id {
            CMD_WRITE_RAW => Ok(Self::WriteRaw),
            CMD_READ_RAW => Ok(Self::ReadRaw),
            other => Err(AgentError::UnknownCommand(other)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealbox_transfer::status;

    #[test]
    fn ids_roundtrip() {
        for cmd in [Command::WriteRaw, Command::ReadRaw] {
            assert_eq!(Command::try_from(cmd.id()).unwrap(), cmd);
        }
        assert_eq!(Command::WriteRaw.id(), 0);
        assert_eq!(Command::ReadRaw.id(), 1);
    }

    #[test]
    fn unknown_id_is_bad_parameters() {
        let err = Command::try_from(7).unwrap_err();
        assert!(matches!(err, AgentError::UnknownCommand(7)));
        assert_eq!(err.code(), status::BAD_PARAMETERS);
    }

    #[test]
    fn both_commands_share_one_shape() {
        assert_eq!(
            Command::WriteRaw.expected_param_types(),
            Command::ReadRaw.expected_param_types()
        );
        assert_eq!(Command::ReadRaw.to_string(), "read_raw");
    }
}
