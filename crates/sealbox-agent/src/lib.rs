//! Command dispatch for Sealbox.
//!
//! A [`SecureStorageAgent`] owns the storage backend and opens sessions. Each
//! [`Session`] accepts two commands, [`Command::WriteRaw`] and
//! [`Command::ReadRaw`], with four typed parameter slots: a payload buffer
//! in slot 0 and an output value receiving elapsed milliseconds in slot 1.
//! Malformed invocations are rejected before storage is touched. Failures
//! carry a stable status code ([`AgentError::code`]).

pub mod agent;
pub mod buffer;
pub mod command;
pub mod error;
pub mod params;

pub use agent::{SecureStorageAgent, Session};
pub use buffer::TransferBuffer;
pub use command::{Command, CMD_READ_RAW, CMD_WRITE_RAW};
pub use error::{AgentError, AgentResult};
pub use params::{Param, ParamType, ParamTypes, Params, PARAM_SLOTS};
