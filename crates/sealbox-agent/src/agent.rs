use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, warn};

use sealbox_store::SecureStorage;
use sealbox_transfer::{
    Clock, ElapsedMs, SecureTransfer, StorageError, SystemClock, TransferConfig,
};

use crate::command::Command;
use crate::error::AgentResult;
use crate::params::{ParamTypes, Params};

/// Entry point of the isolated service: owns the storage backend and hands
/// out sessions that execute commands against it.
pub struct SecureStorageAgent<S: SecureStorage, C: Clock = SystemClock> {
    storage: S,
    clock: C,
    config: TransferConfig,
    next_session: AtomicU32,
}

impl<S: SecureStorage> SecureStorageAgent<S, SystemClock> {
    pub fn new(storage: S, config: TransferConfig) -> Self {
        Self::with_clock(storage, SystemClock::new(), config)
    }
}

impl<S: SecureStorage, C: Clock> SecureStorageAgent<S, C> {
    pub fn with_clock(storage: S, clock: C, config: TransferConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            next_session: AtomicU32::new(1),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Open a session. Sessions take no parameters.
    pub fn open_session(&self, types: ParamTypes) -> AgentResult<Session<'_, S, C>> {
        types.ensure(ParamTypes::NONE)?;
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "session opened");
        Ok(Session { agent: self, id })
    }
}

/// One client session. Commands run one at a time.
pub struct Session<'a, S: SecureStorage, C: Clock> {
    agent: &'a SecureStorageAgent<S, C>,
    id: u32,
}

impl<S: SecureStorage, C: Clock> Session<'_, S, C> {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Run command `cmd_id`.
    ///
    /// Slot 0 carries the payload buffer, slot 1 receives the elapsed
    /// milliseconds in `a`. A read into a buffer that is too small sets the
    /// buffer size to the required size and fails with `ShortBuffer`.
    pub fn invoke_command(
        &mut self,
        cmd_id: u32,
        types: ParamTypes,
        params: &mut Params,
    ) -> AgentResult<()> {
        let result = self.dispatch(cmd_id, types, params);
        if let Err(e) = &result {
            warn!(session = self.id, cmd_id, code = e.code(), error = %e, "command failed");
        }
        result
    }

    fn dispatch(&self, cmd_id: u32, types: ParamTypes, params: &mut Params) -> AgentResult<()> {
        let command = Command::try_from(cmd_id)?;
        types.ensure(command.expected_param_types())?;
        params.check(types)?;

        let agent = self.agent;
        let transfer = SecureTransfer::new(&agent.storage, &agent.clock, agent.config.clone());

        let elapsed = match command {
            Command::WriteRaw => {
                let payload = params.memref(0)?.as_bytes();
                transfer.store(payload)?.elapsed
            }
            Command::ReadRaw => {
                let capacity = params.memref(0)?.capacity();
                match transfer.load(capacity) {
                    Ok((data, report)) => {
                        params.memref_mut(0)?.fill(data);
                        report.elapsed
                    }
                    Err(StorageError::ShortBuffer { needed, capacity }) => {
                        params.memref_mut(0)?.report_needed(needed);
                        return Err(StorageError::ShortBuffer { needed, capacity }.into());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        params.set_value(1, elapsed_to_u32(elapsed), 0)?;
        debug!(session = self.id, command = %command, %elapsed, "command done");
        Ok(())
    }

    pub fn close(self) {
        debug!(session = self.id, "session closed");
    }
}

fn elapsed_to_u32(elapsed: ElapsedMs) -> u32 {
    u32::try_from(elapsed.as_u64()).unwrap_or(u32::MAX)
}
