use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context};
use colored::Colorize;
use serde_json::json;
use tracing::debug;

use sealbox_agent::{
    AgentError, Command as AgentCommand, ParamTypes, Params, SecureStorageAgent, TransferBuffer,
    CMD_READ_RAW, CMD_WRITE_RAW,
};
use sealbox_store::{FileSecureStorage, SecureStorage};
use sealbox_transfer::Clock;

use crate::cli::*;
use crate::settings::Settings;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        root,
        config,
        format,
        ..
    } = cli;
    let settings = Settings::load(config.as_deref())?;
    match command {
        Command::Write(args) => cmd_write(&root, settings, args, format),
        Command::Read(args) => cmd_read(&root, settings, args, format),
        Command::Config => cmd_config(&settings),
    }
}

fn open_agent(
    root: &Path,
    settings: Settings,
) -> anyhow::Result<SecureStorageAgent<FileSecureStorage>> {
    let storage = FileSecureStorage::open(root, settings.storage)
        .with_context(|| format!("opening storage at {}", root.display()))?;
    debug!(root = %root.display(), object = %settings.transfer.object_name, "agent ready");
    Ok(SecureStorageAgent::new(storage, settings.transfer))
}

/// Attach the status code to an agent failure.
fn status_error(e: AgentError) -> anyhow::Error {
    let code = e.code();
    anyhow!(e).context(format!("command failed with status {code:#010x}"))
}

/// Run a write in a fresh session. Returns the elapsed milliseconds.
pub fn write_secret<S: SecureStorage, C: Clock>(
    agent: &SecureStorageAgent<S, C>,
    payload: Vec<u8>,
) -> Result<u32, AgentError> {
    let mut session = agent.open_session(ParamTypes::NONE)?;
    let mut params = Params::transfer(TransferBuffer::from_bytes(payload));
    session.invoke_command(
        CMD_WRITE_RAW,
        AgentCommand::WriteRaw.expected_param_types(),
        &mut params,
    )?;
    session.close();
    Ok(params.value_a(1).unwrap_or_default())
}

/// Run a read in a fresh session. Returns the payload and elapsed
/// milliseconds.
pub fn read_secret<S: SecureStorage, C: Clock>(
    agent: &SecureStorageAgent<S, C>,
    capacity: usize,
) -> Result<(Vec<u8>, u32), AgentError> {
    let mut session = agent.open_session(ParamTypes::NONE)?;
    let mut params = Params::transfer(TransferBuffer::with_capacity(capacity));
    session.invoke_command(
        CMD_READ_RAW,
        AgentCommand::ReadRaw.expected_param_types(),
        &mut params,
    )?;
    session.close();
    let elapsed = params.value_a(1).unwrap_or_default();
    let data = params.memref(0)?.as_bytes().to_vec();
    Ok((data, elapsed))
}

fn cmd_write(
    root: &Path,
    settings: Settings,
    args: WriteArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let payload = match (args.secret, args.file) {
        (Some(secret), _) => secret.into_bytes(),
        (None, Some(path)) => {
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
        }
        (None, None) => anyhow::bail!("no secret given"),
    };
    let bytes = payload.len();
    let agent = open_agent(root, settings)?;
    let elapsed = write_secret(&agent, payload).map_err(status_error)?;

    match format {
        OutputFormat::Text => println!(
            "{} Stored {} bytes as {} in {}",
            "✓".green().bold(),
            bytes.to_string().bold(),
            agent.config().object_name.to_string().cyan(),
            format!("{elapsed}ms").yellow()
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "object": agent.config().object_name.as_str(),
                "bytes": bytes,
                "elapsed_ms": elapsed,
            })
        ),
    }
    Ok(())
}

fn cmd_read(
    root: &Path,
    settings: Settings,
    args: ReadArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let agent = open_agent(root, settings)?;
    let (data, elapsed) = read_secret(&agent, args.capacity).map_err(status_error)?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "object": agent.config().object_name.as_str(),
                "bytes": data.len(),
                "elapsed_ms": elapsed,
                "data_hex": hex::encode(&data),
            })
        ),
        OutputFormat::Text if args.hex => {
            println!("{}", hex::encode(&data));
            eprintln!("{} {} bytes in {elapsed}ms", "✓".green(), data.len());
        }
        OutputFormat::Text => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            eprintln!("{} {} bytes in {elapsed}ms", "✓".green(), data.len());
        }
    }
    Ok(())
}

fn cmd_config(settings: &Settings) -> anyhow::Result<()> {
    print!("{}", settings.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use sealbox_store::{FileStorageConfig, InMemorySecureStorage};
    use sealbox_transfer::{status, ManualClock, TransferConfig};

    use super::*;

    fn memory_agent() -> SecureStorageAgent<InMemorySecureStorage, ManualClock> {
        SecureStorageAgent::with_clock(
            InMemorySecureStorage::new(),
            ManualClock::stepping(0, 1),
            TransferConfig {
                chunk_size: 4,
                ..TransferConfig::default()
            },
        )
    }

    #[test]
    fn write_then_read_in_separate_sessions() {
        let agent = memory_agent();
        assert_eq!(write_secret(&agent, b"hunter2".to_vec()).unwrap(), 1);
        let (data, elapsed) = read_secret(&agent, 64).unwrap();
        assert_eq!(data, b"hunter2");
        assert_eq!(elapsed, 1);
    }

    #[test]
    fn read_short_capacity_reports_status() {
        let agent = memory_agent();
        write_secret(&agent, b"hunter2".to_vec()).unwrap();
        let err = read_secret(&agent, 3).unwrap_err();
        assert_eq!(err.code(), status::SHORT_BUFFER);
        let message = format!("{:#}", status_error(err));
        assert!(message.contains("0xffff0010"));
        assert!(message.contains("need 7 bytes"));
    }

    #[test]
    fn file_storage_persists_between_agents() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            storage: FileStorageConfig { sync: true },
            ..Settings::default()
        };
        let agent = open_agent(dir.path(), settings.clone()).unwrap();
        write_secret(&agent, vec![0, 1, 2, 255]).unwrap();
        drop(agent);

        let agent = open_agent(dir.path(), settings).unwrap();
        let (data, _) = read_secret(&agent, 16).unwrap();
        assert_eq!(data, vec![0, 1, 2, 255]);
    }

    #[test]
    fn read_from_empty_root_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let agent = open_agent(dir.path(), Settings::default()).unwrap();
        let err = read_secret(&agent, 16).unwrap_err();
        assert_eq!(err.code(), status::ITEM_NOT_FOUND);
    }
}
