//! The two-pass store and timed load of the configured object.

use tracing::{debug, info};

use sealbox_store::SecureStorage;

use crate::config::{TransferConfig, MAX_PAYLOAD_SIZE};
use crate::engine::{check_chunk_size, ChunkedTransferEngine, TransferReport};
use crate::error::{StorageError, StorageResult};
use crate::lifecycle::ObjectLifecycleManager;
use crate::timing::Clock;

/// Moves a payload into and out of protected storage.
pub struct SecureTransfer<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> {
    lifecycle: ObjectLifecycleManager<'a, S, C>,
    config: TransferConfig,
}

impl<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> SecureTransfer<'a, S, C> {
    pub fn new(storage: &'a S, clock: &'a C, config: TransferConfig) -> Self {
        let engine = ChunkedTransferEngine::new(storage, clock, config.mode);
        let lifecycle = ObjectLifecycleManager::new(engine, config.object_name.clone());
        Self { lifecycle, config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &ObjectLifecycleManager<'a, S, C> {
        &self.lifecycle
    }

    /// Number of bytes a write of `payload` transfers.
    fn write_size(&self, payload: &[u8]) -> StorageResult<usize> {
        let total = match self.config.payload_size {
            Some(size) if size != payload.len() => {
                return Err(StorageError::BadParameters(format!(
                    "payload is {} bytes, configured size is {size}",
                    payload.len()
                )));
            }
            Some(size) => size,
            None => payload.len(),
        };
        if total > MAX_PAYLOAD_SIZE {
            return Err(StorageError::BadParameters(format!(
                "payload of {total} bytes exceeds maximum {MAX_PAYLOAD_SIZE}"
            )));
        }
        Ok(total)
    }

    /// Persist `payload`: an untimed prepare pass creates and fills the
    /// object, then a timed pass rewrites it through a fresh handle.
    pub fn store(&self, payload: &[u8]) -> StorageResult<TransferReport> {
        let total = self.write_size(payload)?;
        let chunk_size = self.config.chunk_size;

        self.lifecycle.prepare(total, payload, chunk_size)?;

        let guard = self.lifecycle.open_for_transfer()?;
        let report = self
            .lifecycle
            .engine()
            .write_chunked(guard.handle(), payload, total, chunk_size)?;
        guard.release();

        info!(
            name = %self.config.object_name,
            bytes = report.bytes,
            chunks = report.chunks,
            elapsed = %report.elapsed,
            "payload stored"
        );
        Ok(report)
    }

    /// Read the stored payload back.
    ///
    /// `capacity` is the largest payload the caller can accept. A larger
    /// object fails with [`StorageError::ShortBuffer`] before any chunk is
    /// read.
    pub fn load(&self, capacity: usize) -> StorageResult<(Vec<u8>, TransferReport)> {
        check_chunk_size(self.config.chunk_size)?;
        let guard = self.lifecycle.open_for_transfer()?;
        let handle = guard.handle();

        let total = match self.config.payload_size {
            Some(size) => size,
            None => {
                let info = self
                    .lifecycle
                    .engine()
                    .storage()
                    .info(handle)
                    .map_err(|source| StorageError::InfoFailed {
                        name: self.config.object_name.clone(),
                        source,
                    })?;
                info.data_size
            }
        };
        if total > capacity {
            debug!(needed = total, capacity, "caller buffer too small");
            return Err(StorageError::ShortBuffer {
                needed: total,
                capacity,
            });
        }

        let (data, report) =
            self.lifecycle
                .engine()
                .read_chunked(handle, self.config.chunk_size, total)?;
        guard.release();

        info!(
            name = %self.config.object_name,
            bytes = report.bytes,
            returned = data.len(),
            chunks = report.chunks,
            elapsed = %report.elapsed,
            "payload loaded"
        );
        Ok((data, report))
    }
}

#[cfg(test)]
mod tests {
    use sealbox_store::{
        BackendError, FaultPlan, FileSecureStorage, FileStorageConfig, InMemorySecureStorage,
        ObjectName,
    };

    use super::*;
    use crate::config::TransferMode;
    use crate::timing::{ElapsedMs, ManualClock};

    fn config(chunk_size: usize) -> TransferConfig {
        TransferConfig {
            chunk_size,
            ..TransferConfig::default()
        }
    }

    fn object() -> ObjectName {
        TransferConfig::default().object_name
    }

    // -----------------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------------

    #[test]
    fn store_runs_prepare_and_timed_pass() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::stepping(0, 5);
        let transfer = SecureTransfer::new(&store, &clock, config(4));

        let report = transfer.store(b"secret-value!").unwrap();
        assert_eq!(report.bytes, 13);
        assert_eq!(report.chunks, 4);
        assert_eq!(report.elapsed, ElapsedMs(5));
        // Two passes of 4,4,4,1.
        assert_eq!(store.write_log(), vec![4, 4, 4, 1, 4, 4, 4, 1]);
        assert_eq!(store.contents(&object()).unwrap(), b"secret-value!");
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn store_twice_is_idempotent() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        transfer.store(b"same payload").unwrap();
        let first = store.contents(&object()).unwrap();
        transfer.store(b"same payload").unwrap();
        assert_eq!(store.contents(&object()).unwrap(), first);
        assert_eq!(store.len(), 1);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn store_shorter_payload_truncates() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        transfer.store(b"a much longer payload").unwrap();
        transfer.store(b"short").unwrap();
        assert_eq!(store.contents(&object()).unwrap(), b"short");
    }

    #[test]
    fn store_enforces_configured_size() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(
            &store,
            &clock,
            TransferConfig {
                payload_size: Some(8),
                ..config(4)
            },
        );
        let err = transfer.store(b"seven!!").unwrap_err();
        assert!(matches!(err, StorageError::BadParameters(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn store_rejects_oversized_payload() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4096));
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            transfer.store(&big).unwrap_err(),
            StorageError::BadParameters(_)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn store_open_failure_leaves_no_handle() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        store.inject(FaultPlan {
            fail_open: true,
            ..FaultPlan::default()
        });
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        let err = transfer.store(b"payload").unwrap_err();
        assert!(matches!(
            err,
            StorageError::OpenFailed {
                source: BackendError::Injected("open"),
                ..
            }
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn store_timed_pass_failure_releases_handle() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        // Prepare uses writes 0..=3, the timed pass fails on its second chunk.
        store.inject(FaultPlan {
            fail_write_at: Some(5),
            ..FaultPlan::default()
        });
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        let err = transfer.store(b"secret-value!").unwrap_err();
        assert!(matches!(err, StorageError::WriteFailed { offset: 4, len: 4, .. }));
        assert_eq!(store.open_handles(), 0);
        // The prepared object is kept.
        assert!(store.exists(&object()).unwrap());
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    #[test]
    fn load_returns_stored_payload() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::stepping(1_000, 3);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        transfer.store(b"secret-value!").unwrap();

        let (data, report) = transfer.load(64).unwrap();
        assert_eq!(data, b"secret-value!");
        assert_eq!(report.chunks, 4);
        assert_eq!(report.elapsed, ElapsedMs(3));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn load_in_collapse_mode_returns_final_chunk() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        SecureTransfer::new(&store, &clock, config(4))
            .store(b"secret-value!")
            .unwrap();

        let collapse = SecureTransfer::new(
            &store,
            &clock,
            TransferConfig {
                mode: TransferMode::Collapse,
                ..config(4)
            },
        );
        let (data, report) = collapse.load(64).unwrap();
        assert_eq!(data, b"!");
        assert_eq!(report.bytes, 13);
    }

    #[test]
    fn load_missing_object_is_open_failed() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        let err = transfer.load(16).unwrap_err();
        assert!(matches!(
            err,
            StorageError::OpenFailed {
                source: BackendError::NotFound(_),
                ..
            }
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn load_into_small_buffer_is_short_buffer() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        transfer.store(b"secret-value!").unwrap();
        let err = transfer.load(8).unwrap_err();
        assert!(matches!(
            err,
            StorageError::ShortBuffer {
                needed: 13,
                capacity: 8
            }
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn load_with_configured_size_past_object_end() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        SecureTransfer::new(&store, &clock, config(4))
            .store(b"tiny")
            .unwrap();
        let fixed = SecureTransfer::new(
            &store,
            &clock,
            TransferConfig {
                payload_size: Some(8),
                ..config(4)
            },
        );
        let err = fixed.load(8).unwrap_err();
        assert!(matches!(
            err,
            StorageError::ReadFailed {
                offset: 4,
                actual: 0,
                source: None,
                ..
            }
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn load_zero_chunk_size_rejected_before_open() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        store.inject(FaultPlan {
            fail_open: true,
            ..FaultPlan::default()
        });
        let transfer = SecureTransfer::new(&store, &clock, config(0));
        let err = transfer.load(16).unwrap_err();
        assert!(matches!(err, StorageError::BadParameters(_)));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn load_size_query_failure_is_info_failed() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        transfer.store(b"secret-value!").unwrap();
        store.inject(FaultPlan {
            fail_info: true,
            ..FaultPlan::default()
        });
        let err = transfer.load(64).unwrap_err();
        assert!(matches!(
            err,
            StorageError::InfoFailed {
                source: BackendError::Injected("info"),
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to query size of object sealbox.secret");
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn empty_payload_roundtrip() {
        let store = InMemorySecureStorage::new();
        let clock = ManualClock::fixed(0);
        let transfer = SecureTransfer::new(&store, &clock, config(4));
        let report = transfer.store(b"").unwrap();
        assert_eq!(report.chunks, 0);
        let (data, _) = transfer.load(0).unwrap();
        assert!(data.is_empty());
        assert!(store.write_log().is_empty());
    }

    // -----------------------------------------------------------------------
    // File backend
    // -----------------------------------------------------------------------

    #[test]
    fn file_backend_roundtrip_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::fixed(0);
        {
            let store = FileSecureStorage::open(dir.path(), FileStorageConfig::default()).unwrap();
            SecureTransfer::new(&store, &clock, config(5))
                .store(b"persisted across instances")
                .unwrap();
        }
        let store = FileSecureStorage::open(dir.path(), FileStorageConfig::default()).unwrap();
        let (data, _) = SecureTransfer::new(&store, &clock, config(5))
            .load(1024)
            .unwrap();
        assert_eq!(data, b"persisted across instances");
        assert_eq!(store.open_handles(), 0);
    }
}
