//! Object lifecycle: create, prepare, open, and guaranteed release.

use tracing::{debug, warn};

use sealbox_store::{AccessFlags, ObjectHandle, ObjectName, SecureStorage};

use crate::engine::ChunkedTransferEngine;
use crate::error::{StorageError, StorageResult};
use crate::timing::Clock;

/// What happens to the object when its guard is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Disposition {
    Close,
    Remove,
}

/// Scoped ownership of an open handle.
///
/// The handle is released exactly once: by [`release`](Self::release), or by
/// `Drop` on any early return. A guard marked with
/// [`remove_on_release`](Self::remove_on_release) deletes the object as it
/// releases the handle.
pub struct ObjectGuard<'a, S: SecureStorage + ?Sized> {
    storage: &'a S,
    handle: ObjectHandle,
    disposition: Disposition,
    released: bool,
}

impl<'a, S: SecureStorage + ?Sized> ObjectGuard<'a, S> {
    pub fn new(storage: &'a S, handle: ObjectHandle) -> Self {
        Self {
            storage,
            handle,
            disposition: Disposition::Close,
            released: false,
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }

    /// Delete the object when the guard is released.
    pub fn remove_on_release(&mut self) {
        self.disposition = Disposition::Remove;
    }

    /// Keep the object; release only closes the handle.
    pub fn keep(&mut self) {
        self.disposition = Disposition::Close;
    }

    /// Release the handle now.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.disposition {
            Disposition::Close => self.storage.close(self.handle),
            Disposition::Remove => {
                if let Err(e) = self.storage.close_and_delete(self.handle) {
                    warn!(handle = %self.handle, error = %e, "could not remove object");
                    self.storage.close(self.handle);
                }
            }
        }
    }
}

impl<S: SecureStorage + ?Sized> Drop for ObjectGuard<'_, S> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Creates, prepares and opens the configured persistent object.
pub struct ObjectLifecycleManager<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> {
    engine: ChunkedTransferEngine<'a, S, C>,
    name: ObjectName,
}

impl<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> ObjectLifecycleManager<'a, S, C> {
    pub fn new(engine: ChunkedTransferEngine<'a, S, C>, name: ObjectName) -> Self {
        Self { engine, name }
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn engine(&self) -> &ChunkedTransferEngine<'a, S, C> {
        &self.engine
    }

    /// Create the object (truncating any previous version) and write
    /// `total_size` bytes of `seed_chunk` into it, untimed.
    ///
    /// The handle is closed before returning. If a seed write fails the
    /// half-written object is removed and the write error is returned.
    pub fn prepare(
        &self,
        total_size: usize,
        seed_chunk: &[u8],
        chunk_size: usize,
    ) -> StorageResult<()> {
        self.engine.check_write(seed_chunk, total_size, chunk_size)?;

        let storage = self.engine.storage();
        let handle = storage
            .create(&self.name, AccessFlags::transfer(), &[])
            .map_err(|source| {
                warn!(name = %self.name, error = %source, "object create failed");
                StorageError::CreateFailed {
                    name: self.name.clone(),
                    source,
                }
            })?;
        let mut guard = ObjectGuard::new(storage, handle);
        guard.remove_on_release();

        let chunks = self
            .engine
            .write_chunks(handle, seed_chunk, total_size, chunk_size)?;

        guard.keep();
        guard.release();
        debug!(name = %self.name, bytes = total_size, chunks, "object prepared");
        Ok(())
    }

    /// Open the existing object for a transfer pass.
    pub fn open_for_transfer(&self) -> StorageResult<ObjectGuard<'a, S>> {
        let storage = self.engine.storage();
        let handle = storage
            .open(&self.name, AccessFlags::transfer())
            .map_err(|source| {
                warn!(name = %self.name, error = %source, "object open failed");
                StorageError::OpenFailed {
                    name: self.name.clone(),
                    source,
                }
            })?;
        Ok(ObjectGuard::new(storage, handle))
    }

    /// Release a raw handle. Idempotent.
    pub fn close(&self, handle: ObjectHandle) {
        self.engine.storage().close(handle);
    }
}
