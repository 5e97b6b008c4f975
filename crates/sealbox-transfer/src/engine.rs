use tracing::{debug, warn};

use sealbox_store::{ObjectHandle, SecureStorage};

use crate::config::TransferMode;
use crate::error::{StorageError, StorageResult};
use crate::timing::{Clock, ElapsedMs, TeeTime};

/// Timing record and counters for one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferReport {
    pub start: TeeTime,
    pub stop: TeeTime,
    pub elapsed: ElapsedMs,
    /// Bytes moved between buffer and object.
    pub bytes: usize,
    /// Chunk operations issued.
    pub chunks: usize,
}

/// Number of chunks needed to move `total_size` bytes.
pub fn chunk_count(total_size: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(chunk_size)
}

/// Reserve a zeroed buffer of `size` bytes. A zero size allocates nothing.
/// Reject a zero chunk size before any storage is touched.
pub fn check_chunk_size(chunk_size: usize) -> StorageResult<()> {
    if chunk_size == 0 {
        return Err(StorageError::BadParameters("chunk size must be non-zero".into()));
    }
    Ok(())
}

pub(crate) fn alloc_buffer(size: usize) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    if size == 0 {
        return Ok(buf);
    }
    buf.try_reserve_exact(size)
        .map_err(|_| StorageError::AllocationFailed { size })?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Moves payloads between memory and an open object in fixed-size chunks.
///
/// The engine never opens or closes handles; the caller owns the handle and
/// releases it on every path.
pub struct ChunkedTransferEngine<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> {
    storage: &'a S,
    clock: &'a C,
    mode: TransferMode,
}

impl<'a, S: SecureStorage + ?Sized, C: Clock + ?Sized> ChunkedTransferEngine<'a, S, C> {
    pub fn new(storage: &'a S, clock: &'a C, mode: TransferMode) -> Self {
        Self {
            storage,
            clock,
            mode,
        }
    }

    pub fn storage(&self) -> &'a S {
        self.storage
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// Check write arguments without touching storage.
    pub fn check_write(
        &self,
        source: &[u8],
        total_size: usize,
        chunk_size: usize,
    ) -> StorageResult<()> {
        check_chunk_size(chunk_size)?;
        if self.mode == TransferMode::Accumulate && source.len() < total_size {
            return Err(StorageError::BadParameters(format!(
                "source holds {} bytes, transfer needs {total_size}",
                source.len()
            )));
        }
        Ok(())
    }

    /// Write `total_size` bytes to `handle` in chunks, timing the loop.
    ///
    /// Stops at the first failed chunk with [`StorageError::WriteFailed`].
    pub fn write_chunked(
        &self,
        handle: ObjectHandle,
        source: &[u8],
        total_size: usize,
        chunk_size: usize,
    ) -> StorageResult<TransferReport> {
        self.check_write(source, total_size, chunk_size)?;
        let start = self.clock.now();
        let chunks = self.write_chunks(handle, source, total_size, chunk_size)?;
        let stop = self.clock.now();
        let report = TransferReport {
            start,
            stop,
            elapsed: ElapsedMs::between(start, stop),
            bytes: total_size,
            chunks,
        };
        debug!(%handle, bytes = total_size, chunks, elapsed = %report.elapsed, "chunked write done");
        Ok(report)
    }

    /// Untimed chunk loop shared with the prepare pass. Arguments must have
    /// passed [`check_write`](Self::check_write).
    pub(crate) fn write_chunks(
        &self,
        handle: ObjectHandle,
        source: &[u8],
        total_size: usize,
        chunk_size: usize,
    ) -> StorageResult<usize> {
        // Collapse mode stages a single chunk and writes it over and over.
        let staged = match self.mode {
            TransferMode::Collapse => {
                let mut chunk = alloc_buffer(chunk_size.min(total_size))?;
                let n = chunk.len().min(source.len());
                chunk[..n].copy_from_slice(&source[..n]);
                Some(chunk)
            }
            TransferMode::Accumulate => None,
        };

        let mut offset = 0;
        let mut chunks = 0;
        while offset < total_size {
            let n = chunk_size.min(total_size - offset);
            let data = match &staged {
                Some(chunk) => &chunk[..n],
                None => &source[offset..offset + n],
            };
            if let Err(err) = self.storage.write(handle, data) {
                warn!(%handle, offset, len = n, error = %err, "chunk write failed");
                return Err(StorageError::WriteFailed {
                    offset,
                    len: n,
                    source: err,
                });
            }
            offset += n;
            chunks += 1;
        }
        Ok(chunks)
    }

    /// Read `total_size` bytes from `handle` in chunks, timing the loop.
    ///
    /// In [`TransferMode::Accumulate`] the returned payload is exactly
    /// `total_size` bytes. In [`TransferMode::Collapse`] every chunk lands in
    /// the same buffer and only the final chunk is returned.
    ///
    /// Any backend error, short read or count mismatch is
    /// [`StorageError::ReadFailed`]; no partial payload is returned.
    pub fn read_chunked(
        &self,
        handle: ObjectHandle,
        chunk_size: usize,
        total_size: usize,
    ) -> StorageResult<(Vec<u8>, TransferReport)> {
        check_chunk_size(chunk_size)?;
        let mut chunk = alloc_buffer(chunk_size.min(total_size))?;
        let mut payload = match self.mode {
            TransferMode::Accumulate => {
                let mut payload = Vec::new();
                payload
                    .try_reserve_exact(total_size)
                    .map_err(|_| StorageError::AllocationFailed { size: total_size })?;
                Some(payload)
            }
            TransferMode::Collapse => None,
        };

        let start = self.clock.now();
        let mut offset = 0;
        let mut chunks = 0;
        let mut last = 0;
        while offset < total_size {
            let n = chunk_size.min(total_size - offset);
            let got = self
                .storage
                .read(handle, &mut chunk[..n])
                .map_err(|source| {
                    warn!(%handle, offset, len = n, error = %source, "chunk read failed");
                    StorageError::ReadFailed {
                        offset,
                        expected: n,
                        actual: 0,
                        source: Some(source),
                    }
                })?;
            if got != n {
                warn!(%handle, offset, expected = n, actual = got, "short chunk read");
                return Err(StorageError::ReadFailed {
                    offset,
                    expected: n,
                    actual: got,
                    source: None,
                });
            }
            if let Some(payload) = payload.as_mut() {
                payload.extend_from_slice(&chunk[..n]);
            }
            offset += n;
            chunks += 1;
            last = n;
        }
        let stop = self.clock.now();

        let data = match payload.take() {
            Some(payload) => payload,
            None => {
                chunk.truncate(last);
                chunk
            }
        };
        let report = TransferReport {
            start,
            stop,
            elapsed: ElapsedMs::between(start, stop),
            bytes: offset,
            chunks,
        };
        debug!(%handle, bytes = offset, chunks, returned = data.len(), elapsed = %report.elapsed, "chunked read done");
        Ok((data, report))
    }
}
