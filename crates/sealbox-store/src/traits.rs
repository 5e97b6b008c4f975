use crate::error::BackendResult;
use crate::object::{AccessFlags, ObjectHandle, ObjectInfo, ObjectName};

/// A protected storage namespace holding named, opaque persistent objects.
///
/// All implementations must satisfy these invariants:
/// - Objects are only reachable through handles returned by `create` or
///   `open`. Each handle carries its own data position, starting at 0.
/// - `read` and `write` operate at the handle's position and advance it.
///   Writing past the end extends the object; reading past the end returns
///   fewer bytes.
/// - `close` is idempotent and never fails. Closing an unknown handle is a
///   no-op.
/// - The store never interprets object contents.
pub trait SecureStorage: Send + Sync {
    /// Create an object and return an open handle to it.
    ///
    /// With [`AccessFlags::OVERWRITE`] an existing object of the same name is
    /// replaced; without it, an existing object is an error. The object's
    /// initial content is `initial`.
    fn create(
        &self,
        name: &ObjectName,
        flags: AccessFlags,
        initial: &[u8],
    ) -> BackendResult<ObjectHandle>;

    /// Open an existing object.
    fn open(&self, name: &ObjectName, flags: AccessFlags) -> BackendResult<ObjectHandle>;

    /// Read up to `buf.len()` bytes at the handle's position. Returns the
    /// number of bytes read, which is short only at end of data.
    fn read(&self, handle: ObjectHandle, buf: &mut [u8]) -> BackendResult<usize>;

    /// Write all of `data` at the handle's position.
    fn write(&self, handle: ObjectHandle, data: &[u8]) -> BackendResult<()>;

    /// Resize the object's data stream, zero-filling when growing.
    fn truncate(&self, handle: ObjectHandle, size: usize) -> BackendResult<()>;

    /// Move the handle's data position.
    fn seek(&self, handle: ObjectHandle, position: usize) -> BackendResult<()>;

    /// Size, position and flags of an open object.
    fn info(&self, handle: ObjectHandle) -> BackendResult<ObjectInfo>;

    /// Release a handle. Idempotent.
    fn close(&self, handle: ObjectHandle);

    /// Delete the object behind `handle` and release the handle. Requires
    /// [`AccessFlags::WRITE_META`]. The handle is released even when the
    /// delete fails.
    fn close_and_delete(&self, handle: ObjectHandle) -> BackendResult<()>;

    /// Check whether an object exists.
    fn exists(&self, name: &ObjectName) -> BackendResult<bool>;

    /// Delete an object by name. Returns `true` if it existed.
    fn remove(&self, name: &ObjectName) -> BackendResult<bool>;

    /// Number of handles currently open.
    fn open_handles(&self) -> usize;
}
