//! Handle bookkeeping shared by the storage backends.

use std::collections::HashMap;

use crate::error::{BackendError, BackendResult};
use crate::object::{AccessFlags, ObjectHandle, ObjectName};

/// State behind one open handle.
#[derive(Clone, Debug)]
pub(crate) struct OpenObject {
    pub name: ObjectName,
    pub flags: AccessFlags,
    pub position: usize,
}

/// Table of open handles. Handle numbers are never reused.
#[derive(Debug, Default)]
pub(crate) struct HandleTable {
    next: u64,
    open: HashMap<ObjectHandle, OpenObject>,
}

impl HandleTable {
    pub fn insert(&mut self, name: ObjectName, flags: AccessFlags) -> ObjectHandle {
        self.next += 1;
        let handle = ObjectHandle::from_raw(self.next);
        self.open.insert(
            handle,
            OpenObject {
                name,
                flags,
                position: 0,
            },
        );
        handle
    }

    pub fn get(&self, handle: ObjectHandle) -> BackendResult<&OpenObject> {
        self.open.get(&handle).ok_or(BackendError::BadHandle(handle))
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> BackendResult<&mut OpenObject> {
        self.open
            .get_mut(&handle)
            .ok_or(BackendError::BadHandle(handle))
    }

    /// Look up a handle and check that it was opened with `flag`.
    pub fn require(
        &mut self,
        handle: ObjectHandle,
        flag: AccessFlags,
        label: &'static str,
    ) -> BackendResult<&mut OpenObject> {
        let entry = self.get_mut(handle)?;
        if !entry.flags.contains(flag) {
            return Err(BackendError::AccessDenied {
                handle,
                required: label,
            });
        }
        Ok(entry)
    }

    pub fn remove(&mut self, handle: ObjectHandle) -> Option<OpenObject> {
        self.open.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }
}

/// Copy `data` into `stream` at `position`, zero-filling any gap.
pub(crate) fn write_at(stream: &mut Vec<u8>, position: usize, data: &[u8]) {
    let end = position + data.len();
    if stream.len() < end {
        stream.resize(end, 0);
    }
    stream[position..end].copy_from_slice(data);
}

/// Copy bytes from `stream` at `position` into `buf`; returns the count.
pub(crate) fn read_at(stream: &[u8], position: usize, buf: &mut [u8]) -> usize {
    if position >= stream.len() {
        return 0;
    }
    let n = buf.len().min(stream.len() - position);
    buf[..n].copy_from_slice(&stream[position..position + n]);
    n
}
