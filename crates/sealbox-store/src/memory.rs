use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use tracing::debug;

use crate::error::{BackendError, BackendResult};
use crate::handles::{read_at, write_at, HandleTable};
use crate::object::{AccessFlags, ObjectHandle, ObjectInfo, ObjectName};
use crate::traits::SecureStorage;

/// Faults to inject into an [`InMemorySecureStorage`].
///
/// Write and read indices count calls made since the plan was installed,
/// starting at 0.
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    /// Every `create` fails.
    pub fail_create: bool,
    /// Every `open` fails.
    pub fail_open: bool,
    /// Every `info` fails.
    pub fail_info: bool,
    /// The write call with this index fails.
    pub fail_write_at: Option<usize>,
    /// The read call with this index fails.
    pub fail_read_at: Option<usize>,
    /// Each read returns at most this many bytes.
    pub max_read_len: Option<usize>,
}

#[derive(Debug, Default)]
struct FaultState {
    plan: FaultPlan,
    writes: usize,
    reads: usize,
}

/// In-memory, HashMap-based protected storage.
///
/// Intended for tests and embedding. Besides the [`SecureStorage`] contract it
/// records the size of every write call and can inject faults through a
/// [`FaultPlan`].
pub struct InMemorySecureStorage {
    objects: RwLock<HashMap<ObjectName, Vec<u8>>>,
    handles: Mutex<HandleTable>,
    faults: Mutex<FaultState>,
    write_log: Mutex<Vec<usize>>,
}

impl InMemorySecureStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            handles: Mutex::new(HandleTable::default()),
            faults: Mutex::new(FaultState::default()),
            write_log: Mutex::new(Vec::new()),
        }
    }

    /// Install a fault plan, resetting the call counters.
    pub fn inject(&self, plan: FaultPlan) {
        let mut faults = self.faults.lock().expect("lock poisoned");
        *faults = FaultState {
            plan,
            ..FaultState::default()
        };
    }

    /// Remove any installed faults.
    pub fn clear_faults(&self) {
        self.inject(FaultPlan::default());
    }

    /// Sizes of all successful write calls, oldest first.
    pub fn write_log(&self) -> Vec<usize> {
        self.write_log.lock().expect("lock poisoned").clone()
    }

    /// Forget the recorded write sizes.
    pub fn clear_write_log(&self) {
        self.write_log.lock().expect("lock poisoned").clear();
    }

    /// Copy of an object's content, bypassing handles.
    pub fn contents(&self, name: &ObjectName) -> Option<Vec<u8>> {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    fn next_write_fails(&self) -> bool {
        let mut faults = self.faults.lock().expect("lock poisoned");
        let index = faults.writes;
        faults.writes += 1;
        faults.plan.fail_write_at == Some(index)
    }

    /// Returns whether the read fails and the read-length cap.
    fn next_read_fault(&self) -> (bool, Option<usize>) {
        let mut faults = self.faults.lock().expect("lock poisoned");
        let index = faults.reads;
        faults.reads += 1;
        (faults.plan.fail_read_at == Some(index), faults.plan.max_read_len)
    }
}

impl Default for InMemorySecureStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStorage for InMemorySecureStorage {
    fn create(
        &self,
        name: &ObjectName,
        flags: AccessFlags,
        initial: &[u8],
    ) -> BackendResult<ObjectHandle> {
        if self.faults.lock().expect("lock poisoned").plan.fail_create {
            return Err(BackendError::Injected("create"));
        }
        let mut objects = self.objects.write().expect("lock poisoned");
        if objects.contains_key(name) && !flags.contains(AccessFlags::OVERWRITE) {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        objects.insert(name.clone(), initial.to_vec());
        drop(objects);

        let handle = self
            .handles
            .lock()
            .expect("lock poisoned")
            .insert(name.clone(), flags);
        debug!(%name, %handle, initial = initial.len(), "object created");
        Ok(handle)
    }

    fn open(&self, name: &ObjectName, flags: AccessFlags) -> BackendResult<ObjectHandle> {
        if self.faults.lock().expect("lock poisoned").plan.fail_open {
            return Err(BackendError::Injected("open"));
        }
        if !self.objects.read().expect("lock poisoned").contains_key(name) {
            return Err(BackendError::NotFound(name.to_string()));
        }
        let handle = self
            .handles
            .lock()
            .expect("lock poisoned")
            .insert(name.clone(), flags);
        debug!(%name, %handle, "object opened");
        Ok(handle)
    }

    fn read(&self, handle: ObjectHandle, buf: &mut [u8]) -> BackendResult<usize> {
        let (fail, cap) = self.next_read_fault();
        if fail {
            return Err(BackendError::Injected("read"));
        }
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::READ, "READ")?;
        let objects = self.objects.read().expect("lock poisoned");
        let stream = objects
            .get(&entry.name)
            .ok_or_else(|| BackendError::NotFound(entry.name.to_string()))?;
        let limit = cap.map_or(buf.len(), |cap| cap.min(buf.len()));
        let n = read_at(stream, entry.position, &mut buf[..limit]);
        entry.position += n;
        Ok(n)
    }

    fn write(&self, handle: ObjectHandle, data: &[u8]) -> BackendResult<()> {
        if self.next_write_fails() {
            return Err(BackendError::Injected("write"));
        }
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::WRITE, "WRITE")?;
        let mut objects = self.objects.write().expect("lock poisoned");
        let stream = objects
            .get_mut(&entry.name)
            .ok_or_else(|| BackendError::NotFound(entry.name.to_string()))?;
        write_at(stream, entry.position, data);
        entry.position += data.len();
        self.write_log.lock().expect("lock poisoned").push(data.len());
        Ok(())
    }

    fn truncate(&self, handle: ObjectHandle, size: usize) -> BackendResult<()> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::WRITE, "WRITE")?;
        let mut objects = self.objects.write().expect("lock poisoned");
        let stream = objects
            .get_mut(&entry.name)
            .ok_or_else(|| BackendError::NotFound(entry.name.to_string()))?;
        stream.resize(size, 0);
        Ok(())
    }

    fn seek(&self, handle: ObjectHandle, position: usize) -> BackendResult<()> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        handles.get_mut(handle)?.position = position;
        Ok(())
    }

    fn info(&self, handle: ObjectHandle) -> BackendResult<ObjectInfo> {
        if self.faults.lock().expect("lock poisoned").plan.fail_info {
            return Err(BackendError::Injected("info"));
        }
        let handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.get(handle)?;
        let objects = self.objects.read().expect("lock poisoned");
        let stream = objects
            .get(&entry.name)
            .ok_or_else(|| BackendError::NotFound(entry.name.to_string()))?;
        Ok(ObjectInfo {
            data_size: stream.len(),
            position: entry.position,
            flags: entry.flags,
        })
    }

    fn close(&self, handle: ObjectHandle) {
        if self
            .handles
            .lock()
            .expect("lock poisoned")
            .remove(handle)
            .is_some()
        {
            debug!(%handle, "object closed");
        }
    }

    fn close_and_delete(&self, handle: ObjectHandle) -> BackendResult<()> {
        let entry = self
            .handles
            .lock()
            .expect("lock poisoned")
            .remove(handle)
            .ok_or(BackendError::BadHandle(handle))?;
        if !entry.flags.contains(AccessFlags::WRITE_META) {
            return Err(BackendError::AccessDenied {
                handle,
                required: "WRITE_META",
            });
        }
        self.objects
            .write()
            .expect("lock poisoned")
            .remove(&entry.name);
        debug!(name = %entry.name, %handle, "object closed and deleted");
        Ok(())
    }

    fn exists(&self, name: &ObjectName) -> BackendResult<bool> {
        Ok(self.objects.read().expect("lock poisoned").contains_key(name))
    }

    fn remove(&self, name: &ObjectName) -> BackendResult<bool> {
        Ok(self
            .objects
            .write()
            .expect("lock poisoned")
            .remove(name)
            .is_some())
    }

    fn open_handles(&self) -> usize {
        self.handles.lock().expect("lock poisoned").len()
    }
}

impl std::fmt::Debug for InMemorySecureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySecureStorage")
            .field("object_count", &self.len())
            .field("open_handles", &self.open_handles())
            .finish()
    }
}
