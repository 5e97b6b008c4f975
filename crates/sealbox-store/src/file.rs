use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BackendError, BackendResult};
use crate::handles::{read_at, write_at, HandleTable};
use crate::object::{AccessFlags, ObjectHandle, ObjectInfo, ObjectName};
use crate::traits::SecureStorage;

/// Magic prefix of every object file.
const MAGIC: &[u8; 4] = b"SBX1";

/// Header size: 4 bytes magic + 8 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 16;

/// Configuration for [`FileSecureStorage`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// `fsync` each object file after every write.
    pub sync: bool,
}

/// Protected storage backed by one file per object under a root directory.
///
/// On-disk format of an object file:
/// ```text
/// [4 bytes: magic "SBX1"]
/// [8 bytes: data length (little-endian u64)]
/// [4 bytes: CRC32 of data (little-endian u32)]
/// [N bytes: data]
/// ```
///
/// File names are the hex-encoded object name with an `.obj` suffix, so
/// object names never reach the filesystem verbatim. Writes go through a
/// temporary file and a rename; a torn write leaves the previous version in
/// place. An object whose header or CRC does not match is reported as
/// [`BackendError::Corrupt`].
pub struct FileSecureStorage {
    root: PathBuf,
    config: FileStorageConfig,
    handles: Mutex<HandleTable>,
}

impl FileSecureStorage {
    /// Open (or create) a storage namespace rooted at `root`.
    pub fn open(root: &Path, config: FileStorageConfig) -> BackendResult<Self> {
        fs::create_dir_all(root)?;
        debug!(root = %root.display(), sync = config.sync, "file storage opened");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            handles: Mutex::new(HandleTable::default()),
        })
    }

    /// Root directory of the namespace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `name`.
    pub fn object_path(&self, name: &ObjectName) -> PathBuf {
        self.root
            .join(format!("{}.obj", hex::encode(name.as_bytes())))
    }

    fn load(&self, path: &Path, name: &ObjectName) -> BackendResult<Vec<u8>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        decode_frame(path, raw)
    }

    fn store(&self, path: &Path, data: &[u8]) -> BackendResult<()> {
        let tmp = path.with_extension("obj.tmp");
        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&encode_frame(data))?;
            file.flush()?;
            if self.config.sync {
                file.sync_all()?;
            }
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
    frame.extend_from_slice(MAGIC);
    frame.extend_from_slice(&(data.len() as u64).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    frame.extend_from_slice(data);
    frame
}

fn decode_frame(path: &Path, mut raw: Vec<u8>) -> BackendResult<Vec<u8>> {
    let corrupt = |reason: String| {
        warn!(path = %path.display(), %reason, "corrupt object file");
        BackendError::Corrupt {
            path: path.to_path_buf(),
            reason,
        }
    };

    if raw.len() < HEADER_SIZE {
        return Err(corrupt(format!("file shorter than header ({} bytes)", raw.len())));
    }
    if &raw[..4] != MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&raw[4..12]);
    let length = u64::from_le_bytes(len_bytes);
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&raw[12..16]);
    let expected_crc = u32::from_le_bytes(crc_bytes);

    let actual_len = (raw.len() - HEADER_SIZE) as u64;
    if length != actual_len {
        return Err(corrupt(format!(
            "length field {length} does not match data length {actual_len}"
        )));
    }
    let data = raw.split_off(HEADER_SIZE);
    let actual_crc = crc32fast::hash(&data);
    if actual_crc != expected_crc {
        return Err(corrupt(format!(
            "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
        )));
    }
    Ok(data)
}

impl SecureStorage for FileSecureStorage {
    fn create(
        &self,
        name: &ObjectName,
        flags: AccessFlags,
        initial: &[u8],
    ) -> BackendResult<ObjectHandle> {
        let path = self.object_path(name);
        let mut handles = self.handles.lock().expect("lock poisoned");
        if path.try_exists()? && !flags.contains(AccessFlags::OVERWRITE) {
            return Err(BackendError::AlreadyExists(name.to_string()));
        }
        self.store(&path, initial)?;
        let handle = handles.insert(name.clone(), flags);
        debug!(%name, %handle, initial = initial.len(), "object created");
        Ok(handle)
    }

    fn open(&self, name: &ObjectName, flags: AccessFlags) -> BackendResult<ObjectHandle> {
        let path = self.object_path(name);
        let mut handles = self.handles.lock().expect("lock poisoned");
        self.load(&path, name)?;
        let handle = handles.insert(name.clone(), flags);
        debug!(%name, %handle, "object opened");
        Ok(handle)
    }

    fn read(&self, handle: ObjectHandle, buf: &mut [u8]) -> BackendResult<usize> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::READ, "READ")?;
        let stream = self.load(&self.object_path(&entry.name), &entry.name)?;
        let n = read_at(&stream, entry.position, buf);
        entry.position += n;
        Ok(n)
    }

    fn write(&self, handle: ObjectHandle, data: &[u8]) -> BackendResult<()> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::WRITE, "WRITE")?;
        let path = self.object_path(&entry.name);
        let mut stream = self.load(&path, &entry.name)?;
        write_at(&mut stream, entry.position, data);
        self.store(&path, &stream)?;
        entry.position += data.len();
        Ok(())
    }

    fn truncate(&self, handle: ObjectHandle, size: usize) -> BackendResult<()> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.require(handle, AccessFlags::WRITE, "WRITE")?;
        let path = self.object_path(&entry.name);
        let mut stream = self.load(&path, &entry.name)?;
        stream.resize(size, 0);
        self.store(&path, &stream)
    }

    fn seek(&self, handle: ObjectHandle, position: usize) -> BackendResult<()> {
        let mut handles = self.handles.lock().expect("lock poisoned");
        handles.get_mut(handle)?.position = position;
        Ok(())
    }

    fn info(&self, handle: ObjectHandle) -> BackendResult<ObjectInfo> {
        let handles = self.handles.lock().expect("lock poisoned");
        let entry = handles.get(handle)?;
        let stream = self.load(&self.object_path(&entry.name), &entry.name)?;
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
        self.remove(&entry.name)?;
        debug!(name = %entry.name, %handle, "object closed and deleted");
        Ok(())
    }

    fn exists(&self, name: &ObjectName) -> BackendResult<bool> {
        Ok(self.object_path(name).try_exists()?)
    }

    fn remove(&self, name: &ObjectName) -> BackendResult<bool> {
        match fs::remove_file(self.object_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn open_handles(&self) -> usize {
        self.handles.lock().expect("lock poisoned").len()
    }
}

impl std::fmt::Debug for FileSecureStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSecureStorage")
            .field("root", &self.root)
            .field("open_handles", &self.open_handles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom};

    use super::*;

    fn name(s: &str) -> ObjectName {
        ObjectName::new(s).unwrap()
    }

    fn storage(dir: &tempfile::TempDir) -> FileSecureStorage {
        FileSecureStorage::open(dir.path(), FileStorageConfig::default()).unwrap()
    }

    #[test]
    fn create_write_reopen_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("secret"), AccessFlags::transfer(), b"").unwrap();
        store.write(h, b"hello ").unwrap();
        store.write(h, b"world").unwrap();
        store.close(h);

        // A fresh instance over the same root sees the data.
        let store = storage(&dir);
        let h = store.open(&name("secret"), AccessFlags::READ).unwrap();
        let mut buf = [0u8; 32];
        let n = store.read(h, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
        assert_eq!(store.info(h).unwrap().data_size, 11);
        store.close(h);
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn file_name_is_hex_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let path = store.object_path(&name("ab"));
        assert_eq!(path.file_name().unwrap(), "6162.obj");
    }

    #[test]
    fn open_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let err = store.open(&name("nope"), AccessFlags::READ).unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn create_without_overwrite_rejects_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("a"), AccessFlags::transfer(), b"x").unwrap();
        store.close(h);
        let err = store
            .create(&name("a"), AccessFlags::READ | AccessFlags::WRITE, b"")
            .unwrap_err();
        assert!(matches!(err, BackendError::AlreadyExists(_)));
    }

    #[test]
    fn crc_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("a"), AccessFlags::transfer(), b"payload").unwrap();
        store.close(h);

        // Flip the first data byte.
        let path = store.object_path(&name("a"));
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let err = store.open(&name("a"), AccessFlags::READ).unwrap_err();
        assert!(matches!(err, BackendError::Corrupt { .. }));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("a"), AccessFlags::transfer(), b"payload").unwrap();
        store.close(h);

        let path = store.object_path(&name("a"));
        let len = fs::metadata(&path).unwrap().len();
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(len - 2)
            .unwrap();

        assert!(matches!(
            store.open(&name("a"), AccessFlags::READ).unwrap_err(),
            BackendError::Corrupt { .. }
        ));
    }

    #[test]
    fn close_and_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("a"), AccessFlags::transfer(), b"x").unwrap();
        store.close_and_delete(h).unwrap();
        assert!(!store.exists(&name("a")).unwrap());
        assert!(!store.object_path(&name("a")).exists());
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = storage(&dir);
        let h = store.create(&name("a"), AccessFlags::transfer(), b"x").unwrap();
        store.close(h);
        assert!(store.remove(&name("a")).unwrap());
        assert!(!store.remove(&name("a")).unwrap());
    }

    #[test]
    fn sync_mode_writes_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            FileSecureStorage::open(dir.path(), FileStorageConfig { sync: true }).unwrap();
        let h = store.create(&name("a"), AccessFlags::transfer(), b"").unwrap();
        store.write(h, b"durable").unwrap();
        store.close(h);
        assert!(!store.object_path(&name("a")).with_extension("obj.tmp").exists());

        let h = store.open(&name("a"), AccessFlags::READ).unwrap();
        assert_eq!(store.info(h).unwrap().data_size, 7);
        store.close(h);
    }

    #[test]
    fn frame_roundtrip_detects_length_mismatch() {
        let mut frame = encode_frame(b"abc");
        frame.push(b'!');
        let err = decode_frame(Path::new("x.obj"), frame).unwrap_err();
        assert!(matches!(err, BackendError::Corrupt { .. }));
    }
}
