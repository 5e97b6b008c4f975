use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

/// Maximum length of an object name in bytes.
pub const MAX_OBJECT_NAME_LEN: usize = 64;

/// Characters that are forbidden anywhere in an object name.
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ' ', '\t', '\n', '\r'];

// ---------------------------------------------------------------------------
// ObjectName
// ---------------------------------------------------------------------------

/// Validated name of a persistent object.
///
/// Valid names:
/// - Are non-empty and at most [`MAX_OBJECT_NAME_LEN`] bytes
/// - Contain only printable ASCII
/// - Contain no path separators or whitespace
/// - Are not `.` or `..`
///
/// # Examples
///
/// ```
/// use sealbox_store::ObjectName;
///
/// assert!(ObjectName::new("sealbox.secret").is_ok());
/// assert!(ObjectName::new("").is_err());
/// assert!(ObjectName::new("../escape").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName(String);

impl ObjectName {
    /// Validate and wrap a name.
    pub fn new(name: impl Into<String>) -> BackendResult<Self> {
        let name = name.into();
        validate_object_name(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> BackendError {
    BackendError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate an object name, returning `Ok(())` if valid.
pub fn validate_object_name(name: &str) -> BackendResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "object name must not be empty"));
    }
    if name.len() > MAX_OBJECT_NAME_LEN {
        return Err(invalid(
            name,
            format!("longer than {MAX_OBJECT_NAME_LEN} bytes"),
        ));
    }
    for ch in FORBIDDEN_CHARS {
        if name.contains(*ch) {
            return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
        }
    }
    if let Some(ch) = name.chars().find(|c| !c.is_ascii_graphic()) {
        return Err(invalid(name, format!("contains non-printable character: {ch:?}")));
    }
    if name == "." || name == ".." {
        return Err(invalid(name, "must not be '.' or '..'"));
    }
    Ok(())
}

impl TryFrom<String> for ObjectName {
    type Error = BackendError;

    fn try_from(value: String) -> BackendResult<Self> {
        Self::new(value)
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.0
    }
}

impl fmt::Debug for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectName({})", self.0)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AccessFlags
// ---------------------------------------------------------------------------

/// Access flags requested when creating or opening an object.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessFlags(u32);

impl AccessFlags {
    pub const NONE: Self = Self(0);
    /// Data may be read through the handle.
    pub const READ: Self = Self(0x0001);
    /// Data may be written or truncated through the handle.
    pub const WRITE: Self = Self(0x0002);
    /// The object may be deleted or renamed through the handle.
    pub const WRITE_META: Self = Self(0x0004);
    /// Create replaces an existing object of the same name.
    pub const OVERWRITE: Self = Self(0x0400);

    /// Flags used for both passes of a transfer.
    pub const fn transfer() -> Self {
        Self(Self::READ.0 | Self::WRITE.0 | Self::WRITE_META.0 | Self::OVERWRITE.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for AccessFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (Self::READ, "READ"),
            (Self::WRITE, "WRITE"),
            (Self::WRITE_META, "WRITE_META"),
            (Self::OVERWRITE, "OVERWRITE"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            f.write_str("AccessFlags(NONE)")
        } else {
            write!(f, "AccessFlags({})", names.join(" | "))
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectHandle / ObjectInfo
// ---------------------------------------------------------------------------

/// Opaque handle to an open object, issued by a backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Snapshot of an open object's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Current size of the object's data stream in bytes.
    pub data_size: usize,
    /// Data position of the handle.
    pub position: usize,
    /// Flags the handle was opened with.
    pub flags: AccessFlags,
}
