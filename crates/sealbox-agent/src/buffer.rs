/// Caller-owned buffer passed by reference into a command.
///
/// `capacity` is fixed by the caller. `size` is what the last command
/// reported: the number of valid bytes after a successful read, or the
/// number of bytes required after a read into a buffer that was too small.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransferBuffer {
    data: Vec<u8>,
    capacity: usize,
    size: usize,
}

impl TransferBuffer {
    /// An empty buffer able to receive up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
            size: 0,
        }
    }

    /// A full buffer holding `bytes`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let data = bytes.into();
        let len = data.len();
        Self {
            data,
            capacity: len,
            size: len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Current contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Replace the contents. Callers check capacity first.
    pub(crate) fn fill(&mut self, payload: Vec<u8>) {
        debug_assert!(payload.len() <= self.capacity);
        self.size = payload.len();
        self.data = payload;
    }

    /// Report the size a retry needs without touching the contents.
    pub(crate) fn report_needed(&mut self, needed: usize) {
        self.size = needed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_is_full() {
        let b = TransferBuffer::from_bytes(b"abc".to_vec());
        assert_eq!(b.capacity(), 3);
        assert_eq!(b.size(), 3);
        assert_eq!(b.as_bytes(), b"abc");
    }

    #[test]
    fn fill_updates_size() {
        let mut b = TransferBuffer::with_capacity(8);
        assert_eq!(b.size(), 0);
        b.fill(b"hello".to_vec());
        assert_eq!(b.size(), 5);
        assert_eq!(b.capacity(), 8);
        assert_eq!(b.into_bytes(), b"hello");
    }

    #[test]
    fn report_needed_keeps_contents() {
        let mut b = TransferBuffer::from_bytes(b"old".to_vec());
        b.report_needed(32);
        assert_eq!(b.size(), 32);
        assert_eq!(b.as_bytes(), b"old");
    }
}
