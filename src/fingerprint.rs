use std::io;

use serde::{Deserialize, Serialize};

use crate::read_at::{read_prefix, read_range, ReadAt};

/// Leading bytes of a file, used as a content-based identity for that file.
///
/// Fingerprint owns its bytes: `clone()` is a deep copy and no two fingerprints ever share a buffer, so growing a
/// copy with `extend_from` leaves the original alone. Serialized form is the byte sequence with a length prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    first_bytes: Vec<u8>,
}

impl Fingerprint {
    /// Read the first `size` bytes of `source` without moving any cursor it may have. A source shorter than `size`
    /// produces a fingerprint of its whole content.
    pub fn read(source: &(impl ReadAt + ?Sized), size: usize) -> io::Result<Self> {
        Ok(Self {
            first_bytes: read_prefix(source, size)?,
        })
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            first_bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.first_bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.first_bytes
    }

    pub fn len(&self) -> usize {
        self.first_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_bytes.is_empty()
    }

    /// True if `other` is a prefix of `self`. Equal fingerprints start with each other and every fingerprint starts
    /// with an empty one.
    pub fn starts_with(&self, other: &Fingerprint) -> bool {
        self.first_bytes.starts_with(&other.first_bytes)
    }

    /// True if either fingerprint is a prefix of the other, i.e. both could be the same file seen at different sizes.
    pub fn matches(&self, other: &Fingerprint) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    /// Number of leading bytes the two fingerprints have in common.
    pub fn common_prefix_len(&self, other: &Fingerprint) -> usize {
        self.first_bytes
            .iter()
            .zip(&other.first_bytes)
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Append bytes following the current fingerprint from `source` until it holds `max_size` bytes or the source
    /// runs out. Used to complete a fingerprint taken while the file was still shorter than the configured size.
    ///
    /// Returns number of bytes appended.
    pub fn extend_from(
        &mut self,
        source: &(impl ReadAt + ?Sized),
        max_size: usize,
    ) -> io::Result<usize> {
        let current = self.first_bytes.len();
        if current >= max_size {
            return Ok(0);
        }
        let appended = read_range(source, current as u64, max_size - current)?;
        self.first_bytes.extend_from_slice(&appended);
        self.first_bytes.shrink_to_fit();
        Ok(appended.len())
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.first_bytes
    }
}
