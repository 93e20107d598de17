use std::io;

use crate::{
    config::FingerprintConfig, error::ConfigError, fingerprint::Fingerprint, read_at::ReadAt,
};

/// A file reduced to what the tracker needs to identify it in one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    /// Caller-owned identity attached to the file, typically its path
    pub tag: T,
    pub fingerprint: Fingerprint,
    /// Size reported by the source right after fingerprinting
    pub size: u64,
}

/// Produces fingerprints of a validated, fixed size.
///
/// Holds no state besides the size, so one instance can serve any number of threads fingerprinting distinct files.
///
/// ```rust
/// # use fingertrack::{FingerprintConfig, Fingerprinter};
/// let fingerprinter = Fingerprinter::new(&FingerprintConfig::default().with_fingerprint_size(16))?;
/// let file = b"2023-10-01 first line of a log\n".to_vec();
/// let fingerprint = fingerprinter.new_fingerprint(&file)?;
/// assert_eq!(fingerprint.bytes(), b"2023-10-01 first");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprinter {
    size: usize,
}

impl Fingerprinter {
    pub fn new(config: &FingerprintConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            size: config.fingerprint_size,
        })
    }

    /// Configured fingerprint length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fingerprint the leading bytes of `source`.
    ///
    /// Result holds `min(size, source length)` bytes. Source length is whatever is actually readable at the time of
    /// the call, so files being appended to or truncated concurrently are fine. I/O errors are returned as they come
    /// from the source and are never retried.
    pub fn new_fingerprint(&self, source: &(impl ReadAt + ?Sized)) -> io::Result<Fingerprint> {
        Fingerprint::read(source, self.size)
    }

    /// Fingerprint `source` and pair the result with its current size and the caller's tag.
    pub fn observe<T>(&self, tag: T, source: &(impl ReadAt + ?Sized)) -> io::Result<Observation<T>> {
        let (fingerprint, size) = self.measure(source)?;
        Ok(Observation {
            tag,
            fingerprint,
            size,
        })
    }

    /// Fingerprint of `source` and its size taken right after.
    pub fn measure(&self, source: &(impl ReadAt + ?Sized)) -> io::Result<(Fingerprint, u64)> {
        let fingerprint = self.new_fingerprint(source)?;
        let size = source.size()?;
        Ok((fingerprint, size))
    }
}
