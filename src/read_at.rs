use std::{
    cell::RefCell,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
};

/// Random-access readable byte source.
///
/// Reads are qualified by an explicit offset and never touch a sequential cursor that another reader of the same
/// handle may be relying on. This is the capability fingerprinting needs: a log reader can keep consuming lines
/// from a `File` while the same `File` is fingerprinted.
pub trait ReadAt {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns number of bytes read, zero meaning end of source.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Current size of the source. May be stale by the time it is used if somebody is still writing.
    fn size(&self) -> io::Result<u64>;
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= self.len() {
            return Ok(0);
        }
        let available = &self[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        self.as_slice().size()
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }

    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }
}

/// Adapter giving `ReadAt` to a plain sequential `Read + Seek` source.
///
/// Every positional read remembers the current stream position, seeks, reads and seeks back, so the wrapped
/// reader observes the same cursor before and after. Unlike a native positional read this is not safe against
/// another thread advancing the same cursor concurrently; prefer a native `ReadAt` impl where one exists.
///
/// ```rust
/// # use std::io::{Cursor, Read};
/// # use fingertrack::{ReadAt, Rewinding};
/// let source = Rewinding::new(Cursor::new(b"hello world".to_vec()));
/// let mut head = [0; 5];
/// source.read_at(&mut head, 6)?;
/// assert_eq!(&head, b"world");
/// // cursor untouched
/// let mut rest = String::new();
/// source.into_inner().read_to_string(&mut rest)?;
/// assert_eq!(rest, "hello world");
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Rewinding<R> {
    inner: RefCell<R>,
}

impl<R: Read + Seek> Rewinding<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: RefCell::new(inner),
        }
    }

    /// Destroy the adapter and return underlying reader.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> ReadAt for Rewinding<R> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let original = inner.stream_position()?;
        inner.seek(SeekFrom::Start(offset))?;
        let result = inner.read(buf);
        // restore even if read failed, but report the read error first
        let restored = inner.seek(SeekFrom::Start(original));
        let n = result?;
        restored?;
        Ok(n)
    }

    fn size(&self) -> io::Result<u64> {
        let mut inner = self.inner.borrow_mut();
        let original = inner.stream_position()?;
        let size = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(original))?;
        Ok(size)
    }
}

/// Positional reads are issued in chunks of this size, so the result never holds more memory than the bytes read.
const CHUNK_SIZE: usize = 8 * 1024;

/// Read up to `limit` leading bytes of `source`.
pub fn read_prefix(source: &(impl ReadAt + ?Sized), limit: usize) -> io::Result<Vec<u8>> {
    read_range(source, 0, limit)
}

/// Read up to `limit` bytes of `source` starting at `offset`.
///
/// Keeps issuing positional reads until `limit` bytes are collected or the source reports end of data, so a short
/// read from a source that is concurrently shrinking yields a shorter result rather than an error. Memory is
/// reserved for what the source currently holds, not for `limit`.
pub fn read_range(source: &(impl ReadAt + ?Sized), offset: u64, limit: usize) -> io::Result<Vec<u8>> {
    let available = source.size()?.saturating_sub(offset);
    let expected = usize::try_from(available).unwrap_or(usize::MAX).min(limit);
    let mut buf = Vec::with_capacity(expected);
    let mut chunk = [0u8; CHUNK_SIZE];
    while buf.len() < limit {
        let wanted = (limit - buf.len()).min(CHUNK_SIZE);
        match source.read_at(&mut chunk[..wanted], offset.saturating_add(buf.len() as u64)) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    // source may have grown or shrunk since its size was taken
    buf.shrink_to_fit();
    Ok(buf)
}
