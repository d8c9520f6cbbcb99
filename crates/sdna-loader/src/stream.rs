//! Byte streams a snapshot can be read from.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;

use crate::Result;

/// Gzip member magic.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Sequential byte source.
pub trait ByteStream: Read {
    /// Bytes consumed so far.
    fn position(&self) -> u64;

    /// Total size in bytes, if known up front.
    fn size(&self) -> Option<u64>;

    /// Bytes left, if the size is known.
    fn remaining(&self) -> Option<u64> {
        self.size().map(|size| size.saturating_sub(self.position()))
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn position(&self) -> u64 {
        (**self).position()
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}

/// Stream over borrowed bytes.
#[derive(Debug, Clone)]
pub struct MemoryStream<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemoryStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }
}

impl Read for MemoryStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = &self.data[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl ByteStream for MemoryStream<'_> {
    fn position(&self) -> u64 {
        self.position as u64
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Memory-mapped file stream.
pub struct FileStream {
    mmap: Mmap,
    position: usize,
}

impl FileStream {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap, position: 0 })
    }

    /// The whole mapped file.
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = &self.mmap[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        Ok(n)
    }
}

impl ByteStream for FileStream {
    fn position(&self) -> u64 {
        self.position as u64
    }

    fn size(&self) -> Option<u64> {
        Some(self.mmap.len() as u64)
    }
}

/// Gzip-compressed stream. The decompressed size is not known up front.
pub struct GzipStream<R: Read> {
    decoder: GzDecoder<R>,
    position: u64,
}

impl<R: Read> GzipStream<R> {
    pub fn new(inner: R) -> Self {
        Self {
            decoder: GzDecoder::new(inner),
            position: 0,
        }
    }
}

impl<R: Read> Read for GzipStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.decoder.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read> ByteStream for GzipStream<R> {
    fn position(&self) -> u64 {
        self.position
    }

    fn size(&self) -> Option<u64> {
        None
    }
}

/// Open a snapshot file, decompressing it if it starts with the gzip magic.
pub fn open_stream<P: AsRef<Path>>(path: P) -> Result<Box<dyn ByteStream>> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    let is_gzip = match file.read_exact(&mut magic) {
        Ok(()) => magic == GZIP_MAGIC,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
        Err(e) => return Err(e.into()),
    };

    if is_gzip {
        file.seek(SeekFrom::Start(0))?;
        tracing::debug!("opening {} as gzip stream", path.display());
        Ok(Box::new(GzipStream::new(BufReader::new(file))))
    } else {
        Ok(Box::new(FileStream::open(path)?))
    }
}

/// Read until `buf` is full or the stream ends, returning the bytes read.
pub(crate) fn read_full<S: ByteStream + ?Sized>(stream: &mut S, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    #[test]
    fn test_memory_stream() {
        let data = [1u8, 2, 3, 4, 5];
        let mut stream = MemoryStream::new(&data);
        let mut buf = [0u8; 3];
        assert_eq!(read_full(&mut stream, &mut buf).unwrap(), 3);
        assert_eq!(stream.position(), 3);
        assert_eq!(stream.remaining(), Some(2));
        assert_eq!(read_full(&mut stream, &mut buf).unwrap(), 2);
        assert_eq!(read_full(&mut stream, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_stream_sniffs_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"SNAPDNA-v300 payload".to_vec();

        let plain = dir.path().join("plain.snap");
        std::fs::write(&plain, &payload).unwrap();

        let packed = dir.path().join("packed.snap");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        std::fs::write(&packed, encoder.finish().unwrap()).unwrap();

        for path in [&plain, &packed] {
            let mut stream = open_stream(path).unwrap();
            let mut out = Vec::new();
            stream.read_to_end(&mut out).unwrap();
            assert_eq!(out, payload);
            assert_eq!(stream.position(), payload.len() as u64);
        }

        assert_eq!(open_stream(&plain).unwrap().size(), Some(payload.len() as u64));
        assert_eq!(open_stream(&packed).unwrap().size(), None);
    }

    #[test]
    fn test_open_stream_tiny_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.snap");
        std::fs::write(&path, [7u8]).unwrap();
        let mut stream = open_stream(&path).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(read_full(&mut stream, &mut buf).unwrap(), 1);
    }
}
