//! Save path: writes snapshots the loader can read back.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use sdna_schema::Schema;

use crate::{Error, FileHeader, RecordCode, RecordHeader, RecordLayout, Result};

/// Version written when none is given.
pub const DEFAULT_VERSION: u16 = 300;

/// Output file, plain or gzip-compressed.
pub enum FileSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl FileSink {
    /// Flush buffered output and finish the gzip trailer.
    pub fn close(self) -> io::Result<()> {
        match self {
            FileSink::Plain(mut w) => w.flush(),
            FileSink::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileSink::Plain(w) => w.write(buf),
            FileSink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileSink::Plain(w) => w.flush(),
            FileSink::Gzip(w) => w.flush(),
        }
    }
}

/// Writes a file header followed by records.
///
/// Record payloads are written as given; they must already be in the byte
/// order and pointer width announced by the header.
pub struct GraphWriter<W: Write> {
    writer: W,
    header: FileHeader,
    layout: RecordLayout,
    scratch: Vec<u8>,
    records: usize,
}

impl<W: Write> GraphWriter<W> {
    /// Start a snapshot whose header matches the layout of `schema`.
    pub fn new(writer: W, schema: &Schema) -> Result<Self> {
        let header = FileHeader::new(schema.pointer_width(), schema.endian(), DEFAULT_VERSION);
        Self::with_header(writer, header)
    }

    pub fn with_header(mut writer: W, header: FileHeader) -> Result<Self> {
        writer.write_all(&header.to_bytes()?)?;
        Ok(Self {
            writer,
            header,
            layout: header.record_layout(),
            scratch: Vec::with_capacity(24),
            records: 0,
        })
    }

    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Records written so far, not counting the end marker.
    #[inline]
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Write one record. The header's length is taken from `data`.
    pub fn write_record(&mut self, header: &RecordHeader, data: &[u8]) -> Result<()> {
        let length = u32::try_from(data.len()).map_err(|_| {
            Error::Rejected(format!("record payload of {} bytes is too large", data.len()))
        })?;
        if self.header.pointer_width == 4 && header.address > u32::MAX as u64 {
            tracing::debug!(
                "address {:#x} truncated to 32 bits for {}",
                header.address,
                header.code
            );
        }

        let header = RecordHeader { length, ..*header };
        self.scratch.clear();
        self.layout.encode(&header, &mut self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.writer.write_all(data)?;
        self.records += 1;
        Ok(())
    }

    /// Write `count` elements of the struct at `struct_index`.
    pub fn write_struct(
        &mut self,
        code: RecordCode,
        address: u64,
        struct_index: u32,
        count: u32,
        data: &[u8],
    ) -> Result<()> {
        if code.is_reserved() {
            return Err(Error::Rejected(format!(
                "{} is reserved and cannot hold a struct",
                code
            )));
        }
        self.write_record(
            &RecordHeader {
                code,
                length: 0,
                address,
                type_index: struct_index,
                count,
            },
            data,
        )
    }

    /// Write an opaque block.
    pub fn write_data(&mut self, address: u64, data: &[u8]) -> Result<()> {
        self.write_record(
            &RecordHeader {
                code: RecordCode::DATA,
                length: 0,
                address,
                type_index: 0,
                count: 1,
            },
            data,
        )
    }

    /// Write the schema record, encoded in the header's byte order.
    pub fn write_schema(&mut self, schema: &Schema) -> Result<()> {
        if schema.pointer_width() != self.header.pointer_width {
            return Err(Error::Rejected(format!(
                "schema has pointer width {} but the file uses {}",
                schema.pointer_width(),
                self.header.pointer_width
            )));
        }
        let blob = schema.to_blob(self.header.endian);
        self.write_schema_blob(&blob)
    }

    /// Write an already encoded schema blob.
    pub fn write_schema_blob(&mut self, blob: &[u8]) -> Result<()> {
        self.write_record(
            &RecordHeader {
                code: RecordCode::SCHEMA,
                length: 0,
                address: 0,
                type_index: 0,
                count: 1,
            },
            blob,
        )
    }

    /// Write the end marker and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.write_record(
            &RecordHeader {
                code: RecordCode::END,
                length: 0,
                address: 0,
                type_index: 0,
                count: 0,
            },
            &[],
        )?;
        self.records -= 1;
        self.writer.flush()?;
        Ok(self.writer)
    }

    /// Return the underlying writer without an end marker.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl GraphWriter<FileSink> {
    /// Create a snapshot file, gzip-compressed when `gzip` is set.
    ///
    /// Call [`FileSink::close`] on the value returned by
    /// [`finish`](GraphWriter::finish) to flush it.
    pub fn create<P: AsRef<Path>>(path: P, header: FileHeader, gzip: bool) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        let sink = if gzip {
            FileSink::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            FileSink::Plain(file)
        };
        Self::with_header(sink, header)
    }
}
