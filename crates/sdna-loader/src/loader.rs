//! Chunk loader.
//!
//! Reads the file header and every record, registers records by their
//! original address, links the embedded schema as soon as it is read, and
//! hands the collected records to the [`Patcher`] once the stream ends.

use std::io;
use std::path::Path;
use std::sync::Arc;

use sdna_common::SpanArray;
use sdna_schema::{CompiledSchema, LinkGraph, SchemaOptions};

use crate::graph::LoadedGraph;
use crate::hooks::{LoadHooks, NoHooks, RecordView, ReportLevel};
use crate::patcher::Patcher;
use crate::record::{Record, RecordId};
use crate::stream::{open_stream, read_full, ByteStream, MemoryStream};
use crate::{
    AddressMap, Error, FileHeader, LoaderConfig, RecordCode, RecordHeader, RecordLayout, Result,
    FILE_HEADER_SIZE,
};

/// Progress of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    HeaderParsed,
    AwaitingSchema,
    SchemaLinked,
    Patching,
    Done,
    Failed,
}

/// Loads snapshots into the layout of one memory schema.
///
/// The memory schema is shared read-only, so independent loaders may run on
/// separate threads.
pub struct Loader<H: LoadHooks = NoHooks> {
    memory: Arc<CompiledSchema>,
    config: LoaderConfig,
    hooks: H,
    state: LoadState,
}

impl Loader<NoHooks> {
    pub fn new(memory: Arc<CompiledSchema>) -> Self {
        Self::with_hooks(memory, NoHooks)
    }
}

impl<H: LoadHooks> Loader<H> {
    pub fn with_hooks(memory: Arc<CompiledSchema>, hooks: H) -> Self {
        Self {
            memory,
            config: LoaderConfig::default(),
            hooks,
            state: LoadState::Idle,
        }
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[inline]
    pub fn memory_schema(&self) -> &Arc<CompiledSchema> {
        &self.memory
    }

    #[inline]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn into_hooks(self) -> H {
        self.hooks
    }

    /// Load a snapshot from a stream.
    ///
    /// Every call starts over from [`LoadState::Idle`]. On failure the state
    /// is [`LoadState::Failed`] and nothing from the stream is kept.
    pub fn load<S: ByteStream>(&mut self, stream: S) -> Result<LoadedGraph> {
        self.state = LoadState::Idle;
        match self.run(stream) {
            Ok(graph) => {
                self.state = LoadState::Done;
                Ok(graph)
            }
            Err(e) => {
                self.hooks.report(
                    ReportLevel::Error,
                    &format!("load failed while {:?}: {}", self.state, e),
                );
                self.state = LoadState::Failed;
                Err(e)
            }
        }
    }

    /// Load a snapshot held in memory.
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<LoadedGraph> {
        self.load(MemoryStream::new(data))
    }

    /// Load a snapshot file, gzip-compressed or not.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadedGraph> {
        let stream = open_stream(path)?;
        self.load(stream)
    }

    fn run<S: ByteStream>(&mut self, mut stream: S) -> Result<LoadedGraph> {
        self.hooks.initialize_memory_schema(&self.memory)?;

        let header = read_file_header(&mut stream, &self.config)?;
        self.state = LoadState::HeaderParsed;
        tracing::debug!(
            "file header: {} pointer width {} {:?} version {}",
            header.identifier_str(),
            header.pointer_width,
            header.endian,
            header.version
        );

        let layout = header.record_layout();
        let reduced = header.pointer_width != self.memory.schema().pointer_width();
        let mut addresses = AddressMap::new(reduced);
        let mut records: SpanArray<Record> = SpanArray::new();
        let mut linked: Option<(CompiledSchema, LinkGraph, Vec<u8>)> = None;
        let mut duplicates = 0;
        let mut ended = false;

        self.state = LoadState::AwaitingSchema;
        while let Some(record_header) = read_record_header(&mut stream, &layout)? {
            match record_header.code {
                RecordCode::END => {
                    ended = true;
                    break;
                }
                RecordCode::SCHEMA => {
                    let blob = read_payload(&mut stream, record_header.length as usize)?;
                    if linked.is_some() {
                        self.hooks
                            .report(ReportLevel::Warn, "ignoring repeated schema record");
                        continue;
                    }
                    let (file, links) = self.link_schema(&header, &blob)?;
                    linked = Some((file, links, blob));
                    self.state = LoadState::SchemaLinked;
                }
                _ => {
                    let payload = read_payload(&mut stream, record_header.length as usize)?;
                    let id = RecordId(records.len() as u32);
                    if let Some(existing) = addresses.register(record_header.address, id)? {
                        duplicates += 1;
                        self.hooks.report(
                            ReportLevel::Debug,
                            &format!(
                                "{} record at {:#x} repeats record {}, keeping the first",
                                record_header.code, record_header.address, existing.0
                            ),
                        );
                        continue;
                    }
                    records.append(Record::new(record_header, payload))?;
                }
            }
        }

        if !ended {
            if !self.config.tolerate_missing_end {
                return Err(Error::ReadTruncated {
                    needed: layout.header_size(),
                    available: 0,
                });
            }
            self.hooks
                .report(ReportLevel::Debug, "stream ended without an end marker");
        }

        let (file, links, schema_blob) = linked
            .ok_or_else(|| Error::LinkFailed("stream has no schema record".to_string()))?;

        self.state = LoadState::Patching;
        let mut records = records.into_vec();
        let stats = Patcher::new(&self.memory, &file, &links, &addresses)
            .run(&mut records, &self.hooks)?;
        tracing::debug!(
            records = records.len(),
            patched = stats.patched,
            dropped = stats.dropped,
            "patched snapshot"
        );

        for (index, record) in records.iter().enumerate() {
            if let Some(data) = record.data() {
                self.hooks.on_record_ready(RecordView {
                    id: RecordId(index as u32),
                    header: &record.header,
                    data,
                    memory_struct: record.memory_struct(),
                })?;
            }
        }

        Ok(LoadedGraph {
            header,
            memory: Arc::clone(&self.memory),
            file,
            links,
            records,
            schema_blob,
            stats,
            duplicates,
        })
    }

    fn link_schema(&self, header: &FileHeader, blob: &[u8]) -> Result<(CompiledSchema, LinkGraph)> {
        let options = SchemaOptions::new(header.endian, header.pointer_width)
            .with_max_table_len(self.config.max_table_len);
        let file = CompiledSchema::from_blob(blob, &options)?;
        let mut links = LinkGraph::link(&self.memory, &file);

        for name in &self.config.skip_types {
            match self.memory.schema().struct_by_name(name) {
                Some(index) => links.mark_skipped(index),
                None => self.hooks.report(
                    ReportLevel::Warn,
                    &format!("skip list names unknown struct {}", name),
                ),
            }
        }
        for (index, def) in self.memory.structs().iter().enumerate() {
            if self.hooks.should_skip(def.type_hash) {
                links.mark_skipped(index);
            }
        }

        tracing::debug!(structs = file.structs().len(), "linked file schema");
        Ok((file, links))
    }
}

/// Read the file header and the schema blob without patching anything.
pub fn scan_schema<S: ByteStream>(
    mut stream: S,
    config: &LoaderConfig,
) -> Result<(FileHeader, Vec<u8>)> {
    let header = read_file_header(&mut stream, config)?;
    let layout = header.record_layout();

    while let Some(record_header) = read_record_header(&mut stream, &layout)? {
        match record_header.code {
            RecordCode::SCHEMA => {
                let blob = read_payload(&mut stream, record_header.length as usize)?;
                return Ok((header, blob));
            }
            RecordCode::END => break,
            _ => skip_payload(&mut stream, record_header.length as usize)?,
        }
    }
    Err(Error::LinkFailed("stream has no schema record".to_string()))
}

/// [`scan_schema`] on a file path.
pub fn scan_schema_path<P: AsRef<Path>>(
    path: P,
    config: &LoaderConfig,
) -> Result<(FileHeader, Vec<u8>)> {
    scan_schema(open_stream(path)?, config)
}

fn read_file_header<S: ByteStream>(stream: &mut S, config: &LoaderConfig) -> Result<FileHeader> {
    let mut bytes = [0u8; FILE_HEADER_SIZE];
    let n = read_full(stream, &mut bytes)?;
    if n < FILE_HEADER_SIZE {
        return Err(Error::ReadTruncated {
            needed: FILE_HEADER_SIZE,
            available: n,
        });
    }

    let header = FileHeader::parse(&bytes)?;
    if header.identifier != config.identifier {
        return Err(Error::HeaderInvalid(format!(
            "identifier {:?} does not match {:?}",
            header.identifier_str(),
            String::from_utf8_lossy(&config.identifier)
        )));
    }
    Ok(header)
}

/// Read one record header, or `None` on a clean end of stream.
fn read_record_header<S: ByteStream>(
    stream: &mut S,
    layout: &RecordLayout,
) -> Result<Option<RecordHeader>> {
    let mut bytes = [0u8; 24];
    let bytes = &mut bytes[..layout.header_size()];
    match read_full(stream, bytes)? {
        0 => Ok(None),
        n if n < bytes.len() => Err(Error::ReadTruncated {
            needed: bytes.len(),
            available: n,
        }),
        _ => layout.decode(bytes).map(Some),
    }
}

fn read_payload<S: ByteStream>(stream: &mut S, length: usize) -> Result<Vec<u8>> {
    if let Some(remaining) = stream.remaining() {
        if length as u64 > remaining {
            return Err(Error::ReadTruncated {
                needed: length,
                available: remaining as usize,
            });
        }
    }

    let mut payload = SpanArray::filled(length, 0u8)?.into_vec();
    let n = read_full(stream, &mut payload)?;
    if n < length {
        return Err(Error::ReadTruncated {
            needed: length,
            available: n,
        });
    }
    Ok(payload)
}

fn skip_payload<S: ByteStream>(stream: &mut S, length: usize) -> Result<()> {
    let skipped = io::copy(&mut io::Read::take(&mut *stream, length as u64), &mut io::sink())?;
    if skipped < length as u64 {
        return Err(Error::ReadTruncated {
            needed: length,
            available: skipped as usize,
        });
    }
    Ok(())
}
