//! Save and load snapshots end to end.

use std::sync::Arc;

use sdna_common::Endian;
use sdna_loader::{
    ErrorKind, FileHeader, GraphWriter, LoadHooks, LoadState, LoadedGraph, Loader, LoaderConfig,
    RecordCode, RecordId, RecordView, Result, DEFAULT_VERSION,
};
use sdna_schema::{CompiledSchema, NumericValue, SchemaBuilder};

const NODE: RecordCode = RecordCode::new(b"ND");
const POINT: RecordCode = RecordCode::new(b"PT");

/// `Node { int id; float weight; Node *next; char name[8]; }` and
/// `Point { int x; int y; }` in the running build's layout.
fn memory_schema() -> Arc<CompiledSchema> {
    let mut builder = SchemaBuilder::new();
    let node = builder.add_struct("Node");
    builder.add_member(node, "int", "id").unwrap();
    builder.add_member(node, "float", "weight").unwrap();
    builder.add_member(node, "Node", "*next").unwrap();
    builder.add_member(node, "char", "name[8]").unwrap();
    let point = builder.add_struct("Point");
    builder.add_member(point, "int", "x").unwrap();
    builder.add_member(point, "int", "y").unwrap();
    Arc::new(CompiledSchema::compile(builder.build().unwrap()).unwrap())
}

/// Fills struct buffers through the compiled layout.
struct Encoder<'a> {
    schema: &'a CompiledSchema,
    struct_index: usize,
    bytes: Vec<u8>,
}

impl<'a> Encoder<'a> {
    fn new(schema: &'a CompiledSchema, name: &str) -> Self {
        let struct_index = schema.schema().struct_by_name(name).unwrap();
        let length = schema.struct_def(struct_index).unwrap().length;
        Self {
            schema,
            struct_index,
            bytes: vec![0; length],
        }
    }

    fn set(mut self, path: &str, value: NumericValue) -> Self {
        let (member, _) = self.schema.member_by_path(self.struct_index, path).unwrap();
        let kind = member.primitive.unwrap();
        let slot = &mut self.bytes[member.offset..member.offset + member.size];
        assert!(kind.write(value, slot, self.schema.schema().endian()));
        self
    }

    fn pointer(mut self, path: &str, address: u64) -> Self {
        let (member, _) = self.schema.member_by_path(self.struct_index, path).unwrap();
        let width = self.schema.schema().pointer_width() as usize;
        let slot = &mut self.bytes[member.offset..member.offset + width];
        assert!(self.schema.schema().endian().write_uint(slot, width, address));
        self
    }

    fn text(mut self, path: &str, text: &[u8]) -> Self {
        let (member, _) = self.schema.member_by_path(self.struct_index, path).unwrap();
        self.bytes[member.offset..member.offset + text.len()].copy_from_slice(text);
        self
    }
}

fn load(memory: &Arc<CompiledSchema>, bytes: &[u8]) -> LoadedGraph {
    Loader::new(Arc::clone(memory)).load_bytes(bytes).unwrap()
}

#[test]
fn test_round_trip_same_schema_is_byte_identical() {
    let memory = memory_schema();
    let node_index = memory.schema().struct_by_name("Node").unwrap() as u32;
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;

    // Addresses equal the handles the loader assigns, so pointer slots
    // survive unchanged.
    let first = Encoder::new(&memory, "Node")
        .set("id", NumericValue::Signed(1))
        .set("weight", NumericValue::Float(0.5))
        .pointer("next", 2)
        .text("name", b"head")
        .bytes;
    let second = Encoder::new(&memory, "Node")
        .set("id", NumericValue::Signed(2))
        .set("weight", NumericValue::Float(-3.25))
        .text("name", b"tail")
        .bytes;
    let point = Encoder::new(&memory, "Point")
        .set("x", NumericValue::Signed(-7))
        .set("y", NumericValue::Signed(9))
        .bytes;

    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_struct(NODE, 1, node_index, 1, &first).unwrap();
    writer.write_struct(NODE, 2, node_index, 1, &second).unwrap();
    writer.write_struct(POINT, 3, point_index, 1, &point).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    let bytes = writer.finish().unwrap();

    let graph = load(&memory, &bytes);
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.stats().patched, 3);
    assert_eq!(graph.record(RecordId(0)).unwrap().data(), Some(&first[..]));
    assert_eq!(graph.record(RecordId(1)).unwrap().data(), Some(&second[..]));
    assert_eq!(graph.record(RecordId(2)).unwrap().data(), Some(&point[..]));

    let next = graph.read_pointer(RecordId(0), 0, "next").unwrap();
    let target = graph.resolve(next).unwrap();
    assert_eq!(target.header.address, 2);
    assert_eq!(graph.read_pointer(RecordId(1), 0, "next"), Some(0));
    assert_eq!(graph.schema_blob(), &memory.schema().to_blob(Endian::NATIVE)[..]);
}

#[test]
fn test_reordered_and_retyped_members() {
    let memory = memory_schema();

    let mut old = SchemaBuilder::new()
        .with_endian(Endian::Little)
        .with_pointer_width(4);
    let point = old.add_struct("Point");
    old.add_member(point, "short", "y").unwrap();
    old.add_member(point, "float", "x").unwrap();
    old.add_member(point, "int", "z").unwrap();
    let old = old.build().unwrap();

    let mut payload = Vec::new();
    payload.extend_from_slice(&7i16.to_le_bytes());
    payload.extend_from_slice(&2.9f32.to_le_bytes());
    payload.extend_from_slice(&5i32.to_le_bytes());

    let mut writer = GraphWriter::new(Vec::new(), &old).unwrap();
    writer.write_schema(&old).unwrap();
    writer.write_struct(POINT, 0x40, 0, 1, &payload).unwrap();
    let bytes = writer.finish().unwrap();

    let graph = load(&memory, &bytes);
    let (id, _) = graph.records_of_type("Point").next().unwrap();
    assert_eq!(graph.read_member(id, 0, "x").map(NumericValue::as_i64), Some(2));
    assert_eq!(graph.read_member(id, 0, "y").map(NumericValue::as_i64), Some(7));
    assert_eq!(graph.header().pointer_width, 4);
}

#[test]
fn test_big_endian_32_bit_file_into_native_layout() {
    let memory = memory_schema();

    let mut old = SchemaBuilder::new()
        .with_endian(Endian::Big)
        .with_pointer_width(4);
    let node = old.add_struct("Node");
    old.add_member(node, "int", "id").unwrap();
    old.add_member(node, "Node", "*next").unwrap();
    let old = old.build().unwrap();

    let node_bytes = |id: i32, next: u32| {
        let mut out = id.to_be_bytes().to_vec();
        out.extend_from_slice(&next.to_be_bytes());
        out
    };

    let header = FileHeader::new(4, Endian::Big, 249);
    let mut writer = GraphWriter::with_header(Vec::new(), header).unwrap();
    writer.write_schema(&old).unwrap();
    writer
        .write_struct(NODE, 0x1000_0010, 0, 1, &node_bytes(42, 0x1000_0020))
        .unwrap();
    writer
        .write_struct(NODE, 0x1000_0020, 0, 1, &node_bytes(43, 0xdead_0000))
        .unwrap();
    let bytes = writer.finish().unwrap();

    let graph = load(&memory, &bytes);
    assert_eq!(graph.read_member(RecordId(0), 0, "id").map(NumericValue::as_i64), Some(42));
    assert_eq!(graph.read_member(RecordId(1), 0, "id").map(NumericValue::as_i64), Some(43));

    let next = graph.read_pointer(RecordId(0), 0, "next").unwrap();
    assert_eq!(next, RecordId(1).handle());
    assert_eq!(graph.resolve(next).unwrap().header.address, 0x1000_0020);

    // Dangling pointers come back null.
    assert_eq!(graph.read_pointer(RecordId(1), 0, "next"), Some(0));
    assert_eq!(graph.stats().unresolved, 1);

    // Members missing from the file stay zeroed.
    assert_eq!(graph.read_member(RecordId(0), 0, "weight").map(NumericValue::as_f64), Some(0.0));
}

#[test]
fn test_pointer_array_block_is_widened() {
    let mut builder = SchemaBuilder::new();
    let point = builder.add_struct("Point");
    builder.add_member(point, "int", "x").unwrap();
    builder.add_member(point, "int", "y").unwrap();
    let mesh = builder.add_struct("Mesh");
    builder.add_member(mesh, "int", "count").unwrap();
    builder.add_member(mesh, "Point", "**items").unwrap();
    let memory = Arc::new(CompiledSchema::compile(builder.build().unwrap()).unwrap());

    let mut old = SchemaBuilder::new()
        .with_endian(Endian::Little)
        .with_pointer_width(4);
    let point = old.add_struct("Point");
    old.add_member(point, "int", "x").unwrap();
    old.add_member(point, "int", "y").unwrap();
    let mesh = old.add_struct("Mesh");
    old.add_member(mesh, "int", "count").unwrap();
    old.add_member(mesh, "Point", "**items").unwrap();
    let old = old.build().unwrap();

    let le = |values: &[u32]| -> Vec<u8> { values.iter().flat_map(|v| v.to_le_bytes()).collect() };

    let mut writer = GraphWriter::new(Vec::new(), &old).unwrap();
    writer.write_schema(&old).unwrap();
    writer.write_struct(RecordCode::new(b"ME"), 0x100, 1, 1, &le(&[2, 0x200])).unwrap();
    writer.write_data(0x200, &le(&[0x300, 0x310])).unwrap();
    writer.write_struct(POINT, 0x300, 0, 1, &le(&[1, 2])).unwrap();
    writer.write_struct(POINT, 0x310, 0, 1, &le(&[3, 4])).unwrap();
    let bytes = writer.finish().unwrap();

    let graph = load(&memory, &bytes);
    assert_eq!(graph.stats().corrected, 1);

    let items = graph.read_pointer(RecordId(0), 0, "items").unwrap();
    let block = graph.resolve(items).unwrap();
    assert!(block.is_corrected());

    let width = memory.schema().pointer_width() as usize;
    let handles: Vec<u64> = block
        .data()
        .unwrap()
        .chunks_exact(width)
        .map(|slot| Endian::NATIVE.read_uint(slot, width).unwrap())
        .collect();
    assert_eq!(handles, vec![RecordId(2).handle(), RecordId(3).handle()]);

    let second = RecordId::from_handle(handles[1]).unwrap();
    assert_eq!(graph.read_member(second, 0, "y").map(NumericValue::as_i64), Some(4));
}

#[test]
fn test_gzip_file_on_disk() {
    let memory = memory_schema();
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;
    let point = Encoder::new(&memory, "Point")
        .set("x", NumericValue::Signed(11))
        .set("y", NumericValue::Signed(12))
        .bytes;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.snap");
    let header = FileHeader::new(
        memory.schema().pointer_width(),
        memory.schema().endian(),
        DEFAULT_VERSION,
    );
    let mut writer = GraphWriter::create(&path, header, true).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    writer.write_struct(POINT, 0x10, point_index, 1, &point).unwrap();
    writer.finish().unwrap().close().unwrap();

    let mut loader = Loader::new(Arc::clone(&memory));
    let graph = loader.load_path(&path).unwrap();
    assert_eq!(loader.state(), LoadState::Done);
    assert_eq!(graph.record(RecordId(0)).unwrap().data(), Some(&point[..]));
}

#[test]
fn test_missing_schema_is_a_link_failure() {
    let memory = memory_schema();
    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_data(0x10, &[0; 8]).unwrap();
    let bytes = writer.finish().unwrap();

    let mut loader = Loader::new(memory);
    let err = loader.load_bytes(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LinkFailed);
    assert_eq!(loader.state(), LoadState::Failed);
}

#[test]
fn test_bad_header() {
    let memory = memory_schema();
    let mut loader = Loader::new(memory);
    let err = loader.load_bytes(b"SNAPDNA#v300").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HeaderInvalid);

    let err = loader.load_bytes(b"SNAP").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadTruncated);
}

#[test]
fn test_oversized_record_length_is_truncation() {
    let memory = memory_schema();
    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    writer.write_data(0x10, &[0; 64]).unwrap();
    let bytes = writer.into_inner();

    let cut = bytes.len() - 10;
    let err = Loader::new(memory).load_bytes(&bytes[..cut]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadTruncated);
}

#[test]
fn test_duplicate_address_keeps_first() {
    let memory = memory_schema();
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;
    let point = |x: i64| {
        Encoder::new(&memory, "Point")
            .set("x", NumericValue::Signed(x))
            .bytes
    };

    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    writer.write_struct(POINT, 0x10, point_index, 1, &point(1)).unwrap();
    writer.write_struct(POINT, 0x10, point_index, 1, &point(2)).unwrap();
    let bytes = writer.finish().unwrap();

    let graph = load(&memory, &bytes);
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.duplicate_count(), 1);
    assert_eq!(graph.read_member(RecordId(0), 0, "x").map(NumericValue::as_i64), Some(1));
}

#[test]
fn test_skip_list_drops_records_and_pointers() {
    let memory = memory_schema();
    let node_index = memory.schema().struct_by_name("Node").unwrap() as u32;
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;
    let node = Encoder::new(&memory, "Node").pointer("next", 0x20).bytes;
    let point = Encoder::new(&memory, "Point").bytes;

    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    writer.write_struct(POINT, 0x10, point_index, 1, &point).unwrap();
    writer.write_struct(NODE, 0x20, node_index, 1, &node).unwrap();
    let bytes = writer.finish().unwrap();

    let config = LoaderConfig::new().skip_type("Point").skip_type("Node");
    let graph = Loader::new(memory).with_config(config).load_bytes(&bytes).unwrap();
    assert_eq!(graph.stats().dropped, 2);
    assert!(graph.records_of_type("Point").next().is_none());
    assert!(graph.record(RecordId(0)).unwrap().data().is_none());
}

#[derive(Default)]
struct Collector {
    initialized: bool,
    seen: Vec<(RecordId, RecordCode, usize)>,
    skip_hash: Option<u32>,
}

impl LoadHooks for Collector {
    fn initialize_memory_schema(&mut self, memory: &CompiledSchema) -> Result<()> {
        self.initialized = true;
        let point = memory.schema().struct_by_name("Point").unwrap();
        self.skip_hash = memory.struct_def(point).map(|def| def.type_hash);
        Ok(())
    }

    fn should_skip(&self, type_hash: u32) -> bool {
        self.skip_hash == Some(type_hash)
    }

    fn on_record_ready(&mut self, record: RecordView<'_>) -> Result<()> {
        self.seen.push((record.id, record.header.code, record.data.len()));
        Ok(())
    }
}

#[test]
fn test_hooks_see_records_in_file_order() {
    let memory = memory_schema();
    let node_index = memory.schema().struct_by_name("Node").unwrap() as u32;
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;
    let node = Encoder::new(&memory, "Node").bytes;
    let point = Encoder::new(&memory, "Point").bytes;

    let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
    writer.write_schema(memory.schema()).unwrap();
    writer.write_struct(NODE, 0x10, node_index, 1, &node).unwrap();
    writer.write_struct(POINT, 0x20, point_index, 1, &point).unwrap();
    writer.write_data(0x30, b"blob").unwrap();
    writer.write_struct(NODE, 0x40, node_index, 1, &node).unwrap();
    let bytes = writer.finish().unwrap();

    let mut loader = Loader::with_hooks(Arc::clone(&memory), Collector::default());
    loader.load_bytes(&bytes).unwrap();
    let hooks = loader.into_hooks();

    assert!(hooks.initialized);
    assert_eq!(
        hooks.seen,
        vec![
            (RecordId(0), NODE, node.len()),
            (RecordId(2), RecordCode::DATA, 4),
            (RecordId(3), NODE, node.len()),
        ]
    );
}

/// Copies `Point` records in their file layout.
struct VerbatimPoints {
    point_hash: u32,
}

impl LoadHooks for VerbatimPoints {
    fn is_verbatim_type(&self, type_hash: u32) -> bool {
        type_hash == self.point_hash
    }
}

#[test]
fn test_verbatim_type_keeps_file_bytes() {
    let memory = memory_schema();

    let mut old = SchemaBuilder::new();
    let node = old.add_struct("Node");
    old.add_member(node, "int", "id").unwrap();
    old.add_member(node, "float", "weight").unwrap();
    old.add_member(node, "Node", "*next").unwrap();
    old.add_member(node, "char", "name[8]").unwrap();
    let point = old.add_struct("Point");
    old.add_member(point, "int", "y").unwrap();
    old.add_member(point, "int", "x").unwrap();
    let old = CompiledSchema::compile(old.build().unwrap()).unwrap();

    let node_bytes = Encoder::new(&old, "Node")
        .set("id", NumericValue::Signed(5))
        .pointer("next", 0x30)
        .bytes;
    let point_bytes = Encoder::new(&old, "Point")
        .set("y", NumericValue::Signed(20))
        .set("x", NumericValue::Signed(10))
        .bytes;

    let mut writer = GraphWriter::new(Vec::new(), old.schema()).unwrap();
    writer.write_schema(old.schema()).unwrap();
    writer.write_struct(NODE, 0x10, 0, 1, &node_bytes).unwrap();
    writer.write_struct(POINT, 0x30, 1, 1, &point_bytes).unwrap();
    let bytes = writer.finish().unwrap();

    let point_hash = memory.struct_by_name("Point").unwrap().type_hash;
    let graph = Loader::with_hooks(Arc::clone(&memory), VerbatimPoints { point_hash })
        .load_bytes(&bytes)
        .unwrap();

    assert_eq!(graph.stats().verbatim, 1);
    assert_eq!(graph.stats().patched, 1);
    let (id, record) = graph.records_of_type("Point").next().unwrap();
    assert_eq!(id, RecordId(1));
    assert_eq!(record.data(), Some(&point_bytes[..]));

    let next = graph.read_pointer(RecordId(0), 0, "next").unwrap();
    assert_eq!(next, RecordId(1).handle());
    assert_eq!(graph.resolve(next).unwrap().header.address, 0x30);
    assert_eq!(graph.read_member(RecordId(0), 0, "id").map(NumericValue::as_i64), Some(5));
}

#[test]
fn test_parallel_loads_share_memory_schema() {
    let memory = memory_schema();
    let point_index = memory.schema().struct_by_name("Point").unwrap() as u32;

    let files: Vec<Vec<u8>> = (0..4)
        .map(|i| {
            let point = Encoder::new(&memory, "Point")
                .set("x", NumericValue::Signed(i))
                .bytes;
            let mut writer = GraphWriter::new(Vec::new(), memory.schema()).unwrap();
            writer.write_schema(memory.schema()).unwrap();
            writer.write_struct(POINT, 0x10, point_index, 1, &point).unwrap();
            writer.finish().unwrap()
        })
        .collect();

    let values: Vec<i64> = std::thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|bytes| {
                let memory = Arc::clone(&memory);
                scope.spawn(move || {
                    let graph = Loader::new(memory).load_bytes(bytes).unwrap();
                    graph
                        .read_member(RecordId(0), 0, "x")
                        .map(NumericValue::as_i64)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(values, vec![0, 1, 2, 3]);
}
