//! End-to-end tests for the object writer and the read-back path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use cairn_content::{ContentError, ContentManager, MemoryContentManager};
use cairn_splitter::{FixedSplitter, Splitter, SplitterFactory, SplitterKind};
use cairn_types::{ObjectId, Prefix};
use tokio_util::sync::CancellationToken;

use crate::error::ObjectError;
use crate::index::{IndirectEntry, IndirectIndex};
use crate::manager::ObjectManager;
use crate::writer::WriterOptions;

const TEST_MAX_BYTES: u64 = 1_000_000_000;

/// Generate deterministic, non-repeating test data.
fn test_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut state: u32 = 0xDEAD_BEEF;
    for _ in 0..size {
        state = state.wrapping_mul(1103515245).wrapping_add(12345);
        data.push((state >> 16) as u8);
    }
    data
}

/// Manager over an in-memory content store, plus a handle to that store.
fn fixture(splitters: impl SplitterFactory + 'static) -> (ObjectManager, Arc<MemoryContentManager>) {
    let content = Arc::new(MemoryContentManager::new(TEST_MAX_BYTES));
    let manager = ObjectManager::new(content.clone(), Arc::new(splitters));
    (manager, content)
}

/// Splitter that splits after fixed 1-based byte positions, then never again.
struct ScriptedSplitter {
    split_after: Vec<usize>,
    seen: usize,
}

impl Splitter for ScriptedSplitter {
    fn should_split(&mut self, _byte: u8) -> bool {
        self.seen += 1;
        self.split_after.contains(&self.seen)
    }

    fn max_segment_size(&self) -> usize {
        1 << 20
    }
}

/// Factory handing the scripted splitter to the first writer and a
/// never-splitting one to every later writer (the nested index writer must
/// not replay the script).
struct ScriptedFactory {
    script: Mutex<Option<Vec<usize>>>,
}

impl ScriptedFactory {
    fn new(split_after: Vec<usize>) -> Self {
        Self {
            script: Mutex::new(Some(split_after)),
        }
    }
}

impl SplitterFactory for ScriptedFactory {
    fn new_splitter(&self) -> Box<dyn Splitter> {
        match self.script.lock().unwrap().take() {
            Some(split_after) => Box::new(ScriptedSplitter {
                split_after,
                seen: 0,
            }),
            None => Box::new(FixedSplitter::new(1 << 20)),
        }
    }
}

/// Content manager that fails the nth `write_content` call.
struct FailingContentManager {
    inner: MemoryContentManager,
    fail_on: usize,
    writes: AtomicUsize,
}

impl FailingContentManager {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: MemoryContentManager::new(TEST_MAX_BYTES),
            fail_on,
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ContentManager for FailingContentManager {
    async fn write_content(
        &self,
        payload: &[u8],
        prefix: Option<Prefix>,
    ) -> Result<cairn_types::ContentId, ContentError> {
        let n = self.writes.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_on {
            return Err(ContentError::Storage("synthetic write failure".to_string()));
        }
        self.inner.write_content(payload, prefix).await
    }

    async fn open_content(
        &self,
        id: &cairn_types::ContentId,
    ) -> Result<Bytes, ContentError> {
        self.inner.open_content(id).await
    }
}

/// Parse the indirect index document behind an indirect object id.
async fn load_index(manager: &ObjectManager, id: &ObjectId) -> IndirectIndex {
    let ObjectId::Indirect(inner) = id else {
        panic!("expected an indirect object id, got {id}");
    };
    let document = manager.open(inner).await.unwrap();
    serde_json::from_slice(&document).unwrap()
}

// -----------------------------------------------------------------------
// Single chunk, no compression
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_single_small_chunk() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();

    assert_eq!(writer.write(b"hello").await.unwrap(), 5);
    let oid = writer.result().await.unwrap();

    let expected = content.write_content(b"hello", None).await.unwrap();
    assert_eq!(oid, ObjectId::Direct(expected));
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), b"hello");
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_total_bytes_matches_input() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 16 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(1000);

    writer.write(&data[..400]).await.unwrap();
    writer.write(&data[400..]).await.unwrap();
    assert_eq!(writer.total_bytes(), 1000);
}

// -----------------------------------------------------------------------
// Multi-chunk objects and the indirect index
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_split_into_three_chunks() {
    let (manager, content) = fixture(ScriptedFactory::new(vec![3, 6]));
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();

    writer.write(b"abcdefghi").await.unwrap();
    let oid = writer.result().await.unwrap();
    assert!(oid.is_indirect());

    let index = load_index(&manager, &oid).await;
    index.validate().unwrap();
    assert_eq!(index.entries.len(), 3);

    for (i, (start, payload)) in [(0u64, b"abc"), (3, b"def"), (6, b"ghi")]
        .into_iter()
        .enumerate()
    {
        assert_eq!(index.entries[i].start, start);
        assert_eq!(index.entries[i].length, 3);
        let expected = content.write_content(payload, None).await.unwrap();
        assert_eq!(index.entries[i].object, ObjectId::Direct(expected));
    }

    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), b"abcdefghi");
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_index_entries_are_contiguous() {
    let (manager, _) = fixture(ScriptedFactory::new((1..=9).map(|i| i * 100).collect()));
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(950);

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    let index = load_index(&manager, &oid).await;
    index.validate().unwrap();
    assert_eq!(index.entries[0].start, 0);
    assert_eq!(index.total_length(), 950);
    assert_eq!(index.entries.len(), 10);
    for pair in index.entries.windows(2) {
        assert_eq!(pair[1].start, pair[0].start + pair[0].length);
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_split_at_first_byte() {
    let (manager, _) = fixture(ScriptedFactory::new(vec![1]));
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();

    writer.write(b"ab").await.unwrap();
    let oid = writer.result().await.unwrap();

    let index = load_index(&manager, &oid).await;
    assert_eq!(index.entries.len(), 2);
    assert_eq!(index.entries[0].length, 1);
    assert_eq!(index.entries[1].start, 1);
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), b"ab");
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_nested_index_when_document_itself_splits() {
    // A 512-byte splitter forces the first index document to exceed one
    // segment, so the nested writer recurses one more level.
    let (manager, _) = fixture(SplitterKind::Fixed { size: 512 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(5120);

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    let ObjectId::Indirect(inner) = &oid else {
        panic!("expected indirect");
    };
    assert!(inner.is_indirect(), "index document should have split");
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

// -----------------------------------------------------------------------
// Segment-size boundaries
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_exactly_one_segment_is_a_single_chunk() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 4096 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(4096);

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();
    assert!(!oid.is_indirect(), "one full segment is one chunk");
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_hard_split_bounds_chunk_count() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 4096 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(10_000);

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    let index = load_index(&manager, &oid).await;
    // ceil(10000 / 4096) = 3 chunks.
    assert_eq!(index.entries.len(), 3);
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
#[ntest::timeout(20000)]
async fn test_rolling_splitter_roundtrip() {
    let (manager, _) = fixture(SplitterKind::Rolling { avg_size: 4096 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    let data = test_data(300_000);

    // Uneven write sizes must not affect chunking.
    for slice in data.chunks(7_001) {
        writer.write(slice).await.unwrap();
    }
    let oid = writer.result().await.unwrap();
    assert!(oid.is_indirect());
    assert_eq!(writer.total_bytes(), 300_000);
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

// -----------------------------------------------------------------------
// Empty object
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_empty_object_is_one_direct_chunk() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();

    let oid = writer.result().await.unwrap();
    assert!(!oid.is_indirect());

    let expected = content.write_content(b"", None).await.unwrap();
    assert_eq!(oid, ObjectId::Direct(expected));
    assert!(manager.open(&oid).await.unwrap().is_empty());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_empty_object_with_compressor_stays_uncompressed() {
    // Even an empty zstd frame is longer than zero bytes, so the
    // shrink-or-skip rule keeps the raw payload.
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager
        .new_writer(WriterOptions::default().compressor("zstd"))
        .unwrap();

    let oid = writer.result().await.unwrap();
    assert!(matches!(oid, ObjectId::Direct(_)));
}

// -----------------------------------------------------------------------
// Compression
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_compressible_chunk_is_stored_compressed() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager
        .new_writer(WriterOptions::default().compressor("zstd"))
        .unwrap();
    let data = vec![0u8; 4096];

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    let ObjectId::Compressed(content_id) = &oid else {
        panic!("expected a compressed object id, got {oid}");
    };
    let stored = content.open_content(content_id).await.unwrap();
    assert!(
        stored.len() < 100,
        "4 KB of zeros should store as a few dozen bytes, got {}",
        stored.len()
    );
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_incompressible_chunk_is_stored_raw() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager
        .new_writer(WriterOptions::default().compressor("zstd"))
        .unwrap();
    let data = test_data(32);

    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    let ObjectId::Direct(content_id) = &oid else {
        panic!("expected a direct object id, got {oid}");
    };
    let stored = content.open_content(content_id).await.unwrap();
    assert_eq!(stored.as_ref(), data.as_slice());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_unknown_compressor_is_rejected() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let result = manager.new_writer(WriterOptions::default().compressor("lz77"));
    assert!(matches!(result, Err(ObjectError::UnknownCompressor(_))));
}

// -----------------------------------------------------------------------
// Determinism and deduplication
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(20000)]
async fn test_identical_streams_yield_identical_ids() {
    let data = test_data(200_000);
    let mut ids = Vec::new();

    for _ in 0..2 {
        let (manager, _) = fixture(SplitterKind::Rolling { avg_size: 4096 });
        let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
        writer.write(&data).await.unwrap();
        ids.push(writer.result().await.unwrap().to_string());
    }

    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_repeated_content_deduplicates() {
    let (manager, content) = fixture(ScriptedFactory::new((1..=8).map(|i| i * 64).collect()));
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();

    // Eight identical segments: one stored chunk plus the index document.
    let data = vec![0xA5u8; 8 * 64];
    writer.write(&data).await.unwrap();
    let oid = writer.result().await.unwrap();

    assert_eq!(content.content_count(), 2);
    assert_eq!(manager.open(&oid).await.unwrap().as_ref(), data.as_slice());
}

// -----------------------------------------------------------------------
// Prefix routing
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_prefix_propagates_to_every_chunk() {
    let (manager, _) = fixture(ScriptedFactory::new((1..=9).map(|i| i * 100).collect()));
    let prefix = Prefix::new('g').unwrap();
    let mut writer = manager
        .new_writer(WriterOptions::default().prefix(prefix))
        .unwrap();

    writer.write(&test_data(950)).await.unwrap();
    writer.result().await.unwrap();

    let ids = manager.session_content_ids();
    assert!(!ids.is_empty());
    for id in ids {
        assert_eq!(id.prefix(), Some(prefix), "chunk id {id} lost its prefix");
    }
}

// -----------------------------------------------------------------------
// Session content-id tracking
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_tracker_accumulates_across_writers() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });

    let mut first = manager.new_writer(WriterOptions::default()).unwrap();
    first.write(b"first object").await.unwrap();
    first.result().await.unwrap();

    let mut second = manager.new_writer(WriterOptions::default()).unwrap();
    second.write(b"second object").await.unwrap();
    second.result().await.unwrap();

    assert_eq!(manager.session_content_ids().len(), 2);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_tracker_records_deduplicated_ids_once() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });

    for _ in 0..3 {
        let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
        writer.write(b"same object").await.unwrap();
        writer.result().await.unwrap();
    }

    assert_eq!(manager.session_content_ids().len(), 1);
}

// -----------------------------------------------------------------------
// Failure semantics
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_storage_failure_poisons_writer() {
    let content = Arc::new(FailingContentManager::new(1));
    let manager = ObjectManager::new(content, Arc::new(SplitterKind::Fixed { size: 3 }));
    let mut writer = manager
        .new_writer(WriterOptions::default().description("victim"))
        .unwrap();

    // Chunk 0 flushes fine; chunk 1 hits the synthetic failure.
    let err = writer.write(b"abcdef").await.unwrap_err();
    let ObjectError::FlushChunk {
        chunk,
        description,
        source,
    } = &err
    else {
        panic!("expected FlushChunk, got {err}");
    };
    assert_eq!(*chunk, 1);
    assert_eq!(description, "victim");
    assert!(matches!(source, ContentError::Storage(_)));
    assert!(err.to_string().contains("victim"));
    assert!(err.to_string().contains("chunk 1"));

    // Poisoned: every subsequent operation re-surfaces the same error.
    let again = writer.write(b"more").await.unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    let result_err = writer.result().await.unwrap_err();
    assert_eq!(result_err.to_string(), err.to_string());

    // Close still releases buffers.
    writer.close();
    writer.close();
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_cancellation_fails_the_flush() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 2 });
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut writer = manager
        .new_writer(WriterOptions::default().cancel(cancel))
        .unwrap();
    let err = writer.write(b"abcd").await.unwrap_err();
    assert!(matches!(
        err,
        ObjectError::FlushChunk {
            source: ContentError::Cancelled,
            ..
        }
    ));

    // Cancellation poisons like any other flush failure.
    assert!(writer.result().await.is_err());
}

// -----------------------------------------------------------------------
// Writer lifecycle
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_write_after_result_is_rejected() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    writer.write(b"data").await.unwrap();
    writer.result().await.unwrap();

    assert!(matches!(
        writer.write(b"more").await,
        Err(ObjectError::Finalized { .. })
    ));
    assert!(matches!(
        writer.result().await,
        Err(ObjectError::Finalized { .. })
    ));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_close_is_idempotent() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let mut writer = manager.new_writer(WriterOptions::default()).unwrap();
    writer.write(b"discarded").await.unwrap();

    writer.close();
    writer.close();
    assert!(matches!(
        writer.write(b"late").await,
        Err(ObjectError::Finalized { .. })
    ));
}

// -----------------------------------------------------------------------
// Read-back validation
// -----------------------------------------------------------------------

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_open_rejects_non_index_payload_as_indirect() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let id = content.write_content(b"just some bytes", None).await.unwrap();

    let bogus = ObjectId::indirect(ObjectId::Direct(id));
    let err = manager.open(&bogus).await.unwrap_err();
    assert!(matches!(err, ObjectError::MalformedIndex { .. }));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_open_rejects_wrong_sentinel() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let chunk_id = content.write_content(b"abc", None).await.unwrap();

    let mut index = IndirectIndex::new(vec![IndirectEntry {
        start: 0,
        length: 3,
        object: ObjectId::Direct(chunk_id),
    }]);
    index.stream = "not:ours".to_string();

    let doc = serde_json::to_vec(&index).unwrap();
    let doc_id = content.write_content(&doc, None).await.unwrap();

    let err = manager
        .open(&ObjectId::indirect(ObjectId::Direct(doc_id)))
        .await
        .unwrap_err();
    assert!(matches!(err, ObjectError::MalformedIndex { .. }));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_open_rejects_length_mismatch() {
    let (manager, content) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let chunk_id = content.write_content(b"abc", None).await.unwrap();

    // The index claims 5 bytes; the stored chunk has 3.
    let index = IndirectIndex::new(vec![IndirectEntry {
        start: 0,
        length: 5,
        object: ObjectId::Direct(chunk_id),
    }]);
    let doc = serde_json::to_vec(&index).unwrap();
    let doc_id = content.write_content(&doc, None).await.unwrap();

    let err = manager
        .open(&ObjectId::indirect(ObjectId::Direct(doc_id)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ObjectError::LengthMismatch {
            entry: 0,
            expected: 5,
            actual: 3,
        }
    ));
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_open_missing_content_fails() {
    let (manager, _) = fixture(SplitterKind::Fixed { size: 1 << 20 });
    let id = ObjectId::parse("0000000000000000000000000000000000000000000000000000000000000000")
        .unwrap();
    let err = manager.open(&id).await.unwrap_err();
    assert!(matches!(
        err,
        ObjectError::Content(ContentError::NotFound(_))
    ));
}
