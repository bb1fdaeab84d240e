//! The `documents` file: query results on read, upserts on write.
//!
//! Opening runs the collection's query (or map-reduce job) and keeps the
//! rendered result as a snapshot. Reads are served from the snapshot. Writes
//! patch the snapshot and then apply the whole of it back to the collection:
//! documents without `_id` are inserted, documents with a well-formed `_id`
//! replace the stored document, anything else is skipped.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::buffer::ByteBuffer;
use super::error::{CollectionError, CollectionResult};
use super::text::TextFile;
use crate::store::{Collection, Document, ID_FIELD, MapReduce, ObjectId};
use crate::vfs::{FileOps, OpenFlags, VfsResult};

pub struct DocumentsFile {
    collection: Arc<dyn Collection>,
    query: Weak<TextFile>,
    map: Weak<TextFile>,
    reduce: Weak<TextFile>,
    /// Result of the last open, also the staging area for writes.
    snapshot: Mutex<ByteBuffer>,
}

impl std::fmt::Debug for DocumentsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentsFile")
            .field("collection", &self.collection.name())
            .finish_non_exhaustive()
    }
}

/// Content of a sibling text file; a dropped sibling reads as empty.
fn text_of(file: &Weak<TextFile>) -> Vec<u8> {
    file.upgrade().map(|f| f.snapshot()).unwrap_or_default()
}

fn trimmed_text_of(file: &Weak<TextFile>) -> String {
    String::from_utf8_lossy(&text_of(file)).trim().to_string()
}

/// Render documents as a tab-indented JSON array.
pub fn render(docs: &[Document]) -> CollectionResult<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    docs.serialize(&mut ser).map_err(CollectionError::Serialize)?;
    Ok(out)
}

impl DocumentsFile {
    pub fn new(
        collection: Arc<dyn Collection>,
        query: &Arc<TextFile>,
        map: &Arc<TextFile>,
        reduce: &Arc<TextFile>,
    ) -> Self {
        Self {
            collection,
            query: Arc::downgrade(query),
            map: Arc::downgrade(map),
            reduce: Arc::downgrade(reduce),
            snapshot: Mutex::new(ByteBuffer::new()),
        }
    }

    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.collection
    }

    fn filter(&self) -> CollectionResult<Document> {
        let text = text_of(&self.query);
        if text.is_empty() {
            return Ok(Document::new());
        }
        serde_json::from_slice(&text).map_err(CollectionError::Query)
    }

    /// Run the configured query and replace the snapshot with its result.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn open(&self, _flags: OpenFlags) -> CollectionResult<()> {
        let mut snapshot = self.snapshot.lock().await;

        let filter = self.filter()?;
        let map = trimmed_text_of(&self.map);
        let reduce = trimmed_text_of(&self.reduce);

        let docs = if map.is_empty() && reduce.is_empty() {
            self.collection.find(&filter).await
        } else {
            let job = MapReduce::new(map, reduce);
            self.collection.map_reduce(&filter, &job).await
        }
        .map_err(CollectionError::Execution)?;

        let text = render(&docs)?;
        debug!(
            "{}: materialized {} documents ({} bytes)",
            self.collection.name(),
            docs.len(),
            text.len()
        );
        snapshot.replace(text);
        Ok(())
    }

    pub async fn read(&self, offset: u64, size: u32) -> Vec<u8> {
        self.snapshot.lock().await.read(offset, size)
    }

    /// Patch the snapshot, then apply every document in it to the collection.
    ///
    /// Not transactional: documents applied before a failure stay applied,
    /// and the last failure is the one reported.
    pub async fn write(&self, offset: u64, data: &[u8]) -> CollectionResult<u32> {
        let mut snapshot = self.snapshot.lock().await;
        let written = snapshot.write(offset, data)?;

        let docs: Vec<Document> = serde_json::from_slice(snapshot.as_slice())
            .map_err(|source| CollectionError::MalformedBatch { written, source })?;

        let name = self.collection.name();
        let mut last_err = None;
        for mut doc in docs {
            let result = match doc.get(ID_FIELD) {
                None => self.collection.insert(doc).await,
                Some(Value::String(raw)) => match ObjectId::parse_str(raw) {
                    Ok(id) => {
                        doc.remove(ID_FIELD);
                        self.collection.update_id(&id, doc).await
                    }
                    Err(e) => {
                        debug!("{}: skipping document: {}", name, e);
                        continue;
                    }
                },
                Some(other) => {
                    debug!("{}: skipping document with non-string {}: {}", name, ID_FIELD, other);
                    continue;
                }
            };
            if let Err(e) = result {
                warn!("{}: failed to store document: {}", name, e);
                last_err = Some(e);
            }
        }

        match last_err {
            Some(source) => Err(CollectionError::Persistence { written, source }),
            None => Ok(written),
        }
    }

    /// Logical length of the snapshot.
    pub async fn len(&self) -> usize {
        self.snapshot.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl FileOps for DocumentsFile {
    async fn open(&self, flags: OpenFlags) -> VfsResult<()> {
        Ok(DocumentsFile::open(self, flags).await?)
    }

    async fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        Ok(DocumentsFile::read(self, offset, size).await)
    }

    async fn write(&self, offset: u64, data: &[u8]) -> VfsResult<u32> {
        Ok(DocumentsFile::write(self, offset, data).await?)
    }

    async fn size(&self) -> u64 {
        self.len().await as u64
    }
}
