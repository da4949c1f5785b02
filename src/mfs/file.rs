//! Mutable file
//!
//! A clean file reads straight from its chunked DAG. The first mutation pulls
//! the whole content into a buffer; flushing chunks the buffer back into the
//! store and drops it.

use crate::dag::{DagNode, Link};
use crate::error::{MfsError, StorageError};
use crate::importer::{build_dag_from_reader, cat, DagReader};
use crate::mfs::{ParentRef, TreeContext};
use crate::types::Key;
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

enum Content {
    /// Bytes live in the store under `node`
    Stored {
        node: DagNode,
        reader: Option<DagReader>,
    },
    /// Whole file in memory, not yet flushed
    Buffered(Vec<u8>),
}

struct FileState {
    content: Content,
    /// Key and cumulative size of the last flushed node
    key: Key,
    size: u64,
    offset: u64,
    closed: bool,
}

/// File in a mutable tree
pub struct File {
    name: String,
    ctx: Arc<TreeContext>,
    parent: Mutex<ParentRef>,
    dirty: AtomicBool,
    state: Mutex<FileState>,
}

impl File {
    /// Wrap a stored file node
    pub(crate) fn from_node(
        name: String,
        node: DagNode,
        key: Key,
        parent: ParentRef,
        ctx: Arc<TreeContext>,
    ) -> Result<Arc<Self>, MfsError> {
        let size = node.cumulative_size()?;
        Ok(Arc::new(Self {
            name,
            ctx,
            parent: Mutex::new(parent),
            dirty: AtomicBool::new(false),
            state: Mutex::new(FileState {
                content: Content::Stored { node, reader: None },
                key,
                size,
                offset: 0,
                closed: false,
            }),
        }))
    }

    /// A new zero-length file that the next flush will store
    pub(crate) fn new_empty(
        name: String,
        parent: ParentRef,
        ctx: Arc<TreeContext>,
    ) -> Result<Arc<Self>, MfsError> {
        let empty = DagNode::file_leaf(Vec::new());
        Ok(Arc::new(Self {
            name,
            ctx,
            parent: Mutex::new(parent),
            dirty: AtomicBool::new(true),
            state: Mutex::new(FileState {
                key: empty.key()?,
                size: empty.cumulative_size()?,
                content: Content::Buffered(Vec::new()),
                offset: 0,
                closed: false,
            }),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.ctx.is_closed() || self.state.lock().closed
    }

    /// Key of the last flush, `None` while there are unflushed writes
    pub fn key(&self) -> Option<Key> {
        if self.is_dirty() {
            return None;
        }
        let state = self.state.lock();
        match state.content {
            Content::Stored { .. } => Some(state.key),
            Content::Buffered(_) => None,
        }
    }

    /// Logical size, including unflushed writes
    pub fn size(&self) -> Result<u64, MfsError> {
        let state = self.state.lock();
        self.ensure_usable(&state)?;
        Ok(logical_size(&state.content))
    }

    /// Write at the current offset, extending the file as needed
    pub fn write(&self, buf: &[u8]) -> Result<usize, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let offset = state.offset;
        let n = self.write_locked(&mut state, buf, offset)?;
        state.offset += n as u64;
        drop(state);

        self.mark_dirty();
        Ok(n)
    }

    /// Write at `offset` without moving the cursor
    ///
    /// Writing past the end fills the gap with zeros.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let n = self.write_locked(&mut state, buf, offset)?;
        drop(state);

        self.mark_dirty();
        Ok(n)
    }

    /// Read from the current offset
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let offset = state.offset;
        let n = self.read_locked(&mut state, buf, offset)?;
        state.offset += n as u64;
        Ok(n)
    }

    /// Read at `offset` without moving the cursor
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        self.read_locked(&mut state, buf, offset)
    }

    /// Read everything from the current offset to the end
    pub fn read_to_end(&self) -> Result<Vec<u8>, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let remaining = logical_size(&state.content).saturating_sub(state.offset);

        let mut out = vec![0u8; remaining as usize];
        let mut filled = 0;
        while filled < out.len() {
            let offset = state.offset;
            let n = self.read_locked(&mut state, &mut out[filled..], offset)?;
            if n == 0 {
                break;
            }
            filled += n;
            state.offset += n as u64;
        }
        out.truncate(filled);
        Ok(out)
    }

    /// Move the cursor; positions past the end are allowed
    pub fn seek(&self, pos: SeekFrom) -> Result<u64, MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => logical_size(&state.content).checked_add_signed(delta),
            SeekFrom::Current(delta) => state.offset.checked_add_signed(delta),
        };
        let offset = target.ok_or_else(|| {
            MfsError::InvalidArgument(format!("Invalid seek {:?} in {}", pos, self.name))
        })?;
        state.offset = offset;
        Ok(offset)
    }

    /// Cut or zero-extend the file to `size` bytes
    pub fn truncate(&self, size: u64) -> Result<(), MfsError> {
        let mut state = self.state.lock();
        self.ensure_usable(&state)?;
        let size = to_index(size)?;
        self.buffer(&mut state)?.resize(size, 0);
        drop(state);

        self.mark_dirty();
        debug!(file = %self.name, size, "Truncated file");
        Ok(())
    }

    /// Chunk buffered writes into the store and notify the parent
    ///
    /// A store failure keeps the buffer, so the flush can be retried.
    #[instrument(skip(self), fields(file = %self.name))]
    pub fn flush(&self) -> Result<Key, MfsError> {
        self.ctx.ensure_open()?;
        let _guard = self.ctx.flush_lock.lock();

        let before = {
            let state = self.state.lock();
            self.ensure_usable(&state)?;
            state.key
        };
        let link = self.flush_locked()?;
        if link.key != before {
            self.notify_parent();
        }
        Ok(link.key)
    }

    /// Flush and release the file; later operations on this handle fail with `Closed`
    pub fn close(&self) -> Result<Key, MfsError> {
        let _guard = self.ctx.flush_lock.lock();
        let flushed = self.flush()?;

        let mut state = self.state.lock();
        // Pick up writes that raced the flush above
        let link = self.flush_content(&mut state)?;
        state.closed = true;
        if let Content::Stored { reader, .. } = &mut state.content {
            *reader = None;
        }
        drop(state);

        if link.key != flushed {
            self.notify_parent();
        }
        debug!(file = %self.name, key = %link.key, "Closed file");
        Ok(link.key)
    }

    /// Flush and return the file's root DAG node
    pub fn get_node(&self) -> Result<DagNode, MfsError> {
        self.flush()?;
        let mut state = self.state.lock();
        self.flush_content(&mut state)?;
        Ok(self.stored_locked(&state)?.0)
    }

    /// Node and key of flushed content
    pub(crate) fn stored(&self) -> Result<(DagNode, Key), MfsError> {
        let state = self.state.lock();
        self.stored_locked(&state)
    }

    pub(crate) fn last_link(&self) -> Result<Link, MfsError> {
        let state = self.state.lock();
        Ok(Link {
            name: self.name.clone(),
            key: state.key,
            size: state.size,
        })
    }

    pub(crate) fn flush_locked(&self) -> Result<Link, MfsError> {
        self.dirty.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        let result = self.flush_content(&mut state);
        if result.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }

    pub(crate) fn mark_dirty(&self) {
        if !self.dirty.swap(true, Ordering::SeqCst) {
            self.notify_parent();
        }
    }

    pub(crate) fn detach(&self) {
        *self.parent.lock() = ParentRef::Detached;
    }

    fn notify_parent(&self) {
        let parent = self.parent.lock().clone();
        parent.mark_dirty();
    }

    fn flush_content(&self, state: &mut FileState) -> Result<Link, MfsError> {
        if let Content::Buffered(data) = &state.content {
            let (key, node) =
                build_dag_from_reader(self.ctx.store.as_ref(), data.as_slice(), &self.ctx.options)?;
            state.size = node.cumulative_size()?;
            state.key = key;
            state.content = Content::Stored { node, reader: None };
            trace!(file = %self.name, key = %key, "Flushed file");
        }
        Ok(Link {
            name: self.name.clone(),
            key: state.key,
            size: state.size,
        })
    }

    fn stored_locked(&self, state: &FileState) -> Result<(DagNode, Key), MfsError> {
        match &state.content {
            Content::Stored { node, .. } => Ok((node.clone(), state.key)),
            Content::Buffered(_) => Err(MfsError::InvalidArgument(format!(
                "File {} has unflushed writes",
                self.name
            ))),
        }
    }

    fn ensure_usable(&self, state: &FileState) -> Result<(), MfsError> {
        self.ctx.ensure_open()?;
        if state.closed {
            return Err(MfsError::Closed(format!("file {}", self.name)));
        }
        Ok(())
    }

    /// Switch to buffered content, loading the stored bytes first
    fn buffer<'a>(&self, state: &'a mut FileState) -> Result<&'a mut Vec<u8>, MfsError> {
        if let Content::Stored { node, .. } = &state.content {
            let bytes = cat(self.ctx.store.as_ref(), node)?;
            state.content = Content::Buffered(bytes);
        }
        match &mut state.content {
            Content::Buffered(data) => Ok(data),
            Content::Stored { .. } => Err(MfsError::InvalidArgument(format!(
                "File {} could not be buffered",
                self.name
            ))),
        }
    }

    fn write_locked(
        &self,
        state: &mut FileState,
        buf: &[u8],
        offset: u64,
    ) -> Result<usize, MfsError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let start = to_index(offset)?;
        let end = start
            .checked_add(buf.len())
            .ok_or_else(|| MfsError::InvalidArgument("Write past addressable size".to_string()))?;

        let data = self.buffer(state)?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn read_locked(
        &self,
        state: &mut FileState,
        buf: &mut [u8],
        offset: u64,
    ) -> Result<usize, MfsError> {
        match &mut state.content {
            Content::Buffered(data) => {
                let start = offset.min(data.len() as u64) as usize;
                let n = (data.len() - start).min(buf.len());
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            }
            Content::Stored { node, reader } => {
                let mut dag_reader = match reader.take() {
                    Some(r) => r,
                    None => DagReader::new(self.ctx.store.clone(), node.clone())?,
                };
                let result = dag_reader
                    .seek(SeekFrom::Start(offset))
                    .and_then(|_| dag_reader.read(buf));
                *reader = Some(dag_reader);
                result.map_err(|e| MfsError::StoreUnavailable(StorageError::IoError(e)))
            }
        }
    }
}

fn logical_size(content: &Content) -> u64 {
    match content {
        Content::Stored { node, .. } => node.file_size().unwrap_or(0),
        Content::Buffered(data) => data.len() as u64,
    }
}

fn to_index(offset: u64) -> Result<usize, MfsError> {
    usize::try_from(offset)
        .map_err(|_| MfsError::InvalidArgument(format!("Offset {} out of range", offset)))
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl Read for &File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        File::read(*self, buf).map_err(io::Error::from)
    }
}

impl Write for &File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        File::write(*self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        File::flush(*self).map(|_| ()).map_err(io::Error::from)
    }
}

impl Seek for &File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        File::seek(*self, pos).map_err(io::Error::from)
    }
}
