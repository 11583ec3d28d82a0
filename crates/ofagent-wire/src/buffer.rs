//! Outgoing message buffers.
//!
//! A [`Segment`] is a fixed-capacity, zero-filled byte region with a write
//! cursor and a declared payload length (`plen`). Writes at the cursor may
//! not cross `plen`; [`Segment::patch_u16`] overwrites bytes that were
//! already written. The transport sends exactly `plen` bytes of each
//! segment, so encoders widen `plen` to the capacity before writing and
//! shrink it back to the written length afterwards.
//!
//! Segments are chained in a [`BufferList`]. Lists and segments handed out
//! by a [`SegmentPool`] are accounted in [`PoolStats`] and released when
//! dropped, so every allocation is returned exactly once.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, warn};

use crate::error::EncodeError;

/// Default segment capacity: the largest message a 16-bit length can describe.
pub const DEFAULT_SEGMENT_SIZE: usize = u16::MAX as usize;

/// Source of buffer lists and segments.
pub trait BufferAllocator {
    /// Allocate an empty buffer list. `None` when resources are exhausted.
    fn alloc_list(&self) -> Option<BufferList>;

    /// Allocate one segment. `None` when resources are exhausted.
    fn alloc_segment(&self) -> Option<Segment>;
}

impl<T: BufferAllocator + ?Sized> BufferAllocator for &T {
    fn alloc_list(&self) -> Option<BufferList> {
        (**self).alloc_list()
    }

    fn alloc_segment(&self) -> Option<Segment> {
        (**self).alloc_segment()
    }
}

impl<T: BufferAllocator + ?Sized> BufferAllocator for Arc<T> {
    fn alloc_list(&self) -> Option<BufferList> {
        (**self).alloc_list()
    }

    fn alloc_segment(&self) -> Option<Segment> {
        (**self).alloc_segment()
    }
}

/// Allocation counters shared by a pool and everything it hands out.
#[derive(Debug, Default)]
pub struct PoolStats {
    lists_allocated: AtomicUsize,
    lists_freed: AtomicUsize,
    segments_allocated: AtomicUsize,
    segments_freed: AtomicUsize,
}

impl PoolStats {
    pub fn lists_allocated(&self) -> usize {
        self.lists_allocated.load(Ordering::SeqCst)
    }

    pub fn lists_freed(&self) -> usize {
        self.lists_freed.load(Ordering::SeqCst)
    }

    pub fn segments_allocated(&self) -> usize {
        self.segments_allocated.load(Ordering::SeqCst)
    }

    pub fn segments_freed(&self) -> usize {
        self.segments_freed.load(Ordering::SeqCst)
    }

    /// Lists handed out and not yet released.
    pub fn outstanding_lists(&self) -> usize {
        self.lists_allocated().saturating_sub(self.lists_freed())
    }

    /// Segments handed out and not yet released.
    pub fn outstanding_segments(&self) -> usize {
        self.segments_allocated().saturating_sub(self.segments_freed())
    }

    /// Count one more segment as allocated, unless `max` are already out.
    /// Check and increment happen in one compare-exchange.
    fn reserve_segment(&self, max: Option<usize>) -> Result<(), usize> {
        self.segments_allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |allocated| {
                let outstanding = allocated.saturating_sub(self.segments_freed());
                match max {
                    Some(max) if outstanding >= max => None,
                    _ => Some(allocated + 1),
                }
            })
            .map(|_| ())
            .map_err(|allocated| allocated.saturating_sub(self.segments_freed()))
    }

    /// Undo a reservation whose allocation failed.
    fn cancel_segment(&self) {
        self.segments_allocated.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Which counter a [`Lease`] returns to on drop.
#[derive(Clone, Copy)]
enum LeaseKind {
    List,
    Segment,
}

/// Ties an allocation to its pool's counters.
struct Lease {
    stats: Option<Arc<PoolStats>>,
    kind: LeaseKind,
}

impl Lease {
    fn detached(kind: LeaseKind) -> Self {
        Self { stats: None, kind }
    }

    fn pooled(stats: &Arc<PoolStats>, kind: LeaseKind) -> Self {
        let counter = match kind {
            LeaseKind::List => &stats.lists_allocated,
            LeaseKind::Segment => &stats.segments_allocated,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        Self::reserved(stats, kind)
    }

    /// Lease for an allocation already counted by the caller.
    fn reserved(stats: &Arc<PoolStats>, kind: LeaseKind) -> Self {
        Self {
            stats: Some(Arc::clone(stats)),
            kind,
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(stats) = &self.stats {
            let counter = match self.kind {
                LeaseKind::List => &stats.lists_freed,
                LeaseKind::Segment => &stats.segments_freed,
            };
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// One fixed-capacity unit of an outgoing buffer.
pub struct Segment {
    data: BytesMut,
    len: usize,
    plen: usize,
    _lease: Lease,
}

impl Segment {
    /// Create a segment outside any pool.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(BytesMut::zeroed(capacity), Lease::detached(LeaseKind::Segment))
    }

    /// Like [`Segment::with_capacity`], but `None` when the memory cannot
    /// be allocated.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        Some(Self::new(
            zeroed(capacity)?,
            Lease::detached(LeaseKind::Segment),
        ))
    }

    fn new(data: BytesMut, lease: Lease) -> Self {
        Self {
            data,
            len: 0,
            plen: 0,
            _lease: lease,
        }
    }

    /// Total bytes this segment can hold.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Declared payload length.
    pub fn plen(&self) -> usize {
        self.plen
    }

    /// Declare the payload length, clamped to the capacity.
    pub fn set_plen(&mut self, plen: usize) {
        self.plen = plen.min(self.capacity());
    }

    /// Shrink the declared payload length to the bytes actually written.
    pub fn reset_plen(&mut self) {
        self.plen = self.len;
    }

    /// Bytes that can still be written before reaching `plen`.
    pub fn available(&self) -> usize {
        self.plen.saturating_sub(self.len)
    }

    /// Written length as the value of a 16-bit length field.
    pub fn encoded_length(&self) -> Result<u16, EncodeError> {
        u16::try_from(self.len).map_err(|_| EncodeError::LengthOverflow(self.len))
    }

    /// Append bytes at the cursor.
    pub fn put_slice(&mut self, src: &[u8]) -> Result<(), EncodeError> {
        self.reserve(src.len())?;
        self.data[self.len..self.len + src.len()].copy_from_slice(src);
        self.len += src.len();
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), EncodeError> {
        self.put_slice(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), EncodeError> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), EncodeError> {
        self.put_slice(&value.to_be_bytes())
    }

    /// Append `count` zero bytes.
    pub fn put_zeros(&mut self, count: usize) -> Result<(), EncodeError> {
        self.reserve(count)?;
        self.data[self.len..self.len + count].fill(0);
        self.len += count;
        Ok(())
    }

    /// Overwrite two already-written bytes at `offset` with `value` (big-endian).
    pub fn patch_u16(&mut self, offset: usize, value: u16) -> Result<(), EncodeError> {
        if offset.checked_add(2).is_none_or(|end| end > self.len) {
            return Err(EncodeError::PatchOutOfBounds {
                offset,
                width: 2,
                written: self.len,
            });
        }
        self.data[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The bytes a transport should send: the first `plen` bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.plen]
    }

    fn reserve(&self, needed: usize) -> Result<(), EncodeError> {
        let available = self.available();
        if needed > available {
            return Err(EncodeError::OutOfSpace { needed, available });
        }
        Ok(())
    }
}

/// Zero-filled buffer of `capacity` bytes, or `None` if the allocation fails.
fn zeroed(capacity: usize) -> Option<BytesMut> {
    let mut data: Vec<u8> = Vec::new();
    data.try_reserve_exact(capacity).ok()?;
    data.resize(capacity, 0);
    Some(BytesMut::from(bytes::Bytes::from(data)))
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("plen", &self.plen)
            .finish()
    }
}

/// An ordered chain of segments forming one outgoing message.
#[derive(Debug)]
pub struct BufferList {
    segments: Vec<Segment>,
    _lease: Lease,
}

impl BufferList {
    /// Create an empty list outside any pool.
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            _lease: Lease::detached(LeaseKind::List),
        }
    }

    /// The last segment of the list, allocating one from `allocator` when
    /// the list is empty.
    pub fn tail_segment<A>(&mut self, allocator: &A) -> Option<&mut Segment>
    where
        A: BufferAllocator + ?Sized,
    {
        if self.segments.is_empty() {
            self.segments.push(allocator.alloc_segment()?);
        }
        self.segments.last_mut()
    }

    /// Append a segment at the tail.
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Sum of the declared payload lengths of all segments.
    pub fn payload_len(&self) -> usize {
        self.segments.iter().map(Segment::plen).sum()
    }

    /// Concatenated payload of every segment.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload_len());
        for segment in &self.segments {
            out.extend_from_slice(segment.payload());
        }
        out
    }

    /// Return the list and its segments to their pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Default for BufferList {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.stats.is_some() { "pooled" } else { "detached" })
    }
}

/// Segment pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Capacity of each segment in bytes. Default and maximum: 65535.
    pub segment_size: usize,
    /// Maximum segments outstanding at once. `None` means unbounded.
    pub max_outstanding_segments: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            max_outstanding_segments: None,
        }
    }
}

/// Heap-backed allocator with shared accounting and an optional budget.
///
/// Cloning yields a handle to the same counters.
#[derive(Debug, Clone, Default)]
pub struct SegmentPool {
    config: PoolConfig,
    stats: Arc<PoolStats>,
}

impl SegmentPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl BufferAllocator for SegmentPool {
    fn alloc_list(&self) -> Option<BufferList> {
        Some(BufferList {
            segments: Vec::new(),
            _lease: Lease::pooled(&self.stats, LeaseKind::List),
        })
    }

    fn alloc_segment(&self) -> Option<Segment> {
        let max = self.config.max_outstanding_segments;
        if let Err(outstanding) = self.stats.reserve_segment(max) {
            debug!(outstanding, ?max, "segment budget exhausted");
            return None;
        }

        let size = self.config.segment_size;
        let data = if size > DEFAULT_SEGMENT_SIZE {
            None
        } else {
            zeroed(size)
        };
        let Some(data) = data else {
            self.stats.cancel_segment();
            warn!(segment_size = size, "segment allocation failed");
            return None;
        };
        Some(Segment::new(
            data,
            Lease::reserved(&self.stats, LeaseKind::Segment),
        ))
    }
}
