use crate::foundation::core::{Rect, Rotation};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::foundation::math::{align_up, tag_before, tag_reached};
use crate::scene::params::Nlas;
use smallvec::SmallVec;

/// Pool configuration for second-level batch buffers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchPoolOpts {
    /// Maximum number of buffers ever allocated.
    pub(crate) max_buffers: usize,
    /// Allocation granularity in bytes (power of two).
    pub(crate) align: usize,
}

impl Default for BatchPoolOpts {
    fn default() -> Self {
        Self {
            max_buffers: 32,
            align: 32 * 1024,
        }
    }
}

/// Non-linear anamorphic scaling parameters, compared bit-exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NlasSignature {
    pub(crate) vertical_crop: u32,
    pub(crate) horizontal_linear_region: u32,
    pub(crate) nonlinear_crop: u32,
}

impl NlasSignature {
    pub(crate) fn from_params(n: &Nlas) -> Self {
        Self {
            vertical_crop: n.vertical_crop.to_bits(),
            horizontal_linear_region: n.horizontal_linear_region.to_bits(),
            nonlinear_crop: n.nonlinear_crop.to_bits(),
        }
    }
}

/// Everything a recorded block walk depends on. Equal signatures produce identical recordings.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ArgSignature {
    /// Kernel id of the phase.
    pub(crate) media_id: u32,
    pub(crate) output_rect: Rect,
    pub(crate) dst_rects: SmallVec<[Rect; 8]>,
    pub(crate) rotations: SmallVec<[Rotation; 8]>,
    /// Horizontal step of layer 0, as raw bits.
    pub(crate) step_x: u32,
    pub(crate) skip_blocks: bool,
    pub(crate) nlas: Option<NlasSignature>,
}

impl ArgSignature {
    pub(crate) fn layer_count(&self) -> usize {
        self.dst_rects.len()
    }

    /// A buffer recorded for `self` can replay a request for `req`.
    ///
    /// Extra layers recorded beyond the request's are ignored.
    fn serves(&self, req: &ArgSignature) -> bool {
        let n = req.layer_count();
        self.media_id == req.media_id
            && self.step_x == req.step_x
            && self.skip_blocks == req.skip_blocks
            && self.output_rect == req.output_rect
            && self.layer_count() >= n
            && self.dst_rects[..n] == req.dst_rects[..]
            && self.rotations.get(..n) == req.rotations.get(..n)
            && self.nlas == req.nlas
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BatchBufferId(pub(crate) usize);

/// One second-level batch buffer.
#[derive(Debug)]
pub(crate) struct BatchBuffer {
    pub(crate) data: Vec<u32>,
    /// Capacity in bytes.
    pub(crate) size: usize,
    /// Signature of the recording in `data`; `None` until recorded.
    pub(crate) signature: Option<ArgSignature>,
    pub(crate) busy: bool,
    pub(crate) sync_tag: u32,
    pub(crate) call_id: u64,
    pub(crate) locked: bool,
}

impl BatchBuffer {
    fn new(size: usize) -> Self {
        Self {
            data: Vec::with_capacity(size / 4),
            size,
            signature: None,
            busy: false,
            sync_tag: 0,
            call_id: 0,
            locked: false,
        }
    }
}

/// How [`BatchBufferPool::acquire`] found a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Acquired {
    /// Identical recording from an earlier call, replay without recording.
    Reused,
    /// Oldest idle buffer, must be recorded.
    Recycled,
    /// Newly allocated buffer.
    Allocated,
    /// Oldest idle buffer reallocated at the requested size.
    Evicted,
}

impl Acquired {
    pub(crate) fn needs_recording(self) -> bool {
        !matches!(self, Self::Reused)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchPoolStats {
    pub(crate) reused: u64,
    pub(crate) recorded: u64,
    pub(crate) allocated: u64,
    pub(crate) evicted: u64,
}

/// Bounded pool of batch buffers reused across phases and calls.
///
/// Acquisition never blocks: it falls back from a matching recording to the oldest idle buffer,
/// a new allocation and finally eviction, and fails only when every buffer is in flight.
pub(crate) struct BatchBufferPool {
    opts: BatchPoolOpts,
    buffers: Vec<BatchBuffer>,
    stats: BatchPoolStats,
}

impl BatchBufferPool {
    pub(crate) fn new(opts: BatchPoolOpts) -> Self {
        Self {
            opts,
            buffers: Vec::new(),
            stats: BatchPoolStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> BatchPoolStats {
        self.stats
    }

    pub(crate) fn len(&self) -> usize {
        self.buffers.len()
    }

    pub(crate) fn buffer(&self, id: BatchBufferId) -> Option<&BatchBuffer> {
        self.buffers.get(id.0)
    }

    pub(crate) fn buffer_mut(&mut self, id: BatchBufferId) -> CompositeResult<&mut BatchBuffer> {
        self.buffers
            .get_mut(id.0)
            .ok_or_else(|| CompositeError::resource(format!("unknown batch buffer {}", id.0)))
    }

    /// Clear `busy` on every buffer the device reports complete.
    pub(crate) fn refresh(&mut self, reported_sync_tag: u32) {
        for b in self.buffers.iter_mut().filter(|b| b.busy) {
            if tag_reached(reported_sync_tag, b.sync_tag) {
                b.busy = false;
            }
        }
    }

    /// Find or make a buffer of at least `size` bytes for `sig`.
    pub(crate) fn acquire(
        &mut self,
        size: usize,
        sig: &ArgSignature,
        call_id: u64,
        reported_sync_tag: u32,
        allow_replay: bool,
    ) -> CompositeResult<(BatchBufferId, Acquired)> {
        self.refresh(reported_sync_tag);

        // A matching recording is replayed even while in flight; its contents are identical.
        if allow_replay
            && let Some(i) = self.buffers.iter().position(|b| {
                b.size >= size
                    && b.call_id != call_id
                    && b.signature.as_ref().is_some_and(|s| s.serves(sig))
            })
        {
            self.stats.reused = self.stats.reused.saturating_add(1);
            tracing::trace!(buffer = i, "batch buffer replay");
            return Ok((BatchBufferId(i), Acquired::Reused));
        }

        if let Some(i) = oldest_idle(&self.buffers, size) {
            self.reset(i);
            return Ok((BatchBufferId(i), Acquired::Recycled));
        }

        let aligned = align_up(size.max(1), self.opts.align);
        if self.buffers.len() < self.opts.max_buffers {
            self.buffers.push(BatchBuffer::new(aligned));
            self.stats.allocated = self.stats.allocated.saturating_add(1);
            tracing::debug!(bytes = aligned, count = self.buffers.len(), "batch buffer allocated");
            return Ok((BatchBufferId(self.buffers.len() - 1), Acquired::Allocated));
        }

        if let Some(i) = oldest_idle(&self.buffers, 0) {
            self.buffers[i] = BatchBuffer::new(aligned);
            self.stats.evicted = self.stats.evicted.saturating_add(1);
            tracing::debug!(buffer = i, bytes = aligned, "batch buffer evicted");
            return Ok((BatchBufferId(i), Acquired::Evicted));
        }

        Err(CompositeError::resource(format!(
            "all {} batch buffers are in flight",
            self.buffers.len()
        )))
    }

    fn reset(&mut self, i: usize) {
        let b = &mut self.buffers[i];
        b.data.clear();
        b.signature = None;
    }

    /// Record that `id` holds a recording for `sig`.
    pub(crate) fn mark_recorded(
        &mut self,
        id: BatchBufferId,
        sig: ArgSignature,
    ) -> CompositeResult<()> {
        let b = self.buffer_mut(id)?;
        b.signature = Some(sig);
        self.stats.recorded = self.stats.recorded.saturating_add(1);
        Ok(())
    }

    /// Mark `id` in flight until the device reports `sync_tag`.
    pub(crate) fn mark_submitted(
        &mut self,
        id: BatchBufferId,
        sync_tag: u32,
        call_id: u64,
    ) -> CompositeResult<()> {
        let b = self.buffer_mut(id)?;
        b.busy = true;
        b.sync_tag = sync_tag;
        b.call_id = call_id;
        Ok(())
    }

    /// Drop the recording of `id` after a failed submission so it is never replayed.
    pub(crate) fn discard(&mut self, id: BatchBufferId) {
        if let Some(b) = self.buffers.get_mut(id.0) {
            b.data.clear();
            b.signature = None;
            b.locked = false;
        }
    }
}

/// Idle, unlocked buffer of at least `min_size` bytes with the oldest sync tag.
fn oldest_idle(buffers: &[BatchBuffer], min_size: usize) -> Option<usize> {
    buffers
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.busy && !b.locked && b.size >= min_size)
        .reduce(|best, cur| {
            if tag_before(cur.1.sync_tag, best.1.sync_tag) {
                cur
            } else {
                best
            }
        })
        .map(|(i, _)| i)
}
