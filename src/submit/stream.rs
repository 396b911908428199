//! Emission of one phase into the device command stream.

use crate::batch::pool::{ArgSignature, BatchBufferId, BatchBufferPool};
use crate::batch::recorder::walk_blocks;
use crate::coeff::cache::CoeffTable;
use crate::foundation::core::{GpuContextId, ScalingMode, SurfaceId};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::hw::caps::HwGeneration;
use crate::hw::static_data::StaticData;
use crate::kernel::cache::KernelEntry;
use crate::submit::command::Command;
use crate::submit::device::{CommandBuffer, CommandDevice};

/// Slices requested for composite work.
const COMPOSITE_SLICES: u8 = 1;
/// Write-back caching for render targets and intermediates.
const RENDER_CACHE_POLICY: u32 = 0x3;

/// Everything needed to put one phase on the device queue.
pub(crate) struct PhaseSubmission<'a> {
    pub(crate) generation: HwGeneration,
    pub(crate) ctx: GpuContextId,
    /// Last submission of the composite call; carries frame tracking.
    pub(crate) last: bool,
    pub(crate) marker: u32,
    pub(crate) static_data: &'a StaticData,
    pub(crate) kernel: &'a KernelEntry,
    pub(crate) avs: Option<&'a CoeffTable>,
    /// Sampler filter per layer slot.
    pub(crate) samplers: &'a [ScalingMode],
    /// Binding table in slot order: `(surface, written)`.
    pub(crate) bindings: &'a [(SurfaceId, bool)],
    /// Recorded block walk, or `None` for inline dispatch of `signature`.
    pub(crate) batch: Option<BatchBufferId>,
    pub(crate) signature: &'a ArgSignature,
    pub(crate) null_render: bool,
    pub(crate) call_id: u64,
}

/// Result of a successful submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SubmitReceipt {
    pub(crate) sync_tag: u32,
    /// Completion tag stored for status tracking, only on the last submission.
    pub(crate) completion_tag: Option<u32>,
    /// Dwords written into the primary buffer.
    pub(crate) dwords: usize,
}

/// Owns the sync tag sequence that retires batch buffers.
#[derive(Debug)]
pub(crate) struct Submitter {
    next_tag: u32,
}

impl Default for Submitter {
    fn default() -> Self {
        Self { next_tag: 1 }
    }
}

impl Submitter {
    /// Emit and submit one phase. On failure the primary buffer is rolled back and returned
    /// unsubmitted and the batch buffer recording is discarded.
    pub(crate) fn submit_phase<D: CommandDevice + ?Sized>(
        &mut self,
        device: &mut D,
        pool: &mut BatchBufferPool,
        p: &PhaseSubmission<'_>,
    ) -> CompositeResult<SubmitReceipt> {
        let mut buf = device.get_command_buffer()?;
        let cursor = buf.cursor();
        let remaining = buf.remaining();
        let completion_tag = p.last.then(|| device.completion_tag(p.ctx));
        let sync_tag = self.next_tag;

        if let Err(e) = emit_phase(&mut buf, pool, p, completion_tag, sync_tag) {
            buf.rollback(cursor, remaining);
            device.return_command_buffer(buf);
            if let Some(id) = p.batch {
                pool.discard(id);
            }
            tracing::debug!(error = %e, "phase emission rolled back");
            return Err(e);
        }
        let dwords = buf.cursor() - cursor;

        if let Err(e) = device.submit_command_buffer(buf, p.null_render) {
            if let Some(id) = p.batch {
                pool.discard(id);
            }
            return Err(e);
        }

        if p.last {
            device.increment_completion_tag(p.ctx);
        }
        self.next_tag = self.next_tag.wrapping_add(1);
        if let Some(id) = p.batch {
            pool.mark_submitted(id, sync_tag, p.call_id)?;
        }
        tracing::trace!(sync_tag, dwords, last = p.last, "phase submitted");
        Ok(SubmitReceipt {
            sync_tag,
            completion_tag,
            dwords,
        })
    }
}

fn emit_phase(
    buf: &mut CommandBuffer,
    pool: &BatchBufferPool,
    p: &PhaseSubmission<'_>,
    completion_tag: Option<u32>,
    sync_tag: u32,
) -> CompositeResult<()> {
    buf.emit(&Command::PowerMode {
        slices: COMPOSITE_SLICES,
    })?;
    if let Some(tag) = completion_tag {
        buf.emit(&Command::StoreStatusTag { tag })?;
        buf.emit(&Command::IncrementCompletion)?;
    }
    buf.emit(&Command::Marker(p.marker))?;
    buf.emit(&Command::Prologue)?;

    let mut curbe = Vec::new();
    p.static_data.write_wire(&mut curbe);
    buf.emit(&Command::StaticData(&curbe))?;

    let binding_count = u8::try_from(p.bindings.len())
        .map_err(|_| CompositeError::submission("too many surface bindings"))?;
    buf.emit(&Command::InterfaceDescriptor {
        kernel_id: p.kernel.id,
        binary_len: p.kernel.kernel.binary.len() as u32,
        const_dwords: p.kernel.kernel.const_dwords,
        binding_count,
    })?;
    if let Some(table) = p.avs {
        let coefficients = avs_dwords(table);
        buf.emit(&Command::SamplerAvs {
            slot: 0,
            coefficients: &coefficients,
        })?;
    }
    for (layer, &filter) in (0u8..).zip(p.samplers) {
        buf.emit(&Command::SamplerState { layer, filter })?;
    }
    for (index, &(surface, write)) in (0u8..).zip(p.bindings) {
        buf.emit(&Command::SurfaceBinding {
            index,
            surface,
            write,
        })?;
    }
    buf.emit(&Command::CacheOverride {
        policy: RENDER_CACHE_POLICY,
    })?;
    if p.generation.needs_media_state_flush() {
        buf.emit(&Command::MediaStateFlush)?;
    }

    match p.batch {
        Some(id) => {
            let recorded = pool.buffer(id).ok_or_else(|| {
                CompositeError::submission(format!("batch buffer {} vanished", id.0))
            })?;
            if recorded.signature.is_none() {
                return Err(CompositeError::submission(format!(
                    "batch buffer {} was never recorded",
                    id.0
                )));
            }
            buf.emit(&Command::BatchBufferStart {
                buffer: id.0 as u32,
                dwords: recorded.data.len() as u32,
            })?;
        }
        None => walk_blocks(
            p.signature.output_rect,
            &p.signature.dst_rects,
            p.signature.skip_blocks,
            |x, y, masks| {
                buf.emit(&Command::MediaObject {
                    media_id: p.signature.media_id,
                    x,
                    y,
                    masks,
                })
            },
        )?,
    }

    buf.emit(&Command::StoreSyncTag { tag: sync_tag })?;
    if p.generation.needs_pipe_control() {
        buf.emit(&Command::PipeControl)?;
    }
    buf.emit(&Command::BatchBufferEnd)
}

/// Flatten a coefficient table: horizontal Y, horizontal UV, vertical Y, vertical UV.
pub(crate) fn avs_dwords(table: &CoeffTable) -> Vec<u32> {
    [
        &table.horizontal.y,
        &table.horizontal.uv,
        &table.vertical.y,
        &table.vertical.uv,
    ]
    .into_iter()
    .flatten()
    .map(|&c| c as u32)
    .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/submit/stream.rs"]
mod tests;
