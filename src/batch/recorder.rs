use crate::batch::pool::{ArgSignature, BatchBufferId, BatchBufferPool};
use crate::foundation::core::Rect;
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::submit::command::Command;

/// Block edge in pixels.
pub(crate) const BLOCK_SIZE: i32 = 16;

/// Bits of a 16-pixel span covered by `[start, end)`, both relative to the block origin.
pub(crate) fn span_mask(start: i32, end: i32) -> u16 {
    let s = start.clamp(0, BLOCK_SIZE) as u32;
    let e = end.clamp(0, BLOCK_SIZE) as u32;
    ((0xffff_u32 << s) & ((1_u32 << e) - 1)) as u16
}

/// Visit every 16x16 block of `output` that at least one of `dst_rects` touches.
///
/// `f` receives the block origin and one `horizontal | vertical << 16` mask per layer. Without
/// `skip_blocks` every block of the output rect is visited.
pub(crate) fn walk_blocks(
    output: Rect,
    dst_rects: &[Rect],
    skip_blocks: bool,
    mut f: impl FnMut(i32, i32, &[u32]) -> CompositeResult<()>,
) -> CompositeResult<()> {
    let base = if skip_blocks { 0 } else { 0xffff };
    let mut vmasks = vec![0_u16; dst_rects.len()];
    let mut masks = vec![0_u32; dst_rects.len()];

    let mut y = output.top;
    while y < output.bottom {
        let mut row = base;
        for (m, r) in vmasks.iter_mut().zip(dst_rects) {
            *m = span_mask(r.top - y, r.bottom - y);
            row |= *m;
        }
        if row != 0 {
            let mut x = output.left;
            while x < output.right {
                let mut block = base;
                for ((out, r), v) in masks.iter_mut().zip(dst_rects).zip(&vmasks) {
                    let h = span_mask(r.left - x, r.right - x);
                    block |= h;
                    *out = u32::from(h) | u32::from(*v) << 16;
                }
                if block != 0 {
                    f(x, y, &masks)?;
                }
                x = (x + BLOCK_SIZE) & !(BLOCK_SIZE - 1);
            }
        }
        y = (y + BLOCK_SIZE) & !(BLOCK_SIZE - 1);
    }
    Ok(())
}

/// Upper bound in bytes of a recording for `sig`.
pub(crate) fn batch_size(sig: &ArgSignature) -> usize {
    let cols = sig.output_rect.width().div_ceil(16) as usize + 1;
    let rows = sig.output_rect.height().div_ceil(16) as usize + 1;
    let object = Command::MediaObject {
        media_id: 0,
        x: 0,
        y: 0,
        masks: &[0; 0],
    }
    .dwords()
        + sig.layer_count();
    (rows * cols * object + Command::BatchBufferEnd.dwords()) * 4
}

/// Record the block walk for `sig` into buffer `id`.
///
/// The buffer is locked for the duration of the recording and unlocked on every path out.
pub(crate) fn record(
    pool: &mut BatchBufferPool,
    id: BatchBufferId,
    sig: &ArgSignature,
) -> CompositeResult<usize> {
    let buf = pool.buffer_mut(id)?;
    if buf.locked {
        return Err(CompositeError::resource(format!(
            "batch buffer {} is already being recorded",
            id.0
        )));
    }
    buf.locked = true;
    buf.data.clear();

    let limit = buf.size / 4;
    let data = &mut buf.data;
    let mut blocks = 0_usize;
    let walked = walk_blocks(
        sig.output_rect,
        &sig.dst_rects,
        sig.skip_blocks,
        |x, y, masks| {
            let cmd = Command::MediaObject {
                media_id: sig.media_id,
                x,
                y,
                masks,
            };
            if data.len() + cmd.dwords() > limit {
                return Err(CompositeError::resource(format!(
                    "batch buffer of {limit} dwords overflowed at block ({x}, {y})"
                )));
            }
            cmd.encode(data);
            blocks += 1;
            Ok(())
        },
    )
    .and_then(|()| {
        if data.len() + Command::BatchBufferEnd.dwords() > limit {
            return Err(CompositeError::resource("batch buffer has no room for its end"));
        }
        Command::BatchBufferEnd.encode(data);
        Ok(())
    });

    buf.locked = false;
    match walked {
        Ok(()) => {
            tracing::trace!(buffer = id.0, blocks, "batch buffer recorded");
            pool.mark_recorded(id, sig.clone())?;
            Ok(blocks)
        }
        Err(e) => {
            pool.discard(id);
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/batch/recorder.rs"]
mod tests;
